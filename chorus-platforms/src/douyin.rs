//! douyin: general search for videos plus top comments.
//!
//! The general-search feed mixes plain videos with mix/collection entries;
//! entries without an `aweme_info` are skipped rather than failing the search.

use crate::identity;
use crate::pacer::Pacer;
use crate::session::PlatformAdapter;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chorus_browser::Page;
use chorus_common::model::{CommentItem, ContentExtra, ContentItem, ContentType};
use chorus_common::text::{clean_text, parse_count};
use chorus_common::{ChorusConfig, Platform};
use chorus_http::{HttpClient, RequestOpts, SessionHeaders};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const WEB_BASE: &str = "https://www.douyin.com";

// ---- raw API shapes ----

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiStatus {
    status_code: i64,
    status_msg: String,
}

impl ApiStatus {
    fn check(&self, what: &str) -> Result<()> {
        if self.status_code != 0 {
            bail!(
                "douyin {what} failed with status {}: {}",
                self.status_code,
                self.status_msg
            );
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResponse {
    #[serde(flatten)]
    status: ApiStatus,
    data: Vec<SearchEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchEntry {
    aweme_info: Option<AwemeInfo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AwemeInfo {
    aweme_id: String,
    /// douyin calls the caption `desc`; it doubles as the title.
    desc: String,
    create_time: u64,
    statistics: AwemeStatistics,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AwemeStatistics {
    digg_count: Value,
    comment_count: Value,
    share_count: Value,
    play_count: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CommentResponse {
    #[serde(flatten)]
    status: ApiStatus,
    comments: Option<Vec<CommentRaw>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CommentRaw {
    text: String,
    digg_count: Value,
    create_time: u64,
}

// ---- API client ----

struct DouyinClient {
    http: HttpClient,
}

impl DouyinClient {
    fn new(headers: SessionHeaders, timeout: Duration) -> Result<Self> {
        let http = HttpClient::new(WEB_BASE, headers)?.with_timeout(timeout);
        Ok(Self { http })
    }

    fn set_cookie(&mut self, cookie: String) {
        self.http.set_cookie(cookie);
    }

    async fn pong(&self) -> Result<bool> {
        let resp: ApiStatus = self
            .http
            .get_json("/aweme/v1/web/im/user/info/", RequestOpts::default())
            .await?;
        Ok(resp.status_code == 0)
    }

    async fn search(&self, keyword: &str) -> Result<Vec<SearchEntry>> {
        let resp: SearchResponse = self
            .http
            .get_json(
                "/aweme/v1/web/general/search/single/",
                RequestOpts {
                    query: Some(vec![
                        ("keyword", keyword.into()),
                        ("offset", "0".into()),
                        ("search_channel", "aweme_general".into()),
                        ("search_source", "normal_search".into()),
                    ]),
                    ..Default::default()
                },
            )
            .await?;
        resp.status.check("search")?;
        Ok(resp.data)
    }

    async fn comments(&self, aweme_id: &str, count: usize) -> Result<Vec<CommentRaw>> {
        let count = count.to_string();
        let resp: CommentResponse = self
            .http
            .get_json(
                "/aweme/v1/web/comment/list/",
                RequestOpts {
                    query: Some(vec![
                        ("aweme_id", aweme_id.into()),
                        ("cursor", "0".into()),
                        ("count", count.as_str().into()),
                    ]),
                    ..Default::default()
                },
            )
            .await?;
        resp.status.check("comment list")?;
        Ok(resp.comments.unwrap_or_default())
    }
}

// ---- mapping ----

fn map_aweme(info: &AwemeInfo) -> ContentItem {
    ContentItem {
        platform: Platform::Douyin,
        content_type: ContentType::Video,
        title: clean_text(&info.desc),
        content: String::new(),
        url: format!("{WEB_BASE}/video/{}", info.aweme_id),
        publish_time: if info.create_time > 0 {
            info.create_time.to_string()
        } else {
            String::new()
        },
        like_count: parse_count(&info.statistics.digg_count),
        comment_count: parse_count(&info.statistics.comment_count),
        share_count: parse_count(&info.statistics.share_count),
        view_count: parse_count(&info.statistics.play_count),
        comments: Vec::new(),
        extra: Some(ContentExtra::Douyin {
            aweme_id: info.aweme_id.clone(),
        }),
    }
}

fn map_comment(raw: CommentRaw) -> CommentItem {
    CommentItem {
        content: clean_text(&raw.text),
        like_count: parse_count(&raw.digg_count),
        create_time: if raw.create_time > 0 {
            raw.create_time.to_string()
        } else {
            String::new()
        },
        is_reply: false,
    }
}

// ---- adapter ----

pub struct DouyinAdapter {
    client: Option<DouyinClient>,
}

impl DouyinAdapter {
    pub fn new() -> Self {
        Self { client: None }
    }

    fn client(&self) -> Result<&DouyinClient> {
        self.client
            .as_ref()
            .ok_or_else(|| anyhow!("douyin client not initialized"))
    }
}

impl Default for DouyinAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformAdapter for DouyinAdapter {
    fn platform(&self) -> Platform {
        Platform::Douyin
    }

    fn index_url(&self) -> &'static str {
        WEB_BASE
    }

    async fn init_client(&mut self, page: &Page, config: &ChorusConfig) -> Result<()> {
        let headers = identity::harvest(page, WEB_BASE, "https://www.douyin.com/").await?;
        self.client = Some(DouyinClient::new(
            headers,
            Duration::from_secs(config.request_timeout),
        )?);
        Ok(())
    }

    async fn check_login(&self) -> Result<bool> {
        self.client()?.pong().await
    }

    async fn refresh_auth(&mut self, page: &Page) -> Result<()> {
        let cookie = page.cookie_header().await?;
        if let Some(client) = self.client.as_mut() {
            client.set_cookie(cookie);
        }
        Ok(())
    }

    async fn search(
        &mut self,
        keyword: &str,
        max_contents: usize,
        pacer: &Pacer,
    ) -> Result<Vec<ContentItem>> {
        tracing::info!(keyword, "douyin search");
        pacer.wait().await;
        let entries = self.client()?.search(keyword).await?;

        let mut items = Vec::new();
        for entry in entries {
            if items.len() >= max_contents {
                break;
            }
            let Some(info) = entry.aweme_info else {
                continue; // mix/collection entry, nothing to map
            };
            if info.aweme_id.is_empty() {
                tracing::warn!("skipping search entry without aweme_id");
                continue;
            }
            items.push(map_aweme(&info));
        }
        Ok(items)
    }

    async fn comments(
        &mut self,
        extra: &ContentExtra,
        cap: usize,
        _pacer: &Pacer,
    ) -> Result<Vec<CommentItem>> {
        let ContentExtra::Douyin { aweme_id } = extra else {
            bail!("douyin adapter got foreign continuation data");
        };
        let raw = self.client()?.comments(aweme_id, cap.max(20)).await?;
        Ok(raw.into_iter().take(cap).map(map_comment).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn map_aweme_builds_canonical_url() {
        let info: AwemeInfo = serde_json::from_value(json!({
            "aweme_id": "7301234567890",
            "desc": "rust  入门 第一课",
            "create_time": 1700000000u64,
            "statistics": {
                "digg_count": 1500,
                "comment_count": "2.3万",
                "share_count": 12,
                "play_count": 990000,
            }
        }))
        .unwrap();
        let item = map_aweme(&info);
        assert_eq!(item.url, "https://www.douyin.com/video/7301234567890");
        assert_eq!(item.title, "rust 入门 第一课");
        assert_eq!(item.comment_count, 23_000);
        assert_eq!(item.view_count, 990_000);
        assert!(item.content.is_empty());
    }

    #[test]
    fn entries_without_aweme_info_deserialize_to_none() {
        let entry: SearchEntry =
            serde_json::from_value(json!({"aweme_mix_info": {"mix_items": []}})).unwrap();
        assert!(entry.aweme_info.is_none());
    }

    #[test]
    fn status_check_surfaces_platform_message() {
        let status: ApiStatus =
            serde_json::from_value(json!({"status_code": 8, "status_msg": "need login"})).unwrap();
        let err = status.check("search").unwrap_err();
        assert!(err.to_string().contains("need login"));
    }

    #[test]
    fn map_comment_cleans_text() {
        let raw: CommentRaw = serde_json::from_value(json!({
            "text": " 前排  围观 ",
            "digg_count": "3w",
            "create_time": 1700000200u64,
        }))
        .unwrap();
        let c = map_comment(raw);
        assert_eq!(c.content, "前排 围观");
        assert_eq!(c.like_count, 30_000);
    }
}
