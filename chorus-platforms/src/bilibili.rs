//! bilibili: video search plus hot comments.
//!
//! Search returns thin hits; the interesting counters live on the view-detail
//! endpoint, so mapping costs one extra request per video, paced through the
//! session gate.

use crate::html::strip_tags;
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

const API_BASE: &str = "https://api.bilibili.com";
const WEB_BASE: &str = "https://www.bilibili.com";

// ---- raw API shapes ----

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

impl<T> Envelope<T> {
    fn into_data(self) -> Result<T> {
        if self.code != 0 {
            bail!("bilibili api code {}: {}", self.code, self.message);
        }
        self.data.ok_or_else(|| anyhow!("bilibili api returned no data"))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NavData {
    #[serde(rename = "isLogin")]
    is_login: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchData {
    result: Vec<SearchVideo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchVideo {
    aid: u64,
    bvid: String,
    /// Contains `<em class="keyword">` highlight markup.
    title: String,
    pubdate: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ViewEnvelope {
    #[serde(rename = "View")]
    view: VideoView,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VideoView {
    title: String,
    pubdate: u64,
    stat: VideoStat,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VideoStat {
    view: Value,
    like: Value,
    reply: Value,
    share: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReplyData {
    replies: Option<Vec<ReplyRaw>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReplyRaw {
    content: ReplyContent,
    like: Value,
    ctime: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReplyContent {
    message: String,
}

// ---- API client ----

struct BilibiliClient {
    http: HttpClient,
}

impl BilibiliClient {
    fn new(headers: SessionHeaders, timeout: Duration) -> Result<Self> {
        let http = HttpClient::new(API_BASE, headers)?.with_timeout(timeout);
        Ok(Self { http })
    }

    fn set_cookie(&mut self, cookie: String) {
        self.http.set_cookie(cookie);
    }

    async fn pong(&self) -> Result<bool> {
        let resp: Envelope<NavData> = self
            .http
            .get_json("/x/web-interface/nav", RequestOpts::default())
            .await?;
        Ok(resp.code == 0 && resp.data.map(|d| d.is_login).unwrap_or(false))
    }

    async fn search_videos(&self, keyword: &str, page_size: usize) -> Result<Vec<SearchVideo>> {
        let page_size = page_size.to_string();
        let resp: Envelope<SearchData> = self
            .http
            .get_json(
                "/x/web-interface/search/type",
                RequestOpts {
                    query: Some(vec![
                        ("search_type", "video".into()),
                        ("keyword", keyword.into()),
                        ("page", "1".into()),
                        ("page_size", page_size.as_str().into()),
                        ("order", "totalrank".into()),
                    ]),
                    ..Default::default()
                },
            )
            .await?;
        Ok(resp.into_data()?.result)
    }

    async fn video_detail(&self, aid: u64) -> Result<VideoView> {
        let aid = aid.to_string();
        let resp: Envelope<ViewEnvelope> = self
            .http
            .get_json(
                "/x/web-interface/view/detail",
                RequestOpts {
                    query: Some(vec![("aid", aid.as_str().into())]),
                    ..Default::default()
                },
            )
            .await?;
        Ok(resp.into_data()?.view)
    }

    async fn video_comments(&self, aid: &str) -> Result<Vec<ReplyRaw>> {
        let resp: Envelope<ReplyData> = self
            .http
            .get_json(
                "/x/v2/reply",
                RequestOpts {
                    query: Some(vec![
                        ("oid", aid.into()),
                        ("type", "1".into()),
                        ("sort", "1".into()),
                    ]),
                    ..Default::default()
                },
            )
            .await?;
        Ok(resp.into_data()?.replies.unwrap_or_default())
    }
}

// ---- mapping ----

fn video_url(aid: u64, bvid: &str) -> String {
    if bvid.is_empty() {
        format!("{WEB_BASE}/video/av{aid}")
    } else {
        format!("{WEB_BASE}/video/{bvid}")
    }
}

fn map_video(hit: &SearchVideo, view: &VideoView) -> ContentItem {
    let title = if view.title.is_empty() {
        strip_tags(&hit.title)
    } else {
        view.title.clone()
    };
    let pubdate = if view.pubdate > 0 { view.pubdate } else { hit.pubdate };
    ContentItem {
        platform: Platform::Bilibili,
        content_type: ContentType::Video,
        title: clean_text(&title),
        content: String::new(),
        url: video_url(hit.aid, &hit.bvid),
        publish_time: if pubdate > 0 { pubdate.to_string() } else { String::new() },
        like_count: parse_count(&view.stat.like),
        comment_count: parse_count(&view.stat.reply),
        share_count: parse_count(&view.stat.share),
        view_count: parse_count(&view.stat.view),
        comments: Vec::new(),
        extra: Some(ContentExtra::Bilibili {
            aid: hit.aid.to_string(),
            bvid: hit.bvid.clone(),
        }),
    }
}

fn map_reply(raw: ReplyRaw) -> CommentItem {
    CommentItem {
        content: clean_text(&raw.content.message),
        like_count: parse_count(&raw.like),
        create_time: if raw.ctime > 0 { raw.ctime.to_string() } else { String::new() },
        is_reply: false,
    }
}

// ---- adapter ----

pub struct BilibiliAdapter {
    client: Option<BilibiliClient>,
}

impl BilibiliAdapter {
    pub fn new() -> Self {
        Self { client: None }
    }

    fn client(&self) -> Result<&BilibiliClient> {
        self.client
            .as_ref()
            .ok_or_else(|| anyhow!("bilibili client not initialized"))
    }
}

impl Default for BilibiliAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformAdapter for BilibiliAdapter {
    fn platform(&self) -> Platform {
        Platform::Bilibili
    }

    fn index_url(&self) -> &'static str {
        WEB_BASE
    }

    async fn init_client(&mut self, page: &Page, config: &ChorusConfig) -> Result<()> {
        // Only the bilibili-domain cookies: the full jar is too large for the
        // API gateway.
        let headers = identity::harvest(page, WEB_BASE, WEB_BASE).await?;
        self.client = Some(BilibiliClient::new(
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
        tracing::info!(keyword, "bilibili search");
        let hits = self.client()?.search_videos(keyword, max_contents).await?;

        let mut items = Vec::new();
        for hit in hits.into_iter().take(max_contents) {
            if hit.aid == 0 {
                tracing::warn!("skipping search hit without aid");
                continue;
            }
            pacer.wait().await;
            match self.client()?.video_detail(hit.aid).await {
                Ok(view) => items.push(map_video(&hit, &view)),
                Err(e) => {
                    tracing::warn!(aid = hit.aid, error = %e, "skipping video, detail fetch failed");
                }
            }
        }
        Ok(items)
    }

    async fn comments(
        &mut self,
        extra: &ContentExtra,
        cap: usize,
        _pacer: &Pacer,
    ) -> Result<Vec<CommentItem>> {
        let ContentExtra::Bilibili { aid, .. } = extra else {
            bail!("bilibili adapter got foreign continuation data");
        };
        let replies = self.client()?.video_comments(aid).await?;
        Ok(replies.into_iter().take(cap).map(map_reply).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn map_video_prefers_detail_fields() {
        let hit: SearchVideo = serde_json::from_value(json!({
            "aid": 170001,
            "bvid": "BV1xx411c7mD",
            "title": "rust <em class=\"keyword\">异步</em>入门",
            "pubdate": 1699990000u64,
        }))
        .unwrap();
        let view: VideoView = serde_json::from_value(json!({
            "title": "rust 异步入门（完整版）",
            "pubdate": 1700000000u64,
            "stat": {"view": "1.2万", "like": 456, "reply": 78, "share": 9},
        }))
        .unwrap();

        let item = map_video(&hit, &view);
        assert_eq!(item.title, "rust 异步入门（完整版）");
        assert_eq!(item.url, "https://www.bilibili.com/video/BV1xx411c7mD");
        assert_eq!(item.view_count, 12_000);
        assert_eq!(item.like_count, 456);
        assert_eq!(item.publish_time, "1700000000");
        assert!(matches!(
            item.extra,
            Some(ContentExtra::Bilibili { ref aid, .. }) if aid == "170001"
        ));
    }

    #[test]
    fn map_video_falls_back_to_search_hit() {
        let hit: SearchVideo = serde_json::from_value(json!({
            "aid": 42,
            "bvid": "",
            "title": "plain <b>title</b>",
            "pubdate": 123u64,
        }))
        .unwrap();
        let item = map_video(&hit, &VideoView::default());
        assert_eq!(item.title, "plain title");
        assert_eq!(item.url, "https://www.bilibili.com/video/av42");
        assert_eq!(item.publish_time, "123");
        assert_eq!(item.view_count, 0);
    }

    #[test]
    fn map_reply_normalizes_counts() {
        let raw: ReplyRaw = serde_json::from_value(json!({
            "content": {"message": "  讲得   不错 "},
            "like": "1.5万",
            "ctime": 1700000100u64,
        }))
        .unwrap();
        let comment = map_reply(raw);
        assert_eq!(comment.content, "讲得 不错");
        assert_eq!(comment.like_count, 15_000);
        assert!(!comment.is_reply);
    }

    #[test]
    fn envelope_rejects_api_errors() {
        let env: Envelope<SearchData> =
            serde_json::from_value(json!({"code": -412, "message": "request blocked"})).unwrap();
        let err = env.into_data().unwrap_err();
        assert!(err.to_string().contains("-412"));
    }
}
