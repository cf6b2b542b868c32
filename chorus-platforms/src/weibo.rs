//! weibo: post search through the mobile gateway plus hot comments.
//!
//! The m.weibo.cn container feed interleaves posts with ad and topic cards;
//! only card type 9 (a post with an `mblog`) is mapped. Post bodies arrive as
//! HTML fragments and are stripped before they enter the model.

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

const API_BASE: &str = "https://m.weibo.cn";

// ---- raw API shapes ----

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiResponse<T> {
    ok: i64,
    msg: String,
    data: Option<T>,
}

impl<T> ApiResponse<T> {
    fn into_data(self, what: &str) -> Result<T> {
        if self.ok != 1 {
            bail!("weibo {what} failed: {}", self.msg);
        }
        self.data
            .ok_or_else(|| anyhow!("weibo {what} returned no data"))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigData {
    login: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchData {
    cards: Vec<Card>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Card {
    card_type: i64,
    mblog: Option<Mblog>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Mblog {
    id: String,
    mid: String,
    /// HTML fragment.
    text: String,
    created_at: String,
    attitudes_count: Value,
    comments_count: Value,
    reposts_count: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CommentData {
    data: Vec<CommentRaw>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CommentRaw {
    /// HTML fragment.
    text: String,
    like_count: Value,
    created_at: String,
}

// ---- API client ----

struct WeiboClient {
    http: HttpClient,
}

impl WeiboClient {
    fn new(headers: SessionHeaders, timeout: Duration) -> Result<Self> {
        let http = HttpClient::new(API_BASE, headers)?.with_timeout(timeout);
        Ok(Self { http })
    }

    fn set_cookie(&mut self, cookie: String) {
        self.http.set_cookie(cookie);
    }

    async fn pong(&self) -> Result<bool> {
        let resp: ApiResponse<ConfigData> = self
            .http
            .get_json("/api/config", RequestOpts::default())
            .await?;
        Ok(resp.ok == 1 && resp.data.map(|d| d.login).unwrap_or(false))
    }

    async fn search_posts(&self, keyword: &str) -> Result<Vec<Card>> {
        let containerid = format!("100103type=1&q={keyword}");
        let resp: ApiResponse<SearchData> = self
            .http
            .get_json(
                "/api/container/getIndex",
                RequestOpts {
                    query: Some(vec![
                        ("containerid", containerid.as_str().into()),
                        ("page_type", "searchall".into()),
                        ("page", "1".into()),
                    ]),
                    ..Default::default()
                },
            )
            .await?;
        Ok(resp.into_data("search")?.cards)
    }

    async fn hot_comments(&self, mid: &str) -> Result<Vec<CommentRaw>> {
        let resp: ApiResponse<CommentData> = self
            .http
            .get_json(
                "/comments/hotflow",
                RequestOpts {
                    query: Some(vec![
                        ("id", mid.into()),
                        ("mid", mid.into()),
                        ("max_id_type", "0".into()),
                    ]),
                    ..Default::default()
                },
            )
            .await?;
        Ok(resp.into_data("hot comments")?.data)
    }
}

// ---- mapping ----

fn map_post(blog: &Mblog) -> ContentItem {
    let text = clean_text(&strip_tags(&blog.text));
    ContentItem {
        platform: Platform::Weibo,
        content_type: ContentType::Post,
        // Posts have no separate title; use a body prefix.
        title: text.chars().take(50).collect(),
        content: text,
        url: format!("{API_BASE}/detail/{}", blog.id),
        publish_time: blog.created_at.clone(),
        like_count: parse_count(&blog.attitudes_count),
        comment_count: parse_count(&blog.comments_count),
        share_count: parse_count(&blog.reposts_count),
        view_count: 0, // not exposed by the gateway
        comments: Vec::new(),
        extra: Some(ContentExtra::Weibo {
            mid: if blog.mid.is_empty() {
                blog.id.clone()
            } else {
                blog.mid.clone()
            },
        }),
    }
}

fn map_comment(raw: CommentRaw) -> CommentItem {
    CommentItem {
        content: clean_text(&strip_tags(&raw.text)),
        like_count: parse_count(&raw.like_count),
        create_time: raw.created_at,
        is_reply: false,
    }
}

// ---- adapter ----

pub struct WeiboAdapter {
    client: Option<WeiboClient>,
}

impl WeiboAdapter {
    pub fn new() -> Self {
        Self { client: None }
    }

    fn client(&self) -> Result<&WeiboClient> {
        self.client
            .as_ref()
            .ok_or_else(|| anyhow!("weibo client not initialized"))
    }
}

impl Default for WeiboAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformAdapter for WeiboAdapter {
    fn platform(&self) -> Platform {
        Platform::Weibo
    }

    fn index_url(&self) -> &'static str {
        "https://m.weibo.cn"
    }

    async fn init_client(&mut self, page: &Page, config: &ChorusConfig) -> Result<()> {
        let headers = identity::harvest(page, API_BASE, "https://m.weibo.cn/").await?;
        self.client = Some(WeiboClient::new(
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
        tracing::info!(keyword, "weibo search");
        pacer.wait().await;
        let cards = self.client()?.search_posts(keyword).await?;

        let mut items = Vec::new();
        for card in cards {
            if items.len() >= max_contents {
                break;
            }
            if card.card_type != 9 {
                continue; // topic header, ad, user card...
            }
            let Some(blog) = card.mblog else {
                tracing::warn!("skipping post card without mblog payload");
                continue;
            };
            if blog.id.is_empty() {
                tracing::warn!("skipping mblog without id");
                continue;
            }
            items.push(map_post(&blog));
        }
        Ok(items)
    }

    async fn comments(
        &mut self,
        extra: &ContentExtra,
        cap: usize,
        _pacer: &Pacer,
    ) -> Result<Vec<CommentItem>> {
        let ContentExtra::Weibo { mid } = extra else {
            bail!("weibo adapter got foreign continuation data");
        };
        let raw = self.client()?.hot_comments(mid).await?;
        Ok(raw.into_iter().take(cap).map(map_comment).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn map_post_strips_html_and_prefixes_title() {
        let blog: Mblog = serde_json::from_value(json!({
            "id": "4900001",
            "mid": "4900001",
            "text": "今天聊聊 <a href=\"/n/rust\">#rust#</a> 的 async，<br/>感觉不错",
            "created_at": "Mon Nov 13 10:00:00 +0800 2023",
            "attitudes_count": "2.5万",
            "comments_count": 134,
            "reposts_count": 56,
        }))
        .unwrap();
        let item = map_post(&blog);
        assert_eq!(item.content, "今天聊聊 #rust# 的 async，感觉不错");
        assert_eq!(item.title, item.content); // short post: title == body
        assert_eq!(item.url, "https://m.weibo.cn/detail/4900001");
        assert_eq!(item.like_count, 25_000);
        assert_eq!(item.share_count, 56);
    }

    #[test]
    fn non_post_cards_are_skipped_by_type() {
        let card: Card = serde_json::from_value(json!({"card_type": 4})).unwrap();
        assert_eq!(card.card_type, 4);
        assert!(card.mblog.is_none());
    }

    #[test]
    fn map_comment_handles_html_and_counts() {
        let raw: CommentRaw = serde_json::from_value(json!({
            "text": "学到了<span class=\"url-icon\"></span>",
            "like_count": 99,
            "created_at": "Mon Nov 13 11:00:00 +0800 2023",
        }))
        .unwrap();
        let c = map_comment(raw);
        assert_eq!(c.content, "学到了");
        assert_eq!(c.like_count, 99);
    }

    #[test]
    fn api_errors_surface_message() {
        let resp: ApiResponse<SearchData> =
            serde_json::from_value(json!({"ok": 0, "msg": "search rate limited"})).unwrap();
        assert!(resp
            .into_data("search")
            .unwrap_err()
            .to_string()
            .contains("rate limited"));
    }
}
