//! zhihu: answer/article search plus root comments.
//!
//! Search results distinguish answers from column articles; the two build
//! different canonical URLs and hit different comment endpoints, so the kind
//! travels with the item as continuation data. The zhihu cap is 20 comments.

use crate::html::strip_tags;
use crate::identity;
use crate::pacer::Pacer;
use crate::session::PlatformAdapter;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chorus_browser::Page;
use chorus_common::model::{
    CommentItem, ContentExtra, ContentItem, ContentType, ZhihuContentKind,
};
use chorus_common::text::{clean_text, parse_count};
use chorus_common::{ChorusConfig, Platform};
use chorus_http::{HttpClient, RequestOpts, SessionHeaders};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const WEB_BASE: &str = "https://www.zhihu.com";

// ---- raw API shapes ----

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResponse {
    data: Vec<SearchEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchEntry {
    #[serde(rename = "type")]
    entry_type: String,
    object: Option<SearchObject>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchObject {
    #[serde(rename = "type")]
    object_type: String,
    id: Value,
    title: String,
    excerpt: String,
    content: String,
    created_time: u64,
    voteup_count: Value,
    comment_count: Value,
    question: Option<QuestionRef>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QuestionRef {
    id: Value,
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MeResponse {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CommentResponse {
    data: Vec<CommentRaw>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CommentRaw {
    /// HTML fragment.
    content: String,
    like_count: Value,
    created_time: u64,
}

fn id_to_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

// ---- API client ----

struct ZhihuClient {
    http: HttpClient,
}

impl ZhihuClient {
    fn new(headers: SessionHeaders, timeout: Duration) -> Result<Self> {
        let http = HttpClient::new(WEB_BASE, headers)?.with_timeout(timeout);
        Ok(Self { http })
    }

    fn set_cookie(&mut self, cookie: String) {
        self.http.set_cookie(cookie);
    }

    async fn pong(&self) -> Result<bool> {
        let resp: MeResponse = self
            .http
            .get_json("/api/v4/me", RequestOpts::default())
            .await?;
        Ok(!resp.id.is_empty())
    }

    async fn search(&self, keyword: &str) -> Result<Vec<SearchEntry>> {
        let resp: SearchResponse = self
            .http
            .get_json(
                "/api/v4/search_v3",
                RequestOpts {
                    query: Some(vec![
                        ("t", "general".into()),
                        ("q", keyword.into()),
                        ("correction", "1".into()),
                        ("offset", "0".into()),
                        ("limit", "20".into()),
                    ]),
                    ..Default::default()
                },
            )
            .await?;
        Ok(resp.data)
    }

    async fn root_comments(
        &self,
        content_id: &str,
        kind: ZhihuContentKind,
        limit: usize,
    ) -> Result<Vec<CommentRaw>> {
        let surface = match kind {
            ZhihuContentKind::Answer => "answers",
            ZhihuContentKind::Article => "articles",
        };
        let path = format!("/api/v4/{surface}/{content_id}/root_comments");
        let limit = limit.to_string();
        let resp: CommentResponse = self
            .http
            .get_json(
                &path,
                RequestOpts {
                    query: Some(vec![
                        ("order", "normal".into()),
                        ("limit", limit.as_str().into()),
                        ("offset", "".into()),
                    ]),
                    ..Default::default()
                },
            )
            .await?;
        Ok(resp.data)
    }
}

// ---- mapping ----

fn map_object(object: &SearchObject) -> Option<ContentItem> {
    let content_id = id_to_string(&object.id);
    if content_id.is_empty() {
        return None;
    }

    let (kind, content_type) = match object.object_type.as_str() {
        "article" => (ZhihuContentKind::Article, ContentType::Article),
        // Anything else search labels a result is an answer in practice.
        _ => (ZhihuContentKind::Answer, ContentType::Answer),
    };

    let question_id = object
        .question
        .as_ref()
        .map(|q| id_to_string(&q.id))
        .unwrap_or_default();

    let url = match kind {
        ZhihuContentKind::Answer => {
            format!("{WEB_BASE}/question/{question_id}/answer/{content_id}")
        }
        ZhihuContentKind::Article => format!("https://zhuanlan.zhihu.com/p/{content_id}"),
    };

    let body = if object.content.is_empty() {
        &object.excerpt
    } else {
        &object.content
    };
    let text = clean_text(&strip_tags(body));

    let title = clean_text(&strip_tags(&object.title));
    let title = if title.is_empty() {
        object
            .question
            .as_ref()
            .map(|q| clean_text(&q.name))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| text.chars().take(50).collect())
    } else {
        title
    };

    Some(ContentItem {
        platform: Platform::Zhihu,
        content_type,
        title,
        content: text,
        url,
        publish_time: if object.created_time > 0 {
            object.created_time.to_string()
        } else {
            String::new()
        },
        like_count: parse_count(&object.voteup_count),
        comment_count: parse_count(&object.comment_count),
        share_count: 0,
        view_count: 0,
        comments: Vec::new(),
        extra: Some(ContentExtra::Zhihu {
            content_id,
            kind,
            question_id,
        }),
    })
}

fn map_comment(raw: CommentRaw) -> CommentItem {
    CommentItem {
        content: clean_text(&strip_tags(&raw.content)),
        like_count: parse_count(&raw.like_count),
        create_time: if raw.created_time > 0 {
            raw.created_time.to_string()
        } else {
            String::new()
        },
        is_reply: false,
    }
}

// ---- adapter ----

pub struct ZhihuAdapter {
    client: Option<ZhihuClient>,
}

impl ZhihuAdapter {
    pub fn new() -> Self {
        Self { client: None }
    }

    fn client(&self) -> Result<&ZhihuClient> {
        self.client
            .as_ref()
            .ok_or_else(|| anyhow!("zhihu client not initialized"))
    }
}

impl Default for ZhihuAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformAdapter for ZhihuAdapter {
    fn platform(&self) -> Platform {
        Platform::Zhihu
    }

    fn index_url(&self) -> &'static str {
        WEB_BASE
    }

    async fn init_client(&mut self, page: &Page, config: &ChorusConfig) -> Result<()> {
        let headers = identity::harvest(page, WEB_BASE, "https://www.zhihu.com/").await?;
        self.client = Some(ZhihuClient::new(
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
        tracing::info!(keyword, "zhihu search");
        pacer.wait().await;
        let entries = self.client()?.search(keyword).await?;

        let mut items = Vec::new();
        for entry in entries {
            if items.len() >= max_contents {
                break;
            }
            if entry.entry_type != "search_result" {
                continue;
            }
            let Some(object) = entry.object else {
                continue;
            };
            match map_object(&object) {
                Some(item) => items.push(item),
                None => tracing::warn!("skipping search object without id"),
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
        let ContentExtra::Zhihu {
            content_id, kind, ..
        } = extra
        else {
            bail!("zhihu adapter got foreign continuation data");
        };
        let raw = self
            .client()?
            .root_comments(content_id, *kind, cap)
            .await?;
        Ok(raw.into_iter().take(cap).map(map_comment).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn answers_build_question_urls() {
        let object: SearchObject = serde_json::from_value(json!({
            "type": "answer",
            "id": 900100,
            "title": "",
            "excerpt": "",
            "content": "<p>所有权是 rust 的核心概念，<b>借用</b>其次。</p>",
            "created_time": 1700000000u64,
            "voteup_count": "1.8万",
            "comment_count": 230,
            "question": {"id": 4400, "name": "如何入门 Rust？"},
        }))
        .unwrap();

        let item = map_object(&object).unwrap();
        assert_eq!(item.url, "https://www.zhihu.com/question/4400/answer/900100");
        assert_eq!(item.content_type, ContentType::Answer);
        assert_eq!(item.title, "如何入门 Rust？"); // falls back to the question
        assert_eq!(item.content, "所有权是 rust 的核心概念，借用其次。");
        assert_eq!(item.like_count, 18_000);
        assert!(matches!(
            item.extra,
            Some(ContentExtra::Zhihu { kind: ZhihuContentKind::Answer, ref question_id, .. })
                if question_id == "4400"
        ));
    }

    #[test]
    fn articles_build_column_urls() {
        let object: SearchObject = serde_json::from_value(json!({
            "type": "article",
            "id": "771234",
            "title": "Rust 异步生态盘点",
            "excerpt": "tokio 与 async-std 的现状",
            "content": "",
            "created_time": 1700000000u64,
            "voteup_count": 320,
            "comment_count": 18,
        }))
        .unwrap();

        let item = map_object(&object).unwrap();
        assert_eq!(item.url, "https://zhuanlan.zhihu.com/p/771234");
        assert_eq!(item.content_type, ContentType::Article);
        assert_eq!(item.title, "Rust 异步生态盘点");
        assert_eq!(item.content, "tokio 与 async-std 的现状");
    }

    #[test]
    fn objects_without_id_are_rejected() {
        let object = SearchObject::default();
        assert!(map_object(&object).is_none());
    }

    #[test]
    fn comments_strip_markup() {
        let raw: CommentRaw = serde_json::from_value(json!({
            "content": "<p>写得太好了</p>",
            "like_count": 45,
            "created_time": 1700000500u64,
        }))
        .unwrap();
        let c = map_comment(raw);
        assert_eq!(c.content, "写得太好了");
        assert_eq!(c.like_count, 45);
        assert_eq!(c.create_time, "1700000500");
    }
}
