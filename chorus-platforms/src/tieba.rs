//! tieba: thread search plus the full reply flood.
//!
//! tieba is the one platform where "top comments" means effectively all of
//! them: the cap is 100, which is about two pages of the mobile thread feed,
//! so the comment fetch paginates and paces between pages.

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

const WEB_BASE: &str = "https://tieba.baidu.com";

// ---- raw API shapes ----

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MobileResponse<T> {
    no: i64,
    error: String,
    data: Option<T>,
}

impl<T> MobileResponse<T> {
    fn into_data(self, what: &str) -> Result<T> {
        if self.no != 0 {
            bail!("tieba {what} failed with no={}: {}", self.no, self.error);
        }
        self.data
            .ok_or_else(|| anyhow!("tieba {what} returned no data"))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SyncData {
    is_login: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchData {
    post_list: Vec<ThreadHit>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ThreadHit {
    tid: Value,
    title: String,
    content: String,
    time: String,
    forum_name: String,
    reply_num: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ThreadPageData {
    post_list: Vec<FloorPost>,
    page: PageInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FloorPost {
    /// First floor repeats the thread body; later floors are the replies.
    floor: i64,
    content: String,
    time: String,
    agree: AgreeInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AgreeInfo {
    agree_num: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PageInfo {
    total_page: Value,
}

fn tid_to_string(tid: &Value) -> String {
    match tid {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

// ---- API client ----

struct TiebaClient {
    http: HttpClient,
}

impl TiebaClient {
    fn new(headers: SessionHeaders, timeout: Duration) -> Result<Self> {
        let http = HttpClient::new(WEB_BASE, headers)?.with_timeout(timeout);
        Ok(Self { http })
    }

    fn set_cookie(&mut self, cookie: String) {
        self.http.set_cookie(cookie);
    }

    async fn pong(&self) -> Result<bool> {
        let resp: MobileResponse<SyncData> = self
            .http
            .get_json("/mo/q/sync", RequestOpts::default())
            .await?;
        Ok(resp.no == 0 && resp.data.map(|d| d.is_login == 1).unwrap_or(false))
    }

    async fn search_threads(&self, keyword: &str, page_size: usize) -> Result<Vec<ThreadHit>> {
        let rn = page_size.to_string();
        let resp: MobileResponse<SearchData> = self
            .http
            .get_json(
                "/mo/q/search/thread",
                RequestOpts {
                    query: Some(vec![
                        ("word", keyword.into()),
                        ("pn", "1".into()),
                        ("rn", rn.as_str().into()),
                        ("only_thread", "1".into()),
                    ]),
                    ..Default::default()
                },
            )
            .await?;
        Ok(resp.into_data("search")?.post_list)
    }

    async fn thread_page(&self, tid: &str, page: u32) -> Result<ThreadPageData> {
        let pn = page.to_string();
        let resp: MobileResponse<ThreadPageData> = self
            .http
            .get_json(
                "/mo/q/pb/page",
                RequestOpts {
                    query: Some(vec![("tid", tid.into()), ("pn", pn.as_str().into())]),
                    ..Default::default()
                },
            )
            .await?;
        resp.into_data("thread page")
    }
}

// ---- mapping ----

fn map_thread(hit: &ThreadHit) -> Option<ContentItem> {
    let tid = tid_to_string(&hit.tid);
    if tid.is_empty() {
        return None;
    }
    Some(ContentItem {
        platform: Platform::Tieba,
        content_type: ContentType::Post,
        title: clean_text(&hit.title),
        content: clean_text(&hit.content),
        url: format!("{WEB_BASE}/p/{tid}"),
        publish_time: hit.time.clone(),
        like_count: 0, // the thread feed exposes no like counter
        comment_count: parse_count(&hit.reply_num),
        share_count: 0,
        view_count: 0,
        comments: Vec::new(),
        extra: Some(ContentExtra::Tieba {
            note_id: tid,
            tieba_name: hit.forum_name.clone(),
            total_pages: 1,
        }),
    })
}

fn map_floor(post: FloorPost) -> CommentItem {
    CommentItem {
        content: clean_text(&post.content),
        like_count: parse_count(&post.agree.agree_num),
        create_time: post.time,
        is_reply: false,
    }
}

// ---- adapter ----

pub struct TiebaAdapter {
    client: Option<TiebaClient>,
}

impl TiebaAdapter {
    pub fn new() -> Self {
        Self { client: None }
    }

    fn client(&self) -> Result<&TiebaClient> {
        self.client
            .as_ref()
            .ok_or_else(|| anyhow!("tieba client not initialized"))
    }
}

impl Default for TiebaAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformAdapter for TiebaAdapter {
    fn platform(&self) -> Platform {
        Platform::Tieba
    }

    fn index_url(&self) -> &'static str {
        WEB_BASE
    }

    async fn init_client(&mut self, page: &Page, config: &ChorusConfig) -> Result<()> {
        // Baidu hands out the session cookies on its main domain, so warm it
        // up before landing on tieba.
        page.goto("https://www.baidu.com").await?;
        page.goto(WEB_BASE).await?;

        let headers = identity::harvest(page, WEB_BASE, "https://tieba.baidu.com/").await?;
        self.client = Some(TiebaClient::new(
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
        tracing::info!(keyword, "tieba search");
        pacer.wait().await;
        let hits = self.client()?.search_threads(keyword, max_contents).await?;

        let mut items = Vec::new();
        for hit in hits {
            if items.len() >= max_contents {
                break;
            }
            match map_thread(&hit) {
                Some(item) => items.push(item),
                None => tracing::warn!("skipping thread hit without tid"),
            }
        }
        Ok(items)
    }

    async fn comments(
        &mut self,
        extra: &ContentExtra,
        cap: usize,
        pacer: &Pacer,
    ) -> Result<Vec<CommentItem>> {
        let ContentExtra::Tieba { note_id, .. } = extra else {
            bail!("tieba adapter got foreign continuation data");
        };

        let mut comments: Vec<CommentItem> = Vec::new();
        let mut page = 1u32;
        let mut total_pages = 1u64;

        // Page guard: the cap is ~2 pages; a malformed total_page must not
        // turn this into a crawl.
        while comments.len() < cap && (page as u64) <= total_pages && page <= 10 {
            if page > 1 {
                pacer.wait().await;
            }
            let data = self.client()?.thread_page(note_id, page).await?;
            total_pages = parse_count(&data.page.total_page).max(1);

            for post in data.post_list {
                if post.floor <= 1 {
                    continue; // thread body, not a reply
                }
                comments.push(map_floor(post));
                if comments.len() >= cap {
                    break;
                }
            }
            page += 1;
        }
        Ok(comments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn map_thread_builds_post_url() {
        let hit: ThreadHit = serde_json::from_value(json!({
            "tid": 8123456789u64,
            "title": "有人用 rust 重写过爬虫吗",
            "content": "想知道生态怎么样   求指教",
            "time": "2023-11-13 10:00",
            "forum_name": "rust",
            "reply_num": "132",
        }))
        .unwrap();
        let item = map_thread(&hit).unwrap();
        assert_eq!(item.url, "https://tieba.baidu.com/p/8123456789");
        assert_eq!(item.content, "想知道生态怎么样 求指教");
        assert_eq!(item.comment_count, 132);
        assert_eq!(item.like_count, 0);
        assert!(matches!(
            item.extra,
            Some(ContentExtra::Tieba { ref tieba_name, .. }) if tieba_name == "rust"
        ));
    }

    #[test]
    fn threads_without_tid_are_rejected() {
        let hit = ThreadHit::default();
        assert!(map_thread(&hit).is_none());
    }

    #[test]
    fn first_floor_is_not_a_comment() {
        let page: ThreadPageData = serde_json::from_value(json!({
            "post_list": [
                {"floor": 1, "content": "楼主正文", "time": "t0", "agree": {"agree_num": 3}},
                {"floor": 2, "content": "沙发", "time": "t1", "agree": {"agree_num": 9}},
            ],
            "page": {"total_page": 2},
        }))
        .unwrap();

        let replies: Vec<_> = page
            .post_list
            .into_iter()
            .filter(|p| p.floor > 1)
            .map(map_floor)
            .collect();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].content, "沙发");
        assert_eq!(replies[0].like_count, 9);
    }

    #[test]
    fn mobile_envelope_rejects_errors() {
        let resp: MobileResponse<SearchData> =
            serde_json::from_value(json!({"no": 110, "error": "need verify"})).unwrap();
        assert!(resp
            .into_data("search")
            .unwrap_err()
            .to_string()
            .contains("need verify"));
    }
}
