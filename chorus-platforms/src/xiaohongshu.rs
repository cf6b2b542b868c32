//! xiaohongshu: note search plus comments.
//!
//! Search cards carry an `xsec_token` that the comment endpoint demands for
//! that exact note; it travels on the item as continuation data. Feed entries
//! that are query suggestions (`rec_query`, `hot_query`) are filtered out.

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
use rand::Rng;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const API_BASE: &str = "https://edith.xiaohongshu.com";
const WEB_BASE: &str = "https://www.xiaohongshu.com";

// ---- raw API shapes ----

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiResponse<T> {
    success: bool,
    msg: String,
    data: Option<T>,
}

impl<T> ApiResponse<T> {
    fn into_data(self, what: &str) -> Result<T> {
        if !self.success {
            bail!("xiaohongshu {what} failed: {}", self.msg);
        }
        self.data
            .ok_or_else(|| anyhow!("xiaohongshu {what} returned no data"))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MeData {
    guest: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchData {
    items: Vec<SearchItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchItem {
    id: String,
    model_type: String,
    xsec_source: String,
    xsec_token: String,
    note_card: Option<NoteCard>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NoteCard {
    display_title: String,
    desc: String,
    time: u64,
    interact_info: InteractInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InteractInfo {
    liked_count: Value,
    comment_count: Value,
    shared_count: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CommentPage {
    comments: Vec<CommentRaw>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CommentRaw {
    content: String,
    like_count: Value,
    create_time: u64,
}

/// Opaque search-session id the endpoint expects: base36 of a millisecond
/// timestamp shifted past a random salt.
fn make_search_id() -> String {
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let salt: u32 = rand::thread_rng().gen_range(0..2_147_483_646);
    let mut n = (millis << 64) + salt as u128;

    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

// ---- API client ----

struct XiaohongshuClient {
    http: HttpClient,
}

impl XiaohongshuClient {
    fn new(headers: SessionHeaders, timeout: Duration) -> Result<Self> {
        let http = HttpClient::new(API_BASE, headers)?.with_timeout(timeout);
        Ok(Self { http })
    }

    fn set_cookie(&mut self, cookie: String) {
        self.http.set_cookie(cookie);
    }

    async fn pong(&self) -> Result<bool> {
        let resp: ApiResponse<MeData> = self
            .http
            .get_json("/api/sns/web/v2/user/me", RequestOpts::default())
            .await?;
        Ok(resp.success && resp.data.map(|d| !d.guest).unwrap_or(false))
    }

    async fn search_notes(&self, keyword: &str, page_size: usize) -> Result<Vec<SearchItem>> {
        let body = json!({
            "keyword": keyword,
            "search_id": make_search_id(),
            "page": 1,
            "page_size": page_size,
            "sort": "general",
            "note_type": 0,
        });
        let resp: ApiResponse<SearchData> = self
            .http
            .post_json("/api/sns/web/v1/search/notes", &body, RequestOpts::default())
            .await?;
        Ok(resp.into_data("search")?.items)
    }

    async fn note_comments(&self, note_id: &str, xsec_token: &str) -> Result<Vec<CommentRaw>> {
        let resp: ApiResponse<CommentPage> = self
            .http
            .get_json(
                "/api/sns/web/v2/comment/page",
                RequestOpts {
                    query: Some(vec![
                        ("note_id", note_id.into()),
                        ("cursor", "".into()),
                        ("xsec_token", xsec_token.into()),
                        ("image_formats", "jpg,webp,avif".into()),
                    ]),
                    ..Default::default()
                },
            )
            .await?;
        Ok(resp.into_data("comment page")?.comments)
    }
}

// ---- mapping ----

fn map_note(item: &SearchItem, card: &NoteCard) -> ContentItem {
    let title = clean_text(&card.display_title);
    let desc = clean_text(&card.desc);
    ContentItem {
        platform: Platform::Xiaohongshu,
        content_type: ContentType::Note,
        // Untitled notes fall back to the first stretch of body text.
        title: if title.is_empty() {
            desc.chars().take(50).collect()
        } else {
            title
        },
        content: desc,
        url: format!("{WEB_BASE}/explore/{}", item.id),
        publish_time: if card.time > 0 { card.time.to_string() } else { String::new() },
        like_count: parse_count(&card.interact_info.liked_count),
        comment_count: parse_count(&card.interact_info.comment_count),
        share_count: parse_count(&card.interact_info.shared_count),
        view_count: 0, // not exposed publicly
        comments: Vec::new(),
        extra: Some(ContentExtra::Xiaohongshu {
            note_id: item.id.clone(),
            xsec_source: item.xsec_source.clone(),
            xsec_token: item.xsec_token.clone(),
        }),
    }
}

fn map_comment(raw: CommentRaw) -> CommentItem {
    CommentItem {
        content: clean_text(&raw.content),
        like_count: parse_count(&raw.like_count),
        create_time: if raw.create_time > 0 {
            raw.create_time.to_string()
        } else {
            String::new()
        },
        is_reply: false,
    }
}

// ---- adapter ----

pub struct XiaohongshuAdapter {
    client: Option<XiaohongshuClient>,
}

impl XiaohongshuAdapter {
    pub fn new() -> Self {
        Self { client: None }
    }

    fn client(&self) -> Result<&XiaohongshuClient> {
        self.client
            .as_ref()
            .ok_or_else(|| anyhow!("xiaohongshu client not initialized"))
    }
}

impl Default for XiaohongshuAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformAdapter for XiaohongshuAdapter {
    fn platform(&self) -> Platform {
        Platform::Xiaohongshu
    }

    fn index_url(&self) -> &'static str {
        WEB_BASE
    }

    async fn init_client(&mut self, page: &Page, config: &ChorusConfig) -> Result<()> {
        let headers = identity::harvest(page, WEB_BASE, "https://www.xiaohongshu.com/").await?;
        self.client = Some(XiaohongshuClient::new(
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
        tracing::info!(keyword, "xiaohongshu search");
        pacer.wait().await;
        let hits = self.client()?.search_notes(keyword, max_contents).await?;

        let mut items = Vec::new();
        for hit in hits {
            if items.len() >= max_contents {
                break;
            }
            if matches!(hit.model_type.as_str(), "rec_query" | "hot_query") {
                continue;
            }
            if hit.id.is_empty() {
                tracing::warn!("skipping search hit without note id");
                continue;
            }
            match &hit.note_card {
                Some(card) => items.push(map_note(&hit, card)),
                None => tracing::warn!(note_id = %hit.id, "skipping hit without note card"),
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
        let ContentExtra::Xiaohongshu {
            note_id,
            xsec_token,
            ..
        } = extra
        else {
            bail!("xiaohongshu adapter got foreign continuation data");
        };
        let raw = self.client()?.note_comments(note_id, xsec_token).await?;
        Ok(raw.into_iter().take(cap).map(map_comment).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hit() -> SearchItem {
        serde_json::from_value(json!({
            "id": "65f1note",
            "model_type": "note",
            "xsec_source": "pc_search",
            "xsec_token": "ABtoken=",
            "note_card": {
                "display_title": "",
                "desc": "一篇很长的笔记正文，讲 rust 的所有权模型，还有借用检查器的故事。",
                "time": 1700000000u64,
                "interact_info": {"liked_count": "1.1万", "comment_count": "321", "shared_count": 7},
            }
        }))
        .unwrap()
    }

    #[test]
    fn untitled_notes_take_a_body_prefix_title() {
        let h = hit();
        let card = h.note_card.as_ref().unwrap();
        let item = map_note(&h, card);
        assert!(item.title.starts_with("一篇很长的笔记正文"));
        assert!(item.title.chars().count() <= 50);
        assert_eq!(item.url, "https://www.xiaohongshu.com/explore/65f1note");
        assert_eq!(item.like_count, 11_000);
        assert_eq!(item.view_count, 0);
        assert!(matches!(
            item.extra,
            Some(ContentExtra::Xiaohongshu { ref xsec_token, .. }) if xsec_token == "ABtoken="
        ));
    }

    #[test]
    fn search_id_is_base36() {
        let id = make_search_id();
        assert!(!id.is_empty());
        assert!(id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn api_errors_carry_the_platform_message() {
        let resp: ApiResponse<SearchData> =
            serde_json::from_value(json!({"success": false, "msg": "risk control"})).unwrap();
        let err = resp.into_data("search").unwrap_err();
        assert!(err.to_string().contains("risk control"));
    }
}
