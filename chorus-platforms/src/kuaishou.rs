//! kuaishou: video search plus root comments over the GraphQL gateway.
//!
//! Everything on the kuaishou web client goes through one `/graphql`
//! endpoint; search and comments are just different operations with the
//! photo id threaded through. Counts come back as abbreviated strings.

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
use serde_json::{json, Value};
use std::time::Duration;

const WEB_BASE: &str = "https://www.kuaishou.com";

const SEARCH_QUERY: &str = r#"fragment photoContent on PhotoEntity {
  id
  caption
  likeCount
  viewCount
  commentCount
  timestamp
}
query visionSearchPhoto($keyword: String, $pcursor: String, $page: String) {
  visionSearchPhoto(keyword: $keyword, pcursor: $pcursor, page: $page) {
    result
    feeds {
      photo {
        ...photoContent
      }
    }
    pcursor
  }
}"#;

const COMMENT_QUERY: &str = r#"query commentListQuery($photoId: String, $pcursor: String) {
  visionCommentList(photoId: $photoId, pcursor: $pcursor) {
    commentCount
    pcursor
    rootComments {
      content
      timestamp
      likedCount
    }
  }
}"#;

// ---- raw API shapes ----

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GraphqlResponse<T> {
    data: Option<T>,
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GraphqlError {
    message: String,
}

impl<T> GraphqlResponse<T> {
    fn into_data(self, what: &str) -> Result<T> {
        if let Some(first) = self.errors.first() {
            bail!("kuaishou {what} failed: {}", first.message);
        }
        self.data
            .ok_or_else(|| anyhow!("kuaishou {what} returned no data"))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchData {
    #[serde(rename = "visionSearchPhoto")]
    vision_search_photo: Option<SearchFeedList>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchFeedList {
    result: i64,
    feeds: Vec<Feed>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Feed {
    photo: Option<PhotoRaw>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PhotoRaw {
    id: String,
    caption: String,
    #[serde(rename = "likeCount")]
    like_count: Value,
    #[serde(rename = "viewCount")]
    view_count: Value,
    #[serde(rename = "commentCount")]
    comment_count: Value,
    timestamp: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CommentData {
    #[serde(rename = "visionCommentList")]
    vision_comment_list: Option<CommentList>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CommentList {
    #[serde(rename = "rootComments")]
    root_comments: Vec<CommentRaw>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CommentRaw {
    content: String,
    timestamp: u64,
    #[serde(rename = "likedCount")]
    liked_count: Value,
}

// ---- API client ----

struct KuaishouClient {
    http: HttpClient,
}

impl KuaishouClient {
    fn new(headers: SessionHeaders, timeout: Duration) -> Result<Self> {
        let http = HttpClient::new(WEB_BASE, headers)?.with_timeout(timeout);
        Ok(Self { http })
    }

    fn set_cookie(&mut self, cookie: String) {
        self.http.set_cookie(cookie);
    }

    async fn pong(&self) -> Result<bool> {
        // An authenticated search with an empty keyword comes back with
        // result 1; guests get an auth error instead.
        let body = json!({
            "operationName": "visionSearchPhoto",
            "variables": {"keyword": "", "pcursor": "", "page": "search"},
            "query": SEARCH_QUERY,
        });
        let resp: GraphqlResponse<SearchData> = self
            .http
            .post_json("/graphql", &body, RequestOpts::default())
            .await?;
        Ok(resp.errors.is_empty()
            && resp
                .data
                .and_then(|d| d.vision_search_photo)
                .map(|s| s.result == 1)
                .unwrap_or(false))
    }

    async fn search_photos(&self, keyword: &str) -> Result<Vec<Feed>> {
        let body = json!({
            "operationName": "visionSearchPhoto",
            "variables": {"keyword": keyword, "pcursor": "", "page": "search"},
            "query": SEARCH_QUERY,
        });
        let resp: GraphqlResponse<SearchData> = self
            .http
            .post_json("/graphql", &body, RequestOpts::default())
            .await?;
        Ok(resp
            .into_data("search")?
            .vision_search_photo
            .map(|s| s.feeds)
            .unwrap_or_default())
    }

    async fn comments(&self, photo_id: &str) -> Result<Vec<CommentRaw>> {
        let body = json!({
            "operationName": "commentListQuery",
            "variables": {"photoId": photo_id, "pcursor": ""},
            "query": COMMENT_QUERY,
        });
        let resp: GraphqlResponse<CommentData> = self
            .http
            .post_json("/graphql", &body, RequestOpts::default())
            .await?;
        Ok(resp
            .into_data("comment list")?
            .vision_comment_list
            .map(|c| c.root_comments)
            .unwrap_or_default())
    }
}

// ---- mapping ----

fn map_photo(photo: &PhotoRaw) -> ContentItem {
    ContentItem {
        platform: Platform::Kuaishou,
        content_type: ContentType::Video,
        title: clean_text(&photo.caption),
        content: String::new(),
        url: format!("{WEB_BASE}/short-video/{}", photo.id),
        publish_time: if photo.timestamp > 0 {
            photo.timestamp.to_string()
        } else {
            String::new()
        },
        like_count: parse_count(&photo.like_count),
        comment_count: parse_count(&photo.comment_count),
        share_count: 0,
        view_count: parse_count(&photo.view_count),
        comments: Vec::new(),
        extra: Some(ContentExtra::Kuaishou {
            photo_id: photo.id.clone(),
        }),
    }
}

fn map_comment(raw: CommentRaw) -> CommentItem {
    CommentItem {
        content: clean_text(&raw.content),
        like_count: parse_count(&raw.liked_count),
        create_time: if raw.timestamp > 0 {
            raw.timestamp.to_string()
        } else {
            String::new()
        },
        is_reply: false,
    }
}

// ---- adapter ----

pub struct KuaishouAdapter {
    client: Option<KuaishouClient>,
}

impl KuaishouAdapter {
    pub fn new() -> Self {
        Self { client: None }
    }

    fn client(&self) -> Result<&KuaishouClient> {
        self.client
            .as_ref()
            .ok_or_else(|| anyhow!("kuaishou client not initialized"))
    }
}

impl Default for KuaishouAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformAdapter for KuaishouAdapter {
    fn platform(&self) -> Platform {
        Platform::Kuaishou
    }

    fn index_url(&self) -> &'static str {
        WEB_BASE
    }

    async fn init_client(&mut self, page: &Page, config: &ChorusConfig) -> Result<()> {
        let headers = identity::harvest(page, WEB_BASE, "https://www.kuaishou.com/").await?;
        self.client = Some(KuaishouClient::new(
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
        tracing::info!(keyword, "kuaishou search");
        pacer.wait().await;
        let feeds = self.client()?.search_photos(keyword).await?;

        let mut items = Vec::new();
        for feed in feeds {
            if items.len() >= max_contents {
                break;
            }
            let Some(photo) = feed.photo else {
                continue;
            };
            if photo.id.is_empty() {
                tracing::warn!("skipping feed entry without photo id");
                continue;
            }
            items.push(map_photo(&photo));
        }
        Ok(items)
    }

    async fn comments(
        &mut self,
        extra: &ContentExtra,
        cap: usize,
        _pacer: &Pacer,
    ) -> Result<Vec<CommentItem>> {
        let ContentExtra::Kuaishou { photo_id } = extra else {
            bail!("kuaishou adapter got foreign continuation data");
        };
        let raw = self.client()?.comments(photo_id).await?;
        Ok(raw.into_iter().take(cap).map(map_comment).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn map_photo_parses_abbreviated_counts() {
        let photo: PhotoRaw = serde_json::from_value(json!({
            "id": "3x4abcde",
            "caption": "用 rust 写了个小工具",
            "likeCount": "1.7万",
            "viewCount": "120.5万",
            "commentCount": "482",
            "timestamp": 1700000000000u64,
        }))
        .unwrap();
        let item = map_photo(&photo);
        assert_eq!(item.url, "https://www.kuaishou.com/short-video/3x4abcde");
        assert_eq!(item.like_count, 17_000);
        assert_eq!(item.view_count, 1_205_000);
        assert_eq!(item.comment_count, 482);
        assert!(matches!(
            item.extra,
            Some(ContentExtra::Kuaishou { ref photo_id }) if photo_id == "3x4abcde"
        ));
    }

    #[test]
    fn graphql_errors_take_priority_over_data() {
        let resp: GraphqlResponse<SearchData> = serde_json::from_value(json!({
            "data": null,
            "errors": [{"message": "auth required"}],
        }))
        .unwrap();
        assert!(resp
            .into_data("search")
            .unwrap_err()
            .to_string()
            .contains("auth required"));
    }

    #[test]
    fn feeds_without_photo_are_tolerated() {
        let feed: Feed = serde_json::from_value(json!({"photo": null})).unwrap();
        assert!(feed.photo.is_none());
    }

    #[test]
    fn map_comment_normalizes() {
        let raw: CommentRaw = serde_json::from_value(json!({
            "content": "太强了  老铁",
            "timestamp": 1700000300000u64,
            "likedCount": "2.1w",
        }))
        .unwrap();
        let c = map_comment(raw);
        assert_eq!(c.content, "太强了 老铁");
        assert_eq!(c.like_count, 21_000);
    }
}
