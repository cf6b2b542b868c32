//! Normalized content model shared by every platform adapter.
//!
//! Every adapter maps its platform's raw API shapes into [`ContentItem`] and
//! [`CommentItem`]; the orchestrator aggregates them into a [`SearchResult`].
//! The whole model is serde round-trippable, which is the canonical
//! dictionary form consumed by the CLI/JSON façade.

use crate::Platform;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

/// What kind of thing a [`ContentItem`] is on its home platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// bilibili, douyin, kuaishou
    Video,
    /// xiaohongshu
    Note,
    /// weibo, tieba
    Post,
    /// zhihu
    Answer,
    Article,
    Question,
}

/// One comment attached to a content item.
///
/// Comments carry no identity and no author information; they are never
/// deduplicated or referenced once attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentItem {
    pub content: String,
    pub like_count: u64,
    /// Platform-native timestamp string, passed through opaque.
    pub create_time: String,
    pub is_reply: bool,
}

impl Default for CommentItem {
    fn default() -> Self {
        Self {
            content: String::new(),
            like_count: 0,
            create_time: String::new(),
            is_reply: false,
        }
    }
}

/// Which zhihu surface an item came from; decides the comment endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZhihuContentKind {
    Answer,
    Article,
}

/// Platform-specific continuation data needed to fetch comments for one item.
///
/// `None` on a [`ContentItem`] means comments cannot be fetched for that item,
/// which is not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "platform", rename_all = "lowercase")]
pub enum ContentExtra {
    Bilibili {
        aid: String,
        bvid: String,
    },
    Douyin {
        aweme_id: String,
    },
    Xiaohongshu {
        note_id: String,
        xsec_source: String,
        xsec_token: String,
    },
    Weibo {
        mid: String,
    },
    Zhihu {
        content_id: String,
        kind: ZhihuContentKind,
        question_id: String,
    },
    Tieba {
        note_id: String,
        tieba_name: String,
        total_pages: u32,
    },
    Kuaishou {
        photo_id: String,
    },
}

impl ContentExtra {
    /// The primary identifier used for comment enrichment.
    pub fn content_id(&self) -> &str {
        match self {
            ContentExtra::Bilibili { aid, .. } => aid,
            ContentExtra::Douyin { aweme_id } => aweme_id,
            ContentExtra::Xiaohongshu { note_id, .. } => note_id,
            ContentExtra::Weibo { mid } => mid,
            ContentExtra::Zhihu { content_id, .. } => content_id,
            ContentExtra::Tieba { note_id, .. } => note_id,
            ContentExtra::Kuaishou { photo_id } => photo_id,
        }
    }
}

/// One normalized piece of platform content with its canonical link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub platform: Platform,
    pub content_type: ContentType,
    pub title: String,
    /// Body text; empty for pure-video platforms.
    #[serde(default)]
    pub content: String,
    /// Dereferenceable canonical link, required for citation.
    pub url: String,
    #[serde(default)]
    pub publish_time: String,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub comment_count: u64,
    #[serde(default)]
    pub share_count: u64,
    #[serde(default)]
    pub view_count: u64,
    /// Platform-native ordering, filled in by comment enrichment.
    #[serde(default)]
    pub comments: Vec<CommentItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<ContentExtra>,
}

/// Outcome classification for a whole orchestration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStatus {
    Success,
    Partial,
    Failed,
}

/// Aggregated multi-platform search outcome.
///
/// Built incrementally: one [`add_result`](SearchResult::add_result) or
/// [`add_error`](SearchResult::add_error) per platform, never both, then
/// [`finalize`](SearchResult::finalize) once every requested platform has
/// been processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub keyword: String,
    /// RFC 3339 timestamp taken when the run started.
    pub search_time: String,
    #[serde(default)]
    pub results: BTreeMap<Platform, Vec<ContentItem>>,
    pub status: SearchStatus,
    #[serde(default)]
    pub errors: BTreeMap<String, String>,
    /// Wall-clock seconds for the whole run.
    #[serde(default)]
    pub duration: f64,
}

impl SearchResult {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            search_time: chrono::Local::now().to_rfc3339(),
            results: BTreeMap::new(),
            status: SearchStatus::Success,
            errors: BTreeMap::new(),
            duration: 0.0,
        }
    }

    /// Record a platform's items. Empty lists are dropped: platforms with
    /// zero results are omitted from the map, not present as empty entries.
    pub fn add_result(&mut self, platform: Platform, items: Vec<ContentItem>) {
        if !items.is_empty() {
            self.results.insert(platform, items);
        }
    }

    /// Record a platform failure under the name it was requested as.
    pub fn add_error(&mut self, platform: impl Into<String>, error: impl Into<String>) {
        self.errors.insert(platform.into(), error.into());
        if self.status == SearchStatus::Success {
            self.status = SearchStatus::Partial;
        }
    }

    /// Compute the elapsed duration and derive the final status.
    pub fn finalize(&mut self, started: Instant) {
        self.duration = started.elapsed().as_secs_f64();
        self.status = if self.results.is_empty() && !self.errors.is_empty() {
            SearchStatus::Failed
        } else if !self.results.is_empty() && !self.errors.is_empty() {
            SearchStatus::Partial
        } else {
            SearchStatus::Success
        };
    }

    pub fn total_count(&self) -> usize {
        self.results.values().map(Vec::len).sum()
    }

    pub fn all_items(&self) -> impl Iterator<Item = &ContentItem> {
        self.results.values().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_item() -> ContentItem {
        ContentItem {
            platform: Platform::Bilibili,
            content_type: ContentType::Video,
            title: "rust 入门".to_string(),
            content: String::new(),
            url: "https://www.bilibili.com/video/BV1xx411c7mD".to_string(),
            publish_time: "1700000000".to_string(),
            like_count: 1200,
            comment_count: 45,
            share_count: 3,
            view_count: 98000,
            comments: vec![CommentItem {
                content: "讲得很清楚".to_string(),
                like_count: 17,
                create_time: "1700000100".to_string(),
                is_reply: false,
            }],
            extra: Some(ContentExtra::Bilibili {
                aid: "170001".to_string(),
                bvid: "BV1xx411c7mD".to_string(),
            }),
        }
    }

    #[test]
    fn content_item_round_trips_through_json() {
        let item = sample_item();
        let json = serde_json::to_value(&item).unwrap();
        let back: ContentItem = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn extra_union_round_trips_every_variant() {
        let extras = [
            ContentExtra::Douyin {
                aweme_id: "7301".to_string(),
            },
            ContentExtra::Xiaohongshu {
                note_id: "n1".to_string(),
                xsec_source: "pc_search".to_string(),
                xsec_token: "tok".to_string(),
            },
            ContentExtra::Zhihu {
                content_id: "a9".to_string(),
                kind: ZhihuContentKind::Answer,
                question_id: "q4".to_string(),
            },
            ContentExtra::Tieba {
                note_id: "t2".to_string(),
                tieba_name: "rust".to_string(),
                total_pages: 2,
            },
            ContentExtra::Kuaishou {
                photo_id: "p8".to_string(),
            },
            ContentExtra::Weibo {
                mid: "m7".to_string(),
            },
        ];
        for extra in extras {
            let json = serde_json::to_value(&extra).unwrap();
            let back: ContentExtra = serde_json::from_value(json).unwrap();
            assert_eq!(back, extra);
            assert!(!extra.content_id().is_empty());
        }
    }

    #[test]
    fn search_result_round_trips_through_json() {
        let mut result = SearchResult::new("rust");
        result.add_result(Platform::Bilibili, vec![sample_item()]);
        result.add_error("zhihu", "search failed: 403");
        result.finalize(Instant::now());

        let json = serde_json::to_string(&result).unwrap();
        let back: SearchResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn empty_platform_results_are_omitted() {
        let mut result = SearchResult::new("rust");
        result.add_result(Platform::Weibo, vec![]);
        assert!(result.results.is_empty());
    }

    #[test]
    fn status_is_failed_only_when_everything_failed() {
        let mut result = SearchResult::new("rust");
        result.add_error("zhihu", "boom");
        result.add_error("tieba", "boom");
        result.finalize(Instant::now());
        assert_eq!(result.status, SearchStatus::Failed);
        assert!(result.results.is_empty());
    }

    #[test]
    fn status_is_partial_when_some_platforms_succeeded() {
        let mut result = SearchResult::new("rust");
        result.add_result(Platform::Bilibili, vec![sample_item()]);
        result.add_error("zhihu", "boom");
        result.finalize(Instant::now());
        assert_eq!(result.status, SearchStatus::Partial);
    }

    #[test]
    fn status_is_success_without_errors() {
        let mut result = SearchResult::new("rust");
        result.add_result(Platform::Bilibili, vec![sample_item()]);
        result.finalize(Instant::now());
        assert_eq!(result.status, SearchStatus::Success);

        // An all-empty run is also a success: zero items is not an error.
        let mut empty = SearchResult::new("rust");
        empty.finalize(Instant::now());
        assert_eq!(empty.status, SearchStatus::Success);
    }

    #[test]
    fn total_count_sums_platforms() {
        let mut result = SearchResult::new("rust");
        result.add_result(Platform::Bilibili, vec![sample_item(), sample_item()]);
        result.add_result(Platform::Zhihu, vec![sample_item()]);
        assert_eq!(result.total_count(), 3);
        assert_eq!(result.all_items().count(), 3);
    }
}
