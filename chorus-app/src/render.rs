//! Text renderings of a search result.
//!
//! Both renderers work off the same normalized model the JSON output
//! serializes; Markdown is tuned for an AI reader (links first, previews
//! truncated), the plain format for a terminal.

use chorus_common::model::SearchResult;

fn truncate_chars(text: &str, max: usize) -> String {
    let mut out: String = text.chars().take(max).collect();
    if text.chars().count() > max {
        out.push_str("...");
    }
    out
}

/// Markdown rendering, one section per platform.
pub fn to_markdown(result: &SearchResult) -> String {
    let mut lines = Vec::new();
    lines.push(format!("# Search results: {}", result.keyword));
    lines.push(format!("*Searched at: {}*", result.search_time));
    lines.push(format!("*{} items total*", result.total_count()));
    lines.push(String::new());

    for (platform, items) in &result.results {
        lines.push(format!(
            "## {} ({} items)",
            platform.as_str().to_uppercase(),
            items.len()
        ));
        lines.push(String::new());
        for item in items {
            lines.push(format!("### [{}] {}", item.platform, item.title));
            lines.push(format!("**Link**: {}", item.url));

            if !item.content.is_empty() {
                lines.push(String::new());
                lines.push(truncate_chars(&item.content, 500));
            }

            let mut stats = Vec::new();
            if item.view_count > 0 {
                stats.push(format!("views {}", item.view_count));
            }
            if item.like_count > 0 {
                stats.push(format!("likes {}", item.like_count));
            }
            if item.comment_count > 0 {
                stats.push(format!("comments {}", item.comment_count));
            }
            if !stats.is_empty() {
                lines.push(String::new());
                lines.push(stats.join(" | "));
            }

            if !item.comments.is_empty() {
                lines.push(String::new());
                lines.push(format!("**Top comments** ({}):", item.comments.len()));
                for (i, comment) in item.comments.iter().take(5).enumerate() {
                    lines.push(format!("{}. {}", i + 1, truncate_chars(&comment.content, 100)));
                }
            }
            lines.push(String::new());
            lines.push("---".to_string());
            lines.push(String::new());
        }
    }

    if !result.errors.is_empty() {
        lines.push("## Errors".to_string());
        for (platform, error) in &result.errors {
            lines.push(format!("- **{platform}**: {error}"));
        }
    }

    lines.join("\n")
}

/// Compact terminal rendering.
pub fn to_plain(result: &SearchResult) -> String {
    let mut lines = Vec::new();

    for (platform, items) in &result.results {
        lines.push(format!(
            "\n[{}] ({} items)",
            platform.as_str().to_uppercase(),
            items.len()
        ));
        for (i, item) in items.iter().enumerate() {
            lines.push(format!("\n  {}. {}", i + 1, item.title));
            lines.push(format!("     link: {}", item.url));
            if !item.content.is_empty() {
                lines.push(format!("     text: {}", truncate_chars(&item.content, 100)));
            }

            let mut stats = Vec::new();
            if item.view_count > 0 {
                stats.push(format!("views:{}", item.view_count));
            }
            if item.like_count > 0 {
                stats.push(format!("likes:{}", item.like_count));
            }
            if item.comment_count > 0 {
                stats.push(format!("comments:{}", item.comment_count));
            }
            if !stats.is_empty() {
                lines.push(format!("     {}", stats.join(" ")));
            }

            if !item.comments.is_empty() {
                lines.push(format!("     top comments ({}):", item.comments.len()));
                for (j, comment) in item.comments.iter().take(3).enumerate() {
                    lines.push(format!(
                        "        {}. {}",
                        j + 1,
                        truncate_chars(&comment.content, 50)
                    ));
                }
            }
        }
    }

    if !result.errors.is_empty() {
        lines.push("\nerrors:".to_string());
        for (platform, error) in &result.errors {
            lines.push(format!("  {platform}: {error}"));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_common::model::{CommentItem, ContentExtra, ContentItem, ContentType};
    use chorus_common::Platform;
    use std::time::Instant;

    fn sample_result() -> SearchResult {
        let mut result = SearchResult::new("rust");
        result.add_result(
            Platform::Bilibili,
            vec![ContentItem {
                platform: Platform::Bilibili,
                content_type: ContentType::Video,
                title: "rust 教程".to_string(),
                content: String::new(),
                url: "https://www.bilibili.com/video/BV1".to_string(),
                publish_time: String::new(),
                like_count: 12,
                comment_count: 3,
                share_count: 0,
                view_count: 900,
                comments: vec![CommentItem {
                    content: "好视频".to_string(),
                    like_count: 2,
                    create_time: String::new(),
                    is_reply: false,
                }],
                extra: Some(ContentExtra::Bilibili {
                    aid: "1".to_string(),
                    bvid: "BV1".to_string(),
                }),
            }],
        );
        result.add_error("zhihu", "search failed: 403");
        result.finalize(Instant::now());
        result
    }

    #[test]
    fn markdown_carries_links_stats_and_errors() {
        let md = to_markdown(&sample_result());
        assert!(md.contains("# Search results: rust"));
        assert!(md.contains("## BILIBILI (1 items)"));
        assert!(md.contains("**Link**: https://www.bilibili.com/video/BV1"));
        assert!(md.contains("views 900 | likes 12 | comments 3"));
        assert!(md.contains("**Top comments** (1):"));
        assert!(md.contains("- **zhihu**: search failed: 403"));
    }

    #[test]
    fn plain_rendering_lists_items_and_errors() {
        let text = to_plain(&sample_result());
        assert!(text.contains("[BILIBILI] (1 items)"));
        assert!(text.contains("1. rust 教程"));
        assert!(text.contains("link: https://www.bilibili.com/video/BV1"));
        assert!(text.contains("zhihu: search failed: 403"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("一二三四五", 3), "一二三...");
        assert_eq!(truncate_chars("short", 10), "short");
    }
}
