//! Markup stripping for platforms that return HTML fragments in API fields
//! (search-result titles with highlight tags, weibo post bodies).

use regex::Regex;
use std::sync::OnceLock;

static TAG_RE: OnceLock<Regex> = OnceLock::new();

pub(crate) fn strip_tags(text: &str) -> String {
    let re = TAG_RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("static regex"));
    re.replace_all(text, "")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_and_entities_are_removed() {
        assert_eq!(
            strip_tags(r#"rust <em class="keyword">教程</em> &amp; 入门"#),
            "rust 教程 & 入门"
        );
        assert_eq!(strip_tags("no markup"), "no markup");
        assert_eq!(strip_tags("<br/><br/>"), "");
    }
}
