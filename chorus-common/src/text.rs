//! Count and text normalization shared by every platform adapter.
//!
//! Platforms disagree wildly about how they report interaction counts: plain
//! integers, floats, or localized abbreviated strings like `"1.2万"` or
//! `"3w"`. Everything funnels through [`parse_count`] so the normalized model
//! only ever carries plain non-negative integers.

use serde_json::Value;

/// Normalize a raw JSON count into a plain non-negative integer.
///
/// Accepts integers, floats, and abbreviated strings; anything unparsable
/// (including negatives) collapses to 0.
pub fn parse_count(value: &Value) -> u64 {
    match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                u
            } else if let Some(f) = n.as_f64() {
                if f > 0.0 {
                    f as u64
                } else {
                    0
                }
            } else {
                0
            }
        }
        Value::String(s) => parse_count_str(s),
        _ => 0,
    }
}

/// Parse an abbreviated count string: `万`/`w` multiply by 10 000, `亿` by
/// 100 000 000; comma grouping is stripped. Unparsable input yields 0.
pub fn parse_count_str(raw: &str) -> u64 {
    let mut s = raw.trim().to_lowercase().replace(',', "");
    if s.is_empty() {
        return 0;
    }

    let mut multiplier = 1u64;
    if s.contains('万') || s.contains('w') {
        multiplier = 10_000;
        s = s.replace('万', "").replace('w', "");
    } else if s.contains('亿') {
        multiplier = 100_000_000;
        s = s.replace('亿', "");
    }

    match s.trim().parse::<f64>() {
        Ok(n) if n > 0.0 => (n * multiplier as f64) as u64,
        _ => 0,
    }
}

/// Collapse whitespace runs to single spaces and trim both ends.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_numbers_pass_through() {
        assert_eq!(parse_count(&json!(42)), 42);
        assert_eq!(parse_count(&json!(12.7)), 12);
        assert_eq!(parse_count(&json!(-3)), 0);
        assert_eq!(parse_count(&json!(null)), 0);
    }

    #[test]
    fn abbreviated_strings_expand() {
        assert_eq!(parse_count_str("1.2万"), 12_000);
        assert_eq!(parse_count_str("3w"), 30_000);
        assert_eq!(parse_count_str("1.5亿"), 150_000_000);
        assert_eq!(parse_count_str("2,345"), 2_345);
        assert_eq!(parse_count(&json!("8.8W")), 88_000);
    }

    #[test]
    fn garbage_counts_collapse_to_zero() {
        assert_eq!(parse_count_str(""), 0);
        assert_eq!(parse_count_str("  "), 0);
        assert_eq!(parse_count_str("大量"), 0);
        assert_eq!(parse_count_str("-5"), 0);
        assert_eq!(parse_count(&json!({"nested": true})), 0);
    }

    #[test]
    fn clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  hello\t\n world  "), "hello world");
        assert_eq!(clean_text(""), "");
        assert_eq!(clean_text("单行"), "单行");
    }
}
