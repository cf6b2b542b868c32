//! Common types and utilities shared across Chorus crates.
//!
//! This crate defines the platform identifiers, crawl limits and configuration,
//! the normalized content model, text/count normalization helpers, observability
//! setup, and the shared error taxonomy. It is intentionally lightweight so that
//! every crate in the workspace can depend on it.
//!
//! # Overview
//!
//! - [`Platform`]: the closed set of supported content platforms
//! - [`ChorusConfig`] / [`SharedConfig`]: runtime configuration with a
//!   single-writer update path
//! - [`model`]: `ContentItem`, `CommentItem`, `SearchResult`
//! - [`observability`]: centralised tracing/logging initialisation
//! - [`ChorusError`] and [`Result`]: shared error handling
//!
//! # Examples
//!
//! ```rust
//! use chorus_common::{ChorusConfig, Platform};
//!
//! let cfg = ChorusConfig::default();
//! assert_eq!(cfg.normalize_platform(" WB "), "weibo");
//! assert_eq!(cfg.comment_cap_for("zhihu"), 20);
//! assert!(cfg.supported_platforms.contains(&Platform::Bilibili));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

mod config;
pub mod model;
pub mod observability;
pub mod text;

pub use config::{ChorusConfig, ConfigPatch, LoginMode, PlatformLimits, SharedConfig};

/// The closed set of supported content platforms.
///
/// Adding a platform means adding a variant here and an adapter in
/// `chorus-platforms`; there is no dynamic plugin mechanism.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Bilibili,
    Douyin,
    Xiaohongshu,
    Weibo,
    Zhihu,
    Tieba,
    Kuaishou,
}

impl Platform {
    /// Registry-default ordering, used when a search names no platforms.
    pub const ALL: [Platform; 7] = [
        Platform::Bilibili,
        Platform::Douyin,
        Platform::Xiaohongshu,
        Platform::Weibo,
        Platform::Zhihu,
        Platform::Tieba,
        Platform::Kuaishou,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Bilibili => "bilibili",
            Platform::Douyin => "douyin",
            Platform::Xiaohongshu => "xiaohongshu",
            Platform::Weibo => "weibo",
            Platform::Zhihu => "zhihu",
            Platform::Tieba => "tieba",
            Platform::Kuaishou => "kuaishou",
        }
    }

    /// Resolve an already-canonical name. Alias handling lives in
    /// [`ChorusConfig::normalize_platform`]; this only accepts exact matches.
    pub fn from_canonical(name: &str) -> Option<Platform> {
        match name {
            "bilibili" => Some(Platform::Bilibili),
            "douyin" => Some(Platform::Douyin),
            "xiaohongshu" => Some(Platform::Xiaohongshu),
            "weibo" => Some(Platform::Weibo),
            "zhihu" => Some(Platform::Zhihu),
            "tieba" => Some(Platform::Tieba),
            "kuaishou" => Some(Platform::Kuaishou),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error types used across the Chorus workspace.
#[derive(thiserror::Error, Debug)]
pub enum ChorusError {
    /// The requested name does not normalize to a supported platform.
    #[error("platform not supported: {0}")]
    UnsupportedPlatform(String),

    /// Browser launch, authentication check, or login failed for a platform.
    #[error("[{platform}] initialization failed: {message}")]
    Init { platform: Platform, message: String },

    /// The platform API rejected or errored on the keyword search.
    #[error("[{platform}] search failed: {message}")]
    Search { platform: Platform, message: String },

    /// The automation driver reported an error.
    #[error("browser error: {0}")]
    Browser(#[from] anyhow::Error),

    /// Configuration was incomplete or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The run exceeded its overall deadline.
    #[error("operation timed out")]
    Timeout,
}

/// Convenient alias for results that use [`ChorusError`].
pub type Result<T> = std::result::Result<T, ChorusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_names_round_trip() {
        for p in Platform::ALL {
            assert_eq!(Platform::from_canonical(p.as_str()), Some(p));
        }
        assert_eq!(Platform::from_canonical("wb"), None);
    }

    #[test]
    fn platform_serializes_as_lowercase_string() {
        let json = serde_json::to_string(&Platform::Xiaohongshu).unwrap();
        assert_eq!(json, "\"xiaohongshu\"");
    }
}
