//! Runtime configuration and per-platform crawl limits.
//!
//! The configuration is an explicit value injected into the registry and
//! orchestrator at construction time. Live reconfiguration goes through
//! [`SharedConfig::update`], which is the single writer; orchestration runs
//! take a [`SharedConfig::snapshot`] at start and never observe a partial
//! update.

use crate::Platform;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Per-platform crawl caps.
///
/// The content cap is uniform; comment caps differ per platform (tieba keeps
/// effectively all comments, up to two pages).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformLimits {
    pub max_contents: usize,
    pub bilibili_comments: usize,
    pub douyin_comments: usize,
    pub xiaohongshu_comments: usize,
    pub weibo_comments: usize,
    pub zhihu_comments: usize,
    pub tieba_comments: usize,
    pub kuaishou_comments: usize,
}

impl Default for PlatformLimits {
    fn default() -> Self {
        Self {
            max_contents: 8,
            bilibili_comments: 10,
            douyin_comments: 10,
            xiaohongshu_comments: 10,
            weibo_comments: 10,
            zhihu_comments: 20,
            tieba_comments: 100,
            kuaishou_comments: 10,
        }
    }
}

impl PlatformLimits {
    pub fn comment_cap(&self, platform: Platform) -> usize {
        match platform {
            Platform::Bilibili => self.bilibili_comments,
            Platform::Douyin => self.douyin_comments,
            Platform::Xiaohongshu => self.xiaohongshu_comments,
            Platform::Weibo => self.weibo_comments,
            Platform::Zhihu => self.zhihu_comments,
            Platform::Tieba => self.tieba_comments,
            Platform::Kuaishou => self.kuaishou_comments,
        }
    }
}

/// How a session authenticates when the existing browser state is logged out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginMode {
    /// Interactive QR scan in the visible browser window.
    Qrcode,
    /// Interactive phone-number login.
    Phone,
    /// Import a caller-supplied cookie string.
    Cookie,
}

/// Top-level Chorus configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChorusConfig {
    /// Canonical supported platforms, in registry-default search order.
    pub supported_platforms: Vec<Platform>,
    /// Alias -> canonical name (lowercased keys).
    pub platform_aliases: HashMap<String, String>,
    pub limits: PlatformLimits,

    pub login_mode: LoginMode,
    /// Cookie string used by [`LoginMode::Cookie`].
    pub cookies: String,
    /// Seconds to wait for an interactive login before giving up.
    pub login_timeout: u64,

    pub headless: bool,
    /// WebDriver endpoint the automation driver connects to.
    pub webdriver_url: String,
    /// Remote-debugging address of an already-running browser to attach to,
    /// e.g. `127.0.0.1:9222`. `None` launches a fresh browser.
    pub cdp_endpoint: Option<String>,

    /// Per-request timeout, seconds.
    pub request_timeout: u64,
    /// Minimum spacing between successive platform API calls, seconds.
    pub crawl_interval: f64,
    /// Optional overall deadline for a whole orchestration run, seconds.
    pub run_timeout: Option<u64>,
}

impl Default for ChorusConfig {
    fn default() -> Self {
        let platform_aliases = [
            ("bili", "bilibili"),
            ("dy", "douyin"),
            ("xhs", "xiaohongshu"),
            ("wb", "weibo"),
            ("ks", "kuaishou"),
        ]
        .into_iter()
        .map(|(a, c)| (a.to_string(), c.to_string()))
        .collect();

        Self {
            supported_platforms: Platform::ALL.to_vec(),
            platform_aliases,
            limits: PlatformLimits::default(),
            login_mode: LoginMode::Qrcode,
            cookies: String::new(),
            login_timeout: 120,
            headless: false,
            webdriver_url: "http://localhost:9515".to_string(),
            cdp_endpoint: None,
            request_timeout: 30,
            crawl_interval: 1.5,
            run_timeout: None,
        }
    }
}

impl ChorusConfig {
    /// Normalize a platform name or alias to its canonical form.
    ///
    /// Lowercases, trims, and applies the alias table; names that match no
    /// alias pass through unchanged, so callers must still check support.
    pub fn normalize_platform(&self, name: &str) -> String {
        let name = name.trim().to_lowercase();
        match self.platform_aliases.get(&name) {
            Some(canonical) => canonical.clone(),
            None => name,
        }
    }

    pub fn is_supported(&self, name: &str) -> bool {
        let canonical = self.normalize_platform(name);
        Platform::from_canonical(&canonical)
            .map(|p| self.supported_platforms.contains(&p))
            .unwrap_or(false)
    }

    /// Resolve a name or alias to a supported [`Platform`].
    pub fn resolve_platform(&self, name: &str) -> Option<Platform> {
        let canonical = self.normalize_platform(name);
        Platform::from_canonical(&canonical).filter(|p| self.supported_platforms.contains(p))
    }

    /// Comment cap for a platform name; 10 for anything not explicitly
    /// configured.
    pub fn comment_cap_for(&self, name: &str) -> usize {
        match Platform::from_canonical(&self.normalize_platform(name)) {
            Some(platform) => self.limits.comment_cap(platform),
            None => 10,
        }
    }
}

/// Partial configuration update. Every field is optional; fields left unset
/// keep their current value. Deserialization tolerates unknown keys so that
/// forward-compatible callers never error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigPatch {
    pub login_mode: Option<LoginMode>,
    pub cookies: Option<String>,
    pub login_timeout: Option<u64>,
    pub headless: Option<bool>,
    pub webdriver_url: Option<String>,
    pub cdp_endpoint: Option<Option<String>>,
    pub request_timeout: Option<u64>,
    pub crawl_interval: Option<f64>,
    pub run_timeout: Option<Option<u64>>,
    pub max_contents: Option<usize>,
}

impl ConfigPatch {
    fn apply(self, config: &mut ChorusConfig) {
        if let Some(v) = self.login_mode {
            config.login_mode = v;
        }
        if let Some(v) = self.cookies {
            config.cookies = v;
        }
        if let Some(v) = self.login_timeout {
            config.login_timeout = v;
        }
        if let Some(v) = self.headless {
            config.headless = v;
        }
        if let Some(v) = self.webdriver_url {
            config.webdriver_url = v;
        }
        if let Some(v) = self.cdp_endpoint {
            config.cdp_endpoint = v;
        }
        if let Some(v) = self.request_timeout {
            config.request_timeout = v;
        }
        if let Some(v) = self.crawl_interval {
            config.crawl_interval = v;
        }
        if let Some(v) = self.run_timeout {
            config.run_timeout = v;
        }
        if let Some(v) = self.max_contents {
            config.limits.max_contents = v;
        }
    }
}

/// Cheaply cloneable handle to the process configuration.
///
/// Reads take a full [`snapshot`](SharedConfig::snapshot) so an orchestration
/// run in flight never observes a half-applied update.
#[derive(Clone, Default)]
pub struct SharedConfig(Arc<RwLock<ChorusConfig>>);

impl SharedConfig {
    pub fn new(config: ChorusConfig) -> Self {
        Self(Arc::new(RwLock::new(config)))
    }

    pub fn snapshot(&self) -> ChorusConfig {
        self.0
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Merge the supplied fields into the live configuration and return the
    /// result. This is the only mutation path.
    pub fn update(&self, patch: ConfigPatch) -> ChorusConfig {
        let mut guard = self
            .0
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        patch.apply(&mut guard);
        guard.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_applies_aliases_case_insensitively() {
        let cfg = ChorusConfig::default();
        assert_eq!(cfg.normalize_platform("wb"), "weibo");
        assert_eq!(cfg.normalize_platform("  XHS "), "xiaohongshu");
        assert_eq!(cfg.normalize_platform("zhihu"), "zhihu");
        assert_eq!(cfg.normalize_platform("myspace"), "myspace");
    }

    #[test]
    fn normalize_is_idempotent() {
        let cfg = ChorusConfig::default();
        for name in ["wb", "Bili", "kuaishou", "unknown-platform"] {
            let once = cfg.normalize_platform(name);
            assert_eq!(cfg.normalize_platform(&once), once);
        }
    }

    #[test]
    fn alias_and_canonical_agree() {
        let cfg = ChorusConfig::default();
        assert_eq!(
            cfg.normalize_platform("wb"),
            cfg.normalize_platform("weibo")
        );
    }

    #[test]
    fn support_check_covers_aliases_and_rejects_unknowns() {
        let cfg = ChorusConfig::default();
        assert!(cfg.is_supported("ks"));
        assert!(cfg.is_supported("tieba"));
        assert!(!cfg.is_supported("foo"));
    }

    #[test]
    fn comment_caps_match_platform_table() {
        let cfg = ChorusConfig::default();
        assert_eq!(cfg.comment_cap_for("bilibili"), 10);
        assert_eq!(cfg.comment_cap_for("zhihu"), 20);
        assert_eq!(cfg.comment_cap_for("tieba"), 100);
        // Unconfigured names fall back to 10.
        assert_eq!(cfg.comment_cap_for("foo"), 10);
    }

    #[test]
    fn patch_merges_only_supplied_fields() {
        let shared = SharedConfig::default();
        let before = shared.snapshot();

        let after = shared.update(ConfigPatch {
            crawl_interval: Some(0.5),
            headless: Some(true),
            ..Default::default()
        });

        assert_eq!(after.crawl_interval, 0.5);
        assert!(after.headless);
        assert_eq!(after.login_mode, before.login_mode);
        assert_eq!(after.limits, before.limits);
    }

    #[test]
    fn patch_deserialization_ignores_unknown_keys() {
        let patch: ConfigPatch = serde_json::from_value(serde_json::json!({
            "crawl_interval": 2.0,
            "definitely_not_a_field": "ignored",
            "another_unknown": 42,
        }))
        .unwrap();
        assert_eq!(patch.crawl_interval, Some(2.0));
        assert!(patch.headless.is_none());
    }
}
