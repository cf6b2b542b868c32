//! Session registry: one live session per platform, torn down as a unit.

use chorus_common::{ChorusConfig, ChorusError, Platform};
use chorus_platforms::Session;
use std::collections::HashMap;

/// Creates, memoizes, and disposes platform sessions for one orchestration
/// run. Re-requesting a platform (under any alias) returns the cached
/// session instead of re-initializing.
pub struct SessionRegistry {
    config: ChorusConfig,
    sessions: HashMap<Platform, Session>,
}

impl SessionRegistry {
    pub fn new(config: ChorusConfig) -> Self {
        Self {
            config,
            sessions: HashMap::new(),
        }
    }

    /// Supported platforms in registry-default order.
    pub fn supported(&self) -> &[Platform] {
        &self.config.supported_platforms
    }

    /// Resolve a name or alias to its (possibly cached) session.
    pub fn resolve(&mut self, name: &str) -> chorus_common::Result<&mut Session> {
        let platform = self
            .config
            .resolve_platform(name)
            .ok_or_else(|| ChorusError::UnsupportedPlatform(name.trim().to_string()))?;

        Ok(self
            .sessions
            .entry(platform)
            .or_insert_with(|| Session::create(platform, self.config.clone())))
    }

    pub fn live_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Clean up every cached session and clear the cache. Called exactly once
    /// per run, on every exit path; individual cleanup never errors.
    pub async fn dispose_all(&mut self) {
        for (platform, mut session) in self.sessions.drain() {
            session.cleanup().await;
            tracing::debug!(%platform, "session disposed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_to_the_cached_session() {
        let mut registry = SessionRegistry::new(ChorusConfig::default());
        registry.resolve("wb").unwrap();
        registry.resolve("weibo").unwrap();
        registry.resolve(" WB ").unwrap();
        assert_eq!(registry.live_sessions(), 1);

        registry.resolve("zhihu").unwrap();
        assert_eq!(registry.live_sessions(), 2);
    }

    #[test]
    fn unsupported_names_never_create_a_session() {
        let mut registry = SessionRegistry::new(ChorusConfig::default());
        let err = registry.resolve("foo").unwrap_err();
        assert!(matches!(err, ChorusError::UnsupportedPlatform(name) if name == "foo"));
        assert_eq!(registry.live_sessions(), 0);
    }

    #[tokio::test]
    async fn dispose_all_clears_the_cache() {
        let mut registry = SessionRegistry::new(ChorusConfig::default());
        registry.resolve("bilibili").unwrap();
        registry.resolve("ks").unwrap();
        registry.dispose_all().await;
        assert_eq!(registry.live_sessions(), 0);

        // Disposing an already-empty registry is harmless.
        registry.dispose_all().await;
    }

    #[test]
    fn supported_listing_keeps_registry_order() {
        let registry = SessionRegistry::new(ChorusConfig::default());
        assert_eq!(registry.supported(), &Platform::ALL[..]);
    }
}
