//! Orchestration core: the session registry and the multi-platform search
//! driver.
//!
//! The outward contract is small: [`search`] runs one keyword across the
//! requested platforms and always comes back with a [`SearchResult`], and
//! [`supported_platforms`] lists the closed platform set in registry order.
//!
//! ```no_run
//! # async fn demo() {
//! use chorus_common::SharedConfig;
//!
//! let config = SharedConfig::default();
//! let result = chorus_core::search(&config, "rust 教程", None).await;
//! println!("{} items, status {:?}", result.total_count(), result.status);
//! # }
//! ```

pub mod orchestrator;
pub mod registry;

pub use orchestrator::SearchOrchestrator;
pub use registry::SessionRegistry;

use chorus_common::model::SearchResult;
use chorus_common::{Platform, SharedConfig};

/// Run one orchestrated search. `platforms` may name platforms or aliases;
/// `None` searches every supported platform.
pub async fn search(
    config: &SharedConfig,
    keyword: &str,
    platforms: Option<&[String]>,
) -> SearchResult {
    SearchOrchestrator::new(config.clone())
        .search(keyword, platforms)
        .await
}

/// The supported platforms, in registry-default order.
pub fn supported_platforms(config: &SharedConfig) -> Vec<Platform> {
    config.snapshot().supported_platforms
}
