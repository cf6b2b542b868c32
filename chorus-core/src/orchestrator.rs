//! Search orchestration: one run across many platforms.
//!
//! The orchestrator resolves the target platform set, launches one shared
//! browser for the whole run, drives every platform session through its
//! lifecycle strictly in order, and folds each outcome into one
//! [`SearchResult`]. A platform failure is isolated to its own entry; the
//! loop never aborts early, and teardown runs on every exit path.

use crate::registry::SessionRegistry;
use chorus_browser::{ua, BrowserHandle, LaunchOpts};
use chorus_common::model::{ContentItem, SearchResult};
use chorus_common::{ChorusConfig, ChorusError, Platform, SharedConfig};
use std::time::{Duration, Instant};

pub struct SearchOrchestrator {
    config: SharedConfig,
}

impl SearchOrchestrator {
    pub fn new(config: SharedConfig) -> Self {
        Self { config }
    }

    /// Search a keyword across the requested platforms (all supported ones
    /// when `platforms` is `None`).
    ///
    /// Never fails for partial outcomes: the returned result's `status`
    /// says how many platforms made it.
    pub async fn search(&self, keyword: &str, platforms: Option<&[String]>) -> SearchResult {
        let config = self.config.snapshot();
        let started = Instant::now();
        let mut result = SearchResult::new(keyword);
        let mut registry = SessionRegistry::new(config.clone());

        let targets = resolve_targets(&config, platforms, &mut result);
        tracing::info!(
            keyword,
            targets = targets.len(),
            rejected = result.errors.len(),
            "starting orchestration run"
        );

        if targets.is_empty() {
            result.finalize(started);
            return result;
        }

        let launch = LaunchOpts {
            webdriver_url: config.webdriver_url.clone(),
            user_agent: Some(ua::pick_desktop().to_string()),
            headless: config.headless,
            attach: config.cdp_endpoint.clone(),
        };
        let browser = match BrowserHandle::launch(&launch).await {
            Ok(browser) => browser,
            Err(e) => {
                // No browser, no platforms: every target fails the same way.
                let message = format!("browser launch failed: {e}");
                tracing::error!(error = %e, "browser launch failed");
                for (requested, _) in &targets {
                    result.add_error(requested.clone(), message.clone());
                }
                result.finalize(started);
                return result;
            }
        };

        let deadline = config
            .run_timeout
            .map(|secs| tokio::time::Instant::now() + Duration::from_secs(secs));

        for (requested, platform) in &targets {
            let outcome = match deadline {
                Some(at) => {
                    match tokio::time::timeout_at(
                        at,
                        run_platform(&mut registry, *platform, keyword, &browser),
                    )
                    .await
                    {
                        Ok(outcome) => outcome,
                        Err(_) => Err(ChorusError::Timeout),
                    }
                }
                None => run_platform(&mut registry, *platform, keyword, &browser).await,
            };

            match outcome {
                Ok(items) if items.is_empty() => {
                    tracing::info!(platform = %platform, "no results");
                }
                Ok(items) => {
                    tracing::info!(platform = %platform, count = items.len(), "platform done");
                    result.add_result(*platform, items);
                }
                Err(e) => {
                    tracing::error!(platform = %platform, error = %e, "platform failed");
                    result.add_error(requested.clone(), e.to_string());
                }
            }
        }

        // Teardown runs even when every platform above failed or timed out.
        registry.dispose_all().await;
        if let Err(e) = browser.close().await {
            tracing::warn!(error = %e, "browser close failed");
        }

        result.finalize(started);
        tracing::info!(
            status = ?result.status,
            total = result.total_count(),
            duration_s = result.duration,
            "orchestration run finished"
        );
        result
    }
}

async fn run_platform(
    registry: &mut SessionRegistry,
    platform: Platform,
    keyword: &str,
    browser: &BrowserHandle,
) -> chorus_common::Result<Vec<ContentItem>> {
    let session = registry.resolve(platform.as_str())?;
    session.initialize(browser).await?;
    session.search_with_comments(keyword).await
}

/// Work out which platforms the run targets, keyed by the name they were
/// requested under. Unsupported names are rejected up front, recorded as
/// errors without ever creating a session.
fn resolve_targets(
    config: &ChorusConfig,
    platforms: Option<&[String]>,
    result: &mut SearchResult,
) -> Vec<(String, Platform)> {
    match platforms {
        None => config
            .supported_platforms
            .iter()
            .map(|p| (p.as_str().to_string(), *p))
            .collect(),
        Some(names) => {
            let mut targets = Vec::new();
            for name in names {
                match config.resolve_platform(name) {
                    Some(platform) => targets.push((name.clone(), platform)),
                    None => {
                        tracing::warn!(name = %name, "rejecting unsupported platform");
                        result.add_error(
                            name.clone(),
                            format!("platform not supported: {}", name.trim()),
                        );
                    }
                }
            }
            targets
        }
    }
}
