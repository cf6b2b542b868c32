//! Harvesting the browser's identity for platform API clients.

use chorus_browser::Page;
use chorus_http::SessionHeaders;

/// Capture the page's user agent and cookies into the header set a platform
/// client presents. Origin/referer are pinned per platform: several APIs
/// reject requests without them.
pub(crate) async fn harvest(
    page: &Page,
    origin: &str,
    referer: &str,
) -> anyhow::Result<SessionHeaders> {
    Ok(SessionHeaders {
        user_agent: page.user_agent().await?,
        cookie: page.cookie_header().await?,
        origin: Some(origin.to_string()),
        referer: Some(referer.to_string()),
        extra: Vec::new(),
    })
}
