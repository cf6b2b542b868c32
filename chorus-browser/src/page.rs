//! One browser window owned by a single platform session.

use anyhow::{anyhow, Result};
use fantoccini::cookies::Cookie;
use fantoccini::wd::WindowHandle;
use fantoccini::Client;

/// A window on the shared browser. The owning session must call
/// [`close`](Page::close) on every exit path; closing twice is a no-op.
pub struct Page {
    client: Client,
    window: Option<WindowHandle>,
}

impl Page {
    pub(crate) fn new(client: Client, window: WindowHandle) -> Self {
        Self {
            client,
            window: Some(window),
        }
    }

    fn window(&self) -> Result<&WindowHandle> {
        self.window
            .as_ref()
            .ok_or_else(|| anyhow!("page already closed"))
    }

    /// Make this page's window the active browsing context.
    ///
    /// WebDriver commands address the active window, so every operation
    /// refocuses first; sessions interleave on one browser.
    async fn focus(&self) -> Result<()> {
        let window = self.window()?.clone();
        self.client.switch_to_window(window).await?;
        Ok(())
    }

    pub async fn goto(&self, url: &str) -> Result<()> {
        self.focus().await?;
        self.client.goto(url).await?;
        Ok(())
    }

    pub async fn current_url(&self) -> Result<url::Url> {
        self.focus().await?;
        Ok(self.client.current_url().await?)
    }

    /// The user agent the browser actually presents.
    pub async fn user_agent(&self) -> Result<String> {
        self.focus().await?;
        let value = self
            .client
            .execute("return navigator.userAgent;", vec![])
            .await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("navigator.userAgent returned non-string"))
    }

    /// Run a script in the page and return its result.
    pub async fn execute(&self, script: &str) -> Result<serde_json::Value> {
        self.focus().await?;
        Ok(self.client.execute(script, vec![]).await?)
    }

    /// Cookies visible to the page's current origin, as a `Cookie` header
    /// string (`name=value; name=value`).
    ///
    /// WebDriver scopes cookie reads to the active document, which is exactly
    /// the per-platform harvest the API clients need: no foreign-domain
    /// cookies bloating the header.
    pub async fn cookie_header(&self) -> Result<String> {
        self.focus().await?;
        let cookies = self.client.get_all_cookies().await?;
        Ok(cookies
            .iter()
            .map(|c| format!("{}={}", c.name(), c.value()))
            .collect::<Vec<_>>()
            .join("; "))
    }

    /// Import a `name=value; name=value` cookie string into the current
    /// origin. The page must already be on the target site.
    pub async fn import_cookies(&self, cookie_str: &str) -> Result<usize> {
        self.focus().await?;
        let mut imported = 0usize;
        for pair in cookie_str.split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let Some((name, value)) = pair.split_once('=') else {
                tracing::warn!(pair, "skipping malformed cookie pair");
                continue;
            };
            let cookie = Cookie::new(name.trim().to_string(), value.trim().to_string());
            self.client.add_cookie(cookie).await?;
            imported += 1;
        }
        Ok(imported)
    }

    /// Close the window. Safe to call repeatedly.
    pub async fn close(&mut self) -> Result<()> {
        let Some(window) = self.window.take() else {
            return Ok(());
        };
        self.client.switch_to_window(window).await?;
        self.client.close_window().await?;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.window.is_none()
    }
}
