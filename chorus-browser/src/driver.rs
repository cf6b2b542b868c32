//! WebDriver connection and page creation.

use crate::page::Page;
use anyhow::{Context, Result};
use fantoccini::{Client, ClientBuilder};
use serde_json::json;
use webdriver::capabilities::Capabilities;

/// How to obtain the browser for a run.
#[derive(Debug, Clone)]
pub struct LaunchOpts {
    /// WebDriver service endpoint (chromedriver).
    pub webdriver_url: String,
    /// Session-wide user agent; `None` keeps the browser's own.
    pub user_agent: Option<String>,
    pub headless: bool,
    /// Remote-debugging address of a running browser to attach to instead of
    /// launching a fresh one, e.g. `127.0.0.1:9222`.
    pub attach: Option<String>,
}

impl Default for LaunchOpts {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            user_agent: None,
            headless: false,
            attach: None,
        }
    }
}

/// One live browser shared by all platform sessions of a run.
///
/// Each session opens its own [`Page`] (a separate window) so cookie state
/// accumulates in one place while navigation stays independent.
pub struct BrowserHandle {
    client: Client,
    attached: bool,
}

impl BrowserHandle {
    /// Connect to the WebDriver service and start (or attach to) a browser.
    pub async fn launch(opts: &LaunchOpts) -> Result<Self> {
        let mut caps = Capabilities::new();
        let mut chrome_opts = serde_json::Map::new();

        if let Some(endpoint) = &opts.attach {
            // Attaching reuses the running browser's profile and login state;
            // args would be ignored by the browser anyway.
            chrome_opts.insert("debuggerAddress".to_string(), json!(endpoint));
        } else {
            let mut args = vec![
                "--disable-blink-features=AutomationControlled".to_string(),
                "--no-first-run".to_string(),
                "--no-default-browser-check".to_string(),
                "--disable-infobars".to_string(),
            ];
            if let Some(ua) = &opts.user_agent {
                args.push(format!("--user-agent={ua}"));
            }
            if opts.headless {
                args.push("--headless=new".to_string());
                args.push("--disable-gpu".to_string());
            }
            chrome_opts.insert("args".to_string(), json!(args));
        }

        caps.insert("goog:chromeOptions".to_string(), json!(chrome_opts));

        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(&opts.webdriver_url)
            .await
            .with_context(|| format!("webdriver connect failed: {}", opts.webdriver_url))?;

        tracing::info!(
            webdriver = %opts.webdriver_url,
            attached = opts.attach.is_some(),
            headless = opts.headless,
            "browser ready"
        );

        Ok(Self {
            client,
            attached: opts.attach.is_some(),
        })
    }

    /// Open a fresh window and return a page bound to it.
    pub async fn new_page(&self) -> Result<Page> {
        let win = self.client.new_window(true).await?;
        Ok(Page::new(self.client.clone(), win.handle))
    }

    /// End the WebDriver session. An attached browser keeps running; a
    /// launched one exits with the session.
    pub async fn close(self) -> Result<()> {
        tracing::debug!(attached = self.attached, "closing browser session");
        self.client.close().await?;
        Ok(())
    }
}
