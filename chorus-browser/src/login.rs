//! Interactive login flows.
//!
//! A [`LoginFlow`] prepares the browser for authentication (importing a
//! caller-supplied cookie string, or leaving the page on the platform's login
//! surface for a QR scan / phone login) and exposes the polling cadence the
//! session uses while waiting for the authentication probe to turn true.

use crate::page::Page;
use anyhow::{bail, Result};
use chorus_common::LoginMode;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct LoginFlow {
    pub mode: LoginMode,
    /// Cookie string for [`LoginMode::Cookie`].
    pub cookies: String,
    /// How long to wait for an interactive login before giving up.
    pub timeout: Duration,
}

impl LoginFlow {
    pub fn new(mode: LoginMode, cookies: impl Into<String>, timeout: Duration) -> Self {
        Self {
            mode,
            cookies: cookies.into(),
            timeout,
        }
    }

    /// Set the stage for authentication on an already-navigated page.
    ///
    /// For cookie import this writes the cookies and reloads so the site
    /// picks them up; interactive modes only announce what the user must do.
    /// The caller then polls its authentication check until it passes or
    /// [`timeout`](LoginFlow::timeout) elapses.
    pub async fn prepare(&self, page: &Page) -> Result<()> {
        match self.mode {
            LoginMode::Cookie => {
                if self.cookies.trim().is_empty() {
                    bail!("cookie login requested but no cookie string configured");
                }
                let imported = page.import_cookies(&self.cookies).await?;
                if imported == 0 {
                    bail!("cookie string contained no usable cookies");
                }
                let url = page.current_url().await?;
                page.goto(url.as_str()).await?;
                tracing::info!(imported, "imported login cookies");
            }
            LoginMode::Qrcode => {
                tracing::info!("waiting for QR-code scan in the browser window");
            }
            LoginMode::Phone => {
                tracing::info!("waiting for phone login in the browser window");
            }
        }
        Ok(())
    }

    /// Cookie import either worked immediately or never will; interactive
    /// logins are worth polling until the deadline.
    pub fn is_interactive(&self) -> bool {
        !matches!(self.mode, LoginMode::Cookie)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(2)
    }
}
