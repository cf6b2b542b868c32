//! Minimal HTTP client for cookie-authenticated platform web APIs.
//!
//! - A [`SessionHeaders`] identity (user-agent, cookie string, origin/referer)
//!   captured from the live browser session is attached to every request
//! - Per-request query params, timeout and retry overrides via [`RequestOpts`]
//! - Retries 429/5xx with exponential backoff and `Retry-After` support
//! - Extracts the error message from common platform envelopes
//!   (`{"code":..,"message":..}`, `{"status_code":..,"status_msg":..}`, ...)
//!
//! Security: cookie values are never logged; structured `tracing` events only
//! carry the request method, host/path, status, and timing.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    #[error("server returned error {status}: {message}")]
    Api { status: StatusCode, message: String },
}

/// Browser-derived identity attached to every request a platform client makes.
///
/// The cookie string is harvested from the automation session after the page
/// has loaded (and refreshed after an interactive login); the user-agent must
/// match the browser's or several platforms reject the request outright.
#[derive(Debug, Clone, Default)]
pub struct SessionHeaders {
    pub user_agent: String,
    pub cookie: String,
    pub origin: Option<String>,
    pub referer: Option<String>,
    /// Additional platform-specific headers (lowercase names).
    pub extra: Vec<(String, String)>,
}

impl SessionHeaders {
    fn to_header_map(&self) -> Result<HeaderMap, HttpError> {
        let mut map = HeaderMap::new();
        let mut put = |name: &str, value: &str| -> Result<(), HttpError> {
            if value.is_empty() {
                return Ok(());
            }
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| HttpError::Build(format!("invalid header name {name:?}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| HttpError::Build(format!("invalid value for {name:?}: {e}")))?;
            map.insert(name, value);
            Ok(())
        };

        put("user-agent", &self.user_agent)?;
        put("cookie", &self.cookie)?;
        if let Some(origin) = &self.origin {
            put("origin", origin)?;
        }
        if let Some(referer) = &self.referer {
            put("referer", referer)?;
        }
        for (name, value) in &self.extra {
            put(name, value)?;
        }
        Ok(map)
    }
}

/// Per-request tuning knobs.
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    pub timeout: Option<Duration>,
    pub retries: Option<usize>,
    pub query: Option<Vec<(&'a str, Cow<'a, str>)>>,
    pub headers: Option<HeaderMap>,
}

/// HTTP client anchored to one platform's API origin.
#[derive(Clone)]
pub struct HttpClient {
    base: Url,
    inner: Client,
    session: SessionHeaders,
    pub default_timeout: Duration,
    pub max_retries: usize,
}

impl HttpClient {
    pub fn new(base: &str, session: SessionHeaders) -> Result<Self, HttpError> {
        let base = Url::parse(base).map_err(|e| HttpError::Url(e.to_string()))?;
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base,
            inner,
            session,
            default_timeout: Duration::from_secs(30),
            max_retries: 2,
        })
    }

    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    pub fn with_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    /// Replace the cookie string, e.g. after an interactive login completed.
    pub fn set_cookie(&mut self, cookie: String) {
        self.session.cookie = cookie;
    }

    pub async fn get_json<T>(&self, path: &str, opts: RequestOpts<'_>) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        self.request_json::<(), T>(Method::GET, path, None, opts)
            .await
    }

    pub async fn post_json<B, T>(
        &self,
        path: &str,
        body: &B,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request_json(Method::POST, path, Some(body), opts).await
    }

    async fn request_json<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self
            .base
            .join(path)
            .map_err(|e| HttpError::Url(e.to_string()))?;

        let session_headers = self.session.to_header_map()?;
        let timeout = opts.timeout.unwrap_or(self.default_timeout);
        let max_retries = opts.retries.unwrap_or(self.max_retries);
        let mut attempt = 0usize;

        loop {
            let mut rb = self
                .inner
                .request(method.clone(), url.clone())
                .timeout(timeout)
                .headers(session_headers.clone());

            if let Some(q) = &opts.query {
                let pairs: Vec<(&str, &str)> = q.iter().map(|(k, v)| (*k, v.as_ref())).collect();
                rb = rb.query(&pairs);
            }
            if let Some(b) = body {
                rb = rb.json(b);
            }
            if let Some(hdrs) = &opts.headers {
                rb = rb.headers(hdrs.clone());
            }

            tracing::debug!(
                attempt = attempt + 1,
                max_retries,
                method = %method,
                host_path = %format!("{}{}", url.domain().unwrap_or("-"), url.path()),
                timeout_ms = timeout.as_millis() as u64,
                "http.request.start"
            );

            let t0 = std::time::Instant::now();
            let resp = match rb.send().await {
                Ok(resp) => resp,
                Err(err) => {
                    let message = err.to_string();
                    if attempt < max_retries {
                        attempt += 1;
                        let delay = backoff_delay(attempt);
                        tracing::warn!(
                            attempt,
                            backoff_ms = delay.as_millis() as u64,
                            message = %message,
                            "http.retrying.network"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    return Err(HttpError::Network(message));
                }
            };

            let status = resp.status();
            let headers = resp.headers().clone();
            let bytes = match resp.bytes().await {
                Ok(bytes) => bytes,
                Err(err) => {
                    let message = err.to_string();
                    if attempt < max_retries {
                        attempt += 1;
                        let delay = backoff_delay(attempt);
                        tracing::warn!(
                            attempt,
                            backoff_ms = delay.as_millis() as u64,
                            message = %message,
                            "http.retrying.body"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    return Err(HttpError::Network(message));
                }
            };

            tracing::debug!(
                %status,
                duration_ms = t0.elapsed().as_millis() as u64,
                body_len = bytes.len(),
                "http.response"
            );

            if status.is_success() {
                let snippet = snip_body(&bytes);
                return serde_json::from_slice::<T>(&bytes).map_err(|e| {
                    tracing::warn!(
                        serde_err = %e,
                        body_snippet = %snippet,
                        "http.response.decode_error"
                    );
                    HttpError::Decode(e.to_string(), snippet)
                });
            }

            let message = extract_error_message(&bytes);
            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if retryable && attempt < max_retries {
                attempt += 1;
                let delay = match retry_after_secs(&headers) {
                    Some(secs) => Duration::from_secs(secs),
                    None if status == StatusCode::TOO_MANY_REQUESTS => {
                        backoff_delay(attempt).max(Duration::from_millis(1100))
                    }
                    None => backoff_delay(attempt),
                };
                tracing::warn!(
                    %status,
                    attempt,
                    backoff_ms = delay.as_millis() as u64,
                    message = %message,
                    "http.retrying"
                );
                sleep(delay).await;
                continue;
            }

            tracing::warn!(%status, message = %message, "http.error");
            return Err(HttpError::Api { status, message });
        }
    }
}

fn backoff_delay(attempt: usize) -> Duration {
    Duration::from_millis(200u64.saturating_mul(1 << (attempt - 1).min(6)))
}

fn retry_after_secs(h: &HeaderMap) -> Option<u64> {
    h.get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())?
        .parse()
        .ok()
}

fn snip_body(body: &[u8]) -> String {
    let mut snip = String::from_utf8_lossy(body).to_string();
    if snip.len() > 500 {
        let mut end = 500;
        while !snip.is_char_boundary(end) {
            end -= 1;
        }
        snip.truncate(end);
        snip.push_str("...");
    }
    snip
}

/// Pull a human-readable message out of the platform error envelopes we see
/// in practice; fall back to a body snippet.
fn extract_error_message(body: &[u8]) -> String {
    // bilibili / weibo style: {"code": -404, "message": "..."}
    #[derive(Deserialize)]
    struct CodeMessage {
        #[serde(default)]
        message: String,
        #[serde(default)]
        msg: String,
    }

    // douyin style: {"status_code": 8, "status_msg": "..."}
    #[derive(Deserialize)]
    struct StatusMsg {
        #[serde(default)]
        status_msg: String,
    }

    // zhihu style: {"error": {"message": "..."}}
    #[derive(Deserialize)]
    struct ErrorEnvelope {
        error: ErrorDetail,
    }
    #[derive(Deserialize)]
    struct ErrorDetail {
        #[serde(default)]
        message: String,
    }

    if let Ok(env) = serde_json::from_slice::<ErrorEnvelope>(body) {
        if !env.error.message.is_empty() {
            return env.error.message;
        }
    }
    if let Ok(m) = serde_json::from_slice::<StatusMsg>(body) {
        if !m.status_msg.is_empty() {
            return m.status_msg;
        }
    }
    if let Ok(m) = serde_json::from_slice::<CodeMessage>(body) {
        if !m.message.is_empty() {
            return m.message;
        }
        if !m.msg.is_empty() {
            return m.msg;
        }
    }
    snip_body(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelopes_are_extracted() {
        assert_eq!(
            extract_error_message(br#"{"code":-404,"message":"not found"}"#),
            "not found"
        );
        assert_eq!(
            extract_error_message(br#"{"status_code":8,"status_msg":"need login"}"#),
            "need login"
        );
        assert_eq!(
            extract_error_message(br#"{"error":{"message":"unauthorized","code":401}}"#),
            "unauthorized"
        );
        assert_eq!(extract_error_message(br#"{"ok":false,"msg":"rate"}"#), "rate");
        assert_eq!(extract_error_message(b"plain text body"), "plain text body");
    }

    #[test]
    fn session_headers_skip_empty_fields() {
        let headers = SessionHeaders {
            user_agent: "Mozilla/5.0".into(),
            cookie: String::new(),
            origin: Some("https://www.bilibili.com".into()),
            referer: None,
            extra: vec![("x-requested-with".into(), "XMLHttpRequest".into())],
        };
        let map = headers.to_header_map().unwrap();
        assert!(map.get("cookie").is_none());
        assert_eq!(map.get("user-agent").unwrap(), "Mozilla/5.0");
        assert_eq!(map.get("x-requested-with").unwrap(), "XMLHttpRequest");
    }

    #[test]
    fn invalid_header_values_are_rejected() {
        let headers = SessionHeaders {
            user_agent: "bad\nagent".into(),
            ..Default::default()
        };
        assert!(matches!(
            headers.to_header_map(),
            Err(HttpError::Build(_))
        ));
    }

    #[test]
    fn backoff_grows_and_saturates() {
        assert_eq!(backoff_delay(1), Duration::from_millis(200));
        assert_eq!(backoff_delay(2), Duration::from_millis(400));
        assert!(backoff_delay(20) <= Duration::from_millis(200 * 64));
    }
}
