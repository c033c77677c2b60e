use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use tracing::warn;

/// Pause between transport-level retries.
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Timeout and retry budget for one external dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpPolicy {
    pub timeout: Duration,
    /// Extra attempts for idempotent requests that hit a network error, a
    /// 429 or a 5xx. Zero disables retrying.
    pub max_retries: u32,
}

impl HttpPolicy {
    pub fn new(timeout: Duration, max_retries: u32) -> Self {
        Self { timeout, max_retries }
    }

    pub fn client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder().timeout(self.timeout).build()
    }
}

impl Default for HttpPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(15), 0)
    }
}

fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Send an idempotent request, retrying transient failures within the
/// policy's budget. The last response (or error) is returned as-is.
pub(crate) async fn send_idempotent<F>(policy: &HttpPolicy, build: F) -> reqwest::Result<Response>
where
    F: Fn() -> RequestBuilder,
{
    let mut attempt = 0;
    loop {
        let result = build().send().await;
        let retry = match &result {
            Ok(response) => is_transient(response.status()),
            Err(e) => e.is_timeout() || e.is_connect(),
        };

        if !retry || attempt >= policy.max_retries {
            return result;
        }

        attempt += 1;
        match &result {
            Ok(response) => warn!(status = %response.status(), attempt, "transient response, retrying"),
            Err(e) => warn!(error = %e, attempt, "request failed, retrying"),
        }
        tokio::time::sleep(RETRY_DELAY).await;
    }
}

/// `abcd****wxyz`: enough to correlate tokens in logs without leaking them.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}****{tail}")
}
