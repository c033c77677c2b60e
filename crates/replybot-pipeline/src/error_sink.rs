use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use tracing::{info, warn};

use replybot_types::api::ErrorReport;

use crate::collaborators::ErrorSink;
use crate::http::HttpPolicy;

/// Forwards failure reports as JSON to an external endpoint.
pub struct HttpErrorSink {
    client: reqwest::Client,
    url: String,
}

impl HttpErrorSink {
    pub fn new(url: String, policy: HttpPolicy) -> anyhow::Result<Self> {
        Ok(Self {
            client: policy.client()?,
            url,
        })
    }
}

#[async_trait]
impl ErrorSink for HttpErrorSink {
    async fn report(&self, report: &ErrorReport) -> anyhow::Result<()> {
        let response = self
            .client
            .post(&self.url)
            .header(ACCEPT, "application/json")
            .json(report)
            .send()
            .await
            .context("error report request failed")?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("error sink returned {status}: {body}");
        }
        info!(status = status.as_u16(), "error report delivered");
        Ok(())
    }
}

/// Used when no reporting endpoint is configured: the failure is already in
/// the logs, so this only notes that nothing was forwarded.
pub struct LogOnlyErrorSink;

#[async_trait]
impl ErrorSink for LogOnlyErrorSink {
    async fn report(&self, report: &ErrorReport) -> anyhow::Result<()> {
        warn!(error = %report.error, "no error sink configured, report not forwarded");
        Ok(())
    }
}
