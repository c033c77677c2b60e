use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};

use replybot_pipeline::http::HttpPolicy;

/// Values shipped in `.env.example` that must be replaced before running.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me", "your-client-secret", "sk-change-me"];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,

    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,

    pub marketplace_url: String,
    pub oauth_url: String,
    pub generation_url: String,
    pub generation_api_key: String,
    pub generation_model: String,
    pub error_sink_url: Option<String>,

    pub marketplace_http: HttpPolicy,
    pub oauth_http: HttpPolicy,
    pub generation_http: HttpPolicy,
    pub error_sink_http: HttpPolicy,

    pub token_history_limit: Option<usize>,
    pub store_profile: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let required = |key: &str| -> anyhow::Result<String> {
            match get(key) {
                Some(v) if !PLACEHOLDER_SECRETS.contains(&v.as_str()) => Ok(v),
                Some(_) => bail!("{key} is still a placeholder, set it in your .env file"),
                None => bail!("{key} is not set"),
            }
        };

        let parsed = |key: &str| -> anyhow::Result<Option<u64>> {
            get(key)
                .map(|v| v.parse::<u64>().with_context(|| format!("{key} must be a non-negative integer, got {v:?}")))
                .transpose()
        };

        let policy = |prefix: &str, default_timeout: u64, retries: bool| -> anyhow::Result<HttpPolicy> {
            let key = format!("REPLYBOT_{prefix}_TIMEOUT_SECS");
            let timeout = match parsed(&key)? {
                Some(0) => bail!("{key} must be at least 1"),
                other => other.unwrap_or(default_timeout),
            };
            let max_retries = if retries {
                parsed(&format!("REPLYBOT_{prefix}_MAX_RETRIES"))?.unwrap_or(0)
            } else {
                0
            };
            Ok(HttpPolicy::new(
                Duration::from_secs(timeout),
                u32::try_from(max_retries).context("retry count out of range")?,
            ))
        };

        let port = or("REPLYBOT_PORT", "5000")
            .parse()
            .context("REPLYBOT_PORT must be a port number")?;

        let token_history_limit = match parsed("REPLYBOT_TOKEN_HISTORY_LIMIT")? {
            Some(0) => bail!("REPLYBOT_TOKEN_HISTORY_LIMIT must be at least 1"),
            other => other.map(|n| n as usize),
        };

        Ok(Self {
            host: or("REPLYBOT_HOST", "0.0.0.0"),
            port,
            db_path: or("REPLYBOT_DB_PATH", "replybot.db").into(),

            client_id: required("REPLYBOT_CLIENT_ID")?,
            client_secret: required("REPLYBOT_CLIENT_SECRET")?,
            redirect_uri: or("REPLYBOT_REDIRECT_URI", ""),

            marketplace_url: or("REPLYBOT_MARKETPLACE_URL", replybot_pipeline::marketplace::DEFAULT_BASE_URL),
            oauth_url: or("REPLYBOT_OAUTH_URL", replybot_pipeline::marketplace::DEFAULT_BASE_URL),
            generation_url: or("REPLYBOT_GENERATION_URL", replybot_pipeline::generation::DEFAULT_BASE_URL),
            generation_api_key: required("REPLYBOT_GENERATION_API_KEY")?,
            generation_model: or("REPLYBOT_GENERATION_MODEL", replybot_pipeline::generation::DEFAULT_MODEL),
            error_sink_url: get("REPLYBOT_ERROR_SINK_URL"),

            marketplace_http: policy("MARKETPLACE", 15, true)?,
            oauth_http: policy("OAUTH", 15, false)?,
            generation_http: policy("GENERATION", 60, true)?,
            error_sink_http: policy("ERROR_SINK", 5, false)?,

            token_history_limit,
            store_profile: get("REPLYBOT_STORE_PROFILE"),
        })
    }
}
