//! Seams between the worker and everything it talks to.
//!
//! Production implementations live next to this module (`store`,
//! `marketplace`, `oauth`, `generation`, `error_sink`); tests swap in
//! in-memory fakes.

use async_trait::async_trait;
use serde_json::Value;

use replybot_types::api::ErrorReport;
use replybot_types::marketplace::{
    AnswerReceipt, ItemDetails, QuestionSearch, QuestionWindow, ResponseTime, TokenGrant,
};
use replybot_types::models::{Intent, QuestionRecord};

use crate::error::{GenerationError, MarketplaceError, OAuthError};
use crate::generation::AnswerContext;

/// Per-account OAuth token persistence.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_access_token(&self, account_id: &str) -> anyhow::Result<Option<String>>;

    async fn get_refresh_token(&self, account_id: &str) -> anyhow::Result<Option<String>>;

    /// Append a new authoritative pair. Older pairs are kept as history.
    async fn store_token_pair(
        &self,
        account_id: &str,
        refresh_token: &str,
        access_token: &str,
    ) -> anyhow::Result<()>;
}

/// The marketplace's OAuth token endpoint. Client credentials are held by
/// the implementation.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, OAuthError>;

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, OAuthError>;
}

#[async_trait]
pub trait Marketplace: Send + Sync {
    async fn fetch_unanswered_questions(
        &self,
        account_id: &str,
        access_token: &str,
        window: &QuestionWindow,
    ) -> Result<QuestionSearch, MarketplaceError>;

    async fn fetch_customer(&self, customer_id: &str, access_token: &str) -> Result<Value, MarketplaceError>;

    async fn fetch_item_description(&self, item_id: &str, access_token: &str) -> Result<String, MarketplaceError>;

    async fn fetch_item_details(&self, item_id: &str, access_token: &str) -> Result<ItemDetails, MarketplaceError>;

    async fn post_answer(
        &self,
        question_id: &str,
        text: &str,
        access_token: &str,
    ) -> Result<AnswerReceipt, MarketplaceError>;

    /// The seller's question response-time stats, used by the report.
    async fn fetch_response_time(&self, account_id: &str, access_token: &str) -> Result<ResponseTime, MarketplaceError>;
}

#[async_trait]
pub trait Generator: Send + Sync {
    /// Pick an intent label for a question. Returns the raw model output.
    async fn classify(&self, question: &str, vocabulary: &[Intent]) -> Result<String, GenerationError>;

    async fn draft_answer(&self, context: &AnswerContext) -> Result<String, GenerationError>;
}

/// External error-reporting endpoint. Callers ignore failures.
#[async_trait]
pub trait ErrorSink: Send + Sync {
    async fn report(&self, report: &ErrorReport) -> anyhow::Result<()>;
}

#[async_trait]
pub trait ReportingStore: Send + Sync {
    async fn persist(&self, record: &QuestionRecord) -> anyhow::Result<()>;
}
