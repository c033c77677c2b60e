use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use replybot_types::marketplace::{AnswerReceipt, ItemDetails, QuestionSearch, QuestionWindow, ResponseTime};

use crate::collaborators::Marketplace;
use crate::error::MarketplaceError;
use crate::http::{HttpPolicy, send_idempotent};

/// Base URL of the public marketplace REST API.
pub const DEFAULT_BASE_URL: &str = "https://api.mercadolibre.com";

/// REST client for question, item and user lookups and answer posting.
#[derive(Debug, Clone)]
pub struct MarketplaceClient {
    client: reqwest::Client,
    base_url: String,
    policy: HttpPolicy,
}

impl MarketplaceClient {
    pub fn new(base_url: impl Into<String>, policy: HttpPolicy) -> Result<Self, MarketplaceError> {
        Ok(Self {
            client: policy.client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            policy,
        })
    }

    async fn get(&self, path: &str, access_token: &str, query: &[(&str, String)]) -> Result<Response, MarketplaceError> {
        let url = format!("{}{}", self.base_url, path);
        let response = send_idempotent(&self.policy, || {
            self.client.get(&url).bearer_auth(access_token).query(query)
        })
        .await?;
        check_status(response).await
    }
}

/// Map 401 and other non-success statuses to their error variants.
async fn check_status(response: Response) -> Result<Response, MarketplaceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(MarketplaceError::Unauthorized);
    }
    let body = response.text().await.unwrap_or_default();
    Err(MarketplaceError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, MarketplaceError> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| MarketplaceError::Decode(e.to_string()))
}

#[async_trait]
impl Marketplace for MarketplaceClient {
    async fn fetch_unanswered_questions(
        &self,
        account_id: &str,
        access_token: &str,
        window: &QuestionWindow,
    ) -> Result<QuestionSearch, MarketplaceError> {
        let query = [
            ("status", "UNANSWERED".to_string()),
            ("date_created_from", window.from.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ("date_created_to", window.to.to_rfc3339_opts(SecondsFormat::Millis, true)),
        ];

        let response = self.get("/my/received_questions/search", access_token, &query).await;
        if let Err(e) = &response {
            warn!(account = account_id, error = %e, "question search failed");
        }
        let search: QuestionSearch = decode(response?).await?;
        info!(account = account_id, count = search.questions.len(), "unanswered questions fetched");
        Ok(search)
    }

    async fn fetch_customer(&self, customer_id: &str, access_token: &str) -> Result<Value, MarketplaceError> {
        let response = self.get(&format!("/users/{customer_id}"), access_token, &[]).await?;
        let customer = decode(response).await?;
        debug!(customer = customer_id, "customer profile fetched");
        Ok(customer)
    }

    async fn fetch_item_description(&self, item_id: &str, access_token: &str) -> Result<String, MarketplaceError> {
        let response = self.get(&format!("/items/{item_id}/description"), access_token, &[]).await?;
        let body: Value = decode(response).await?;
        debug!(item = item_id, "item description fetched");
        Ok(body
            .get("plain_text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    async fn fetch_item_details(&self, item_id: &str, access_token: &str) -> Result<ItemDetails, MarketplaceError> {
        let response = self.get(&format!("/items/{item_id}"), access_token, &[]).await?;
        let listing: Value = decode(response).await?;
        debug!(item = item_id, "item details fetched");
        Ok(ItemDetails::from_listing(&listing))
    }

    async fn post_answer(
        &self,
        question_id: &str,
        text: &str,
        access_token: &str,
    ) -> Result<AnswerReceipt, MarketplaceError> {
        // The marketplace expects a numeric question id when it has one.
        let question: Value = question_id
            .parse::<u64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::from(question_id));

        // Posting is not idempotent: sent exactly once, whatever the policy.
        let response = self
            .client
            .post(format!("{}/answers", self.base_url))
            .bearer_auth(access_token)
            .json(&json!({ "question_id": question, "text": text }))
            .send()
            .await?;
        let receipt = decode(check_status(response).await?).await?;
        info!(question = question_id, "answer posted");
        Ok(receipt)
    }

    async fn fetch_response_time(&self, account_id: &str, access_token: &str) -> Result<ResponseTime, MarketplaceError> {
        let response = self
            .get(&format!("/users/{account_id}/questions/response_time"), access_token, &[])
            .await?;
        let stats: ResponseTime = decode(response).await?;
        debug!(account = account_id, total_minutes = ?stats.total.response_time, "response time fetched");
        Ok(stats)
    }
}
