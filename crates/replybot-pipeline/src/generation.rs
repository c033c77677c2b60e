//! Classification and answer drafting against an OpenAI-compatible
//! chat-completions API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use replybot_types::marketplace::{Enrichment, Question};
use replybot_types::models::{Classification, Intent, UNIDENTIFIED};

use crate::collaborators::Generator;
use crate::error::GenerationError;
use crate::http::{HttpPolicy, send_idempotent};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";

const CLASSIFY_MAX_TOKENS: u32 = 50;
const CLASSIFY_TEMPERATURE: f32 = 0.5;
const DRAFT_MAX_TOKENS: u32 = 256;
const DRAFT_TEMPERATURE: f32 = 1.0;

/// Everything the drafting prompt is built from.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerContext {
    pub question: Question,
    pub classification: Classification,
    pub enrichment: Enrichment,
    /// Free-text description of the store, appended to the system prompt.
    #[serde(skip)]
    pub store_profile: Option<String>,
}

// -- Wire types --

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

pub struct GenerationClient {
    client: reqwest::Client,
    completions_url: String,
    api_key: String,
    model: String,
    policy: HttpPolicy,
}

impl GenerationClient {
    pub fn new(base_url: &str, api_key: String, model: String, policy: HttpPolicy) -> Result<Self, GenerationError> {
        Ok(Self {
            client: policy.client()?,
            completions_url: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            model,
            policy,
        })
    }

    async fn complete(
        &self,
        system: String,
        user: String,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, GenerationError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system".into(), content: system },
                ChatMessage { role: "user".into(), content: user },
            ],
            max_tokens,
            temperature,
        };

        let response = send_idempotent(&self.policy, || {
            self.client
                .post(&self.completions_url)
                .bearer_auth(&self.api_key)
                .json(&request)
        })
        .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|e| GenerationError::Decode(e.to_string()))?;

        if let Some(usage) = &parsed.usage {
            debug!(
                model = %self.model,
                input_tokens = usage.prompt_tokens,
                output_tokens = usage.completion_tokens,
                "completion usage"
            );
        }

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default();
        if content.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(content)
    }
}

#[async_trait]
impl Generator for GenerationClient {
    async fn classify(&self, question: &str, vocabulary: &[Intent]) -> Result<String, GenerationError> {
        self.complete(
            classification_prompt(vocabulary),
            question.to_string(),
            CLASSIFY_MAX_TOKENS,
            CLASSIFY_TEMPERATURE,
        )
        .await
    }

    async fn draft_answer(&self, context: &AnswerContext) -> Result<String, GenerationError> {
        self.complete(
            drafting_prompt(context),
            context.question.text.clone(),
            DRAFT_MAX_TOKENS,
            DRAFT_TEMPERATURE,
        )
        .await
    }
}

fn classification_prompt(vocabulary: &[Intent]) -> String {
    let intents = vocabulary
        .iter()
        .map(|intent| format!("- {}: {}", intent.label, intent.keywords.join("; ")))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Classify the buyer question sent by the user into exactly one of these intents. \
         The keywords are hints, not an exhaustive list.\n{intents}\n\
         Reply with the intent name only. If none applies, reply \"{UNIDENTIFIED}\"."
    )
}

fn drafting_prompt(context: &AnswerContext) -> String {
    // Serialising the context cannot fail: it only holds strings and JSON values.
    let facts = serde_json::to_string_pretty(context).unwrap_or_default();
    let mut prompt = format!(
        "You answer buyer questions for a marketplace store. Answer the user's question \
         using only the information below. Be brief and polite, and never invent facts: \
         when the information is missing, say the store will check and get back.\n\
         Question type: {}\n\
         Information:\n{facts}",
        context.classification
    );
    if let Some(profile) = context.store_profile.as_deref().filter(|p| !p.trim().is_empty()) {
        prompt.push_str("\nAbout the store:\n");
        prompt.push_str(profile);
    }
    prompt
}
