//! The single consumer of the notification queue.
//!
//! Each notification runs the full pipeline (token, question fetch,
//! enrichment, classification, drafting, posting, persistence) before the
//! next one is dequeued. A failed notification is logged and reported; it
//! never stops the worker.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Duration;
use futures_util::FutureExt;
use tracing::{debug, error, info, warn};

use replybot_types::api::ErrorReport;
use replybot_types::marketplace::{Enrichment, Question, QuestionWindow};
use replybot_types::models::{Classification, INTENTS, QuestionRecord};
use replybot_types::notification::NotificationPayload;

use crate::collaborators::{CredentialStore, ErrorSink, Generator, Marketplace, OAuthProvider, ReportingStore};
use crate::error::{MarketplaceError, PipelineError};
use crate::generation::AnswerContext;
use crate::queue::{NotificationReceiver, QueueMessage};
use crate::refresh::TokenRefresher;

/// External services the worker depends on.
pub struct Collaborators {
    pub credentials: Arc<dyn CredentialStore>,
    pub oauth: Arc<dyn OAuthProvider>,
    pub marketplace: Arc<dyn Marketplace>,
    pub generator: Arc<dyn Generator>,
    pub error_sink: Arc<dyn ErrorSink>,
    pub reporting: Arc<dyn ReportingStore>,
}

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// How far back the unanswered-question search reaches.
    pub question_window: Duration,
    pub store_profile: Option<String>,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            question_window: Duration::hours(24),
            store_profile: None,
        }
    }
}

/// Per-run counters, returned when the worker stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub answered: u64,
    pub dropped: u64,
    pub failed: u64,
}

pub struct Worker {
    credentials: Arc<dyn CredentialStore>,
    refresher: TokenRefresher,
    marketplace: Arc<dyn Marketplace>,
    generator: Arc<dyn Generator>,
    error_sink: Arc<dyn ErrorSink>,
    reporting: Arc<dyn ReportingStore>,
    settings: WorkerSettings,
}

impl Worker {
    pub fn new(collaborators: Collaborators, settings: WorkerSettings) -> Self {
        let refresher = TokenRefresher::new(collaborators.credentials.clone(), collaborators.oauth);
        Self {
            credentials: collaborators.credentials,
            refresher,
            marketplace: collaborators.marketplace,
            generator: collaborators.generator,
            error_sink: collaborators.error_sink,
            reporting: collaborators.reporting,
            settings,
        }
    }

    /// Drain the queue until a shutdown message arrives or every producer
    /// is gone.
    pub async fn run(self, mut queue: NotificationReceiver) -> WorkerStats {
        info!("notification worker started");
        let mut stats = WorkerStats::default();

        while let Some(message) = queue.dequeue().await {
            let payload = match message {
                QueueMessage::Notification(payload) => payload,
                QueueMessage::Shutdown => {
                    info!(pending = queue.len(), "shutdown requested");
                    break;
                }
            };

            match self.handle(&payload).await {
                Ok(_) => stats.answered += 1,
                Err(e) if e.is_reportable() => stats.failed += 1,
                Err(_) => stats.dropped += 1,
            }
        }

        info!(
            answered = stats.answered,
            dropped = stats.dropped,
            failed = stats.failed,
            "notification worker stopped"
        );
        stats
    }

    /// Process one notification and deal with its failure, if any.
    ///
    /// Panics inside the pipeline are caught and treated as internal errors.
    pub async fn handle(&self, payload: &NotificationPayload) -> Result<QuestionRecord, PipelineError> {
        debug!(
            resource = payload.resource().unwrap_or("-"),
            payload = %payload.as_json(),
            "processing notification"
        );

        let result = match AssertUnwindSafe(self.process(payload)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(PipelineError::Internal(panic_message(panic.as_ref()))),
        };

        match &result {
            Ok(record) => info!(
                seller = %record.seller_id,
                item = %record.item_id,
                "notification processed"
            ),
            Err(e) if e.is_reportable() => {
                error!(
                    account = payload.account_id().as_deref().unwrap_or("-"),
                    topic = payload.topic().unwrap_or("-"),
                    resource = payload.resource().unwrap_or("-"),
                    kind = ?e.kind(),
                    error = %e,
                    "notification failed"
                );
                self.report(e).await;
            }
            Err(_) => {
                warn!(payload = %payload.as_json(), "notification without user_id dropped");
            }
        }

        result
    }

    /// The pipeline proper. Returns on the first fatal step.
    pub async fn process(&self, payload: &NotificationPayload) -> Result<QuestionRecord, PipelineError> {
        let account = payload.account_id().ok_or(PipelineError::MissingAccount)?;

        let stored = self
            .credentials
            .get_access_token(&account)
            .await
            .map_err(|e| PipelineError::internal(format!("{e:#}")))?;
        if stored.is_none() {
            warn!(account = %account, "no access token stored, expecting a refresh");
        }

        let (access_token, questions) = self.fetch_questions(&account, stored.unwrap_or_default()).await?;

        let question = questions
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::NoQuestions { account: account.clone() })?;
        info!(account = %account, question = %question.id, item = %question.item_id, "answering question");

        let enrichment = self.enrich(&question, &access_token).await;

        let raw_label = self
            .generator
            .classify(&question.text, INTENTS)
            .await
            .map_err(|source| PipelineError::Classify {
                question_id: question.id.clone(),
                source,
            })?;
        let classification = Classification::from_model_output(&raw_label, INTENTS);
        info!(question = %question.id, classification = %classification, "question classified");

        let context = AnswerContext {
            question,
            classification,
            enrichment,
            store_profile: self.settings.store_profile.clone(),
        };
        let answer = self
            .generator
            .draft_answer(&context)
            .await
            .map_err(|source| PipelineError::Draft {
                question_id: context.question.id.clone(),
                source,
            })?;

        let receipt = self
            .marketplace
            .post_answer(&context.question.id, &answer, &access_token)
            .await
            .map_err(|source| PipelineError::PostAnswer {
                question_id: context.question.id.clone(),
                source,
            })?;

        // The answer is already public; a lost report row is not worth failing for.
        let record = QuestionRecord::from_receipt(&receipt);
        if let Err(e) = self.reporting.persist(&record).await {
            error!(question = %context.question.id, error = %format!("{e:#}"), "failed to persist question record");
        }

        Ok(record)
    }

    /// Fetch unanswered questions, refreshing the token once on a 401.
    /// Returns the token that worked alongside the questions.
    async fn fetch_questions(
        &self,
        account: &str,
        access_token: String,
    ) -> Result<(String, Vec<Question>), PipelineError> {
        let window = QuestionWindow::trailing(self.settings.question_window);

        match self
            .marketplace
            .fetch_unanswered_questions(account, &access_token, &window)
            .await
        {
            Ok(search) => Ok((access_token, search.questions)),
            Err(MarketplaceError::Unauthorized) => {
                warn!(account, "access token rejected, refreshing");
                let refreshed = self.refresher.refresh(account, &access_token).await?;
                let search = self
                    .marketplace
                    .fetch_unanswered_questions(account, &refreshed, &window)
                    .await
                    .map_err(|source| PipelineError::FetchQuestions {
                        account: account.to_string(),
                        source,
                    })?;
                Ok((refreshed, search.questions))
            }
            Err(source) => Err(PipelineError::FetchQuestions {
                account: account.to_string(),
                source,
            }),
        }
    }

    /// Best-effort context lookups; each failure leaves its field empty.
    async fn enrich(&self, question: &Question, access_token: &str) -> Enrichment {
        let (customer, description, details) = tokio::join!(
            self.marketplace.fetch_customer(&question.from.id, access_token),
            self.marketplace.fetch_item_description(&question.item_id, access_token),
            self.marketplace.fetch_item_details(&question.item_id, access_token),
        );

        Enrichment {
            customer: customer.unwrap_or_else(|e| {
                warn!(customer = %question.from.id, error = %e, "customer lookup failed");
                serde_json::Value::Object(Default::default())
            }),
            item_description: description.unwrap_or_else(|e| {
                warn!(item = %question.item_id, error = %e, "item description lookup failed");
                String::new()
            }),
            item_details: details.unwrap_or_else(|e| {
                warn!(item = %question.item_id, error = %e, "item details lookup failed");
                Default::default()
            }),
        }
    }

    async fn report(&self, err: &PipelineError) {
        let report = ErrorReport { error: err.to_string() };
        match self.error_sink.report(&report).await {
            Ok(()) => debug!("error report sent"),
            Err(e) => error!(error = %format!("{e:#}"), "failed to send error report"),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("pipeline panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("pipeline panicked: {s}")
    } else {
        "pipeline panicked".to_string()
    }
}
