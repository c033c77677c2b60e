pub mod auth;
pub mod notifications;
pub mod questions;

use std::sync::Arc;

use axum::{
    Json, Router,
    routing::get,
};
use serde_json::{Value, json};

use replybot_db::Database;
use replybot_pipeline::NotificationQueue;
use replybot_pipeline::collaborators::{CredentialStore, Marketplace, OAuthProvider};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub queue: NotificationQueue,
    pub db: Arc<Database>,
    pub oauth: Arc<dyn OAuthProvider>,
    pub credentials: Arc<dyn CredentialStore>,
    pub marketplace: Arc<dyn Marketplace>,
}

/// All HTTP routes. Layers (CORS, tracing) are added by the binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/notification",
            get(notifications::ignore_notification).post(notifications::receive_notification),
        )
        .route("/queue_size", get(notifications::queue_size))
        .route("/auth/callback", get(auth::callback))
        .route("/questions", get(questions::list_questions))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
