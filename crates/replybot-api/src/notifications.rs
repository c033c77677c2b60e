use axum::{Json, extract::State, http::StatusCode};
use serde_json::Value;
use tracing::{error, info};

use replybot_types::api::{QueueSizeResponse, StatusResponse};
use replybot_types::notification::NotificationPayload;

use crate::AppState;

/// Accept a marketplace notification and queue it for the worker.
///
/// The body is not validated beyond being JSON: a payload without a usable
/// `user_id` is still queued and dropped by the worker.
pub async fn receive_notification(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<StatusResponse>, StatusCode> {
    let payload = NotificationPayload::new(body);
    info!(
        account = payload.account_id().as_deref().unwrap_or("-"),
        topic = payload.topic().unwrap_or("-"),
        resource = payload.resource().unwrap_or("-"),
        "notification received"
    );

    state.queue.enqueue(payload).map_err(|e| {
        error!("{e}");
        StatusCode::SERVICE_UNAVAILABLE
    })?;

    Ok(Json(StatusResponse::new("success", "notification queued")))
}

/// The marketplace sometimes calls the callback URL with GET; nothing is queued.
pub async fn ignore_notification() -> Json<StatusResponse> {
    Json(StatusResponse::new("ignored", "only POST notifications are processed"))
}

pub async fn queue_size(State(state): State<AppState>) -> Json<QueueSizeResponse> {
    Json(QueueSizeResponse {
        status: "success".into(),
        queue_size: state.queue.len(),
    })
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use serde_json::json;
    use tower::ServiceExt;

    use replybot_pipeline::queue::QueueMessage;

    use crate::test_support::{StubOAuth, TestApp, body_json};

    fn post(body: &str) -> Request<Body> {
        Request::post("/notification")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn post_enqueues_payload_verbatim() {
        let mut app = TestApp::new(StubOAuth::rejecting());
        let payload = json!({ "user_id": 42, "topic": "questions", "resource": "/questions/5001" });

        let response = app.router().oneshot(post(&payload.to_string())).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "success");
        assert!(body["message"].is_string());

        assert_eq!(app.state.queue.len(), 1);
        match app.receiver.dequeue().await {
            Some(QueueMessage::Notification(queued)) => assert_eq!(queued.as_json(), &payload),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn payload_without_user_id_is_still_accepted() {
        let app = TestApp::new(StubOAuth::rejecting());
        let response = app.router().oneshot(post("{}")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(app.state.queue.len(), 1);
    }

    #[tokio::test]
    async fn unparseable_body_is_rejected() {
        let app = TestApp::new(StubOAuth::rejecting());
        let response = app.router().oneshot(post("{not json")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(app.state.queue.is_empty());
    }

    #[tokio::test]
    async fn closed_queue_is_unavailable() {
        let app = TestApp::new(StubOAuth::rejecting());
        let TestApp { state, receiver, .. } = app;
        drop(receiver);

        let response = crate::router(state).oneshot(post(r#"{"user_id":"1"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn get_is_ignored() {
        let app = TestApp::new(StubOAuth::rejecting());
        let response = app
            .router()
            .oneshot(Request::get("/notification").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ignored");
        assert!(app.state.queue.is_empty());
    }

    #[tokio::test]
    async fn queue_size_reports_depth() {
        let app = TestApp::new(StubOAuth::rejecting());
        for _ in 0..3 {
            app.router().oneshot(post(r#"{"user_id":"7"}"#)).await.unwrap();
        }

        let response = app
            .router()
            .oneshot(Request::get("/queue_size").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body = body_json(response).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["queue_size"], 3);
    }
}
