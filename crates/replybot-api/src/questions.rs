use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use tracing::{error, info, warn};

use replybot_types::api::{QuestionListQuery, QuestionListResponse, QuestionResponse, ResponseTimeReport};

use crate::AppState;

const MAX_LIMIT: u32 = 500;

/// Answered questions, most recent first. Filtering by seller also pulls
/// that seller's response-time stats from the marketplace.
pub async fn list_questions(
    State(state): State<AppState>,
    Query(query): Query<QuestionListQuery>,
) -> Result<Json<QuestionListResponse>, StatusCode> {
    let limit = query.limit.min(MAX_LIMIT);
    let seller_id = query.seller_id.filter(|s| !s.is_empty());

    let db = state.db.clone();
    let filter = seller_id.clone();
    let rows = tokio::task::spawn_blocking(move || db.list_questions(filter.as_deref(), limit))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!("failed to list questions: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let questions = rows
        .into_iter()
        .map(|row| QuestionResponse {
            id: row.id,
            seller_id: row.seller_id,
            question_text: row.question_text,
            question_date: row.question_date,
            item_id: row.item_id,
            answer_text: row.answer_text,
            answer_date: row.answer_date,
            customer_id: row.customer_id,
            recorded_at: row.created_at,
        })
        .collect();

    let response_time = match seller_id {
        Some(seller) => seller_response_time(&state, &seller).await,
        None => None,
    };

    Ok(Json(QuestionListResponse {
        questions,
        response_time,
    }))
}

/// Best effort: the listing is still served when the stats are unavailable.
async fn seller_response_time(state: &AppState, seller_id: &str) -> Option<ResponseTimeReport> {
    let access_token = match state.credentials.get_access_token(seller_id).await {
        Ok(Some(token)) => token,
        Ok(None) => {
            warn!(seller = seller_id, "no access token stored, skipping response time");
            return None;
        }
        Err(e) => {
            error!(seller = seller_id, error = %format!("{e:#}"), "failed to read access token");
            return None;
        }
    };

    match state.marketplace.fetch_response_time(seller_id, &access_token).await {
        Ok(stats) => {
            info!(seller = seller_id, "response time fetched");
            Some(stats.into())
        }
        Err(e) => {
            warn!(seller = seller_id, error = %e, "response time lookup failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use replybot_pipeline::collaborators::CredentialStore;
    use replybot_types::marketplace::{ResponseTime, ResponseTimeBucket};
    use replybot_types::models::QuestionRecord;

    use crate::test_support::{StubMarketplace, StubOAuth, TestApp, body_json};

    fn record(seller: &str, item: &str, answered_at: &str) -> QuestionRecord {
        QuestionRecord {
            seller_id: seller.into(),
            question_text: "Tem em azul?".into(),
            question_date: "2026-10-18T08:00:00.000-03:00".into(),
            item_id: item.into(),
            answer_text: "Temos sim.".into(),
            answer_date: answered_at.into(),
            customer_id: "900".into(),
        }
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn lists_newest_first_with_seller_filter() {
        let app = TestApp::new(StubOAuth::rejecting());
        app.state.db.insert_question(&record("42", "MLB1", "2026-10-18T09:00:00.000-03:00")).unwrap();
        app.state.db.insert_question(&record("42", "MLB2", "2026-10-18T10:00:00.000-03:00")).unwrap();
        app.state.db.insert_question(&record("7", "MLB3", "2026-10-18T11:00:00.000-03:00")).unwrap();

        let response = app.router().oneshot(get("/questions?seller_id=42")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let items: Vec<&str> = body["questions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|q| q["item_id"].as_str().unwrap())
            .collect();
        assert_eq!(items, vec!["MLB2", "MLB1"]);
        assert!(body["questions"][0]["recorded_at"].is_string());
        // no token stored for the seller
        assert!(body["response_time"].is_null());
    }

    #[tokio::test]
    async fn limit_is_applied() {
        let app = TestApp::new(StubOAuth::rejecting());
        for i in 0..3 {
            let answered = format!("2026-10-18T0{i}:00:00.000-03:00");
            app.state.db.insert_question(&record("42", "MLB1", &answered)).unwrap();
        }

        let response = app.router().oneshot(get("/questions?limit=2")).await.unwrap();

        let body = body_json(response).await;
        assert_eq!(body["questions"].as_array().unwrap().len(), 2);
        assert!(body["response_time"].is_null());
        assert!(app.marketplace.lookups.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn seller_filter_adds_response_time_in_hours() {
        let app = TestApp::with_marketplace(
            StubOAuth::rejecting(),
            StubMarketplace {
                stats: Some(ResponseTime {
                    user_id: Some("42".into()),
                    total: ResponseTimeBucket { response_time: Some(90.0), sales_percent_increase: None },
                    weekend: ResponseTimeBucket { response_time: Some(30.0), sales_percent_increase: Some(5.0) },
                    ..ResponseTime::default()
                }),
                ..StubMarketplace::default()
            },
        );
        app.credentials.store_token_pair("42", "refresh", "access-42").await.unwrap();

        let response = app.router().oneshot(get("/questions?seller_id=42")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["response_time"]["user_id"], "42");
        assert_eq!(body["response_time"]["total"]["hours"], 1.5);
        assert_eq!(body["response_time"]["total"]["display"], "1.5 hours");
        assert_eq!(body["response_time"]["weekend"]["display"], "30 minutes");
        assert_eq!(body["response_time"]["weekend"]["sales_percent_increase"], 5.0);
        assert_eq!(
            *app.marketplace.lookups.lock().unwrap(),
            vec![("42".to_string(), "access-42".to_string())]
        );
    }

    #[tokio::test]
    async fn failed_response_time_lookup_still_lists() {
        let app = TestApp::new(StubOAuth::rejecting());
        app.credentials.store_token_pair("42", "refresh", "access-42").await.unwrap();
        app.state.db.insert_question(&record("42", "MLB1", "2026-10-18T09:00:00.000-03:00")).unwrap();

        let response = app.router().oneshot(get("/questions?seller_id=42")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["questions"].as_array().unwrap().len(), 1);
        assert!(body["response_time"].is_null());
        assert_eq!(app.marketplace.lookups.lock().unwrap().len(), 1);
    }
}
