use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use tracing::{error, info, warn};

use replybot_types::api::{AuthCallbackQuery, AuthCallbackResponse};

use crate::AppState;

/// OAuth redirect target: trade the authorization code for the first token
/// pair of an account.
///
/// The account is taken from `state`; when the authorization was started
/// without one, the `user_id` returned with the grant is used instead.
pub async fn callback(
    State(state): State<AppState>,
    Query(query): Query<AuthCallbackQuery>,
) -> Result<Json<AuthCallbackResponse>, StatusCode> {
    let code = query
        .code
        .filter(|c| !c.trim().is_empty())
        .ok_or(StatusCode::BAD_REQUEST)?;

    let grant = state.oauth.exchange_code(&code).await.map_err(|e| {
        warn!(error = %e, "authorization code exchange failed");
        StatusCode::BAD_GATEWAY
    })?;

    let account_id = query
        .state
        .filter(|s| !s.trim().is_empty())
        .or(grant.user_id)
        .ok_or(StatusCode::BAD_REQUEST)?;

    let (Some(access), Some(refresh)) = (grant.access_token, grant.refresh_token) else {
        warn!(account = %account_id, "token grant without access_token or refresh_token");
        return Err(StatusCode::BAD_GATEWAY);
    };

    state
        .credentials
        .store_token_pair(&account_id, &refresh, &access)
        .await
        .map_err(|e| {
            error!(account = %account_id, error = %format!("{e:#}"), "failed to store token pair");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    info!(account = %account_id, "account authorized");
    Ok(Json(AuthCallbackResponse {
        status: "success".into(),
        account_id,
    }))
}
