use async_trait::async_trait;
use reqwest::header::ACCEPT;
use tracing::{error, info};

use replybot_types::marketplace::TokenGrant;

use crate::collaborators::OAuthProvider;
use crate::error::OAuthError;
use crate::http::{HttpPolicy, mask_token};

/// Client for the marketplace's `/oauth/token` endpoint.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl OAuthClient {
    pub fn new(
        base_url: &str,
        client_id: String,
        client_secret: String,
        redirect_uri: String,
        policy: HttpPolicy,
    ) -> Result<Self, OAuthError> {
        Ok(Self {
            client: policy.client()?,
            token_url: format!("{}/oauth/token", base_url.trim_end_matches('/')),
            client_id,
            client_secret,
            redirect_uri,
        })
    }

    async fn request_grant(&self, form: &[(&str, &str)]) -> Result<TokenGrant, OAuthError> {
        let response = self
            .client
            .post(&self.token_url)
            .header(ACCEPT, "application/json")
            .form(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            error!(status = status.as_u16(), body = %body, "token endpoint rejected the request");
            return Err(OAuthError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| OAuthError::Decode(e.to_string()))
    }
}

#[async_trait]
impl OAuthProvider for OAuthClient {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, OAuthError> {
        info!(refresh_token = %mask_token(refresh_token), "refreshing access token");
        self.request_grant(&[
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, OAuthError> {
        info!("exchanging authorization code");
        self.request_grant(&[
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ])
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> OAuthClient {
        OAuthClient::new(
            &server.uri(),
            "app-id".into(),
            "app-secret".into(),
            "https://example.test/auth/callback".into(),
            HttpPolicy::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn refresh_posts_form_encoded_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("client_id=app-id"))
            .and(body_string_contains("refresh_token=TG-old"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "APP_USR-new",
                "refresh_token": "TG-new",
                "user_id": 42,
                "expires_in": 21600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let grant = client(&server).refresh("TG-old").await.unwrap();
        assert_eq!(grant.access_token.as_deref(), Some("APP_USR-new"));
        assert_eq!(grant.refresh_token.as_deref(), Some("TG-new"));
        assert_eq!(grant.user_id.as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn rejected_refresh_is_a_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant" })))
            .mount(&server)
            .await;

        match client(&server).refresh("TG-revoked").await {
            Err(OAuthError::Status { status, body }) => {
                assert_eq!(status, 400);
                assert!(body.contains("invalid_grant"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn code_exchange_sends_redirect_uri() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=TG-code"))
            .and(body_string_contains("redirect_uri="))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "a", "refresh_token": "r"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let grant = client(&server).exchange_code("TG-code").await.unwrap();
        assert_eq!(grant.user_id, None);
    }
}
