//! Token refresh after the marketplace rejected an access token.
//!
//! `Fresh -> ExpiredSuspected -> Refreshing -> Refreshed | RefreshFailed`.
//! A failed refresh is terminal for the notification that triggered it; the
//! next notification for the account starts over from `Fresh`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use crate::collaborators::{CredentialStore, OAuthProvider};
use crate::error::{PipelineError, RefreshFailure};
use crate::http::mask_token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Fresh,
    ExpiredSuspected,
    Refreshing,
    Refreshed,
    RefreshFailed,
}

/// One async lock per account id, created on first use.
///
/// Refreshes for the same account run one at a time; different accounts do
/// not contend.
#[derive(Default)]
pub struct AccountLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl AccountLocks {
    pub async fn lock(&self, account_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            locks.entry(account_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

pub struct TokenRefresher {
    credentials: Arc<dyn CredentialStore>,
    oauth: Arc<dyn OAuthProvider>,
    locks: AccountLocks,
}

impl TokenRefresher {
    pub fn new(credentials: Arc<dyn CredentialStore>, oauth: Arc<dyn OAuthProvider>) -> Self {
        Self {
            credentials,
            oauth,
            locks: AccountLocks::default(),
        }
    }

    /// Obtain a new access token for `account_id` after `rejected_token` got
    /// a 401. Issues at most one call to the OAuth provider.
    ///
    /// When another caller refreshed the account while this one waited for
    /// the lock, the token it stored is returned without a second refresh.
    pub async fn refresh(&self, account_id: &str, rejected_token: &str) -> Result<String, PipelineError> {
        let mut state = RefreshState::Fresh;
        transition(account_id, &mut state, RefreshState::ExpiredSuspected);

        let _guard = self.locks.lock(account_id).await;

        let current = self
            .credentials
            .get_access_token(account_id)
            .await
            .map_err(|e| failed(account_id, &mut state, RefreshFailure::Store(format!("{e:#}"))))?;
        if let Some(current) = current.filter(|t| !t.is_empty() && t != rejected_token) {
            debug!(account = account_id, "token already refreshed by a concurrent caller");
            transition(account_id, &mut state, RefreshState::Refreshed);
            return Ok(current);
        }

        let refresh_token = match self.credentials.get_refresh_token(account_id).await {
            Ok(Some(token)) => token,
            Ok(None) => return Err(failed(account_id, &mut state, RefreshFailure::NoRefreshToken)),
            Err(e) => return Err(failed(account_id, &mut state, RefreshFailure::Store(format!("{e:#}")))),
        };

        transition(account_id, &mut state, RefreshState::Refreshing);
        let grant = self
            .oauth
            .refresh(&refresh_token)
            .await
            .map_err(|e| failed(account_id, &mut state, RefreshFailure::Provider(e)))?;

        let (access_token, new_refresh_token) = match (grant.access_token, grant.refresh_token) {
            (Some(access), Some(refresh)) if !access.is_empty() && !refresh.is_empty() => (access, refresh),
            _ => return Err(failed(account_id, &mut state, RefreshFailure::MissingTokens)),
        };

        // The provider has already rotated the pair; a store failure here
        // only costs the next notification another refresh attempt.
        if let Err(e) = self
            .credentials
            .store_token_pair(account_id, &new_refresh_token, &access_token)
            .await
        {
            error!(account = account_id, error = %format!("{e:#}"), "failed to store refreshed token pair");
        }

        transition(account_id, &mut state, RefreshState::Refreshed);
        info!(account = account_id, access_token = %mask_token(&access_token), "access token refreshed");
        Ok(access_token)
    }
}

fn transition(account_id: &str, state: &mut RefreshState, next: RefreshState) {
    debug!(account = account_id, from = ?state, to = ?next, "token refresh state");
    *state = next;
}

fn failed(account_id: &str, state: &mut RefreshState, reason: RefreshFailure) -> PipelineError {
    transition(account_id, state, RefreshState::RefreshFailed);
    warn!(account = account_id, reason = %reason, "token refresh failed");
    PipelineError::RefreshFailed {
        account: account_id.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use replybot_types::marketplace::TokenGrant;

    use crate::error::OAuthError;

    #[derive(Default)]
    struct MemoryCredentials {
        pairs: Mutex<HashMap<String, Vec<(String, String)>>>,
    }

    impl MemoryCredentials {
        fn with_pair(account: &str, access: &str, refresh: &str) -> Self {
            let store = Self::default();
            store
                .pairs
                .lock()
                .unwrap()
                .insert(account.into(), vec![(access.into(), refresh.into())]);
            store
        }

        fn history(&self, account: &str) -> Vec<(String, String)> {
            self.pairs.lock().unwrap().get(account).cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl CredentialStore for MemoryCredentials {
        async fn get_access_token(&self, account_id: &str) -> anyhow::Result<Option<String>> {
            Ok(self.history(account_id).last().map(|(a, _)| a.clone()))
        }

        async fn get_refresh_token(&self, account_id: &str) -> anyhow::Result<Option<String>> {
            Ok(self.history(account_id).last().map(|(_, r)| r.clone()))
        }

        async fn store_token_pair(&self, account_id: &str, refresh: &str, access: &str) -> anyhow::Result<()> {
            self.pairs
                .lock()
                .unwrap()
                .entry(account_id.into())
                .or_default()
                .push((access.into(), refresh.into()));
            Ok(())
        }
    }

    struct CountingProvider {
        calls: AtomicUsize,
        grant: Option<TokenGrant>,
        delay: Duration,
    }

    impl CountingProvider {
        fn granting(access: &str, refresh: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                grant: Some(TokenGrant {
                    access_token: Some(access.into()),
                    refresh_token: Some(refresh.into()),
                    ..TokenGrant::default()
                }),
                delay: Duration::ZERO,
            }
        }

        fn rejecting() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                grant: None,
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl OAuthProvider for CountingProvider {
        async fn refresh(&self, _refresh_token: &str) -> Result<TokenGrant, OAuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.grant.clone().ok_or(OAuthError::Status {
                status: 400,
                body: "invalid_grant".into(),
            })
        }

        async fn exchange_code(&self, _code: &str) -> Result<TokenGrant, OAuthError> {
            unreachable!("not used by the refresher")
        }
    }

    #[tokio::test]
    async fn refresh_appends_new_pair() {
        let store = Arc::new(MemoryCredentials::with_pair("42", "old-access", "old-refresh"));
        let provider = Arc::new(CountingProvider::granting("new-access", "new-refresh"));
        let refresher = TokenRefresher::new(store.clone(), provider.clone());

        let token = refresher.refresh("42", "old-access").await.unwrap();

        assert_eq!(token, "new-access");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            store.history("42"),
            vec![
                ("old-access".to_string(), "old-refresh".to_string()),
                ("new-access".to_string(), "new-refresh".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn missing_refresh_token_fails_without_calling_provider() {
        let store = Arc::new(MemoryCredentials::default());
        let provider = Arc::new(CountingProvider::granting("a", "r"));
        let refresher = TokenRefresher::new(store, provider.clone());

        let err = refresher.refresh("42", "").await.unwrap_err();

        assert!(matches!(
            err,
            PipelineError::RefreshFailed { reason: RefreshFailure::NoRefreshToken, .. }
        ));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn provider_rejection_is_terminal() {
        let store = Arc::new(MemoryCredentials::with_pair("42", "old", "refresh"));
        let provider = Arc::new(CountingProvider::rejecting());
        let refresher = TokenRefresher::new(store.clone(), provider.clone());

        let err = refresher.refresh("42", "old").await.unwrap_err();

        assert!(matches!(
            err,
            PipelineError::RefreshFailed { reason: RefreshFailure::Provider(_), .. }
        ));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.history("42").len(), 1);
    }

    #[tokio::test]
    async fn grant_without_tokens_fails() {
        let store = Arc::new(MemoryCredentials::with_pair("42", "old", "refresh"));
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            grant: Some(TokenGrant {
                access_token: Some("only-access".into()),
                ..TokenGrant::default()
            }),
            delay: Duration::ZERO,
        });
        let refresher = TokenRefresher::new(store.clone(), provider);

        let err = refresher.refresh("42", "old").await.unwrap_err();

        assert!(matches!(
            err,
            PipelineError::RefreshFailed { reason: RefreshFailure::MissingTokens, .. }
        ));
        assert_eq!(store.history("42").len(), 1);
    }

    #[tokio::test]
    async fn concurrent_refreshes_of_one_account_hit_provider_once() {
        let store = Arc::new(MemoryCredentials::with_pair("42", "old", "refresh"));
        let provider = Arc::new(CountingProvider {
            delay: Duration::from_millis(50),
            ..CountingProvider::granting("new", "new-refresh")
        });
        let refresher = Arc::new(TokenRefresher::new(store.clone(), provider.clone()));

        let a = tokio::spawn({
            let refresher = refresher.clone();
            async move { refresher.refresh("42", "old").await }
        });
        let b = tokio::spawn({
            let refresher = refresher.clone();
            async move { refresher.refresh("42", "old").await }
        });

        assert_eq!(a.await.unwrap().unwrap(), "new");
        assert_eq!(b.await.unwrap().unwrap(), "new");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.history("42").len(), 2);
    }

    #[tokio::test]
    async fn different_accounts_do_not_share_a_lock() {
        let locks = AccountLocks::default();
        let _first = locks.lock("1").await;
        let second = tokio::time::timeout(Duration::from_millis(100), locks.lock("2")).await;
        assert!(second.is_ok());
    }
}
