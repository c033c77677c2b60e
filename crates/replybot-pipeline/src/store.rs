use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tracing::{debug, info};

use replybot_db::Database;
use replybot_types::models::QuestionRecord;

use crate::collaborators::{CredentialStore, ReportingStore};

/// SQLite-backed credential and reporting store.
///
/// Every call hops onto the blocking pool; rusqlite must not run on the
/// async runtime threads.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Database>,
    /// Keep at most this many token pairs per account. `None` keeps all.
    token_history_limit: Option<usize>,
}

impl SqliteStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            token_history_limit: None,
        }
    }

    pub fn with_token_history_limit(mut self, limit: Option<usize>) -> Self {
        self.token_history_limit = limit;
        self
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    async fn blocking<F, T>(&self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .context("spawn_blocking join error")?
    }
}

#[async_trait]
impl CredentialStore for SqliteStore {
    async fn get_access_token(&self, account_id: &str) -> anyhow::Result<Option<String>> {
        let account = account_id.to_string();
        let pair = self.blocking(move |db| db.latest_token_pair(&account)).await?;
        if pair.is_none() {
            debug!(account = account_id, "no access token stored");
        }
        Ok(pair.map(|p| p.access_token))
    }

    async fn get_refresh_token(&self, account_id: &str) -> anyhow::Result<Option<String>> {
        let account = account_id.to_string();
        let pair = self.blocking(move |db| db.latest_token_pair(&account)).await?;
        Ok(pair.map(|p| p.refresh_token).filter(|t| !t.is_empty()))
    }

    async fn store_token_pair(
        &self,
        account_id: &str,
        refresh_token: &str,
        access_token: &str,
    ) -> anyhow::Result<()> {
        let account = account_id.to_string();
        let refresh = refresh_token.to_string();
        let access = access_token.to_string();
        let limit = self.token_history_limit;

        let pruned = self
            .blocking(move |db| {
                db.insert_token_pair(&account, &refresh, &access)?;
                match limit {
                    Some(keep) => db.prune_token_history(&account, keep),
                    None => Ok(0),
                }
            })
            .await?;

        info!(account = account_id, pruned, "token pair stored");
        Ok(())
    }
}

#[async_trait]
impl ReportingStore for SqliteStore {
    async fn persist(&self, record: &QuestionRecord) -> anyhow::Result<()> {
        let row = record.clone();
        let id = self.blocking(move |db| db.insert_question(&row)).await?;
        debug!(id, seller = %record.seller_id, item = %record.item_id, "question record stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        SqliteStore::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    #[tokio::test]
    async fn reads_back_latest_pair() {
        let store = store();
        assert_eq!(store.get_access_token("42").await.unwrap(), None);
        assert_eq!(store.get_refresh_token("42").await.unwrap(), None);

        store.store_token_pair("42", "r1", "a1").await.unwrap();
        store.store_token_pair("42", "r2", "a2").await.unwrap();

        assert_eq!(store.get_access_token("42").await.unwrap().as_deref(), Some("a2"));
        assert_eq!(store.get_refresh_token("42").await.unwrap().as_deref(), Some("r2"));
        assert_eq!(store.database().token_history_len("42").unwrap(), 2);
    }

    #[tokio::test]
    async fn history_limit_prunes_on_append() {
        let store = store().with_token_history_limit(Some(2));
        for i in 0..4 {
            store.store_token_pair("42", &format!("r{i}"), &format!("a{i}")).await.unwrap();
        }
        assert_eq!(store.database().token_history_len("42").unwrap(), 2);
        assert_eq!(store.get_access_token("42").await.unwrap().as_deref(), Some("a3"));
    }

    #[tokio::test]
    async fn persists_question_records() {
        let store = store();
        let record = QuestionRecord {
            seller_id: "1".into(),
            question_text: "q".into(),
            question_date: "2026-10-18T09:00:00".into(),
            item_id: "MLB9".into(),
            answer_text: "a".into(),
            answer_date: "2026-10-18T09:05:00".into(),
            customer_id: "5".into(),
        };
        store.persist(&record).await.unwrap();

        let rows = store.database().list_questions(Some("1"), 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].item_id, "MLB9");
    }
}
