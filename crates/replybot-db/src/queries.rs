use crate::Database;
use crate::models::{QuestionRow, TokenPairRow};
use anyhow::Result;
use replybot_types::models::QuestionRecord;
use rusqlite::{Connection, OptionalExtension};

impl Database {
    // -- Token log --

    /// Append a token pair for `account_id`. Returns the new row id.
    pub fn insert_token_pair(
        &self,
        account_id: &str,
        refresh_token: &str,
        access_token: &str,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO token_pairs (account_id, access_token, refresh_token) VALUES (?1, ?2, ?3)",
                (account_id, access_token, refresh_token),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// The authoritative (most recently appended) pair for an account.
    pub fn latest_token_pair(&self, account_id: &str) -> Result<Option<TokenPairRow>> {
        self.with_conn(|conn| query_latest_token_pair(conn, account_id))
    }

    pub fn token_history_len(&self, account_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM token_pairs WHERE account_id = ?1",
                [account_id],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
    }

    /// Drop all but the newest `keep` pairs of an account. Returns the number
    /// of rows deleted. `keep` is clamped to at least one so the current pair
    /// always survives.
    pub fn prune_token_history(&self, account_id: &str, keep: usize) -> Result<usize> {
        let keep = keep.max(1) as i64;
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let deleted = tx.execute(
                "DELETE FROM token_pairs
                 WHERE account_id = ?1
                   AND id NOT IN (
                       SELECT id FROM token_pairs
                       WHERE account_id = ?1
                       ORDER BY id DESC
                       LIMIT ?2
                   )",
                rusqlite::params![account_id, keep],
            )?;
            tx.commit()?;
            Ok(deleted)
        })
    }

    // -- Question report --

    pub fn insert_question(&self, record: &QuestionRecord) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO questions
                    (seller_id, question_text, question_date, item_id, answer_text, answer_date, customer_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    record.seller_id,
                    record.question_text,
                    record.question_date,
                    record.item_id,
                    record.answer_text,
                    record.answer_date,
                    record.customer_id,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Answered questions, most recently recorded first, optionally for one
    /// seller.
    pub fn list_questions(&self, seller_id: Option<&str>, limit: u32) -> Result<Vec<QuestionRow>> {
        self.with_conn(|conn| query_questions(conn, seller_id, limit))
    }
}

fn query_latest_token_pair(conn: &Connection, account_id: &str) -> Result<Option<TokenPairRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, account_id, access_token, refresh_token, created_at
         FROM token_pairs
         WHERE account_id = ?1
         ORDER BY id DESC
         LIMIT 1",
    )?;

    let row = stmt
        .query_row([account_id], |row| {
            Ok(TokenPairRow {
                id: row.get(0)?,
                account_id: row.get(1)?,
                access_token: row.get(2)?,
                refresh_token: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_questions(conn: &Connection, seller_id: Option<&str>, limit: u32) -> Result<Vec<QuestionRow>> {
    // NULL seller filter matches every row. Answer dates carry the
    // marketplace's local offset and do not sort as text; row ids follow
    // the order answers were posted in.
    let mut stmt = conn.prepare(
        "SELECT id, seller_id, question_text, question_date, item_id, answer_text, answer_date,
                customer_id, created_at
         FROM questions
         WHERE ?1 IS NULL OR seller_id = ?1
         ORDER BY id DESC
         LIMIT ?2",
    )?;

    let rows = stmt
        .query_map(rusqlite::params![seller_id, limit], |row| {
            Ok(QuestionRow {
                id: row.get(0)?,
                seller_id: row.get(1)?,
                question_text: row.get(2)?,
                question_date: row.get(3)?,
                item_id: row.get(4)?,
                answer_text: row.get(5)?,
                answer_date: row.get(6)?,
                customer_id: row.get(7)?,
                created_at: row.get(8)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}
