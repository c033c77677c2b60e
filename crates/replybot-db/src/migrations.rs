use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (token log + question report)");
        conn.execute_batch(
            "
            -- Append-only: every grant or refresh inserts a row, the newest
            -- row per account is the authoritative pair.
            CREATE TABLE token_pairs (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id      TEXT NOT NULL,
                access_token    TEXT NOT NULL,
                refresh_token   TEXT NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_token_pairs_account
                ON token_pairs(account_id, id);

            CREATE TABLE questions (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                seller_id       TEXT NOT NULL,
                question_text   TEXT NOT NULL,
                question_date   TEXT NOT NULL,
                item_id         TEXT NOT NULL,
                answer_text     TEXT NOT NULL,
                answer_date     TEXT NOT NULL,
                customer_id     TEXT NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_questions_seller
                ON questions(seller_id, answer_date);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }
}
