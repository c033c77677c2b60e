/// Database row types: these map directly to SQLite rows.
/// Distinct from replybot-types models to keep the DB layer independent.

pub struct TokenPairRow {
    pub id: i64,
    pub account_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub created_at: String,
}

pub struct QuestionRow {
    pub id: i64,
    pub seller_id: String,
    pub question_text: String,
    pub question_date: String,
    pub item_id: String,
    pub answer_text: String,
    pub answer_date: String,
    pub customer_id: String,
    pub created_at: String,
}
