use serde::{Deserialize, Serialize};

use crate::marketplace::AnswerReceipt;

/// One answered question, as kept for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub seller_id: String,
    pub question_text: String,
    pub question_date: String,
    pub item_id: String,
    pub answer_text: String,
    pub answer_date: String,
    pub customer_id: String,
}

impl QuestionRecord {
    pub fn from_receipt(receipt: &AnswerReceipt) -> Self {
        Self {
            seller_id: receipt.seller_id.clone(),
            question_text: receipt.text.clone(),
            question_date: receipt.date_created.clone(),
            item_id: receipt.item_id.clone(),
            answer_text: receipt.answer.text.clone(),
            answer_date: receipt.answer.date_created.clone(),
            customer_id: receipt.from.id.clone(),
        }
    }
}

// -- Classification --

/// A question intent and the keywords that hint at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Intent {
    pub label: &'static str,
    pub keywords: &'static [&'static str],
}

/// Label used when the model cannot place a question in any intent.
pub const UNIDENTIFIED: &str = "Unidentified";

pub const INTENTS: &[Intent] = &[
    Intent { label: "Shipping", keywords: &["shipping", "freight", "send"] },
    Intent {
        label: "Delivery",
        keywords: &["delivery time", "when does it arrive", "delivery status", "track order", "not arrived"],
    },
    Intent { label: "Price", keywords: &["price", "cost", "how much", "value"] },
    Intent {
        label: "Product details",
        keywords: &["color", "size", "depth", "cm", "mm", "measurements", "diameter", "assembly", "comes assembled"],
    },
    Intent { label: "Stock", keywords: &["available", "stock", "availability", "quantity"] },
    Intent { label: "Payment", keywords: &["payment", "pay", "installments"] },
    Intent { label: "Warranty", keywords: &["warranty", "guarantee"] },
    Intent { label: "Returns", keywords: &["return", "refund", "send back"] },
    Intent {
        label: "Support",
        keywords: &["support", "help", "talk to the seller", "messages", "complaint"],
    },
    Intent {
        label: "Purchase problems",
        keywords: &["wrong", "broken", "defective", "missing parts", "not delivered", "delay"],
    },
    Intent {
        label: "Product variations",
        keywords: &["do you make", "other sizes", "custom", "another listing"],
    },
];

/// Intent label assigned to a question. Free text: the model may answer
/// outside the vocabulary, in which case the raw label is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Classification(String);

impl Classification {
    /// Map a raw model answer onto the vocabulary, case-insensitively and
    /// ignoring surrounding quotes and punctuation.
    pub fn from_model_output(raw: &str, vocabulary: &[Intent]) -> Self {
        let cleaned = raw.trim().trim_matches(|c: char| c == '"' || c == '\'' || c == '.').trim();
        if cleaned.is_empty() {
            return Self(UNIDENTIFIED.to_string());
        }
        let label = vocabulary
            .iter()
            .find(|intent| intent.label.eq_ignore_ascii_case(cleaned))
            .map(|intent| intent.label.to_string())
            .unwrap_or_else(|| cleaned.to_string());
        Self(label)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
