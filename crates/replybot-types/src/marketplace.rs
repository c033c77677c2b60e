use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Item attribute ids forwarded to answer drafting. Everything else in the
/// item listing is noise for the model.
pub const ATTRIBUTE_ALLOW_LIST: &[&str] = &[
    "MATERIAL",
    "UNITS_PER_PACK",
    "BASE_MATERIAL",
    "BRAND",
    "DIAMETER",
    "FINISH",
    "HEIGHT",
    "IS_EXTENSIBLE",
    "IS_KIT",
    "IS_SUITABLE_FOR_EXTERIOR",
    "LENGTH",
    "REQUIRES_ASSEMBLY",
    "STYLE",
    "TOP_MATERIAL",
    "WEIGHT",
    "WIDTH",
];

// -- Questions --

/// Creation-date window for the received-questions search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl QuestionWindow {
    /// Window ending now and reaching `span` into the past.
    pub fn trailing(span: Duration) -> Self {
        let to = Utc::now();
        Self { from: to - span, to }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asker {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub item_id: String,
    pub text: String,
    pub from: Asker,
    #[serde(default)]
    pub date_created: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionSearch {
    #[serde(default)]
    pub questions: Vec<Question>,
}

// -- Answers --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerEcho {
    pub text: String,
    pub date_created: String,
}

/// Question as echoed back by the marketplace after an answer was posted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerReceipt {
    #[serde(deserialize_with = "string_or_number")]
    pub seller_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub item_id: String,
    pub text: String,
    pub date_created: String,
    pub answer: AnswerEcho,
    pub from: Asker,
}

// -- Items --

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemAttribute {
    pub name: String,
    pub value: String,
}

/// The subset of an item listing that is useful for answering questions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemDetails {
    pub title: Option<String>,
    pub category_id: Option<String>,
    pub available_quantity: Option<i64>,
    pub warranty_time: Option<String>,
    pub condition: Option<String>,
    pub pictures: Vec<String>,
    pub attributes: Vec<ItemAttribute>,
}

impl ItemDetails {
    /// Extract the allow-listed fields from a raw `/items/{id}` body.
    pub fn from_listing(item: &Value) -> Self {
        let str_field = |key: &str| item.get(key).and_then(Value::as_str).map(str::to_string);

        let warranty_time = item
            .get("sale_terms")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .find(|term| term.get("id").and_then(Value::as_str) == Some("WARRANTY_TIME"))
            .and_then(|term| term.get("value_name").and_then(Value::as_str))
            .map(str::to_string);

        let pictures = item
            .get("pictures")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|p| p.get("url").and_then(Value::as_str))
            .map(str::to_string)
            .collect();

        let attributes = item
            .get("attributes")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter(|attr| {
                attr.get("id")
                    .and_then(Value::as_str)
                    .is_some_and(|id| ATTRIBUTE_ALLOW_LIST.contains(&id))
            })
            .map(|attr| ItemAttribute {
                name: attr.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
                value: attr
                    .get("value_name")
                    .and_then(Value::as_str)
                    .unwrap_or("No value")
                    .to_string(),
            })
            .collect();

        Self {
            title: str_field("title"),
            category_id: str_field("category_id"),
            available_quantity: item.get("available_quantity").and_then(Value::as_i64),
            warranty_time,
            condition: str_field("condition"),
            pictures,
            attributes,
        }
    }
}

/// Best-effort context gathered around a question. Each field falls back to
/// its empty value when the corresponding lookup fails.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Enrichment {
    pub customer: Value,
    pub item_description: String,
    pub item_details: ItemDetails,
}

// -- Seller metrics --

/// One bucket of `/users/{id}/questions/response_time`, in minutes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseTimeBucket {
    #[serde(default)]
    pub response_time: Option<f64>,
    #[serde(default)]
    pub sales_percent_increase: Option<f64>,
}

/// Average time the seller takes to answer buyer questions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseTime {
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub total: ResponseTimeBucket,
    #[serde(default)]
    pub weekend: ResponseTimeBucket,
    #[serde(default)]
    pub weekdays_working_hours: ResponseTimeBucket,
    #[serde(default)]
    pub weekdays_extra_hours: ResponseTimeBucket,
}

// -- OAuth --

/// Body of a successful `/oauth/token` response. Both tokens are optional
/// here because a 200 without them is still a failed grant.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TokenGrant {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub user_id: Option<String>,
    pub expires_in: Option<u64>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}
