use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw webhook body as delivered by the marketplace.
///
/// Kept verbatim: the only field the pipeline requires is `user_id`, every
/// other key (`resource`, `topic`, `attempts`, ...) is informational.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationPayload(Value);

impl NotificationPayload {
    pub fn new(body: Value) -> Self {
        Self(body)
    }

    /// The account the notification belongs to.
    ///
    /// The marketplace sends `user_id` as an integer; string ids are
    /// accepted too. Empty strings, fractional numbers, nulls and other
    /// shapes count as missing.
    pub fn account_id(&self) -> Option<String> {
        match self.0.get("user_id")? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => n
                .as_u64()
                .map(|id| id.to_string())
                .or_else(|| n.as_i64().map(|id| id.to_string())),
            _ => None,
        }
    }

    pub fn topic(&self) -> Option<&str> {
        self.0.get("topic").and_then(Value::as_str)
    }

    pub fn resource(&self) -> Option<&str> {
        self.0.get("resource").and_then(Value::as_str)
    }

    pub fn as_json(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for NotificationPayload {
    fn from(body: Value) -> Self {
        Self(body)
    }
}
