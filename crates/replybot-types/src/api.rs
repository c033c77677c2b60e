use serde::{Deserialize, Serialize};

use crate::marketplace::{ResponseTime, ResponseTimeBucket};

// -- Notifications --

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

impl StatusResponse {
    pub fn new(status: &str, message: &str) -> Self {
        Self {
            status: status.to_string(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueueSizeResponse {
    pub status: String,
    pub queue_size: usize,
}

/// Body forwarded to the external error-reporting endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub error: String,
}

// -- Auth --

/// Query string of the OAuth redirect. `state` carries the account id the
/// authorization was started for.
#[derive(Debug, Deserialize)]
pub struct AuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthCallbackResponse {
    pub status: String,
    pub account_id: String,
}

// -- Reporting --

#[derive(Debug, Deserialize)]
pub struct QuestionListQuery {
    pub seller_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuestionResponse {
    pub id: i64,
    pub seller_id: String,
    pub question_text: String,
    pub question_date: String,
    pub item_id: String,
    pub answer_text: String,
    pub answer_date: String,
    pub customer_id: String,
    pub recorded_at: String,
}

/// `GET /questions` body. `response_time` is only looked up when the
/// listing is filtered by seller.
#[derive(Debug, Serialize, Deserialize)]
pub struct QuestionListResponse {
    pub questions: Vec<QuestionResponse>,
    pub response_time: Option<ResponseTimeReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseTimeReport {
    pub user_id: Option<String>,
    pub total: ResponseTimeSummary,
    pub weekend: ResponseTimeSummary,
    pub weekdays_working_hours: ResponseTimeSummary,
    pub weekdays_extra_hours: ResponseTimeSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseTimeSummary {
    pub minutes: Option<f64>,
    /// Rounded to two decimals.
    pub hours: Option<f64>,
    /// "95 minutes" below an hour, "1.58 hours" from there on.
    pub display: Option<String>,
    pub sales_percent_increase: Option<f64>,
}

impl From<&ResponseTimeBucket> for ResponseTimeSummary {
    fn from(bucket: &ResponseTimeBucket) -> Self {
        let minutes = bucket.response_time;
        let hours = minutes.map(|m| (m / 60.0 * 100.0).round() / 100.0);
        let display = minutes.zip(hours).map(|(m, h)| {
            if m >= 60.0 {
                format!("{h} hours")
            } else {
                format!("{m} minutes")
            }
        });
        Self {
            minutes,
            hours,
            display,
            sales_percent_increase: bucket.sales_percent_increase,
        }
    }
}

impl From<ResponseTime> for ResponseTimeReport {
    fn from(stats: ResponseTime) -> Self {
        Self {
            total: (&stats.total).into(),
            weekend: (&stats.weekend).into(),
            weekdays_working_hours: (&stats.weekdays_working_hours).into(),
            weekdays_extra_hours: (&stats.weekdays_extra_hours).into(),
            user_id: stats.user_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minutes_convert_to_hours_from_sixty_on() {
        let long = ResponseTimeSummary::from(&ResponseTimeBucket {
            response_time: Some(95.0),
            sales_percent_increase: Some(12.0),
        });
        assert_eq!(long.hours, Some(1.58));
        assert_eq!(long.display.as_deref(), Some("1.58 hours"));
        assert_eq!(long.sales_percent_increase, Some(12.0));

        let short = ResponseTimeSummary::from(&ResponseTimeBucket {
            response_time: Some(45.0),
            sales_percent_increase: None,
        });
        assert_eq!(short.hours, Some(0.75));
        assert_eq!(short.display.as_deref(), Some("45 minutes"));

        let unknown = ResponseTimeSummary::from(&ResponseTimeBucket::default());
        assert_eq!(unknown.hours, None);
        assert_eq!(unknown.display, None);
    }
}
