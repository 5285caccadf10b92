use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provider-reported error, append-only. Rows feed the admin webhook monitor
/// and are never mutated after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookErrorRecord {
    pub id: i64,
    pub code: i64,
    pub title: String,
    pub message: String,
    pub details: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl WebhookErrorRecord {
    pub fn new(code: i64, title: String, message: String, details: Option<String>) -> Self {
        Self {
            id: 0,
            code,
            title,
            message,
            details,
            occurred_at: Utc::now(),
        }
    }
}
