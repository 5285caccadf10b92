use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::consts;

/// CRM lead owned by the surrounding application; the webhook pipeline only
/// reads and auto-creates leads through the repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: i64,
    /// Stored as received from upstream; formats vary ("+52155..", "52155..")
    pub contact_phone: String,
    pub name: String,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    pub fn create_default_from_phone(contact_phone: &str, name: String) -> Self {
        Self {
            id: 0,
            contact_phone: contact_phone.to_string(),
            name,
            source: consts::LEAD_SOURCE_WHATSAPP.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}
