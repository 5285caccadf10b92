use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::consts;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
pub enum Direction {
    #[serde(rename = "inbound")]
    #[display("inbound")]
    Inbound,
    #[serde(rename = "outbound")]
    #[display("outbound")]
    Outbound,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, Default)]
pub enum ContentType {
    #[serde(rename = "text")]
    #[display("text")]
    Text,
    #[serde(rename = "image")]
    #[display("image")]
    Image,
    #[serde(rename = "video")]
    #[display("video")]
    Video,
    #[serde(rename = "document")]
    #[display("document")]
    Document,
    #[serde(rename = "audio")]
    #[display("audio")]
    Audio,
    #[serde(rename = "location")]
    #[display("location")]
    Location,
    #[serde(rename = "interactive")]
    #[display("interactive")]
    Interactive,
    #[default]
    #[serde(rename = "unknown")]
    #[display("unknown")]
    Unknown,
}

/// Delivery state of a message.
///
/// Inbound messages stay at `Received`. Outbound messages progress along
/// `sent -> delivered -> read`; `failed` is reachable from `sent` or
/// `delivered` and is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
pub enum MessageStatus {
    #[serde(rename = "received")]
    #[display("received")]
    Received,
    #[serde(rename = "sent")]
    #[display("sent")]
    Sent,
    #[serde(rename = "delivered")]
    #[display("delivered")]
    Delivered,
    #[serde(rename = "read")]
    #[display("read")]
    Read,
    #[serde(rename = "failed")]
    #[display("failed")]
    Failed,
}

impl MessageStatus {
    /// Parses a provider status string from a webhook status notification.
    /// `received` is not a provider value, only an internal inbound state.
    pub fn from_provider(status: &str) -> Option<Self> {
        match status {
            "sent" => Some(Self::Sent),
            "delivered" => Some(Self::Delivered),
            "read" => Some(Self::Read),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Position in the linear order `received < sent < delivered < read`.
    /// `Failed` sits outside the linear order and is handled separately.
    fn rank(self) -> u8 {
        match self {
            Self::Received => 0,
            Self::Sent => 1,
            Self::Delivered => 2,
            Self::Read => 3,
            Self::Failed => 4,
        }
    }

    /// Whether moving from `self` to `next` is a forward transition.
    ///
    /// Backward transitions and same-status replays are rejected; `Failed`
    /// never transitions again once set.
    pub fn accepts_transition_to(self, next: MessageStatus) -> bool {
        match (self, next) {
            (Self::Failed, _) => false,
            (current, Self::Failed) => matches!(current, Self::Sent | Self::Delivered),
            (current, next) => next.rank() > current.rank(),
        }
    }
}

/// Canonical message record, one row per provider message id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    /// Provider message id, globally unique
    pub external_message_id: String,
    /// Weak reference: the lead may not exist yet when the row is inserted
    pub lead_id: Option<i64>,
    pub direction: Direction,
    pub channel: String,
    pub content_type: ContentType,
    /// Normalized structure matching `content_type`; `Unknown` embeds the
    /// raw provider object so no data is dropped
    pub content: serde_json::Value,
    pub status: MessageStatus,
    pub received_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    /// Pricing/conversation details merged in from status notifications
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    pub fn new_inbound(
        external_message_id: &str,
        lead_id: Option<i64>,
        content_type: ContentType,
        content: serde_json::Value,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            external_message_id: external_message_id.to_string(),
            lead_id,
            direction: Direction::Inbound,
            channel: consts::CHANNEL_WHATSAPP.to_string(),
            content_type,
            content,
            status: MessageStatus::Received,
            received_at: Some(received_at),
            sent_at: None,
            delivered_at: None,
            read_at: None,
            failed_at: None,
            metadata: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// An outbound message observed through a `message_echoes` notification
    pub fn new_outbound_echo(
        external_message_id: &str,
        lead_id: Option<i64>,
        content_type: ContentType,
        content: serde_json::Value,
        sent_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            external_message_id: external_message_id.to_string(),
            lead_id,
            direction: Direction::Outbound,
            channel: consts::CHANNEL_WHATSAPP.to_string(),
            content_type,
            content,
            status: MessageStatus::Sent,
            received_at: None,
            sent_at: Some(sent_at),
            delivered_at: None,
            read_at: None,
            failed_at: None,
            metadata: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}
