//! # WhatsApp Webhook Schemas
//!
//! Data structures for WhatsApp Business Cloud API webhook payloads. The
//! `change.value` is kept as raw JSON on [`Change`] because only some event
//! kinds have a message-shaped value; audit logging stores the raw object
//! and typed extraction happens per kind via [`Change::typed_value`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Root webhook payload from WhatsApp
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookPayload {
    /// The object type, typically "whatsapp_business_account"
    pub object: String,
    /// Array of entry objects containing the actual data
    pub entry: Vec<Entry>,
}

/// Entry object containing changes and metadata
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Entry {
    /// Business Account ID
    pub id: String,
    /// Unix timestamp of the notification batch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
    /// Array of changes that occurred
    pub changes: Vec<Change>,
}

/// Change object carrying one event
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Change {
    /// The field that changed (e.g., "messages")
    pub field: String,
    /// Raw event payload; shape depends on `field`
    pub value: serde_json::Value,
}

impl Change {
    /// Parses the raw value into the message-event shape. Only meaningful
    /// for message/echo/status fields.
    pub fn typed_value(&self) -> serde_json::Result<ChangeValue> {
        serde_json::from_value(self.value.clone())
    }
}

/// Typed view of `change.value` for message-bearing events
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChangeValue {
    /// Messaging product (e.g., "whatsapp")
    #[serde(default)]
    pub messaging_product: Option<String>,
    /// Metadata about the business phone number
    #[serde(default)]
    pub metadata: Option<Metadata>,
    /// Array of contacts (senders)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacts: Option<Vec<Contact>>,
    /// Array of messages received
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
    /// Array of messages the business sent, echoed back
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_echoes: Option<Vec<Message>>,
    /// Array of statuses (for sent messages)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statuses: Option<Vec<Status>>,
    /// Errors the provider reports at the value level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ProviderError>>,
}

/// Metadata about the WhatsApp Business phone number
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Metadata {
    /// Display name of the business phone number
    pub display_phone_number: String,
    /// Phone number ID
    pub phone_number_id: String,
}

/// Contact information for the message sender
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Contact {
    /// Profile information
    pub profile: Profile,
    /// WhatsApp ID (phone number)
    pub wa_id: String,
}

/// Profile information
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Display name of the contact
    pub name: String,
}

/// Message object
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Message {
    /// Sender's WhatsApp ID (phone number)
    pub from: String,
    /// Recipient's WhatsApp ID, present on echoed outbound messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Message ID
    pub id: String,
    /// Timestamp of the message (unix epoch seconds, as a string)
    pub timestamp: String,
    /// Message type (text, image, video, document, etc.)
    #[serde(rename = "type")]
    pub msg_type: String,
    /// Text message content (if type is "text")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextMessage>,
    /// Image message content (if type is "image")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<MediaMessage>,
    /// Video message content (if type is "video")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<MediaMessage>,
    /// Document message content (if type is "document")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<MediaMessage>,
    /// Audio message content (if type is "audio")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<MediaMessage>,
    /// Location message content (if type is "location")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationMessage>,
    /// Interactive reply content (if type is "interactive")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interactive: Option<InteractiveMessage>,
    /// Context (if this is a reply to another message)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Context>,
    /// Errors the provider attaches to unsupported messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ProviderError>>,
}

/// Text message content
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TextMessage {
    /// The text body of the message
    pub body: String,
}

/// Media message content (image, video, document, audio)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaMessage {
    /// Media ID
    pub id: String,
    /// MIME type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// SHA256 hash of the media
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    /// Caption (for image, video, document)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// Original filename (for document)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Location message content
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocationMessage {
    /// Latitude
    pub latitude: f64,
    /// Longitude
    pub longitude: f64,
    /// Name of the location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Address of the location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Interactive reply content (list or button reply)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InteractiveMessage {
    /// Reply kind: "list_reply" or "button_reply"
    #[serde(rename = "type")]
    pub interactive_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_reply: Option<InteractiveReply>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button_reply: Option<InteractiveReply>,
}

impl InteractiveMessage {
    /// The reply the user selected, whichever kind it was
    pub fn reply(&self) -> Option<&InteractiveReply> {
        self.list_reply.as_ref().or(self.button_reply.as_ref())
    }
}

/// Selected row or button of an interactive message
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InteractiveReply {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Context for reply messages
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Context {
    /// ID of the message being replied to
    pub from: String,
    /// Message ID being referenced
    pub id: String,
}

/// Status update for sent messages
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Status {
    /// Message ID the status refers to
    pub id: String,
    /// Status (sent, delivered, read, failed)
    pub status: String,
    /// Timestamp (unix epoch seconds, as a string)
    pub timestamp: String,
    /// Recipient ID
    pub recipient_id: String,
    /// Conversation window details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation: Option<Conversation>,
    /// Billing details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing: Option<Pricing>,
    /// Delivery errors (populated when status is "failed")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ProviderError>>,
}

/// Conversation metadata attached to status updates
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Conversation {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<ConversationOrigin>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConversationOrigin {
    #[serde(rename = "type")]
    pub origin_type: String,
}

/// Pricing metadata attached to status updates
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Pricing {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Error object the provider embeds in values, messages and statuses
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderError {
    pub code: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_data: Option<ErrorData>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Parses the provider's epoch-seconds string timestamps
pub fn epoch_to_datetime(timestamp: &str) -> Option<DateTime<Utc>> {
    let seconds = timestamp.parse::<i64>().ok()?;
    DateTime::from_timestamp(seconds, 0)
}
