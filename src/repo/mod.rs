pub mod sqlite;
pub mod sqlite_queries;

use crate::models;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Narrow persistence gateway for the webhook pipeline. Every method is an
/// independent unit of work; callers deliberately avoid wrapping
/// normalization, lead creation and audit logging into one transaction so a
/// partial failure never takes down the whole request.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait AppRepo {
    /// Inserts a message row. Returns `None` when a row with the same
    /// `external_message_id` already exists (idempotent no-op).
    async fn insert_message(
        &self,
        message: &models::message::Message,
    ) -> anyhow::Result<Option<i64>>;

    /// Backfills the owning lead of a just-inserted message
    async fn set_message_lead(&self, message_id: i64, lead_id: i64) -> anyhow::Result<()>;

    async fn get_message_by_external_id(
        &self,
        external_message_id: &str,
    ) -> anyhow::Result<Option<models::message::Message>>;

    /// Applies a monotonic status transition. The underlying UPDATE carries
    /// the ordering guard in its WHERE clause so concurrent handlers cannot
    /// move a message backward; returns false when the guard rejected it.
    async fn update_message_status(
        &self,
        external_message_id: &str,
        new_status: models::message::MessageStatus,
        at: DateTime<Utc>,
    ) -> anyhow::Result<bool>;

    /// Merges pricing/conversation details into the message metadata JSON
    /// without touching unrelated keys
    async fn merge_message_metadata(
        &self,
        external_message_id: &str,
        patch: &serde_json::Value,
    ) -> anyhow::Result<()>;

    /// Finds a lead whose stored phone equals any of the candidate forms
    async fn find_lead_by_phone(
        &self,
        candidates: &[String],
    ) -> anyhow::Result<Option<models::lead::Lead>>;

    async fn create_lead(&self, lead: &models::lead::Lead) -> anyhow::Result<i64>;

    /// Atomically claims a webhook event key. Returns true when this caller
    /// now owns processing (fresh key or expired marker), false when an
    /// unexpired marker already exists.
    async fn claim_webhook_event(
        &self,
        event_key: &str,
        processed_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> anyhow::Result<bool>;

    async fn purge_expired_webhook_events(&self, now: DateTime<Utc>) -> anyhow::Result<u64>;

    async fn insert_webhook_log(
        &self,
        event_field: &str,
        payload: &serde_json::Value,
    ) -> anyhow::Result<()>;

    async fn insert_webhook_error(
        &self,
        record: &models::audit::WebhookErrorRecord,
    ) -> anyhow::Result<()>;

    async fn insert_activity(
        &self,
        lead_id: i64,
        activity_type: &str,
        detail: &str,
    ) -> anyhow::Result<()>;

    async fn insert_notification(
        &self,
        lead_id: Option<i64>,
        title: &str,
        body: &str,
    ) -> anyhow::Result<()>;
}

pub type ImplAppRepo = Box<dyn AppRepo>;
