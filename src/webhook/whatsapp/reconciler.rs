//! # Status Reconciler
//!
//! Applies delivery-status notifications to previously stored outbound
//! messages. The provider does not guarantee in-order delivery, so the
//! reconciler enforces the monotonic order `sent -> delivered -> read`
//! (`failed` terminal from `sent`/`delivered`): late or replayed updates
//! become logged no-ops instead of backward transitions.

use chrono::Utc;

use crate::models::audit::WebhookErrorRecord;
use crate::models::message::MessageStatus;
use crate::{metric, repo};

use super::schemas;

/// Applies one status notification.
///
/// Unknown message ids are dropped after logging: the provider may notify
/// about messages outside our retention window. Everything else either
/// advances the state machine or is rejected as out-of-order.
pub async fn apply_status(
    status: &schemas::Status,
    repo: &repo::ImplAppRepo,
) -> anyhow::Result<()> {
    if let Some(errors) = status.errors.as_deref() {
        record_provider_errors(errors, repo).await?;
    }

    let Some(new_status) = MessageStatus::from_provider(&status.status) else {
        let message_id = status.id.to_string();
        logfire::warn!(
            "Unrecognized delivery status '{status}' for message {message_id}",
            status = status.status.to_string(),
            message_id = message_id
        );
        return Ok(());
    };

    let Some(stored) = repo.get_message_by_external_id(&status.id).await? else {
        let message_id = status.id.to_string();
        logfire::info!(
            "Delivery status '{status}' for unknown message {message_id}, dropping",
            status = status.status.to_string(),
            message_id = message_id
        );
        return Ok(());
    };

    if !stored.status.accepts_transition_to(new_status) {
        logfire::info!(
            "Ignoring out-of-order status transition {current} -> {new} for message {message_id}",
            current = stored.status.to_string(),
            new = new_status.to_string(),
            message_id = status.id.to_string()
        );
        return Ok(());
    }

    let at = schemas::epoch_to_datetime(&status.timestamp).unwrap_or_else(Utc::now);

    // the UPDATE re-checks the transition guard, so a concurrent handler
    // racing us simply turns this into a no-op
    let applied = repo.update_message_status(&status.id, new_status, at).await?;
    if !applied {
        logfire::info!(
            "Status transition to '{new}' for message {message_id} already applied concurrently",
            new = new_status.to_string(),
            message_id = status.id.to_string()
        );
        return Ok(());
    }

    metric::incr_status_statds(&new_status.to_string());
    merge_status_metadata(status, repo).await?;

    Ok(())
}

/// Merges pricing/conversation details into the message metadata. Only the
/// keys present on the notification are patched; unrelated metadata is left
/// untouched (absent keys must not be nulled out by the JSON merge).
async fn merge_status_metadata(
    status: &schemas::Status,
    repo: &repo::ImplAppRepo,
) -> anyhow::Result<()> {
    let mut patch = serde_json::Map::new();

    if let Some(pricing) = &status.pricing {
        patch.insert("pricing".to_string(), serde_json::to_value(pricing)?);
    }
    if let Some(conversation) = &status.conversation {
        patch.insert("conversation".to_string(), serde_json::to_value(conversation)?);
    }

    if patch.is_empty() {
        return Ok(());
    }

    repo.merge_message_metadata(&status.id, &serde_json::Value::Object(patch))
        .await
}

/// Appends provider-reported errors to the webhook error audit table
pub async fn record_provider_errors(
    errors: &[schemas::ProviderError],
    repo: &repo::ImplAppRepo,
) -> anyhow::Result<()> {
    for error in errors {
        let record = WebhookErrorRecord::new(
            error.code,
            error
                .title
                .clone()
                .unwrap_or_else(|| "whatsapp webhook error".to_string()),
            error.message.clone().unwrap_or_default(),
            error
                .error_data
                .as_ref()
                .and_then(|data| data.details.clone()),
        );

        repo.insert_webhook_error(&record).await?;
    }

    Ok(())
}
