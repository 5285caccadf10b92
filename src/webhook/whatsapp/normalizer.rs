//! # Message Normalizer
//!
//! Converts provider-specific message shapes (text, media, location,
//! interactive replies) into canonical [`Message`](crate::models::message)
//! rows, resolves or auto-creates the owning lead, and records best-effort
//! activity/notification entries.
//!
//! Inserts are idempotent on the provider message id, so redelivered
//! messages become no-ops rather than duplicate rows.

use chrono::Utc;
use ntex::time::{Millis, timeout};

use crate::models::message::{ContentType, Message};
use crate::{api, consts, metric, models, repo, utils};

use super::schemas;

/// Determines the canonical content type and content structure of a provider
/// message by inspecting which payload variant is present.
///
/// Unrecognized shapes map to [`ContentType::Unknown`] with the raw provider
/// object embedded, so no data is ever dropped.
pub fn normalize_content(message: &schemas::Message) -> (ContentType, serde_json::Value) {
    if let Some(text) = &message.text {
        return (ContentType::Text, serde_json::json!({"text": text.body}));
    }

    for (content_type, media) in [
        (ContentType::Image, &message.image),
        (ContentType::Video, &message.video),
        (ContentType::Document, &message.document),
        (ContentType::Audio, &message.audio),
    ] {
        if let Some(media) = media {
            return (content_type, media_content(media));
        }
    }

    if let Some(location) = &message.location {
        return (
            ContentType::Location,
            serde_json::json!({
                "latitude": location.latitude,
                "longitude": location.longitude,
                "name": location.name,
                "address": location.address,
            }),
        );
    }

    if let Some(interactive) = &message.interactive {
        return (
            ContentType::Interactive,
            serde_json::json!({
                "type": interactive.interactive_type,
                "reply": interactive.reply(),
            }),
        );
    }

    (
        ContentType::Unknown,
        serde_json::to_value(message).unwrap_or(serde_json::Value::Null),
    )
}

fn media_content(media: &schemas::MediaMessage) -> serde_json::Value {
    serde_json::json!({
        "media_id": media.id,
        "mime_type": media.mime_type,
        "sha256": media.sha256,
        "caption": media.caption,
        "filename": media.filename,
    })
}

/// Stores one inbound message: normalize, resolve the lead by phone,
/// auto-create the lead when the sender is unknown, then backfill the
/// message's lead reference.
pub async fn store_inbound_message(
    message: &schemas::Message,
    contacts: Option<&[schemas::Contact]>,
    repo: &repo::ImplAppRepo,
) -> anyhow::Result<()> {
    let (content_type, content) = normalize_content(message);
    let received_at = schemas::epoch_to_datetime(&message.timestamp).unwrap_or_else(Utc::now);

    let existing_lead = api::lead::find_lead_by_phone(repo, &message.from).await?;

    let record = Message::new_inbound(
        &message.id,
        existing_lead.as_ref().map(|lead| lead.id),
        content_type,
        content,
        received_at,
    );

    let Some(message_row_id) = repo.insert_message(&record).await? else {
        logfire::info!(
            "Skipping already stored message {message_id}",
            message_id = message.id.to_string()
        );
        return Ok(());
    };

    metric::incr_message_statds(&content_type.to_string());

    let lead = match existing_lead {
        Some(lead) => lead,
        None => {
            let profile_name = contacts
                .and_then(|contacts| contacts.iter().find(|c| c.wa_id == message.from))
                .map(|contact| contact.profile.name.as_str());

            let lead = api::lead::create_lead_from_inbound(repo, &message.from, profile_name).await?;
            repo.set_message_lead(message_row_id, lead.id).await?;
            lead
        }
    };

    record_lead_audit_trail(&lead, message, content_type, repo).await;

    Ok(())
}

/// Stores an outbound message observed through a `message_echoes` event.
///
/// The lead is resolved by the recipient number but never auto-created:
/// business-initiated messages may target numbers that are not leads.
pub async fn store_outbound_echo(
    message: &schemas::Message,
    repo: &repo::ImplAppRepo,
) -> anyhow::Result<()> {
    let (content_type, content) = normalize_content(message);
    let sent_at = schemas::epoch_to_datetime(&message.timestamp).unwrap_or_else(Utc::now);

    let lead = match &message.to {
        Some(recipient) => api::lead::find_lead_by_phone(repo, recipient).await?,
        None => None,
    };

    let record = Message::new_outbound_echo(
        &message.id,
        lead.map(|lead| lead.id),
        content_type,
        content,
        sent_at,
    );

    if repo.insert_message(&record).await?.is_none() {
        logfire::info!(
            "Skipping already stored echoed message {message_id}",
            message_id = message.id.to_string()
        );
        return Ok(());
    }

    metric::incr_message_statds(&content_type.to_string());
    Ok(())
}

/// Best-effort activity + notification entries for an inbound message.
///
/// These writes are time-boxed and their failures are swallowed after
/// logging: the webhook ack must never wait on, or fail because of,
/// auxiliary audit rows.
async fn record_lead_audit_trail(
    lead: &models::lead::Lead,
    message: &schemas::Message,
    content_type: ContentType,
    repo: &repo::ImplAppRepo,
) {
    let detail = match &message.text {
        Some(text) => utils::snippet(&text.body, consts::ACTIVITY_SNIPPET_MAX_CHARS),
        None => format!("{content_type} message received"),
    };

    let audit_writes = async {
        repo.insert_activity(lead.id, "whatsapp_message", &detail)
            .await?;
        repo.insert_notification(Some(lead.id), "New WhatsApp message", &detail)
            .await
    };

    match timeout(Millis(consts::BEST_EFFORT_TIMEOUT_MILLIS as u32), audit_writes).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            logfire::warn!(
                "Failed to record audit trail for lead {lead_id}: {error}",
                lead_id = lead.id.to_string(),
                error = e.to_string()
            );
        }
        Err(_) => {
            logfire::warn!(
                "Audit trail write timed out for lead {lead_id}",
                lead_id = lead.id.to_string()
            );
        }
    }
}
