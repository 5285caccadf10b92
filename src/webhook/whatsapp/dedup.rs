//! Event deduplication for at-least-once webhook deliveries.
//!
//! Each change is claimed under an idempotency key before processing. The
//! claim is a single atomic set-if-absent-or-expired statement against a
//! crash-durable store, so duplicate suppression survives restarts and is
//! safe under concurrent handler instances.
//!
//! When the store is unavailable the claim fails open: the CRM prefers
//! processing a duplicate (downstream persistence is idempotent on the
//! provider message id) over silently dropping legitimate traffic.

use crate::{consts, repo};
use chrono::Utc;

use super::schemas;

/// Idempotency key for one change of one entry.
///
/// Provider message ids are preferred because they are globally unique and
/// stable across redeliveries; batches without one fall back to the
/// entry/field/time triple.
pub fn event_key(entry: &schemas::Entry, change: &schemas::Change) -> String {
    for list in ["messages", "message_echoes", "statuses"] {
        let first_id = change
            .value
            .get(list)
            .and_then(|items| items.get(0))
            .and_then(|item| item.get("id"))
            .and_then(|id| id.as_str());

        if let Some(id) = first_id {
            return format!("{field}:{id}", field = change.field);
        }
    }

    format!(
        "{entry_id}:{field}:{time}",
        entry_id = entry.id,
        field = change.field,
        time = entry.time.unwrap_or_default()
    )
}

/// Attempts to claim `event_key` for processing. Returns false when an
/// unexpired marker exists (duplicate delivery), true when the caller owns
/// processing or the dedup store is unavailable.
pub async fn claim_event(repo: &repo::ImplAppRepo, event_key: &str) -> bool {
    let now = Utc::now();
    let expires_at = now + chrono::TimeDelta::seconds(consts::WEBHOOK_DEDUP_TTL_SECONDS);

    match repo.claim_webhook_event(event_key, now, expires_at).await {
        Ok(claimed) => claimed,
        Err(e) => {
            logfire::warn!(
                "Dedup store unavailable, processing event {event_key} without duplicate check: {error}",
                event_key = event_key.to_string(),
                error = e.to_string()
            );
            true
        }
    }
}
