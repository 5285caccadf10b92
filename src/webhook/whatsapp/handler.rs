//! # WhatsApp Webhook Handler
//!
//! Orchestrates processing of a verified webhook payload: claims each
//! change's idempotency key, classifies it, and dispatches to the
//! normalizer/reconciler or the audit log.
//!
//! Error scoping is deliberate: failures are caught at the smallest
//! enclosing unit (per message, per status, per change) and logged with
//! enough context to replay, so one malformed item never blocks its
//! siblings and the provider always receives a 200 acknowledgment for a
//! structurally valid request.

use chrono::Utc;

use crate::{consts, metric, repo};

use super::{classifier::EventKind, dedup, normalizer, reconciler, schemas};

/// Main webhook processor. Never fails for per-event problems; the caller
/// acknowledges 200 regardless of partial processing outcomes.
pub async fn process_webhook(
    payload: schemas::WebhookPayload,
    repo: &repo::ImplAppRepo,
) -> anyhow::Result<()> {
    if payload.object != consts::WHATSAPP_BUSINESS_OBJECT {
        logfire::warn!(
            "Unexpected webhook object '{object}', processing anyway",
            object = payload.object.to_string()
        );
    }

    for entry in &payload.entry {
        for change in &entry.changes {
            process_change(entry, change, repo).await;
        }
    }

    // opportunistic cleanup; the TTL already bounds correctness
    match repo.purge_expired_webhook_events(Utc::now()).await {
        Ok(purged) if purged > 0 => {
            tracing::info!("Purged {} expired dedup markers", purged);
        }
        Ok(_) => {}
        Err(e) => {
            logfire::warn!(
                "Failed to purge expired dedup markers: {error}",
                error = e.to_string()
            );
        }
    }

    Ok(())
}

async fn process_change(entry: &schemas::Entry, change: &schemas::Change, repo: &repo::ImplAppRepo) {
    let kind = EventKind::from_field(&change.field);
    metric::incr_webhook_event_statds(&kind.to_string());

    let event_key = dedup::event_key(entry, change);
    if !dedup::claim_event(repo, &event_key).await {
        logfire::info!(
            "Skipping duplicate webhook delivery {event_key}",
            event_key = event_key.to_string()
        );
        return;
    }

    match kind {
        EventKind::Messages | EventKind::MessageEchoes | EventKind::Statuses => {
            handle_message_change(kind, &event_key, change, repo).await;
        }
        EventKind::TemplateStatusUpdate => {
            // template lifecycle is managed by the CRM admin screens; the
            // event is acknowledged and audited, never processed here
            logfire::info!(
                "Template status update {event_key} acknowledged without processing",
                event_key = event_key.to_string()
            );
            audit_change(change, repo).await;
        }
        EventKind::Unknown => {
            logfire::warn!(
                "Unknown webhook field '{field}', recording for audit",
                field = change.field.to_string()
            );
            audit_change(change, repo).await;
        }
        EventKind::AccountAlerts
        | EventKind::AccountReviewUpdate
        | EventKind::AccountUpdate
        | EventKind::BusinessCapabilityUpdate
        | EventKind::PhoneNumberQualityUpdate
        | EventKind::PhoneNumberNameUpdate => {
            logfire::info!(
                "Account-level webhook event {event_key}",
                event_key = event_key.to_string()
            );
            audit_change(change, repo).await;
        }
    }
}

/// Processes the message/echo/status arrays of one change, catching errors
/// per item so siblings in the same batch still get handled.
async fn handle_message_change(
    kind: EventKind,
    event_key: &str,
    change: &schemas::Change,
    repo: &repo::ImplAppRepo,
) {
    let value = match change.typed_value() {
        Ok(value) => value,
        Err(e) => {
            logfire::error!(
                "Malformed '{field}' change value in {event_key}: {error}",
                field = change.field.to_string(),
                event_key = event_key.to_string(),
                error = e.to_string()
            );
            audit_change(change, repo).await;
            return;
        }
    };

    if let Some(errors) = value.errors.as_deref() {
        if let Err(e) = reconciler::record_provider_errors(errors, repo).await {
            logfire::error!(
                "Failed to record provider errors for {event_key}: {error}",
                event_key = event_key.to_string(),
                error = e.to_string()
            );
        }
    }

    let contacts = value.contacts.as_deref();

    for message in value.messages.as_deref().unwrap_or_default() {
        let outcome = if kind == EventKind::MessageEchoes {
            normalizer::store_outbound_echo(message, repo).await
        } else {
            normalizer::store_inbound_message(message, contacts, repo).await
        };

        if let Err(e) = outcome {
            logfire::error!(
                "Failed to process message {message_id} from {sender}: {error}",
                message_id = message.id.to_string(),
                sender = message.from.to_string(),
                error = e.to_string()
            );
        }
    }

    for echo in value.message_echoes.as_deref().unwrap_or_default() {
        if let Err(e) = normalizer::store_outbound_echo(echo, repo).await {
            logfire::error!(
                "Failed to process echoed message {message_id}: {error}",
                message_id = echo.id.to_string(),
                error = e.to_string()
            );
        }
    }

    for status in value.statuses.as_deref().unwrap_or_default() {
        if let Err(e) = reconciler::apply_status(status, repo).await {
            let message_id = status.id.to_string();
            logfire::error!(
                "Failed to apply status '{status}' for message {message_id}: {error}",
                status = status.status.to_string(),
                message_id = message_id,
                error = e.to_string()
            );
        }
    }
}

/// Persists the raw change to the audit log. Best-effort: audit rows must
/// never fail the acknowledgment.
async fn audit_change(change: &schemas::Change, repo: &repo::ImplAppRepo) {
    if let Err(e) = repo.insert_webhook_log(&change.field, &change.value).await {
        logfire::warn!(
            "Failed to audit webhook change '{field}': {error}",
            field = change.field.to_string(),
            error = e.to_string()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::{ContentType, Direction, MessageStatus};
    use crate::repo::MockAppRepo;
    use mockall::predicate::*;

    fn payload(value: serde_json::Value) -> schemas::WebhookPayload {
        serde_json::from_value(serde_json::json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "102290129340398",
                "time": 1700000000,
                "changes": [value]
            }]
        }))
        .unwrap()
    }

    fn text_message_change() -> serde_json::Value {
        serde_json::json!({
            "field": "messages",
            "value": {
                "messaging_product": "whatsapp",
                "metadata": {
                    "display_phone_number": "15550783881",
                    "phone_number_id": "106540352242922"
                },
                "contacts": [{"profile": {"name": "Kerry Fisher"}, "wa_id": "447911123456"}],
                "messages": [{
                    "from": "447911123456",
                    "id": "wamid.e2e",
                    "timestamp": "1700000000",
                    "type": "text",
                    "text": {"body": "hello"}
                }]
            }
        })
    }

    fn expect_claim(mock_repo: &mut MockAppRepo, claimed: bool) {
        mock_repo
            .expect_claim_webhook_event()
            .times(1)
            .returning(move |_, _, _| Box::pin(async move { Ok(claimed) }));
    }

    fn expect_purge(mock_repo: &mut MockAppRepo) {
        mock_repo
            .expect_purge_expired_webhook_events()
            .returning(|_| Box::pin(async { Ok(0) }));
    }

    #[ntex::test]
    async fn test_end_to_end_text_message_creates_message_and_lead() {
        let mut mock_repo = MockAppRepo::new();
        expect_claim(&mut mock_repo, true);
        expect_purge(&mut mock_repo);
        mock_repo
            .expect_find_lead_by_phone()
            .withf(|candidates| candidates.first().is_some_and(|c| c == "447911123456"))
            .times(1)
            .returning(|_| Box::pin(async { Ok(None) }));
        mock_repo
            .expect_insert_message()
            .withf(|message| {
                message.external_message_id == "wamid.e2e"
                    && message.direction == Direction::Inbound
                    && message.content_type == ContentType::Text
                    && message.content["text"] == "hello"
                    && message.status == MessageStatus::Received
                    && message
                        .received_at
                        .is_some_and(|at| at.timestamp() == 1700000000)
            })
            .times(1)
            .returning(|_| Box::pin(async { Ok(Some(100)) }));
        mock_repo
            .expect_create_lead()
            .withf(|lead| lead.contact_phone == "447911123456" && lead.source == "whatsapp")
            .times(1)
            .returning(|_| Box::pin(async { Ok(42) }));
        mock_repo
            .expect_set_message_lead()
            .with(eq(100i64), eq(42i64))
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(()) }));
        mock_repo
            .expect_insert_activity()
            .times(1)
            .returning(|_, _, _| Box::pin(async { Ok(()) }));
        mock_repo
            .expect_insert_notification()
            .times(1)
            .returning(|_, _, _| Box::pin(async { Ok(()) }));
        let mock_repo: Box<dyn crate::repo::AppRepo> = Box::new(mock_repo);

        process_webhook(payload(text_message_change()), &mock_repo)
            .await
            .unwrap();
    }

    #[ntex::test]
    async fn test_duplicate_delivery_is_not_reprocessed() {
        let mut mock_repo = MockAppRepo::new();
        expect_claim(&mut mock_repo, false);
        expect_purge(&mut mock_repo);
        // nothing beyond the claim: no inserts, no lookups
        mock_repo.expect_find_lead_by_phone().times(0);
        mock_repo.expect_insert_message().times(0);
        let mock_repo: Box<dyn crate::repo::AppRepo> = Box::new(mock_repo);

        process_webhook(payload(text_message_change()), &mock_repo)
            .await
            .unwrap();
    }

    #[ntex::test]
    async fn test_dedup_store_failure_processes_anyway() {
        let mut mock_repo = MockAppRepo::new();
        mock_repo
            .expect_claim_webhook_event()
            .times(1)
            .returning(|_, _, _| Box::pin(async { Err(anyhow::anyhow!("dedup store down")) }));
        expect_purge(&mut mock_repo);
        mock_repo
            .expect_find_lead_by_phone()
            .times(1)
            .returning(|_| Box::pin(async { Ok(None) }));
        mock_repo
            .expect_insert_message()
            .times(1)
            .returning(|_| Box::pin(async { Ok(Some(1)) }));
        mock_repo
            .expect_create_lead()
            .times(1)
            .returning(|_| Box::pin(async { Ok(2) }));
        mock_repo
            .expect_set_message_lead()
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(()) }));
        mock_repo
            .expect_insert_activity()
            .times(1)
            .returning(|_, _, _| Box::pin(async { Ok(()) }));
        mock_repo
            .expect_insert_notification()
            .times(1)
            .returning(|_, _, _| Box::pin(async { Ok(()) }));
        let mock_repo: Box<dyn crate::repo::AppRepo> = Box::new(mock_repo);

        process_webhook(payload(text_message_change()), &mock_repo)
            .await
            .unwrap();
    }

    #[ntex::test]
    async fn test_unknown_field_is_audited_not_processed() {
        let mut mock_repo = MockAppRepo::new();
        expect_claim(&mut mock_repo, true);
        expect_purge(&mut mock_repo);
        mock_repo
            .expect_insert_webhook_log()
            .withf(|field, _| field == "some_future_field")
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(()) }));
        mock_repo.expect_insert_message().times(0);
        mock_repo.expect_update_message_status().times(0);
        let mock_repo: Box<dyn crate::repo::AppRepo> = Box::new(mock_repo);

        let unknown = payload(serde_json::json!({
            "field": "some_future_field",
            "value": {"anything": true}
        }));

        process_webhook(unknown, &mock_repo).await.unwrap();
    }

    #[ntex::test]
    async fn test_template_status_update_is_logged_passthrough() {
        let mut mock_repo = MockAppRepo::new();
        expect_claim(&mut mock_repo, true);
        expect_purge(&mut mock_repo);
        mock_repo
            .expect_insert_webhook_log()
            .withf(|field, payload| {
                field == "message_template_status_update" && payload["event"] == "APPROVED"
            })
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(()) }));
        mock_repo.expect_insert_message().times(0);
        let mock_repo: Box<dyn crate::repo::AppRepo> = Box::new(mock_repo);

        let template_update = payload(serde_json::json!({
            "field": "message_template_status_update",
            "value": {"event": "APPROVED", "message_template_id": 1234}
        }));

        process_webhook(template_update, &mock_repo).await.unwrap();
    }

    #[ntex::test]
    async fn test_one_malformed_message_does_not_block_siblings() {
        // the first message's insert fails; the second sibling in the same
        // batch must still be processed
        let two_messages = payload(serde_json::json!({
            "field": "messages",
            "value": {
                "messaging_product": "whatsapp",
                "metadata": {
                    "display_phone_number": "15550783881",
                    "phone_number_id": "106540352242922"
                },
                "messages": [
                    {
                        "from": "447911123456",
                        "id": "wamid.bad",
                        "timestamp": "1700000000",
                        "type": "text",
                        "text": {"body": "first"}
                    },
                    {
                        "from": "447911123456",
                        "id": "wamid.good",
                        "timestamp": "1700000001",
                        "type": "text",
                        "text": {"body": "second"}
                    }
                ]
            }
        }));

        let mut mock_repo = MockAppRepo::new();
        expect_claim(&mut mock_repo, true);
        expect_purge(&mut mock_repo);
        mock_repo
            .expect_find_lead_by_phone()
            .times(2)
            .returning(|_| {
                Box::pin(async {
                    Ok(Some(crate::models::lead::Lead::create_default_from_phone(
                        "447911123456",
                        "Kerry".to_string(),
                    )))
                })
            });
        mock_repo
            .expect_insert_message()
            .withf(|message| message.external_message_id == "wamid.bad")
            .times(1)
            .returning(|_| Box::pin(async { Err(anyhow::anyhow!("db write failed")) }));
        mock_repo
            .expect_insert_message()
            .withf(|message| message.external_message_id == "wamid.good")
            .times(1)
            .returning(|_| Box::pin(async { Ok(Some(2)) }));
        mock_repo
            .expect_insert_activity()
            .times(1)
            .returning(|_, _, _| Box::pin(async { Ok(()) }));
        mock_repo
            .expect_insert_notification()
            .times(1)
            .returning(|_, _, _| Box::pin(async { Ok(()) }));
        let mock_repo: Box<dyn crate::repo::AppRepo> = Box::new(mock_repo);

        process_webhook(two_messages, &mock_repo).await.unwrap();
    }

    #[ntex::test]
    async fn test_statuses_under_messages_field_are_reconciled() {
        let status_change = payload(serde_json::json!({
            "field": "messages",
            "value": {
                "messaging_product": "whatsapp",
                "metadata": {
                    "display_phone_number": "15550783881",
                    "phone_number_id": "106540352242922"
                },
                "statuses": [{
                    "id": "wamid.out1",
                    "status": "delivered",
                    "timestamp": "1700000100",
                    "recipient_id": "447911123456"
                }]
            }
        }));

        let mut mock_repo = MockAppRepo::new();
        expect_claim(&mut mock_repo, true);
        expect_purge(&mut mock_repo);
        mock_repo
            .expect_get_message_by_external_id()
            .with(eq("wamid.out1"))
            .times(1)
            .returning(|_| {
                Box::pin(async {
                    let mut message = crate::models::message::Message::new_outbound_echo(
                        "wamid.out1",
                        Some(1),
                        ContentType::Text,
                        serde_json::json!({"text": "hi"}),
                        Utc::now(),
                    );
                    message.status = MessageStatus::Sent;
                    Ok(Some(message))
                })
            });
        mock_repo
            .expect_update_message_status()
            .withf(|_, new_status, _| *new_status == MessageStatus::Delivered)
            .times(1)
            .returning(|_, _, _| Box::pin(async { Ok(true) }));
        let mock_repo: Box<dyn crate::repo::AppRepo> = Box::new(mock_repo);

        process_webhook(status_change, &mock_repo).await.unwrap();
    }

    #[ntex::test]
    async fn test_message_echoes_stored_as_outbound() {
        let echoes = payload(serde_json::json!({
            "field": "message_echoes",
            "value": {
                "messaging_product": "whatsapp",
                "metadata": {
                    "display_phone_number": "15550783881",
                    "phone_number_id": "106540352242922"
                },
                "message_echoes": [{
                    "from": "15550783881",
                    "to": "447911123456",
                    "id": "wamid.echo9",
                    "timestamp": "1700000200",
                    "type": "text",
                    "text": {"body": "on our way"}
                }]
            }
        }));

        let mut mock_repo = MockAppRepo::new();
        expect_claim(&mut mock_repo, true);
        expect_purge(&mut mock_repo);
        mock_repo
            .expect_find_lead_by_phone()
            .times(1)
            .returning(|_| Box::pin(async { Ok(None) }));
        mock_repo
            .expect_insert_message()
            .withf(|message| {
                message.external_message_id == "wamid.echo9"
                    && message.direction == Direction::Outbound
                    && message.status == MessageStatus::Sent
            })
            .times(1)
            .returning(|_| Box::pin(async { Ok(Some(3)) }));
        mock_repo.expect_create_lead().times(0);
        let mock_repo: Box<dyn crate::repo::AppRepo> = Box::new(mock_repo);

        process_webhook(echoes, &mock_repo).await.unwrap();
    }
}
