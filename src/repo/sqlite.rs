use crate::models;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Row, SqlitePool, sqlite::SqliteRow};

use super::{AppRepo, sqlite_queries};

#[derive(Clone)]
pub struct SqlxSqliteRepo {
    pub db_pool: SqlitePool,
}

fn enum_from_column<T: serde::de::DeserializeOwned>(raw: &str) -> sqlx::Result<T> {
    serde_json::from_str::<T>(&format!("\"{raw}\""))
        .map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

impl FromRow<'_, SqliteRow> for models::message::Message {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        let content: String = row.try_get("content")?;
        let metadata: Option<String> = row.try_get("metadata")?;

        Ok(Self {
            id: row.try_get("id")?,
            external_message_id: row.try_get("external_message_id")?,
            lead_id: row.try_get("lead_id")?,
            direction: enum_from_column(row.try_get::<&str, &str>("direction")?)?,
            channel: row.try_get("channel")?,
            content_type: enum_from_column(row.try_get::<&str, &str>("content_type")?)?,
            content: serde_json::from_str(&content).unwrap_or(serde_json::Value::Null),
            status: enum_from_column(row.try_get::<&str, &str>("status")?)?,
            received_at: row.try_get("received_at")?,
            sent_at: row.try_get("sent_at")?,
            delivered_at: row.try_get("delivered_at")?,
            read_at: row.try_get("read_at")?,
            failed_at: row.try_get("failed_at")?,
            metadata: metadata.and_then(|raw| serde_json::from_str(&raw).ok()),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl FromRow<'_, SqliteRow> for models::lead::Lead {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            contact_phone: row.try_get("contact_phone")?,
            name: row.try_get("name")?,
            source: row.try_get("source")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl SqlxSqliteRepo {
    fn status_update_query(new_status: models::message::MessageStatus) -> Option<&'static str> {
        match new_status {
            models::message::MessageStatus::Sent => Some(sqlite_queries::QUERY_MARK_MESSAGE_SENT),
            models::message::MessageStatus::Delivered => {
                Some(sqlite_queries::QUERY_MARK_MESSAGE_DELIVERED)
            }
            models::message::MessageStatus::Read => Some(sqlite_queries::QUERY_MARK_MESSAGE_READ),
            models::message::MessageStatus::Failed => {
                Some(sqlite_queries::QUERY_MARK_MESSAGE_FAILED)
            }
            // inbound-only state, never the target of a provider transition
            models::message::MessageStatus::Received => None,
        }
    }
}

#[async_trait]
impl AppRepo for SqlxSqliteRepo {
    async fn insert_message(
        &self,
        message: &models::message::Message,
    ) -> anyhow::Result<Option<i64>> {
        let result = sqlx::query(sqlite_queries::QUERY_INSERT_MESSAGE)
            .bind(&message.external_message_id)
            .bind(message.lead_id)
            .bind(message.direction.to_string())
            .bind(&message.channel)
            .bind(message.content_type.to_string())
            .bind(message.content.to_string())
            .bind(message.status.to_string())
            .bind(message.received_at)
            .bind(message.sent_at)
            .bind(message.delivered_at)
            .bind(message.read_at)
            .bind(message.failed_at)
            .bind(message.metadata.as_ref().map(|meta| meta.to_string()))
            .bind(message.created_at)
            .bind(message.updated_at)
            .execute(&self.db_pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(Some(result.last_insert_rowid()))
    }

    async fn set_message_lead(&self, message_id: i64, lead_id: i64) -> anyhow::Result<()> {
        Ok(sqlx::query(sqlite_queries::QUERY_SET_MESSAGE_LEAD)
            .bind(message_id)
            .bind(lead_id)
            .bind(Utc::now())
            .execute(&self.db_pool)
            .await
            .map(|_| ())?)
    }

    async fn get_message_by_external_id(
        &self,
        external_message_id: &str,
    ) -> anyhow::Result<Option<models::message::Message>> {
        Ok(
            sqlx::query_as::<_, models::message::Message>(
                sqlite_queries::QUERY_GET_MESSAGE_BY_EXTERNAL_ID,
            )
            .bind(external_message_id)
            .fetch_optional(&self.db_pool)
            .await?,
        )
    }

    async fn update_message_status(
        &self,
        external_message_id: &str,
        new_status: models::message::MessageStatus,
        at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let Some(query) = Self::status_update_query(new_status) else {
            anyhow::bail!("'{new_status}' is not a provider delivery status");
        };

        let result = sqlx::query(query)
            .bind(external_message_id)
            .bind(new_status.to_string())
            .bind(at)
            .bind(Utc::now())
            .execute(&self.db_pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn merge_message_metadata(
        &self,
        external_message_id: &str,
        patch: &serde_json::Value,
    ) -> anyhow::Result<()> {
        Ok(sqlx::query(sqlite_queries::QUERY_MERGE_MESSAGE_METADATA)
            .bind(external_message_id)
            .bind(patch.to_string())
            .bind(Utc::now())
            .execute(&self.db_pool)
            .await
            .map(|_| ())?)
    }

    async fn find_lead_by_phone(
        &self,
        candidates: &[String],
    ) -> anyhow::Result<Option<models::lead::Lead>> {
        let Some(first) = candidates.first() else {
            return Ok(None);
        };

        // the query takes exactly three forms; repeat the first to pad
        let second = candidates.get(1).unwrap_or(first);
        let third = candidates.get(2).unwrap_or(first);

        Ok(
            sqlx::query_as::<_, models::lead::Lead>(sqlite_queries::QUERY_FIND_LEAD_BY_PHONE)
                .bind(first)
                .bind(second)
                .bind(third)
                .fetch_optional(&self.db_pool)
                .await?,
        )
    }

    async fn create_lead(&self, lead: &models::lead::Lead) -> anyhow::Result<i64> {
        Ok(sqlx::query(sqlite_queries::QUERY_INSERT_LEAD)
            .bind(&lead.contact_phone)
            .bind(&lead.name)
            .bind(&lead.source)
            .bind(lead.created_at)
            .bind(lead.updated_at)
            .execute(&self.db_pool)
            .await?
            .last_insert_rowid())
    }

    async fn claim_webhook_event(
        &self,
        event_key: &str,
        processed_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(sqlite_queries::QUERY_CLAIM_WEBHOOK_EVENT)
            .bind(event_key)
            .bind(processed_at)
            .bind(expires_at)
            .execute(&self.db_pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn purge_expired_webhook_events(&self, now: DateTime<Utc>) -> anyhow::Result<u64> {
        Ok(
            sqlx::query(sqlite_queries::QUERY_PURGE_EXPIRED_WEBHOOK_EVENTS)
                .bind(now)
                .execute(&self.db_pool)
                .await?
                .rows_affected(),
        )
    }

    async fn insert_webhook_log(
        &self,
        event_field: &str,
        payload: &serde_json::Value,
    ) -> anyhow::Result<()> {
        Ok(sqlx::query(sqlite_queries::QUERY_INSERT_WEBHOOK_LOG)
            .bind(event_field)
            .bind(payload.to_string())
            .bind(Utc::now())
            .execute(&self.db_pool)
            .await
            .map(|_| ())?)
    }

    async fn insert_webhook_error(
        &self,
        record: &models::audit::WebhookErrorRecord,
    ) -> anyhow::Result<()> {
        Ok(sqlx::query(sqlite_queries::QUERY_INSERT_WEBHOOK_ERROR)
            .bind(record.code)
            .bind(&record.title)
            .bind(&record.message)
            .bind(&record.details)
            .bind(record.occurred_at)
            .execute(&self.db_pool)
            .await
            .map(|_| ())?)
    }

    async fn insert_activity(
        &self,
        lead_id: i64,
        activity_type: &str,
        detail: &str,
    ) -> anyhow::Result<()> {
        Ok(sqlx::query(sqlite_queries::QUERY_INSERT_ACTIVITY)
            .bind(lead_id)
            .bind(activity_type)
            .bind(detail)
            .bind(Utc::now())
            .execute(&self.db_pool)
            .await
            .map(|_| ())?)
    }

    async fn insert_notification(
        &self,
        lead_id: Option<i64>,
        title: &str,
        body: &str,
    ) -> anyhow::Result<()> {
        Ok(sqlx::query(sqlite_queries::QUERY_INSERT_NOTIFICATION)
            .bind(lead_id)
            .bind(title)
            .bind(body)
            .bind(Utc::now())
            .execute(&self.db_pool)
            .await
            .map(|_| ())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::{ContentType, Message, MessageStatus};
    use sqlx::sqlite::SqlitePoolOptions;

    // single connection so the in-memory database is shared by every query
    async fn test_repo() -> SqlxSqliteRepo {
        let db_pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite should connect");

        crate::utils::run_migrations(&db_pool)
            .await
            .expect("migrations should apply");

        SqlxSqliteRepo { db_pool }
    }

    fn text_message(external_id: &str) -> Message {
        Message::new_inbound(
            external_id,
            None,
            ContentType::Text,
            serde_json::json!({"text": "hello"}),
            Utc::now(),
        )
    }

    #[ntex::test]
    async fn test_insert_message_duplicate_is_noop() {
        let repo = test_repo().await;

        let first = repo.insert_message(&text_message("wamid.A")).await.unwrap();
        let second = repo.insert_message(&text_message("wamid.A")).await.unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
    }

    #[ntex::test]
    async fn test_get_message_round_trip() {
        let repo = test_repo().await;
        repo.insert_message(&text_message("wamid.B")).await.unwrap();

        let stored = repo
            .get_message_by_external_id("wamid.B")
            .await
            .unwrap()
            .expect("message should be stored");

        assert_eq!(stored.external_message_id, "wamid.B");
        assert_eq!(stored.content_type, ContentType::Text);
        assert_eq!(stored.status, MessageStatus::Received);
        assert_eq!(stored.content["text"], "hello");
        assert!(stored.lead_id.is_none());
    }

    #[ntex::test]
    async fn test_status_guard_rejects_backward_transition() {
        let repo = test_repo().await;
        repo.insert_message(&text_message("wamid.C")).await.unwrap();

        // received -> read applies; read -> delivered must be rejected and
        // delivered_at must stay unset
        let read_applied = repo
            .update_message_status("wamid.C", MessageStatus::Read, Utc::now())
            .await
            .unwrap();
        let delivered_applied = repo
            .update_message_status("wamid.C", MessageStatus::Delivered, Utc::now())
            .await
            .unwrap();

        assert!(read_applied);
        assert!(!delivered_applied);

        let stored = repo
            .get_message_by_external_id("wamid.C")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, MessageStatus::Read);
        assert!(stored.read_at.is_some());
        assert!(stored.delivered_at.is_none());
    }

    #[ntex::test]
    async fn test_claim_webhook_event_is_atomic_per_key() {
        let repo = test_repo().await;
        let now = Utc::now();
        let expires = now + chrono::TimeDelta::hours(24);

        let first = repo.claim_webhook_event("evt-1", now, expires).await.unwrap();
        let second = repo.claim_webhook_event("evt-1", now, expires).await.unwrap();
        let other = repo.claim_webhook_event("evt-2", now, expires).await.unwrap();

        assert!(first);
        assert!(!second);
        assert!(other);
    }

    #[ntex::test]
    async fn test_claim_webhook_event_reclaims_expired_marker() {
        let repo = test_repo().await;
        let past = Utc::now() - chrono::TimeDelta::hours(48);
        let past_expiry = past + chrono::TimeDelta::hours(24);

        assert!(repo.claim_webhook_event("evt-3", past, past_expiry).await.unwrap());

        let now = Utc::now();
        let reclaimed = repo
            .claim_webhook_event("evt-3", now, now + chrono::TimeDelta::hours(24))
            .await
            .unwrap();

        assert!(reclaimed);
    }

    #[ntex::test]
    async fn test_purge_expired_webhook_events() {
        let repo = test_repo().await;
        let past = Utc::now() - chrono::TimeDelta::hours(48);

        repo.claim_webhook_event("evt-old", past, past + chrono::TimeDelta::hours(24))
            .await
            .unwrap();

        let purged = repo.purge_expired_webhook_events(Utc::now()).await.unwrap();
        assert_eq!(purged, 1);

        // the key is claimable again after the purge
        let now = Utc::now();
        assert!(
            repo.claim_webhook_event("evt-old", now, now + chrono::TimeDelta::hours(24))
                .await
                .unwrap()
        );
    }

    #[ntex::test]
    async fn test_find_lead_by_phone_matches_any_candidate() {
        let repo = test_repo().await;
        let lead = models::lead::Lead::create_default_from_phone("+905551234567", "Test".into());
        repo.create_lead(&lead).await.unwrap();

        let candidates = vec!["905551234567".to_string(), "+905551234567".to_string()];
        let found = repo.find_lead_by_phone(&candidates).await.unwrap();

        assert!(found.is_some_and(|l| l.contact_phone == "+905551234567"));
    }

    #[ntex::test]
    async fn test_merge_message_metadata_keeps_unrelated_fields() {
        let repo = test_repo().await;
        repo.insert_message(&text_message("wamid.D")).await.unwrap();

        repo.merge_message_metadata("wamid.D", &serde_json::json!({"pricing": {"billable": true}}))
            .await
            .unwrap();
        repo.merge_message_metadata("wamid.D", &serde_json::json!({"conversation": {"id": "c1"}}))
            .await
            .unwrap();

        let stored = repo
            .get_message_by_external_id("wamid.D")
            .await
            .unwrap()
            .unwrap();
        let metadata = stored.metadata.expect("metadata should be set");

        assert_eq!(metadata["pricing"]["billable"], true);
        assert_eq!(metadata["conversation"]["id"], "c1");
    }

    #[ntex::test]
    async fn test_set_message_lead_backfills_weak_reference() {
        let repo = test_repo().await;
        let message_id = repo
            .insert_message(&text_message("wamid.E"))
            .await
            .unwrap()
            .unwrap();
        let lead = models::lead::Lead::create_default_from_phone("5551", "L".into());
        let lead_id = repo.create_lead(&lead).await.unwrap();

        repo.set_message_lead(message_id, lead_id).await.unwrap();

        let stored = repo
            .get_message_by_external_id("wamid.E")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.lead_id, Some(lead_id));
    }
}
