pub const QUERY_INSERT_MESSAGE: &str = r#"
INSERT INTO message(
    external_message_id,lead_id,direction,channel,content_type,content,status,
    received_at,sent_at,delivered_at,read_at,failed_at,metadata,created_at,updated_at
) VALUES($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15)
ON CONFLICT(external_message_id) DO NOTHING;
"#;

pub const QUERY_SET_MESSAGE_LEAD: &str = r#"
UPDATE message SET lead_id=$2, updated_at=$3 WHERE id=$1;
"#;

pub const QUERY_GET_MESSAGE_BY_EXTERNAL_ID: &str = r#"
SELECT
    id,external_message_id,lead_id,direction,channel,content_type,content,status,
    received_at,sent_at,delivered_at,read_at,failed_at,metadata,created_at,updated_at
FROM message
WHERE external_message_id=$1;
"#;

// Status transition guards: each UPDATE only fires from the states the new
// status is reachable from, and COALESCE keeps an already-set timestamp.

pub const QUERY_MARK_MESSAGE_SENT: &str = r#"
UPDATE message SET status=$2, sent_at=COALESCE(sent_at,$3), updated_at=$4
WHERE external_message_id=$1 AND status IN ('received');
"#;

pub const QUERY_MARK_MESSAGE_DELIVERED: &str = r#"
UPDATE message SET status=$2, delivered_at=COALESCE(delivered_at,$3), updated_at=$4
WHERE external_message_id=$1 AND status IN ('received','sent');
"#;

pub const QUERY_MARK_MESSAGE_READ: &str = r#"
UPDATE message SET status=$2, read_at=COALESCE(read_at,$3), updated_at=$4
WHERE external_message_id=$1 AND status IN ('received','sent','delivered');
"#;

pub const QUERY_MARK_MESSAGE_FAILED: &str = r#"
UPDATE message SET status=$2, failed_at=COALESCE(failed_at,$3), updated_at=$4
WHERE external_message_id=$1 AND status IN ('sent','delivered');
"#;

pub const QUERY_MERGE_MESSAGE_METADATA: &str = r#"
UPDATE message
SET metadata=json_patch(COALESCE(metadata,'{}'),$2), updated_at=$3
WHERE external_message_id=$1;
"#;

pub const QUERY_FIND_LEAD_BY_PHONE: &str = r#"
SELECT id,contact_phone,name,source,created_at,updated_at
FROM lead
WHERE contact_phone IN ($1,$2,$3)
ORDER BY created_at ASC
LIMIT 1;
"#;

pub const QUERY_INSERT_LEAD: &str = r#"
INSERT INTO lead(contact_phone,name,source,created_at,updated_at)
VALUES($1,$2,$3,$4,$5);
"#;

pub const QUERY_CLAIM_WEBHOOK_EVENT: &str = r#"
INSERT INTO webhook_event_dedup(event_key,processed_at,expires_at)
VALUES($1,$2,$3)
ON CONFLICT(event_key) DO UPDATE SET
    processed_at=excluded.processed_at,
    expires_at=excluded.expires_at
WHERE webhook_event_dedup.expires_at <= excluded.processed_at;
"#;

pub const QUERY_PURGE_EXPIRED_WEBHOOK_EVENTS: &str = r#"
DELETE FROM webhook_event_dedup WHERE expires_at <= $1;
"#;

pub const QUERY_INSERT_WEBHOOK_LOG: &str = r#"
INSERT INTO webhook_log(event_field,payload,created_at) VALUES($1,$2,$3);
"#;

pub const QUERY_INSERT_WEBHOOK_ERROR: &str = r#"
INSERT INTO webhook_error(code,title,message,details,occurred_at)
VALUES($1,$2,$3,$4,$5);
"#;

pub const QUERY_INSERT_ACTIVITY: &str = r#"
INSERT INTO activity(lead_id,activity_type,detail,created_at) VALUES($1,$2,$3,$4);
"#;

pub const QUERY_INSERT_NOTIFICATION: &str = r#"
INSERT INTO notification(lead_id,title,body,is_read,created_at)
VALUES($1,$2,$3,0,$4);
"#;
