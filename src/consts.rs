pub const CHANNEL_WHATSAPP: &str = "whatsapp";
pub const LEAD_SOURCE_WHATSAPP: &str = "whatsapp";

/// Top-level `object` value of WhatsApp Business Account webhook payloads
pub const WHATSAPP_BUSINESS_OBJECT: &str = "whatsapp_business_account";

pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

/// How long a processed-event marker suppresses redeliveries. Provider
/// redelivery windows are short; 24h bounds the dedup table's growth.
pub const WEBHOOK_DEDUP_TTL_SECONDS: i64 = chrono::TimeDelta::hours(24).num_seconds();

/// Time box for best-effort side effects (activity log, notifications) so a
/// slow write can never push the webhook ack past the provider's timeout.
pub const BEST_EFFORT_TIMEOUT_MILLIS: u64 = 1_500;

/// Request-scoped deadline for processing one webhook POST. The provider
/// expects the ack within a few seconds and retries on timeout, so slow
/// processing is abandoned and acknowledged instead.
pub const WEBHOOK_PROCESSING_DEADLINE_MILLIS: u64 = 5_000;

/// Max characters of message text copied into activity/notification rows
pub const ACTIVITY_SNIPPET_MAX_CHARS: usize = 120;
