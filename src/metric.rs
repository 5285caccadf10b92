use opentelemetry::{KeyValue, metrics::UpDownCounter};
use std::sync::LazyLock;

static STATDS: LazyLock<UpDownCounter<i64>> = LazyLock::new(|| {
    logfire::i64_up_down_counter("happy_crm_statds")
        .with_description("Happy CRM webhook ingestion statistics")
        .with_unit("attempt")
        .build()
});

fn incr_statds(metric: String, value: String) {
    STATDS.add(1, &[KeyValue::new(metric, value)]);
}

pub fn incr_webhook_event_statds(kind: &str) {
    incr_statds("webhook_event".to_string(), kind.into())
}

pub fn incr_message_statds(content_type: &str) {
    incr_statds("message_normalized".to_string(), content_type.into())
}

pub fn incr_status_statds(status: &str) {
    incr_statds("status_transition".to_string(), status.into())
}

pub fn incr_lead_action_statds(action: &str) {
    incr_statds("lead_action".to_string(), action.into())
}
