//! Closed classification of webhook `change.field` discriminators.
//!
//! The provider adds fields over time; everything unrecognized maps to
//! [`EventKind::Unknown`], which is audited and acknowledged instead of
//! rejected so new fields never cause retry storms.

use derive_more::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum EventKind {
    #[display("messages")]
    Messages,
    #[display("message_echoes")]
    MessageEchoes,
    #[display("statuses")]
    Statuses,
    #[display("account_alerts")]
    AccountAlerts,
    #[display("account_review_update")]
    AccountReviewUpdate,
    #[display("account_update")]
    AccountUpdate,
    #[display("business_capability_update")]
    BusinessCapabilityUpdate,
    #[display("phone_number_quality_update")]
    PhoneNumberQualityUpdate,
    #[display("phone_number_name_update")]
    PhoneNumberNameUpdate,
    #[display("message_template_status_update")]
    TemplateStatusUpdate,
    #[display("unknown")]
    Unknown,
}

impl EventKind {
    pub fn from_field(field: &str) -> Self {
        match field {
            "messages" => Self::Messages,
            "message_echoes" => Self::MessageEchoes,
            "statuses" => Self::Statuses,
            "account_alerts" => Self::AccountAlerts,
            "account_review_update" => Self::AccountReviewUpdate,
            "account_update" => Self::AccountUpdate,
            "business_capability_update" => Self::BusinessCapabilityUpdate,
            "phone_number_quality_update" => Self::PhoneNumberQualityUpdate,
            "phone_number_name_update" => Self::PhoneNumberNameUpdate,
            "message_template_status_update" => Self::TemplateStatusUpdate,
            _ => Self::Unknown,
        }
    }
}
