//! # Lead Resolver
//!
//! This module is the only place the webhook pipeline touches CRM business
//! data beyond messages: it looks up leads by phone number and auto-creates
//! them for inbound messages from unknown senders.

use crate::{metric, models, repo};

/// Candidate phone forms used when matching a sender against stored leads.
///
/// Upstream storage is inconsistent about the leading `+`, so the lookup
/// tries the number as received, with `+`, and without `+`.
///
/// TODO: true E.164 canonicalization (spaces, dashes, country-code
/// inference) once lead storage is normalized.
pub fn phone_candidates(raw: &str) -> Vec<String> {
    let as_received = raw.trim().to_string();

    let without_plus = as_received
        .strip_prefix('+')
        .map(str::to_string)
        .unwrap_or_else(|| as_received.clone());
    let with_plus = format!("+{without_plus}");

    let mut candidates = vec![as_received];
    for form in [with_plus, without_plus] {
        if !candidates.contains(&form) {
            candidates.push(form);
        }
    }

    candidates
}

/// Finds a lead whose stored phone matches any candidate form of `phone`
pub async fn find_lead_by_phone(
    repo: &repo::ImplAppRepo,
    phone: &str,
) -> anyhow::Result<Option<models::lead::Lead>> {
    repo.find_lead_by_phone(&phone_candidates(phone)).await
}

/// Auto-creates a lead for an inbound message from an unknown number.
///
/// The lead name comes from the webhook contact profile when the provider
/// sent one; otherwise a placeholder derived from the number is used.
pub async fn create_lead_from_inbound(
    repo: &repo::ImplAppRepo,
    phone: &str,
    profile_name: Option<&str>,
) -> anyhow::Result<models::lead::Lead> {
    let name = profile_name
        .map(str::to_string)
        .unwrap_or_else(|| format!("WhatsApp {phone}"));

    let mut lead = models::lead::Lead::create_default_from_phone(phone, name);
    lead.id = repo.create_lead(&lead).await?;

    metric::incr_lead_action_statds("auto_create");
    Ok(lead)
}
