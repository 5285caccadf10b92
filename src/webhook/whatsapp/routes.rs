//! WhatsApp webhook endpoint handlers
//!
//! This module handles incoming webhook requests from the WhatsApp Business
//! Cloud API. It implements both the verification endpoint (GET) and the
//! webhook receiver (POST).
//!
//! # Security
//!
//! The POST endpoint verifies webhook authenticity by validating the
//! X-Hub-Signature-256 header against the configured app secret (see
//! [`super::security`]). Verification happens on the raw body bytes before
//! any JSON parsing.

use super::{handler, schemas, security};
use crate::{
    config, consts,
    server::{AppState, errors},
};
use ntex::{
    time::{Millis, timeout},
    util::Bytes,
    web,
};
use serde::Deserialize;

/// Query parameters for webhook verification
#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    /// The mode parameter, should be "subscribe"
    #[serde(rename = "hub.mode")]
    pub mode: String,
    /// The verification token from WhatsApp
    #[serde(rename = "hub.verify_token")]
    pub verify_token: String,
    /// The challenge string to echo back
    #[serde(rename = "hub.challenge")]
    pub challenge: String,
}

/// Webhook verification endpoint (GET)
///
/// WhatsApp sends a GET request to verify the webhook URL. This endpoint
/// validates the verify token and returns the challenge.
///
/// # Returns
/// - 200 with the literal challenge string if verification succeeds
/// - 403 otherwise, without echoing the expected token
#[web::get("")]
pub async fn verify(
    query: web::types::Query<VerifyQuery>,
) -> Result<impl web::Responder, web::Error> {
    if query.mode != "subscribe" {
        return Err(errors::WebhookError::VerificationFailed.into());
    }

    let app_config = config::APP_CONFIG
        .get()
        .expect("APP_CONFIG should be initialized before starting web server");

    if query.verify_token != app_config.whatsapp_webhook_verify_token {
        return Err(errors::WebhookError::VerificationFailed.into());
    }

    Ok(web::HttpResponse::Ok()
        .content_type("text/plain")
        .body(query.challenge.clone()))
}

/// Webhook receiver endpoint (POST)
///
/// Receives webhook events from the WhatsApp Business Cloud API: incoming
/// messages, delivery statuses, and account-level notifications.
///
/// # Responses
/// - 200 `OK` once the payload is authenticated and parsed, including when
///   individual events inside it fail to process (the provider retries on
///   non-200, and indefinite retries only amplify load)
/// - 401 on signature verification failure
/// - 400 on unparseable JSON
#[web::post("")]
pub async fn receive(
    req: web::HttpRequest,
    body: Bytes,
    app_state: web::types::State<AppState>,
) -> Result<impl web::Responder, web::Error> {
    let app_config = config::APP_CONFIG
        .get()
        .expect("APP_CONFIG should be initialized before starting web server");

    let signature_header = req
        .headers()
        .get(consts::SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    match security::check_signature(signature_header, &body, app_config.app_secret()) {
        security::SignatureCheck::Valid => {}
        security::SignatureCheck::Invalid => {
            return Err(errors::WebhookError::InvalidSignature.into());
        }
        security::SignatureCheck::Unconfigured => {
            // fail closed in production; everywhere else the bypass is
            // allowed but announced on every single request
            if app_config.is_prod() {
                logfire::error!(
                    "Rejecting webhook: no app secret configured in production"
                );
                return Err(errors::WebhookError::InvalidSignature.into());
            }

            logfire::warn!(
                "SIGNATURE VERIFICATION BYPASSED: no app secret configured, accepting unverified webhook (non-production only)"
            );
        }
    }

    // Parse the JSON payload only after the signature check passed
    let payload: schemas::WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            logfire::error!(
                "Failed to parse webhook payload: {error}",
                error = e.to_string()
            );
            return Err(errors::WebhookError::MalformedPayload(e.to_string()).into());
        }
    };

    // Per-event failures are handled (and logged) inside, and the whole
    // batch runs under a request-scoped deadline; neither a processing
    // problem nor a slow dependency may push the provider into a retry storm
    let processing = handler::process_webhook(payload, &app_state.repo);
    match timeout(Millis(consts::WEBHOOK_PROCESSING_DEADLINE_MILLIS as u32), processing).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            logfire::error!("Failed to process webhook: {error}", error = e.to_string());
        }
        Err(_) => {
            logfire::error!("Webhook processing hit the request deadline, acknowledging anyway");
        }
    }

    Ok(web::HttpResponse::Ok().content_type("text/plain").body("OK"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_query_deserialization() {
        let json = r#"{"hub.mode":"subscribe","hub.verify_token":"test123","hub.challenge":"challenge123"}"#;
        let query: VerifyQuery = serde_json::from_str(json).unwrap();
        assert_eq!(query.mode, "subscribe");
        assert_eq!(query.verify_token, "test123");
        assert_eq!(query.challenge, "challenge123");
    }
}
