//! Security utilities for WhatsApp webhook verification
//!
//! Meta signs every webhook payload with HMAC-SHA256 using the app's secret
//! key and sends the result in the `X-Hub-Signature-256` header as
//! `sha256=<hex_signature>`.
//!
//! Verification recomputes the HMAC over the raw request body bytes (never
//! the parsed JSON) and compares digests in constant time.
//!
//! The check fails closed: a configured secret with a missing or malformed
//! header is `Invalid`, and an absent secret is reported as `Unconfigured`
//! so the route layer can reject in production and only bypass (loudly)
//! outside of it.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Outcome of validating a request against the configured app secret
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    Valid,
    Invalid,
    /// No app secret configured; the route layer decides per environment
    Unconfigured,
}

/// Validates the X-Hub-Signature-256 header of an incoming webhook request.
///
/// # Arguments
///
/// * `signature_header` - The header value, if the request carried one
/// * `payload` - The raw request body bytes
/// * `app_secret` - The configured app secret, if any
pub fn check_signature(
    signature_header: Option<&str>,
    payload: &[u8],
    app_secret: Option<&str>,
) -> SignatureCheck {
    let Some(app_secret) = app_secret else {
        return SignatureCheck::Unconfigured;
    };

    let Some(signature_header) = signature_header else {
        logfire::warn!("Missing X-Hub-Signature-256 header on signed webhook endpoint");
        return SignatureCheck::Invalid;
    };

    if verify_signature(signature_header, payload, app_secret) {
        SignatureCheck::Valid
    } else {
        SignatureCheck::Invalid
    }
}

/// Verifies a signature header value against the request payload.
///
/// Returns true only when the header carries a well-formed `sha256=` hex
/// digest matching `HMAC-SHA256(app_secret, payload)`. The comparison is
/// constant-time to prevent timing attacks.
pub fn verify_signature(signature_header: &str, payload: &[u8], app_secret: &str) -> bool {
    // Extract the signature from the header (format: "sha256=<signature>")
    let signature_hex = match signature_header.strip_prefix("sha256=") {
        Some(sig) => sig,
        None => {
            logfire::warn!("Invalid signature header format: expected 'sha256=' prefix");
            return false;
        }
    };

    // Decode the hex signature
    let expected_signature = match hex::decode(signature_hex) {
        Ok(sig) => sig,
        Err(e) => {
            logfire::warn!(
                "Failed to decode signature hex: {error}",
                error = e.to_string()
            );
            return false;
        }
    };

    // Compute HMAC-SHA256 of the payload
    let mut mac = match HmacSha256::new_from_slice(app_secret.as_bytes()) {
        Ok(m) => m,
        Err(e) => {
            logfire::error!(
                "Failed to create HMAC instance: {error}",
                error = e.to_string()
            );
            return false;
        }
    };

    mac.update(payload);
    let computed_signature = mac.finalize().into_bytes();

    // Constant-time comparison to prevent timing attacks
    let is_valid: bool = computed_signature.ct_eq(&expected_signature[..]).into();

    if !is_valid {
        logfire::warn!("Webhook signature verification failed: signatures do not match");
    }

    is_valid
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(payload: &[u8], secret: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(payload);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_verify_signature_valid() {
        let payload = b"{\"test\":\"data\"}";
        let secret = "test_secret";
        let header = sign(payload, secret);

        assert!(verify_signature(&header, payload, secret));
    }

    #[test]
    fn test_verify_signature_invalid() {
        let payload = b"{\"test\":\"data\"}";
        let secret = "test_secret";
        let wrong_signature =
            "sha256=0000000000000000000000000000000000000000000000000000000000000000";

        assert!(!verify_signature(wrong_signature, payload, secret));
    }

    #[test]
    fn test_verify_signature_wrong_secret() {
        let payload = b"{\"test\":\"data\"}";
        let header = sign(payload, "wrong_secret");

        assert!(!verify_signature(&header, payload, "test_secret"));
    }

    #[test]
    fn test_verify_signature_invalid_header_format() {
        let payload = b"{\"test\":\"data\"}";
        let secret = "test_secret";

        // Missing sha256= prefix
        assert!(!verify_signature("abc123", payload, secret));

        // Wrong prefix
        assert!(!verify_signature("sha1=abc123", payload, secret));
    }

    #[test]
    fn test_verify_signature_invalid_hex() {
        assert!(!verify_signature("sha256=zzzzz", b"{}", "test_secret"));
    }

    #[test]
    fn test_verify_signature_tampered_payload() {
        let original_payload = b"{\"test\":\"data\"}";
        let tampered_payload = b"{\"test\":\"hacked\"}";
        let secret = "test_secret";
        let header = sign(original_payload, secret);

        // Try to verify with tampered payload
        assert!(!verify_signature(&header, tampered_payload, secret));
    }

    #[test]
    fn test_check_signature_valid() {
        let payload = b"{\"object\":\"whatsapp_business_account\"}";
        let header = sign(payload, "secret");

        assert_eq!(
            check_signature(Some(&header), payload, Some("secret")),
            SignatureCheck::Valid
        );
    }

    #[test]
    fn test_check_signature_missing_header_with_secret_is_invalid() {
        assert_eq!(
            check_signature(None, b"{}", Some("secret")),
            SignatureCheck::Invalid
        );
    }

    #[test]
    fn test_check_signature_without_secret_is_unconfigured() {
        // even a well-formed header cannot be validated without a key
        let header = sign(b"{}", "whatever");
        assert_eq!(
            check_signature(Some(&header), b"{}", None),
            SignatureCheck::Unconfigured
        );
    }
}
