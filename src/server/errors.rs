use derive_more::{Display, Error};
use ntex::{http, web};

/// Rejection reasons for webhook requests. Everything past these checks is
/// acknowledged 200 regardless of internal processing outcomes, so this enum
/// stays deliberately small.
#[derive(Debug, Display, Error)]
pub enum WebhookError {
    /// Bad or missing X-Hub-Signature-256, or no secret configured in prod
    #[display("invalid webhook signature")]
    InvalidSignature,
    /// Subscription handshake with wrong mode or verify token
    #[display("webhook verification failed")]
    VerificationFailed,
    #[display("malformed webhook payload")]
    MalformedPayload(#[error(not(source))] String),
}

impl web::error::WebResponseError for WebhookError {
    fn error_response(&self, _: &web::HttpRequest) -> web::HttpResponse {
        logfire::warn!("Rejecting webhook request: {error}", error = format!("{self:?}"));

        // the response body never includes details: no token or secret
        // material must leak back to the caller
        web::HttpResponse::build(self.status_code())
            .set_header("content-type", "text/plain; charset=utf-8")
            .body(self.to_string())
    }

    fn status_code(&self) -> http::StatusCode {
        match *self {
            WebhookError::InvalidSignature => http::StatusCode::UNAUTHORIZED,
            WebhookError::VerificationFailed => http::StatusCode::FORBIDDEN,
            WebhookError::MalformedPayload(_) => http::StatusCode::BAD_REQUEST,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ntex::web::error::WebResponseError;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            WebhookError::InvalidSignature.status_code(),
            http::StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            WebhookError::VerificationFailed.status_code(),
            http::StatusCode::FORBIDDEN
        );
        assert_eq!(
            WebhookError::MalformedPayload("bad json".to_string()).status_code(),
            http::StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_display_does_not_leak_details() {
        let error = WebhookError::MalformedPayload("secret detail".to_string());
        assert_eq!(error.to_string(), "malformed webhook payload");
    }
}
