//! Crate-wide error taxonomy
//!
//! Every fallible operation in the core surfaces a `CoreError`. Handlers map
//! errors to HTTP responses through a single helper so that failure classes
//! that must be indistinguishable on the wire stay indistinguishable.

use std::fmt;

use serde::Serialize;
use spin_sdk::http::Response;
use tracing::warn;

/// Error kinds of the cryptographic core
#[derive(Debug)]
pub enum CoreError {
    /// Malformed Base64URL / Base58 / hex / UTF-8 input
    InvalidEncoding(String),
    /// Body is not a well-formed signed envelope
    BadEnvelope(String),
    /// Envelope structure is fine but the Ed25519 signature does not verify
    BadSignature(String),
    /// Missing or invalid credentials
    Unauthorized(String),
    /// Access token MAC is valid but the token is past `exp`
    TokenExpired,
    /// Access token and refresh cookie are both past `exp`; carries the
    /// cookie domain so the clearing `Set-Cookie` matches the original
    BothTokensExpired(Option<String>),
    /// Caller is authenticated but not allowed to touch this resource
    AccessDenied,
    /// Resource does not exist
    NotFound,
    /// Secret is OTP-gated and no OTP was supplied
    OtpRequired,
    /// Supplied OTP does not match the stored one
    OtpMismatch,
    /// Request field failed a range / format / length check
    ValidationFailed(String),
    /// AEAD tag mismatch
    AeadFail,
    /// X25519 produced a non-contributory (all-zero) shared secret
    EcdhRejected,
    /// A single-use or read-budget gate lost its race
    StorageConflict(String),
    /// Outbound email delivery failed
    MailerFailed(String),
    /// Anything else (database, config, serialization internals)
    Internal(String),
}

/// Wire shape of error bodies: `{"error": <kind>, "message"?: <string>}`
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl CoreError {
    /// Stable kind discriminator used in response bodies
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::InvalidEncoding(_) => "InvalidEncoding",
            CoreError::BadEnvelope(_) => "BadEnvelope",
            CoreError::BadSignature(_) => "BadSignature",
            CoreError::Unauthorized(_) => "Unauthorized",
            CoreError::TokenExpired => "TokenExpired",
            CoreError::BothTokensExpired(_) => "BothTokensExpired",
            // Cross-user denial must be indistinguishable from a missing row
            CoreError::AccessDenied | CoreError::NotFound => "NotFound",
            CoreError::OtpRequired => "OtpRequired",
            CoreError::OtpMismatch => "OtpMismatch",
            CoreError::ValidationFailed(_) => "ValidationFailed",
            CoreError::AeadFail => "AeadFail",
            CoreError::EcdhRejected => "EcdhRejected",
            CoreError::StorageConflict(_) => "Unauthorized",
            CoreError::MailerFailed(_) => "MailerFailed",
            CoreError::Internal(_) => "Internal",
        }
    }

    /// HTTP status for this error kind
    pub fn status(&self) -> u16 {
        match self {
            CoreError::InvalidEncoding(_)
            | CoreError::BadEnvelope(_)
            | CoreError::ValidationFailed(_)
            | CoreError::OtpRequired => 400,
            CoreError::BadSignature(_)
            | CoreError::Unauthorized(_)
            | CoreError::TokenExpired
            | CoreError::BothTokensExpired(_)
            | CoreError::OtpMismatch
            | CoreError::StorageConflict(_) => 401,
            CoreError::AccessDenied | CoreError::NotFound => 404,
            CoreError::AeadFail
            | CoreError::EcdhRejected
            | CoreError::MailerFailed(_)
            | CoreError::Internal(_) => 500,
        }
    }

    /// Message exposed to the client, if any
    ///
    /// Only validation failures carry detail; cryptographic and authorization
    /// failures stay opaque so no step information leaks.
    fn public_message(&self) -> Option<String> {
        match self {
            CoreError::ValidationFailed(msg) => Some(msg.clone()),
            _ => None,
        }
    }

    /// Build the HTTP response for this error
    pub fn into_response(self) -> Response {
        warn!("Request failed: {}", self);

        let body = ErrorBody {
            error: self.kind(),
            message: self.public_message(),
        };
        let json = serde_json::to_string(&body)
            .unwrap_or_else(|_| r#"{"error":"Internal"}"#.to_string());

        let mut builder = Response::builder();
        builder.status(self.status()).header("content-type", "application/json");

        // Double expiry clears the refresh cookie so the browser forgets the
        // dead session (Domain must match the original cookie, RFC 6265)
        if let CoreError::BothTokensExpired(domain) = &self {
            builder.header("set-cookie", &crate::token::cookie::clear_refresh_cookie(domain.as_deref()));
        }

        builder.body(json).build()
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::InvalidEncoding(msg) => write!(f, "Invalid encoding: {}", msg),
            CoreError::BadEnvelope(msg) => write!(f, "Bad envelope: {}", msg),
            CoreError::BadSignature(msg) => write!(f, "Bad signature: {}", msg),
            CoreError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            CoreError::TokenExpired => write!(f, "Access token expired"),
            CoreError::BothTokensExpired(_) => write!(f, "Both tokens expired"),
            CoreError::AccessDenied => write!(f, "Access denied"),
            CoreError::NotFound => write!(f, "Not found"),
            CoreError::OtpRequired => write!(f, "OTP required"),
            CoreError::OtpMismatch => write!(f, "OTP mismatch"),
            CoreError::ValidationFailed(msg) => write!(f, "Validation failed: {}", msg),
            CoreError::AeadFail => write!(f, "AEAD authentication failed"),
            CoreError::EcdhRejected => write!(f, "ECDH produced non-contributory shared secret"),
            CoreError::StorageConflict(msg) => write!(f, "Storage conflict: {}", msg),
            CoreError::MailerFailed(msg) => write!(f, "Mailer failed: {}", msg),
            CoreError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<spin_sdk::sqlite::Error> for CoreError {
    fn from(e: spin_sdk::sqlite::Error) -> Self {
        CoreError::Internal(format!("sqlite: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_denied_and_not_found_share_kind_and_status() {
        assert_eq!(CoreError::AccessDenied.kind(), CoreError::NotFound.kind());
        assert_eq!(CoreError::AccessDenied.status(), CoreError::NotFound.status());
    }

    #[test]
    fn storage_conflict_presents_as_unauthorized() {
        let e = CoreError::StorageConflict("lost consume race".into());
        assert_eq!(e.kind(), "Unauthorized");
        assert_eq!(e.status(), 401);
    }

    #[test]
    fn validation_detail_is_exposed_but_crypto_detail_is_not() {
        assert!(CoreError::ValidationFailed("max_reads out of range".into())
            .public_message()
            .is_some());
        assert!(CoreError::BadSignature("wrong key".into()).public_message().is_none());
        assert!(CoreError::AeadFail.public_message().is_none());
    }
}
