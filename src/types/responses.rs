//! Response payload structures
//!
//! These are the payloads placed *inside* signed response envelopes; the
//! envelope layer Base64URL-encodes their canonical JSON and signs it.

use serde::{Deserialize, Serialize};

/// Authentication response payload for magic-link redemption and refresh
///
/// Optional fields collapse away so the same structure serves the
/// no-rotation refresh (no `expires_at`), the full rotation (with
/// `expires_at`) and redemption (everything).
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    /// Bearer access token
    pub access_token: String,
    /// Token type (always "Bearer")
    pub token_type: String,
    /// Base58-encoded user id
    pub user_id: String,
    /// Post-auth redirect target captured at magic-link issuance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    /// Refresh cookie expiration, present only when a new cookie is set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    /// Server X25519 public key (hex), present on redemption only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_x25519_pub_key: Option<String>,
    /// Per-user private-key context sealed to the client's X25519 key
    /// (Base64URL), present on redemption only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted_privkey_context: Option<String>,
}

impl AuthResponse {
    pub fn new(access_token: String, user_id: String) -> Self {
        Self {
            access_token,
            token_type: "Bearer".to_string(),
            user_id,
            next: None,
            expires_at: None,
            server_x25519_pub_key: None,
            encrypted_privkey_context: None,
        }
    }
}

/// Minimal acknowledgement payload (`{"status":"OK"}`)
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self { status: "OK".to_string() }
    }
}

/// Response payload for shared-secret creation
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSecretResponse {
    /// Sender-role retrieval URL path
    pub url_sender: String,
    /// Receiver-role retrieval URL path
    pub url_receiver: String,
    /// Base58 reference id shared by both role rows
    pub reference: String,
    /// 9-digit OTP, present iff the secret was created with `require_otp`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp: Option<String>,
}

/// Response payload for shared-secret retrieval
#[derive(Debug, Serialize, Deserialize)]
pub struct RetrieveSecretResponse {
    pub role: String,
    /// Remaining read budget after this retrieval (-1 = unlimited sender)
    pub pending_reads: i64,
    pub secret_text: String,
    /// Base58 user id of the sender
    pub sender: String,
    /// Base58 user id of the receiver
    pub receiver: String,
    pub reference: String,
    pub expires_at: i64,
}

/// Response payload for read confirmation
#[derive(Debug, Serialize, Deserialize)]
pub struct ConfirmReadResponse {
    pub success: bool,
    pub pending_reads: i64,
    pub role: String,
}
