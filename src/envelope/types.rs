//! Wire types for signed envelopes
//!
//! Requests and responses share one shape; unknown fields are rejected so a
//! body is either exactly an envelope or an error — no shape probing.

use serde::{Deserialize, Serialize};

/// Signed request body for all POST/DELETE endpoints
///
/// `payload` is the Base64URL encoding of a canonically-serialized JSON
/// object; `signature` is the Base58 encoding of an Ed25519 signature over
/// the `payload` *string* (not its decoded bytes).
#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SignedRequest {
    pub payload: String,
    pub signature: String,
}

/// Signed response body, same wire shape, signed with the server's
/// per-session Ed25519 key
#[derive(Debug, Serialize, Deserialize)]
pub struct SignedResponse {
    pub payload: String,
    pub signature: String,
}
