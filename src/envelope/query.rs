//! Signed query strings for GET and DELETE endpoints
//!
//! The client assembles its query parameters into an object, serializes it
//! canonically, signs the serialization, and appends `&signature=…`. The
//! signer is always the session key bound in the bearer token; it is never
//! re-sent with the request.

use std::collections::HashMap;

use crate::codec;
use crate::crypto::primitives::ed25519_verify;
use crate::types::CoreError;

/// Verify a signed query string and strip the `signature` parameter
///
/// On success the map holds only the payload parameters, ready for use.
pub fn verify_query_params(
    params: &mut HashMap<String, String>,
    public_key: &[u8; 32],
) -> Result<(), CoreError> {
    let signature_b58 = params
        .remove("signature")
        .ok_or_else(|| CoreError::BadEnvelope("missing signature parameter".to_string()))?;

    let signature = codec::b58_decode_array::<64>(&signature_b58)
        .map_err(|_| CoreError::BadEnvelope("signature is not 64 Base58 bytes".to_string()))?;

    let serialized = codec::canonical_query(params)?;
    if !ed25519_verify(public_key, serialized.as_bytes(), &signature) {
        return Err(CoreError::BadSignature("query".to_string()));
    }
    Ok(())
}
