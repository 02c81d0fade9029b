//! Inbound envelope verification
//!
//! Verification order on every signed body:
//! 1. structural check (well-formed envelope, Base58 signature of 64 bytes,
//!    decodable payload)
//! 2. signer identification (by the caller: bearer-bound key, payload
//!    `pub_key`, or magic-link binding — exactly one, never a mix)
//! 3. Ed25519 verification over the exact Base64URL payload string
//! 4. only then: payload decoding and use

use serde::Deserialize;
use serde_json::Value;

use super::types::SignedRequest;
use crate::codec;
use crate::crypto::primitives::ed25519_verify;
use crate::types::CoreError;

/// Auth method found inside an envelope payload
///
/// Strict separation: a bearer-authenticated request must carry neither
/// field; an anonymous request must carry exactly one.
#[derive(Debug, PartialEq, Eq)]
pub enum PayloadAuth {
    None,
    PubKey(String),
    MagicLink(String),
}

/// Parse a request body as a signed envelope and run the structural checks
pub fn parse_signed_request(body: &[u8]) -> Result<SignedRequest, CoreError> {
    let request: SignedRequest = serde_json::from_slice(body)
        .map_err(|e| CoreError::BadEnvelope(format!("not a signed request: {}", e)))?;

    if request.payload.is_empty() {
        return Err(CoreError::BadEnvelope("empty payload".to_string()));
    }
    // Fails early on anything that cannot be a 64-byte Ed25519 signature
    codec::b58_decode_array::<64>(&request.signature)
        .map_err(|_| CoreError::BadEnvelope("signature is not 64 Base58 bytes".to_string()))?;

    Ok(request)
}

/// Verify the envelope signature against a known signer key
pub fn verify_with_key(request: &SignedRequest, public_key: &[u8; 32]) -> Result<(), CoreError> {
    let signature = codec::b58_decode_array::<64>(&request.signature)
        .map_err(|_| CoreError::BadEnvelope("signature is not 64 Base58 bytes".to_string()))?;

    if !ed25519_verify(public_key, request.payload.as_bytes(), &signature) {
        return Err(CoreError::BadSignature("envelope".to_string()));
    }
    Ok(())
}

/// Decode the payload into its JSON value (for auth-method inspection)
pub fn payload_value(request: &SignedRequest) -> Result<Value, CoreError> {
    let json_string = codec::b64url_decode_utf8(&request.payload)?;
    serde_json::from_str(&json_string)
        .map_err(|e| CoreError::BadEnvelope(format!("payload json: {}", e)))
}

/// Decode the payload into a typed structure (after verification)
pub fn decode_payload<T>(request: &SignedRequest) -> Result<T, CoreError>
where
    T: for<'de> Deserialize<'de>,
{
    codec::b64url_decode_json(&request.payload)
}

/// Inspect which payload-embedded auth method is present
///
/// Rejects ambiguous payloads (both `pub_key` and `magiclink`) outright.
pub fn detect_payload_auth(payload: &Value) -> Result<PayloadAuth, CoreError> {
    let pub_key = payload.get("pub_key").and_then(|v| v.as_str());
    let magiclink = payload.get("magiclink").and_then(|v| v.as_str());

    match (pub_key, magiclink) {
        (Some(_), Some(_)) => Err(CoreError::BadEnvelope(
            "payload carries both pub_key and magiclink".to_string(),
        )),
        (Some(key), None) => Ok(PayloadAuth::PubKey(key.to_string())),
        (None, Some(token)) => Ok(PayloadAuth::MagicLink(token.to_string())),
        (None, None) => Ok(PayloadAuth::None),
    }
}

/// Verify a self-signed bootstrap envelope: the signer key is the `pub_key`
/// field inside the payload itself
///
/// Returns the verified signer key.
pub fn verify_self_signed(request: &SignedRequest) -> Result<[u8; 32], CoreError> {
    let value = payload_value(request)?;
    let PayloadAuth::PubKey(pub_key_hex) = detect_payload_auth(&value)? else {
        return Err(CoreError::BadEnvelope("payload must carry pub_key".to_string()));
    };
    let public_key = codec::hex_decode_array::<32>(&pub_key_hex)
        .map_err(|_| CoreError::BadEnvelope("pub_key must be 32 hex bytes".to_string()))?;

    verify_with_key(request, &public_key)?;
    Ok(public_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{b58_encode, b64url_encode, canonical_json};
    use ed25519_dalek::{Signer, SigningKey};
    use serde_json::json;

    fn signed_body(signing_key: &SigningKey, payload: &Value) -> SignedRequest {
        let json = canonical_json(payload).unwrap();
        let encoded = b64url_encode(json.as_bytes());
        let signature = b58_encode(&signing_key.sign(encoded.as_bytes()).to_bytes());
        SignedRequest { payload: encoded, signature }
    }

    #[test]
    fn parse_rejects_unknown_fields() {
        let body = br#"{"payload":"eyJ9","signature":"1","extra":true}"#;
        assert!(matches!(
            parse_signed_request(body),
            Err(CoreError::BadEnvelope(_))
        ));
    }

    #[test]
    fn parse_rejects_short_signature() {
        let body = br#"{"payload":"eyJ9","signature":"3mJr"}"#;
        assert!(parse_signed_request(body).is_err());
    }

    #[test]
    fn self_signed_round_trip() {
        let signing_key = SigningKey::from_bytes(&[5u8; 32]);
        let pub_key_hex = hex::encode(signing_key.verifying_key().to_bytes());
        let request = signed_body(
            &signing_key,
            &json!({"email": "me@x.org", "pub_key": pub_key_hex}),
        );

        let signer = verify_self_signed(&request).unwrap();
        assert_eq!(signer, signing_key.verifying_key().to_bytes());
    }

    #[test]
    fn self_signed_with_wrong_key_fails() {
        let signing_key = SigningKey::from_bytes(&[6u8; 32]);
        let other_pub = hex::encode(SigningKey::from_bytes(&[7u8; 32]).verifying_key().to_bytes());
        let request = signed_body(&signing_key, &json!({"pub_key": other_pub}));

        assert!(matches!(
            verify_self_signed(&request),
            Err(CoreError::BadSignature(_))
        ));
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let signing_key = SigningKey::from_bytes(&[8u8; 32]);
        let public = signing_key.verifying_key().to_bytes();
        let mut request = signed_body(&signing_key, &json!({"a": 1}));
        verify_with_key(&request, &public).unwrap();

        request.payload = b64url_encode(br#"{"a":2}"#);
        assert!(verify_with_key(&request, &public).is_err());
    }

    #[test]
    fn ambiguous_payload_auth_is_rejected() {
        let value = json!({"pub_key": "aa", "magiclink": "bb"});
        assert!(detect_payload_auth(&value).is_err());

        assert_eq!(
            detect_payload_auth(&json!({"magiclink": "bb"})).unwrap(),
            PayloadAuth::MagicLink("bb".to_string())
        );
        assert_eq!(detect_payload_auth(&json!({})).unwrap(), PayloadAuth::None);
    }
}
