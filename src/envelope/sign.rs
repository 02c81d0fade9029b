//! Outbound response signing
//!
//! Responses are signed with a per-session Ed25519 key derived from the
//! server signing seed and the session identity `(user_id, client_pub)`.
//! Clients pin the matching public half from the `server_pub_key` field of
//! authentication responses. On 2/3-window rotation the response is signed
//! with the OLD session key while the payload carries the NEW
//! `server_pub_key`, so a man in the middle cannot swap keys unnoticed.

use ed25519_dalek::SigningKey;
use serde::Serialize;
use serde_json::Value;
use zeroize::Zeroizing;

use super::types::SignedResponse;
use crate::codec;
use crate::config::CoreConfig;
use crate::crypto::kdf::derive_bytes;
use crate::crypto::primitives::ed25519_sign;
use crate::types::CoreError;

/// Derive the per-session server signing key for `(user_id, client_pub)`
pub fn derive_session_signing_key(
    config: &CoreConfig,
    user_id: &[u8; 16],
    client_pub: &[u8; 32],
) -> SigningKey {
    let mut combined = [0u8; 48];
    combined[..16].copy_from_slice(user_id);
    combined[16..].copy_from_slice(client_pub);

    let derived = derive_bytes(&config.server_signing_seed, &combined, 32);
    let mut seed = Zeroizing::new([0u8; 32]);
    seed.copy_from_slice(&derived);
    SigningKey::from_bytes(&seed)
}

/// Public half of the per-session server key, hex-encoded for payloads
pub fn session_server_pub_hex(
    config: &CoreConfig,
    user_id: &[u8; 16],
    client_pub: &[u8; 32],
) -> String {
    let signing_key = derive_session_signing_key(config, user_id, client_pub);
    hex::encode(signing_key.verifying_key().to_bytes())
}

/// Sign a payload with the session key for `(user_id, client_pub)`
pub fn sign_payload<T>(
    config: &CoreConfig,
    user_id: &[u8; 16],
    client_pub: &[u8; 32],
    payload: &T,
) -> Result<SignedResponse, CoreError>
where
    T: Serialize,
{
    let value = serde_json::to_value(payload)
        .map_err(|e| CoreError::Internal(format!("serialize: {}", e)))?;
    sign_value(config, user_id, client_pub, value)
}

/// Sign a payload with `server_pub_key` injected (authentication responses)
pub fn sign_payload_with_server_key<T>(
    config: &CoreConfig,
    user_id: &[u8; 16],
    client_pub: &[u8; 32],
    payload: &T,
) -> Result<SignedResponse, CoreError>
where
    T: Serialize,
{
    let server_pub = session_server_pub_hex(config, user_id, client_pub);
    let value = inject_server_pub_key(payload, server_pub)?;
    sign_value(config, user_id, client_pub, value)
}

/// Sign a rotation response: the NEW `server_pub_key` (derived from the new
/// client key) travels in a payload signed with the OLD session key
pub fn sign_payload_with_rotation<T>(
    config: &CoreConfig,
    user_id: &[u8; 16],
    old_client_pub: &[u8; 32],
    new_client_pub: &[u8; 32],
    payload: &T,
) -> Result<SignedResponse, CoreError>
where
    T: Serialize,
{
    let new_server_pub = session_server_pub_hex(config, user_id, new_client_pub);
    let value = inject_server_pub_key(payload, new_server_pub)?;
    sign_value(config, user_id, old_client_pub, value)
}

fn inject_server_pub_key<T>(payload: &T, server_pub_hex: String) -> Result<Value, CoreError>
where
    T: Serialize,
{
    let mut value = serde_json::to_value(payload)
        .map_err(|e| CoreError::Internal(format!("serialize: {}", e)))?;
    let Value::Object(ref mut map) = value else {
        return Err(CoreError::Internal(
            "payload must be a JSON object to carry server_pub_key".to_string(),
        ));
    };
    map.insert("server_pub_key".to_string(), Value::String(server_pub_hex));
    Ok(value)
}

fn sign_value(
    config: &CoreConfig,
    user_id: &[u8; 16],
    client_pub: &[u8; 32],
    value: Value,
) -> Result<SignedResponse, CoreError> {
    let signing_key = derive_session_signing_key(config, user_id, client_pub);

    let json_string = codec::canonical_json(&value)?;
    let base64_payload = codec::b64url_encode(json_string.as_bytes());

    // The Base64URL string itself is the signed message, mirroring requests
    let signature = ed25519_sign(&signing_key, base64_payload.as_bytes());

    Ok(SignedResponse {
        payload: base64_payload,
        signature: codec::b58_encode(&signature),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::test_config;
    use crate::crypto::primitives::ed25519_verify;
    use serde_json::json;

    #[test]
    fn response_verifies_under_the_session_public_key() {
        let config = test_config();
        let user_id = [1u8; 16];
        let client_pub = [2u8; 32];

        let response = sign_payload(&config, &user_id, &client_pub, &json!({"status": "OK"})).unwrap();

        let server_pub_hex = session_server_pub_hex(&config, &user_id, &client_pub);
        let server_pub: [u8; 32] = hex::decode(server_pub_hex).unwrap().try_into().unwrap();
        let signature: [u8; 64] = bs58::decode(&response.signature)
            .into_vec()
            .unwrap()
            .try_into()
            .unwrap();
        assert!(ed25519_verify(&server_pub, response.payload.as_bytes(), &signature));
    }

    #[test]
    fn session_keys_differ_per_client_key() {
        let config = test_config();
        let user_id = [1u8; 16];
        assert_ne!(
            session_server_pub_hex(&config, &user_id, &[2u8; 32]),
            session_server_pub_hex(&config, &user_id, &[3u8; 32])
        );
    }

    #[test]
    fn server_pub_key_is_injected_into_the_signed_payload() {
        let config = test_config();
        let response =
            sign_payload_with_server_key(&config, &[4u8; 16], &[5u8; 32], &json!({"a": 1})).unwrap();

        let json = codec::b64url_decode_utf8(&response.payload).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            value.get("server_pub_key").and_then(|v| v.as_str()),
            Some(session_server_pub_hex(&config, &[4u8; 16], &[5u8; 32]).as_str())
        );
    }

    #[test]
    fn rotation_signs_with_old_key_and_embeds_new_key() {
        let config = test_config();
        let user_id = [6u8; 16];
        let old_pub = [7u8; 32];
        let new_pub = [8u8; 32];

        let response =
            sign_payload_with_rotation(&config, &user_id, &old_pub, &new_pub, &json!({"a": 1}))
                .unwrap();

        // Payload carries the NEW server key
        let json = codec::b64url_decode_utf8(&response.payload).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            value.get("server_pub_key").and_then(|v| v.as_str()),
            Some(session_server_pub_hex(&config, &user_id, &new_pub).as_str())
        );

        // Signature verifies under the OLD session key
        let old_server_hex = session_server_pub_hex(&config, &user_id, &old_pub);
        let old_server: [u8; 32] = hex::decode(old_server_hex).unwrap().try_into().unwrap();
        let signature: [u8; 64] = bs58::decode(&response.signature)
            .into_vec()
            .unwrap()
            .try_into()
            .unwrap();
        assert!(ed25519_verify(&old_server, response.payload.as_bytes(), &signature));
    }
}
