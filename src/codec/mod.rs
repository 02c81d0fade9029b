//! Canonical codec: deterministic JSON, Base64URL, Base58, hex
//!
//! The canonical JSON byte sequence is the signing input for every envelope,
//! so frontend and backend must produce identical serializations: object
//! keys recursively sorted by Unicode code point, arrays in order, compact
//! output, shortest round-trip numbers.

use std::collections::HashMap;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::CoreError;

/// Serialize a payload to canonical JSON
pub fn canonical_json<T>(payload: &T) -> Result<String, CoreError>
where
    T: Serialize,
{
    let value = serde_json::to_value(payload)
        .map_err(|e| CoreError::Internal(format!("serialize: {}", e)))?;
    serde_json::to_string(&sort_json_keys(value))
        .map_err(|e| CoreError::Internal(format!("serialize: {}", e)))
}

/// Recursively sort JSON object keys; arrays keep their order
pub fn sort_json_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, sort_json_keys(v)))
                    .collect(),
            )
        }
        Value::Array(array) => Value::Array(array.into_iter().map(sort_json_keys).collect()),
        other => other,
    }
}

/// Canonical serialization of query parameters: a sorted JSON object of
/// strings, identical to what the client signs
pub fn canonical_query(params: &HashMap<String, String>) -> Result<String, CoreError> {
    let mut map = serde_json::Map::new();
    for (key, value) in params {
        map.insert(key.clone(), Value::String(value.clone()));
    }
    serde_json::to_string(&sort_json_keys(Value::Object(map)))
        .map_err(|e| CoreError::Internal(format!("serialize: {}", e)))
}

/// Base64URL without padding (RFC 4648 §5)
pub fn b64url_encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode Base64URL, tolerating both padded and unpadded input
pub fn b64url_decode(input: &str) -> Result<Vec<u8>, CoreError> {
    URL_SAFE_NO_PAD
        .decode(input.trim_end_matches('='))
        .map_err(|e| CoreError::InvalidEncoding(format!("base64url: {}", e)))
}

/// Decode a Base64URL payload back to its UTF-8 JSON string
pub fn b64url_decode_utf8(input: &str) -> Result<String, CoreError> {
    let bytes = b64url_decode(input)?;
    String::from_utf8(bytes).map_err(|e| CoreError::InvalidEncoding(format!("utf-8: {}", e)))
}

/// Decode Base64URL and deserialize the JSON payload into a typed structure
pub fn b64url_decode_json<T>(input: &str) -> Result<T, CoreError>
where
    T: for<'de> Deserialize<'de>,
{
    let json_string = b64url_decode_utf8(input)?;
    serde_json::from_str(&json_string)
        .map_err(|e| CoreError::BadEnvelope(format!("payload json: {}", e)))
}

/// Base58 (Bitcoin alphabet)
pub fn b58_encode(bytes: &[u8]) -> String {
    bs58::encode(bytes).into_string()
}

pub fn b58_decode(input: &str) -> Result<Vec<u8>, CoreError> {
    bs58::decode(input)
        .into_vec()
        .map_err(|e| CoreError::InvalidEncoding(format!("base58: {}", e)))
}

/// Decode Base58 into a fixed-size array, rejecting any other length
pub fn b58_decode_array<const N: usize>(input: &str) -> Result<[u8; N], CoreError> {
    let bytes = b58_decode(input)?;
    bytes
        .try_into()
        .map_err(|_| CoreError::InvalidEncoding(format!("base58: expected {} bytes", N)))
}

/// Decode a hex string into a fixed-size array
pub fn hex_decode_array<const N: usize>(input: &str) -> Result<[u8; N], CoreError> {
    let bytes =
        hex::decode(input).map_err(|e| CoreError::InvalidEncoding(format!("hex: {}", e)))?;
    bytes
        .try_into()
        .map_err(|_| CoreError::InvalidEncoding(format!("hex: expected {} bytes", N)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_json_sorts_keys_recursively() {
        let a = sort_json_keys(json!({"b": 1, "a": {"z": 2, "y": [{"q": 3, "p": 4}]}}));
        let b = sort_json_keys(json!({"a": {"y": [{"p": 4, "q": 3}], "z": 2}, "b": 1}));
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn canonical_json_is_a_fixed_point() {
        let once = canonical_json(&json!({"b": [3, 1, 2], "a": "x"})).unwrap();
        let value: Value = serde_json::from_str(&once).unwrap();
        let twice = canonical_json(&value).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn canonical_json_has_no_whitespace() {
        let s = canonical_json(&json!({"a": 1, "b": "two"})).unwrap();
        assert_eq!(s, r#"{"a":1,"b":"two"}"#);
    }

    #[test]
    fn b64url_round_trip_and_alphabet() {
        let cases: &[&[u8]] = &[b"", b"f", b"fo", b"foo", b"foob", &[0xff, 0xfe, 0xfd, 0x01]];
        for bytes in cases {
            let encoded = b64url_encode(bytes);
            assert!(!encoded.contains('+') && !encoded.contains('/') && !encoded.contains('='));
            assert_eq!(b64url_decode(&encoded).unwrap(), *bytes);
        }
    }

    #[test]
    fn b64url_decode_tolerates_padding() {
        // "fo" encodes to "Zm8" unpadded, "Zm8=" padded
        assert_eq!(b64url_decode("Zm8").unwrap(), b"fo");
        assert_eq!(b64url_decode("Zm8=").unwrap(), b"fo");
    }

    #[test]
    fn b58_leading_zero_bytes_map_to_leading_ones() {
        let bytes = [0u8, 0, 1, 2, 3];
        let encoded = b58_encode(&bytes);
        assert!(encoded.starts_with("11"));
        assert_eq!(b58_decode(&encoded).unwrap(), bytes);
    }

    #[test]
    fn b58_decode_array_rejects_wrong_length() {
        let encoded = b58_encode(&[7u8; 16]);
        assert!(b58_decode_array::<16>(&encoded).is_ok());
        assert!(b58_decode_array::<32>(&encoded).is_err());
    }

    #[test]
    fn canonical_query_matches_sorted_object() {
        let mut params = HashMap::new();
        params.insert("hash".to_string(), "abc".to_string());
        params.insert("after".to_string(), "1".to_string());
        assert_eq!(
            canonical_query(&params).unwrap(),
            r#"{"after":"1","hash":"abc"}"#
        );
    }
}
