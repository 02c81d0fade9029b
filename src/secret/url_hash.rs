//! Row addressing: the 40-byte URL hash
//!
//! A shared-secret row is addressed by an opaque 40-byte value whose
//! decrypted layout is `reference_id[16] ‖ role_user_id[16] ‖ checksum[8]`,
//! where the checksum is a keyed derivation over the first 32 bytes with the
//! role in its final byte. The encrypted form is both the URL token and the
//! database primary key, so validating an address *is* the access check:
//! a forged or foreign URL fails the checksum or the user binding and is
//! indistinguishable from a missing row.
//!
//! Encryption runs in two passes so every row gets its own keystreams:
//! the body (`reference_id ‖ user_id`) is masked under a key derived from
//! the row's checksum, then the checksum is masked under a key derived
//! from the already-masked body. Decryption unwinds in reverse order.
//! No two rows ever share a keystream, so one caller's known-plaintext
//! URL reveals nothing about anyone else's.

use tracing::debug;

use super::types::{SecretRole, CHECKSUM_LENGTH, REFERENCE_ID_LENGTH, ROW_HASH_LENGTH};
use crate::codec;
use crate::config::CoreConfig;
use crate::crypto::kdf::{derive_bytes, derive_cipher_and_nonce};
use crate::crypto::primitives::{ct_eq, stream_xor};
use crate::types::CoreError;

const BODY_CIPHER_CONTEXT: &[u8] = b"row-hash body cipher v1";
const TAIL_CIPHER_CONTEXT: &[u8] = b"row-hash tail cipher v1";
const CHECKSUM_CONTEXT: &[u8] = b"row-hash checksum v1";

const BODY_LENGTH: usize = ROW_HASH_LENGTH - CHECKSUM_LENGTH;

/// Components recovered from a valid row hash
pub struct RowAddress {
    pub reference_id: [u8; REFERENCE_ID_LENGTH],
    pub user_id: [u8; 16],
    pub role: SecretRole,
}

/// Build the encrypted 40-byte row hash for `(reference_id, user_id, role)`
pub fn build_row_hash(
    config: &CoreConfig,
    reference_id: &[u8; REFERENCE_ID_LENGTH],
    user_id: &[u8; 16],
    role: SecretRole,
) -> [u8; ROW_HASH_LENGTH] {
    let checksum = checksum_with_role(config, reference_id, user_id, role);

    let mut hash = [0u8; ROW_HASH_LENGTH];
    hash[0..16].copy_from_slice(reference_id);
    hash[16..32].copy_from_slice(user_id);
    hash[32..40].copy_from_slice(&checksum);

    // Pass 1: mask the body under the row's checksum
    let (key, nonce) = body_cipher(config, &checksum);
    stream_xor(&key, &nonce, &mut hash[0..BODY_LENGTH]);

    // Pass 2: mask the checksum under the masked body
    let mut masked_body = [0u8; BODY_LENGTH];
    masked_body.copy_from_slice(&hash[0..BODY_LENGTH]);
    let (key, nonce) = tail_cipher(config, &masked_body);
    stream_xor(&key, &nonce, &mut hash[BODY_LENGTH..]);

    debug!("🔗 Built row hash for {:?}", role);
    hash
}

/// Decrypt and validate a row hash; returns its components
///
/// Every failure mode collapses to `AccessDenied`.
pub fn parse_row_hash(
    config: &CoreConfig,
    encrypted: &[u8; ROW_HASH_LENGTH],
) -> Result<RowAddress, CoreError> {
    let mut plain = *encrypted;

    // Unwind pass 2: the masked body is in the clear part of the token
    let mut masked_body = [0u8; BODY_LENGTH];
    masked_body.copy_from_slice(&plain[0..BODY_LENGTH]);
    let (key, nonce) = tail_cipher(config, &masked_body);
    stream_xor(&key, &nonce, &mut plain[BODY_LENGTH..]);

    // Unwind pass 1: the recovered checksum keys the body mask
    let mut checksum = [0u8; CHECKSUM_LENGTH];
    checksum.copy_from_slice(&plain[BODY_LENGTH..]);
    let (key, nonce) = body_cipher(config, &checksum);
    stream_xor(&key, &nonce, &mut plain[0..BODY_LENGTH]);

    let mut reference_id = [0u8; REFERENCE_ID_LENGTH];
    reference_id.copy_from_slice(&plain[0..16]);
    let mut user_id = [0u8; 16];
    user_id.copy_from_slice(&plain[16..32]);

    let role = SecretRole::from_byte(plain[39])?;
    let expected = checksum_with_role(config, &reference_id, &user_id, role);
    if !ct_eq(&plain[32..40], &expected) {
        return Err(CoreError::AccessDenied);
    }

    Ok(RowAddress { reference_id, user_id, role })
}

/// Decode the Base58 URL form of a row hash
pub fn decode_url_hash(input: &str) -> Result<[u8; ROW_HASH_LENGTH], CoreError> {
    codec::b58_decode_array::<ROW_HASH_LENGTH>(input).map_err(|_| CoreError::AccessDenied)
}

/// Base58 URL form of a row hash
pub fn encode_url_hash(hash: &[u8; ROW_HASH_LENGTH]) -> String {
    codec::b58_encode(hash)
}

fn checksum_with_role(
    config: &CoreConfig,
    reference_id: &[u8; REFERENCE_ID_LENGTH],
    user_id: &[u8; 16],
    role: SecretRole,
) -> [u8; CHECKSUM_LENGTH] {
    let mut data = Vec::with_capacity(CHECKSUM_CONTEXT.len() + 32);
    data.extend_from_slice(CHECKSUM_CONTEXT);
    data.extend_from_slice(reference_id);
    data.extend_from_slice(user_id);

    let derived = derive_bytes(&config.row_hash_key, &data, CHECKSUM_LENGTH - 1);
    let mut checksum = [0u8; CHECKSUM_LENGTH];
    checksum[0..7].copy_from_slice(&derived);
    checksum[7] = role.as_byte();
    checksum
}

/// Body keystream, keyed per row by the checksum
fn body_cipher(
    config: &CoreConfig,
    checksum: &[u8; CHECKSUM_LENGTH],
) -> (zeroize::Zeroizing<[u8; 32]>, [u8; 12]) {
    let mut data = Vec::with_capacity(BODY_CIPHER_CONTEXT.len() + CHECKSUM_LENGTH);
    data.extend_from_slice(BODY_CIPHER_CONTEXT);
    data.extend_from_slice(checksum);
    derive_cipher_and_nonce(&config.row_hash_key, &data)
}

/// Tail keystream, keyed per row by the masked body
fn tail_cipher(
    config: &CoreConfig,
    masked_body: &[u8; BODY_LENGTH],
) -> (zeroize::Zeroizing<[u8; 32]>, [u8; 12]) {
    let mut data = Vec::with_capacity(TAIL_CIPHER_CONTEXT.len() + BODY_LENGTH);
    data.extend_from_slice(TAIL_CIPHER_CONTEXT);
    data.extend_from_slice(masked_body);
    derive_cipher_and_nonce(&config.row_hash_key, &data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::test_config;

    #[test]
    fn build_parse_round_trip_for_both_roles() {
        let config = test_config();
        let reference_id = [1u8; 16];
        let user_id = [2u8; 16];

        for role in [SecretRole::Sender, SecretRole::Receiver] {
            let hash = build_row_hash(&config, &reference_id, &user_id, role);
            let address = parse_row_hash(&config, &hash).unwrap();
            assert_eq!(address.reference_id, reference_id);
            assert_eq!(address.user_id, user_id);
            assert_eq!(address.role, role);
        }
    }

    #[test]
    fn sender_and_receiver_addresses_differ() {
        let config = test_config();
        let sender = build_row_hash(&config, &[1u8; 16], &[2u8; 16], SecretRole::Sender);
        let receiver = build_row_hash(&config, &[1u8; 16], &[3u8; 16], SecretRole::Receiver);
        assert_ne!(sender, receiver);
    }

    #[test]
    fn rows_never_share_a_keystream() {
        let config = test_config();
        let user_id = [2u8; 16];

        // Same user, same role, two creations: under a shared keystream the
        // user_id segment (bytes 16..32) would encrypt identically
        let hash_a = build_row_hash(&config, &[1u8; 16], &user_id, SecretRole::Receiver);
        let hash_b = build_row_hash(&config, &[9u8; 16], &user_id, SecretRole::Receiver);
        assert_ne!(hash_a[16..32], hash_b[16..32]);

        // Same role byte in both plaintext tails, so a shared tail keystream
        // would encrypt byte 39 identically too
        assert_ne!(hash_a[32..40], hash_b[32..40]);
    }

    #[test]
    fn tampered_hash_is_access_denied() {
        let config = test_config();
        let mut hash = build_row_hash(&config, &[1u8; 16], &[2u8; 16], SecretRole::Receiver);
        hash[5] ^= 0x01;
        assert!(matches!(
            parse_row_hash(&config, &hash),
            Err(CoreError::AccessDenied)
        ));
    }

    #[test]
    fn tampered_tail_is_access_denied() {
        let config = test_config();
        let mut hash = build_row_hash(&config, &[1u8; 16], &[2u8; 16], SecretRole::Sender);
        hash[36] ^= 0x01;
        assert!(parse_row_hash(&config, &hash).is_err());
    }

    #[test]
    fn foreign_key_cannot_forge_an_address() {
        let config = test_config();
        let mut other = test_config();
        other.row_hash_key = [0x99; 64];

        let hash = build_row_hash(&other, &[1u8; 16], &[2u8; 16], SecretRole::Sender);
        assert!(parse_row_hash(&config, &hash).is_err());
    }

    #[test]
    fn url_form_round_trips_at_roughly_55_chars() {
        let config = test_config();
        let hash = build_row_hash(&config, &[7u8; 16], &[8u8; 16], SecretRole::Sender);
        let url = encode_url_hash(&hash);
        assert!((50..=56).contains(&url.len()), "len={}", url.len());
        assert_eq!(decode_url_hash(&url).unwrap(), hash);
    }

    #[test]
    fn malformed_url_token_is_access_denied() {
        assert!(matches!(
            decode_url_hash("not!base58"),
            Err(CoreError::AccessDenied)
        ));
        assert!(decode_url_hash(&codec::b58_encode(&[1u8; 10])).is_err());
    }
}
