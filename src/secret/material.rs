//! Per-secret key material and the two encryption layers
//!
//! Layer 2 (confidentiality of the record): ChaCha20-Poly1305 under a fresh
//! 44-byte key material split as nonce[12] ‖ cipher_key[32].
//!
//! Layer 1 (key material at rest): a length-preserving ChaCha20 wrap keyed
//! per row from the row-hash master key and the row's encrypted hash, so
//! the two role rows of one secret wrap the same material differently.
//! Integrity is already guaranteed by layer 2's tag.

use tracing::debug;
use zeroize::Zeroizing;

use super::types::{
    SecretRole, KEY_MATERIAL_LENGTH, NONCE_LENGTH, OTP_LENGTH, REFERENCE_ID_LENGTH,
    ROW_HASH_LENGTH, UNLIMITED_READS,
};
use crate::config::CoreConfig;
use crate::crypto::kdf::derive_cipher_and_nonce;
use crate::crypto::primitives::{aead_open, aead_seal, rand_array, rand_range_u32, stream_xor};
use crate::types::CoreError;

const WRAP_CONTEXT: &[u8] = b"key-material wrap v1";

/// Fresh random key material: nonce[12] ‖ cipher_key[32]
pub fn generate_key_material() -> Result<Zeroizing<[u8; KEY_MATERIAL_LENGTH]>, CoreError> {
    Ok(Zeroizing::new(rand_array::<KEY_MATERIAL_LENGTH>()?))
}

/// Fresh random reference id
pub fn generate_reference_id() -> Result<[u8; REFERENCE_ID_LENGTH], CoreError> {
    rand_array::<REFERENCE_ID_LENGTH>()
}

/// Fresh 9-digit OTP
pub fn generate_otp() -> Result<Zeroizing<String>, CoreError> {
    let value = rand_range_u32(100_000_000, 999_999_999)?;
    debug_assert_eq!(value.to_string().len(), OTP_LENGTH);
    Ok(Zeroizing::new(value.to_string()))
}

/// Initial read budget for a role
pub fn initial_pending_reads(role: SecretRole, max_reads: i64) -> i64 {
    match role {
        SecretRole::Sender => UNLIMITED_READS,
        SecretRole::Receiver => max_reads,
    }
}

fn split_key_material(
    key_material: &[u8; KEY_MATERIAL_LENGTH],
) -> (Zeroizing<[u8; 32]>, [u8; 12]) {
    let mut nonce = [0u8; NONCE_LENGTH];
    nonce.copy_from_slice(&key_material[0..NONCE_LENGTH]);
    let mut cipher_key = Zeroizing::new([0u8; 32]);
    cipher_key.copy_from_slice(&key_material[NONCE_LENGTH..KEY_MATERIAL_LENGTH]);
    (cipher_key, nonce)
}

/// Seal a serialized record under the key material (layer 2)
pub fn seal_record(
    key_material: &[u8; KEY_MATERIAL_LENGTH],
    record_bytes: &[u8],
) -> Result<Vec<u8>, CoreError> {
    let (cipher_key, nonce) = split_key_material(key_material);
    let ciphertext = aead_seal(&cipher_key, &nonce, record_bytes)?;
    debug!("🔒 Sealed secret record ({} bytes)", ciphertext.len());
    Ok(ciphertext)
}

/// Open a sealed record (layer 2)
pub fn open_record(
    key_material: &[u8; KEY_MATERIAL_LENGTH],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CoreError> {
    let (cipher_key, nonce) = split_key_material(key_material);
    aead_open(&cipher_key, &nonce, ciphertext)
}

/// Wrap key material for storage inside its row (layer 1)
pub fn wrap_key_material(
    config: &CoreConfig,
    row_hash: &[u8; ROW_HASH_LENGTH],
    key_material: &[u8; KEY_MATERIAL_LENGTH],
) -> [u8; KEY_MATERIAL_LENGTH] {
    let mut wrapped = *key_material;
    let (key, nonce) = wrap_cipher(config, row_hash);
    stream_xor(&key, &nonce, &mut wrapped);
    wrapped
}

/// Unwrap key material fetched from a row (layer 1)
pub fn unwrap_key_material(
    config: &CoreConfig,
    row_hash: &[u8; ROW_HASH_LENGTH],
    wrapped: &[u8],
) -> Result<Zeroizing<[u8; KEY_MATERIAL_LENGTH]>, CoreError> {
    if wrapped.len() != KEY_MATERIAL_LENGTH {
        return Err(CoreError::Internal("bad wrapped key material length".to_string()));
    }
    let mut key_material = Zeroizing::new([0u8; KEY_MATERIAL_LENGTH]);
    key_material.copy_from_slice(wrapped);
    let (key, nonce) = wrap_cipher(config, row_hash);
    stream_xor(&key, &nonce, &mut key_material[..]);
    Ok(key_material)
}

fn wrap_cipher(
    config: &CoreConfig,
    row_hash: &[u8; ROW_HASH_LENGTH],
) -> (Zeroizing<[u8; 32]>, [u8; 12]) {
    let mut data = Vec::with_capacity(WRAP_CONTEXT.len() + ROW_HASH_LENGTH);
    data.extend_from_slice(WRAP_CONTEXT);
    data.extend_from_slice(row_hash);
    derive_cipher_and_nonce(&config.row_hash_key, &data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::test_config;

    #[test]
    fn record_seal_open_round_trip() {
        let key_material = [5u8; KEY_MATERIAL_LENGTH];
        let sealed = seal_record(&key_material, b"the record").unwrap();
        assert_eq!(sealed.len(), b"the record".len() + 16);
        let opened = open_record(&key_material, &sealed).unwrap();
        assert_eq!(&opened[..], b"the record");
    }

    #[test]
    fn record_tamper_is_aead_fail() {
        let key_material = [5u8; KEY_MATERIAL_LENGTH];
        let mut sealed = seal_record(&key_material, b"the record").unwrap();
        sealed[3] ^= 0x01;
        assert!(matches!(
            open_record(&key_material, &sealed),
            Err(CoreError::AeadFail)
        ));
    }

    #[test]
    fn wrap_is_row_bound() {
        let config = test_config();
        let key_material = [6u8; KEY_MATERIAL_LENGTH];
        let row_a = [1u8; ROW_HASH_LENGTH];
        let row_b = [2u8; ROW_HASH_LENGTH];

        let wrapped_a = wrap_key_material(&config, &row_a, &key_material);
        let wrapped_b = wrap_key_material(&config, &row_b, &key_material);
        assert_ne!(wrapped_a, wrapped_b);

        let unwrapped = unwrap_key_material(&config, &row_a, &wrapped_a).unwrap();
        assert_eq!(&unwrapped[..], &key_material[..]);

        // Unwrapping under the wrong row yields garbage, caught by layer 2
        let crossed = unwrap_key_material(&config, &row_b, &wrapped_a).unwrap();
        assert_ne!(&crossed[..], &key_material[..]);
    }

    #[test]
    fn otp_is_nine_decimal_digits() {
        for _ in 0..16 {
            let otp = generate_otp().unwrap();
            assert_eq!(otp.len(), OTP_LENGTH);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
            assert_ne!(otp.as_bytes()[0], b'0');
        }
    }

    #[test]
    fn pending_reads_follow_the_role() {
        assert_eq!(initial_pending_reads(SecretRole::Sender, 3), UNLIMITED_READS);
        assert_eq!(initial_pending_reads(SecretRole::Receiver, 3), 3);
    }
}
