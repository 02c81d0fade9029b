//! Crypto primitives adapter
//!
//! The only place that talks to the cipher crates directly. Everything above
//! composes these operations; nothing above re-implements them.

use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;
use chacha20poly1305::{aead::Aead, ChaCha20Poly1305, Key, KeyInit, Nonce};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::TryRngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret as X25519StaticSecret};
use zeroize::Zeroizing;

use crate::types::CoreError;

type HmacSha256 = Hmac<Sha256>;

/// Sign a message with Ed25519 (RFC 8032, deterministic)
pub fn ed25519_sign(signing_key: &SigningKey, message: &[u8]) -> [u8; 64] {
    signing_key.sign(message).to_bytes()
}

/// Verify an Ed25519 signature; false for malformed keys as well
pub fn ed25519_verify(public_key: &[u8; 32], message: &[u8], signature: &[u8; 64]) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    let signature = Signature::from_bytes(signature);
    verifying_key.verify(message, &signature).is_ok()
}

/// X25519 scalar multiplication, rejecting non-contributory results
///
/// An all-zero shared secret means the peer supplied a low-order point.
pub fn x25519_shared(
    my_private: &X25519StaticSecret,
    their_public: &X25519PublicKey,
) -> Result<Zeroizing<[u8; 32]>, CoreError> {
    let shared = my_private.diffie_hellman(their_public);
    if !shared.was_contributory() {
        return Err(CoreError::EcdhRejected);
    }
    Ok(Zeroizing::new(*shared.as_bytes()))
}

/// ChaCha20-Poly1305 seal: ciphertext with a 16-byte tag appended
pub fn aead_seal(key: &[u8; 32], nonce: &[u8; 12], plaintext: &[u8]) -> Result<Vec<u8>, CoreError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| CoreError::Internal("aead seal".to_string()))
}

/// ChaCha20-Poly1305 open with constant-time tag check
pub fn aead_open(
    key: &[u8; 32],
    nonce: &[u8; 12],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CoreError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| CoreError::AeadFail)
}

/// Length-preserving ChaCha20 keystream transform (at-rest wrapping where a
/// MAC already exists at another layer)
pub fn stream_xor(key: &[u8; 32], nonce: &[u8; 12], buffer: &mut [u8]) {
    let mut cipher = ChaCha20::new(key.into(), nonce.into());
    cipher.apply_keystream(buffer);
}

/// HMAC-SHA-256
pub fn hmac_sha256(key: &[u8], message: &[u8]) -> [u8; 32] {
    // HMAC accepts keys of any length, so construction cannot fail
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key).expect("HMAC key length");
    mac.update(message);
    mac.finalize().into_bytes().into()
}

/// Constant-time byte equality (length mismatch yields false)
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Fill a fixed-size array from the OS CSPRNG
pub fn rand_array<const N: usize>() -> Result<[u8; N], CoreError> {
    let mut buffer = [0u8; N];
    OsRng
        .try_fill_bytes(&mut buffer)
        .map_err(|e| CoreError::Internal(format!("csprng: {}", e)))?;
    Ok(buffer)
}

/// Uniform random integer in `[low, high]` via rejection sampling
pub fn rand_range_u32(low: u32, high: u32) -> Result<u32, CoreError> {
    debug_assert!(low < high);
    let span = high - low + 1;
    let zone = u32::MAX - (u32::MAX % span);
    loop {
        let draw = u32::from_be_bytes(rand_array::<4>()?);
        if draw < zone {
            return Ok(low + draw % span);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ed25519_sign_verify_round_trip() {
        let signing_key = SigningKey::from_bytes(&[7u8; 32]);
        let public = signing_key.verifying_key().to_bytes();
        let signature = ed25519_sign(&signing_key, b"message");

        assert!(ed25519_verify(&public, b"message", &signature));
        assert!(!ed25519_verify(&public, b"other message", &signature));

        let other_public = SigningKey::from_bytes(&[8u8; 32]).verifying_key().to_bytes();
        assert!(!ed25519_verify(&other_public, b"message", &signature));
    }

    #[test]
    fn ed25519_signing_is_deterministic() {
        let signing_key = SigningKey::from_bytes(&[9u8; 32]);
        assert_eq!(
            ed25519_sign(&signing_key, b"same"),
            ed25519_sign(&signing_key, b"same")
        );
    }

    #[test]
    fn x25519_agreement_is_symmetric() {
        let a = X25519StaticSecret::from([11u8; 32]);
        let b = X25519StaticSecret::from([12u8; 32]);
        let a_pub = X25519PublicKey::from(&a);
        let b_pub = X25519PublicKey::from(&b);

        let ab = x25519_shared(&a, &b_pub).unwrap();
        let ba = x25519_shared(&b, &a_pub).unwrap();
        assert_eq!(&ab[..], &ba[..]);
    }

    #[test]
    fn x25519_rejects_low_order_point() {
        let secret = X25519StaticSecret::from([13u8; 32]);
        // The identity point forces an all-zero shared secret
        let low_order = X25519PublicKey::from([0u8; 32]);
        assert!(matches!(
            x25519_shared(&secret, &low_order),
            Err(CoreError::EcdhRejected)
        ));
    }

    #[test]
    fn aead_round_trip_and_tamper_detection() {
        let key = [21u8; 32];
        let nonce = [22u8; 12];
        let mut ciphertext = aead_seal(&key, &nonce, b"top secret").unwrap();
        assert_eq!(ciphertext.len(), b"top secret".len() + 16);

        let opened = aead_open(&key, &nonce, &ciphertext).unwrap();
        assert_eq!(&opened[..], b"top secret");

        ciphertext[0] ^= 0x01;
        assert!(matches!(
            aead_open(&key, &nonce, &ciphertext),
            Err(CoreError::AeadFail)
        ));
    }

    #[test]
    fn stream_xor_is_an_involution() {
        let key = [31u8; 32];
        let nonce = [32u8; 12];
        let mut buffer = *b"forty-byte-ish working buffer for xor!!!";
        let original = buffer;

        stream_xor(&key, &nonce, &mut buffer);
        assert_ne!(buffer, original);
        stream_xor(&key, &nonce, &mut buffer);
        assert_eq!(buffer, original);
    }

    #[test]
    fn hmac_is_deterministic_and_key_sensitive() {
        assert_eq!(hmac_sha256(b"k", b"m"), hmac_sha256(b"k", b"m"));
        assert_ne!(hmac_sha256(b"k", b"m"), hmac_sha256(b"k2", b"m"));
    }

    #[test]
    fn ct_eq_handles_length_mismatch() {
        assert!(ct_eq(b"abc", b"abc"));
        assert!(!ct_eq(b"abc", b"abd"));
        assert!(!ct_eq(b"abc", b"abcd"));
    }

    #[test]
    fn rand_range_stays_in_bounds() {
        for _ in 0..32 {
            let v = rand_range_u32(100_000_000, 999_999_999).unwrap();
            assert!((100_000_000..=999_999_999).contains(&v));
        }
    }
}
