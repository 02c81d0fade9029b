//! X25519 + Blake3-XOF + ChaCha20-Poly1305 sealing
//!
//! Seals small key-material blobs between an X25519 private key and a peer
//! public key. The context string is a wire constant shared with clients;
//! changing it is a versioned migration, not a refactor.

use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret as X25519StaticSecret};
use zeroize::Zeroizing;

use super::primitives::{aead_open, aead_seal, x25519_shared};
use crate::types::CoreError;

/// Wire-contract KDF context for sealed key material
pub const KEY_MATERIAL_CONTEXT: &[u8] = b"SharedSecretKeyMaterial_v1";

/// Derive cipher_key[32] + nonce[12] from the ECDH shared secret
///
/// Blake3 keyed hash with the shared secret as key, the context string as
/// message, XOF output split as key = out[0..32], nonce = out[32..44].
fn derive_cipher_and_nonce(shared: &[u8; 32]) -> (Zeroizing<[u8; 32]>, [u8; 12]) {
    let mut hasher = blake3::Hasher::new_keyed(shared);
    hasher.update(KEY_MATERIAL_CONTEXT);
    let mut xof_reader = hasher.finalize_xof();

    let mut derived = Zeroizing::new([0u8; 44]);
    xof_reader.fill(&mut derived[..]);

    let mut cipher_key = Zeroizing::new([0u8; 32]);
    cipher_key.copy_from_slice(&derived[0..32]);
    let mut nonce = [0u8; 12];
    nonce.copy_from_slice(&derived[32..44]);

    (cipher_key, nonce)
}

/// Seal a blob to a peer: ECDH → Blake3 KDF → ChaCha20-Poly1305
///
/// Output length is `plaintext.len() + 16` (Poly1305 tag).
pub fn seal(
    my_private: &X25519StaticSecret,
    their_public: &X25519PublicKey,
    plaintext: &[u8],
) -> Result<Vec<u8>, CoreError> {
    let shared = x25519_shared(my_private, their_public)?;
    let (cipher_key, nonce) = derive_cipher_and_nonce(&shared);
    aead_seal(&cipher_key, &nonce, plaintext)
}

/// Open a blob sealed with [`seal`] by the peer
///
/// The server side only seals; opening is the client's half of the
/// protocol and is exercised by the round-trip tests.
#[allow(dead_code)]
pub fn open(
    my_private: &X25519StaticSecret,
    their_public: &X25519PublicKey,
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CoreError> {
    let shared = x25519_shared(my_private, their_public)?;
    let (cipher_key, nonce) = derive_cipher_and_nonce(&shared);
    aead_open(&cipher_key, &nonce, ciphertext)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypair(byte: u8) -> (X25519StaticSecret, X25519PublicKey) {
        let secret = X25519StaticSecret::from([byte; 32]);
        let public = X25519PublicKey::from(&secret);
        (secret, public)
    }

    #[test]
    fn seal_open_round_trip_both_directions() {
        let (server_sk, server_pk) = keypair(41);
        let (client_sk, client_pk) = keypair(42);
        let key_material = [7u8; 44];

        let sealed = seal(&server_sk, &client_pk, &key_material).unwrap();
        assert_eq!(sealed.len(), 60);

        // Either side can open what the other sealed
        let opened = open(&client_sk, &server_pk, &sealed).unwrap();
        assert_eq!(&opened[..], &key_material[..]);
    }

    #[test]
    fn tampered_ciphertext_fails_to_open() {
        let (server_sk, _) = keypair(43);
        let (client_sk, client_pk) = keypair(44);
        let server_pk = X25519PublicKey::from(&server_sk);

        let mut sealed = seal(&server_sk, &client_pk, &[1u8; 32]).unwrap();
        sealed[10] ^= 0xff;
        assert!(matches!(
            open(&client_sk, &server_pk, &sealed),
            Err(CoreError::AeadFail)
        ));
    }

    #[test]
    fn wrong_peer_cannot_open() {
        let (server_sk, server_pk) = keypair(45);
        let (_, client_pk) = keypair(46);
        let (intruder_sk, _) = keypair(47);

        let sealed = seal(&server_sk, &client_pk, &[2u8; 44]).unwrap();
        assert!(open(&intruder_sk, &server_pk, &sealed).is_err());
    }
}
