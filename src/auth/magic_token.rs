//! Magic tokens and their stored bindings
//!
//! A magic token is a 32-byte random identifier delivered out of band. The
//! database never sees it: rows are indexed by a keyed derivation of the
//! identifier and hold the session binding AEAD-sealed under a key that is
//! itself derived from the identifier, so possession of the emailed link is
//! required both to *find* and to *open* the binding.

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::config::CoreConfig;
use crate::crypto::kdf::{derive_bytes, derive_cipher_and_nonce};
use crate::crypto::primitives::{aead_open, aead_seal, rand_array};
use crate::types::CoreError;

/// Raw magic-token identifier length
pub const MAGIC_ID_LENGTH: usize = 32;

const INDEX_CONTEXT: &[u8] = b"magic-link index v1";
const BINDING_CONTEXT: &[u8] = b"magic-link binding v1";

/// Everything a magic token binds at issuance
///
/// The Ed25519 key authenticates the redemption request; the X25519 key
/// receives the sealed private-key context and is used exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MagicBinding {
    /// Derived user id (hex, 16 bytes)
    pub user_id: String,
    /// Session Ed25519 public key (hex, 32 bytes)
    pub ed25519_pub: String,
    /// One-shot X25519 public key (hex, 32 bytes)
    pub x25519_pub: String,
    /// Host the magic link points back to and the cookie is scoped to
    pub ui_host: String,
    /// Post-auth redirect target
    pub next: String,
    /// Email language tag, carried opaquely
    pub email_lang: String,
    /// Issuance time (epoch seconds)
    pub created_at: i64,
}

impl MagicBinding {
    pub fn user_id_bytes(&self) -> Result<[u8; 16], CoreError> {
        codec::hex_decode_array::<16>(&self.user_id)
    }

    pub fn ed25519_pub_bytes(&self) -> Result<[u8; 32], CoreError> {
        codec::hex_decode_array::<32>(&self.ed25519_pub)
    }

    pub fn x25519_pub_bytes(&self) -> Result<[u8; 32], CoreError> {
        codec::hex_decode_array::<32>(&self.x25519_pub)
    }
}

/// Generate a fresh 32-byte magic identifier
pub fn generate_magic_id() -> Result<[u8; MAGIC_ID_LENGTH], CoreError> {
    rand_array::<MAGIC_ID_LENGTH>()
}

/// The magic link placed in the email body
pub fn magic_link_url(ui_host: &str, magic_id: &[u8; MAGIC_ID_LENGTH]) -> String {
    format!("https://{}/?magiclink={}", ui_host, codec::b58_encode(magic_id))
}

/// Database index for a magic identifier (keyed, 16 bytes)
pub fn token_ref(config: &CoreConfig, magic_id: &[u8; MAGIC_ID_LENGTH]) -> [u8; 16] {
    let mut data = Vec::with_capacity(INDEX_CONTEXT.len() + MAGIC_ID_LENGTH);
    data.extend_from_slice(INDEX_CONTEXT);
    data.extend_from_slice(magic_id);

    let derived = derive_bytes(&config.magic_link_hmac_key, &data, 16);
    let mut index = [0u8; 16];
    index.copy_from_slice(&derived);
    index
}

/// Seal a binding under a key derived from the magic identifier
pub fn seal_binding(
    config: &CoreConfig,
    magic_id: &[u8; MAGIC_ID_LENGTH],
    binding: &MagicBinding,
) -> Result<Vec<u8>, CoreError> {
    let plaintext = codec::canonical_json(binding)?;
    let (key, nonce) = binding_cipher(config, magic_id);
    aead_seal(&key, &nonce, plaintext.as_bytes())
}

/// Open a sealed binding; any failure is indistinguishable from a missing
/// token at the caller
pub fn open_binding(
    config: &CoreConfig,
    magic_id: &[u8; MAGIC_ID_LENGTH],
    ciphertext: &[u8],
) -> Result<MagicBinding, CoreError> {
    let (key, nonce) = binding_cipher(config, magic_id);
    let plaintext = aead_open(&key, &nonce, ciphertext)?;
    serde_json::from_slice(&plaintext)
        .map_err(|e| CoreError::Internal(format!("binding json: {}", e)))
}

fn binding_cipher(
    config: &CoreConfig,
    magic_id: &[u8; MAGIC_ID_LENGTH],
) -> (zeroize::Zeroizing<[u8; 32]>, [u8; 12]) {
    let mut data = Vec::with_capacity(BINDING_CONTEXT.len() + MAGIC_ID_LENGTH);
    data.extend_from_slice(BINDING_CONTEXT);
    data.extend_from_slice(magic_id);
    derive_cipher_and_nonce(&config.magic_link_hmac_key, &data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::test_config;

    fn binding() -> MagicBinding {
        MagicBinding {
            user_id: hex::encode([1u8; 16]),
            ed25519_pub: hex::encode([2u8; 32]),
            x25519_pub: hex::encode([3u8; 32]),
            ui_host: "app.example.com".to_string(),
            next: "/inbox".to_string(),
            email_lang: "en".to_string(),
            created_at: 1_700_000_000,
        }
    }

    #[test]
    fn binding_seal_open_round_trip() {
        let config = test_config();
        let magic_id = [9u8; 32];

        let sealed = seal_binding(&config, &magic_id, &binding()).unwrap();
        let opened = open_binding(&config, &magic_id, &sealed).unwrap();
        assert_eq!(opened, binding());
    }

    #[test]
    fn wrong_magic_id_cannot_open_the_binding() {
        let config = test_config();
        let sealed = seal_binding(&config, &[9u8; 32], &binding()).unwrap();
        assert!(matches!(
            open_binding(&config, &[10u8; 32], &sealed),
            Err(CoreError::AeadFail)
        ));
    }

    #[test]
    fn token_ref_is_deterministic_and_id_sensitive() {
        let config = test_config();
        assert_eq!(token_ref(&config, &[1u8; 32]), token_ref(&config, &[1u8; 32]));
        assert_ne!(token_ref(&config, &[1u8; 32]), token_ref(&config, &[2u8; 32]));
    }

    #[test]
    fn link_url_embeds_base58_id() {
        let magic_id = [7u8; 32];
        let url = magic_link_url("localhost", &magic_id);
        assert!(url.starts_with("https://localhost/?magiclink="));
        let encoded = url.rsplit('=').next().unwrap();
        assert_eq!(codec::b58_decode_array::<32>(encoded).unwrap(), magic_id);
    }
}
