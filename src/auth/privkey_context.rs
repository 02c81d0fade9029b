//! Per-user private-key context
//!
//! Each user owns an opaque 32-byte blob of server-held key material,
//! created on first login, AEAD-sealed at rest under a subkey of the
//! user-id master key, and delivered to the client at redemption sealed to
//! their one-shot X25519 key.

use x25519_dalek::PublicKey as X25519PublicKey;
use zeroize::Zeroizing;

use crate::config::CoreConfig;
use crate::crypto::ecdh;
use crate::crypto::kdf::derive_cipher_and_nonce;
use crate::crypto::primitives::{aead_open, aead_seal, rand_array};
use crate::storage;
use crate::types::CoreError;

/// Plaintext context length
pub const CONTEXT_LENGTH: usize = 32;

const AT_REST_CONTEXT: &[u8] = b"privkey-context v1";

/// One-shot delivery target for the sealed context
///
/// Wraps the client's X25519 public key so it can be consumed exactly once:
/// sealing takes the bundle by value.
pub struct OneShotX25519(pub [u8; 32]);

/// Fetch the user's context, creating it (atomically) on first login
pub fn get_or_create_context(
    config: &CoreConfig,
    user_id: &[u8; 16],
    now: i64,
) -> Result<Zeroizing<[u8; 32]>, CoreError> {
    if let Some(blob) = storage::users::fetch_privkey_blob(config, user_id)? {
        return open_at_rest(config, user_id, &blob);
    }

    let context = Zeroizing::new(rand_array::<CONTEXT_LENGTH>()?);
    let sealed = seal_at_rest(config, user_id, &context)?;
    storage::users::insert_user(config, user_id, &sealed, now)?;

    // INSERT OR IGNORE: a concurrent first login may have won; re-read so
    // both requests hand out the same context
    let blob = storage::users::fetch_privkey_blob(config, user_id)?
        .ok_or_else(|| CoreError::Internal("user row vanished after insert".to_string()))?;
    open_at_rest(config, user_id, &blob)
}

/// Seal the context to the client's one-shot X25519 key (consumes the key)
pub fn seal_context_for_client(
    config: &CoreConfig,
    context: &Zeroizing<[u8; 32]>,
    client_key: OneShotX25519,
) -> Result<Vec<u8>, CoreError> {
    let their_public = X25519PublicKey::from(client_key.0);
    ecdh::seal(&config.server_x25519_secret(), &their_public, &context[..])
}

fn seal_at_rest(
    config: &CoreConfig,
    user_id: &[u8; 16],
    context: &Zeroizing<[u8; 32]>,
) -> Result<Vec<u8>, CoreError> {
    let (key, nonce) = at_rest_cipher(config, user_id);
    aead_seal(&key, &nonce, &context[..])
}

fn open_at_rest(
    config: &CoreConfig,
    user_id: &[u8; 16],
    blob: &[u8],
) -> Result<Zeroizing<[u8; 32]>, CoreError> {
    let (key, nonce) = at_rest_cipher(config, user_id);
    let plaintext = aead_open(&key, &nonce, blob)?;
    if plaintext.len() != CONTEXT_LENGTH {
        return Err(CoreError::Internal("bad privkey context length".to_string()));
    }
    let mut context = Zeroizing::new([0u8; CONTEXT_LENGTH]);
    context.copy_from_slice(&plaintext);
    Ok(context)
}

fn at_rest_cipher(
    config: &CoreConfig,
    user_id: &[u8; 16],
) -> (Zeroizing<[u8; 32]>, [u8; 12]) {
    let mut data = Vec::with_capacity(AT_REST_CONTEXT.len() + 16);
    data.extend_from_slice(AT_REST_CONTEXT);
    data.extend_from_slice(user_id);
    derive_cipher_and_nonce(&config.user_id_hmac_key, &data)
}
