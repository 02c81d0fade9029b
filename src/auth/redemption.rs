//! Magic-link redemption
//!
//! Exchanges a magic token for the session credentials. Every failure on
//! this path — unknown token, expired, already consumed, wrong signer, lost
//! consume race — produces the same response shape and status, so the
//! endpoint cannot be used as an oracle.

use tracing::{info, warn};

use super::magic_token::{self, MAGIC_ID_LENGTH};
use super::privkey_context::{self, OneShotX25519};
use super::user_id::user_id_to_username;
use crate::codec;
use crate::config::CoreConfig;
use crate::envelope::verify::{detect_payload_auth, verify_with_key, PayloadAuth};
use crate::envelope::SignedRequest;
use crate::storage;
use crate::token::authority::{mint_access, mint_refresh};
use crate::types::CoreError;

/// Everything the handler needs to build the redemption response
pub struct RedeemedSession {
    pub user_id: [u8; 16],
    pub username: String,
    pub session_pub: [u8; 32],
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_expires_at: i64,
    pub ui_host: String,
    pub next: String,
    /// Private-key context sealed to the client's one-shot X25519 key,
    /// Base64URL-encoded
    pub encrypted_privkey_context: String,
}

/// The uniform redemption failure
fn uniform_failure() -> CoreError {
    CoreError::BadEnvelope("magic link".to_string())
}

/// Redeem a magic link presented in a signed envelope
pub fn redeem(
    config: &CoreConfig,
    request: &SignedRequest,
    now: i64,
) -> Result<RedeemedSession, CoreError> {
    let value = crate::envelope::verify::payload_value(request).map_err(|_| uniform_failure())?;
    let PayloadAuth::MagicLink(token_b58) =
        detect_payload_auth(&value).map_err(|_| uniform_failure())?
    else {
        return Err(uniform_failure());
    };

    let magic_id: [u8; MAGIC_ID_LENGTH] =
        codec::b58_decode_array(&token_b58).map_err(|_| uniform_failure())?;
    let token_ref = magic_token::token_ref(config, &magic_id);

    // Lookup returns only live (unconsumed, unexpired) rows
    let Some(sealed_binding) = storage::magic_links::fetch_binding(config, &token_ref, now)? else {
        warn!("Magic link not redeemable");
        return Err(uniform_failure());
    };
    let binding = magic_token::open_binding(config, &magic_id, &sealed_binding)
        .map_err(|_| uniform_failure())?;

    // The redemption envelope must be signed by the key published at issuance
    let session_pub = binding.ed25519_pub_bytes().map_err(|_| uniform_failure())?;
    verify_with_key(request, &session_pub).map_err(|_| uniform_failure())?;

    // Single-use gate: exactly one row may flip to consumed. A lost race
    // is a storage conflict internally but wears the uniform failure on
    // the wire.
    if !storage::magic_links::consume(config, &token_ref, now)? {
        let conflict = CoreError::StorageConflict("magic-link double consume".to_string());
        warn!("{}", conflict);
        return Err(uniform_failure());
    }

    let user_id = binding.user_id_bytes().map_err(|_| uniform_failure())?;

    // Deliver the server-held private-key context, sealed to the one-shot
    // X25519 key; the bundle yields the key by value so it cannot be reused
    let context = privkey_context::get_or_create_context(config, &user_id, now)?;
    let client_x25519 = OneShotX25519(binding.x25519_pub_bytes().map_err(|_| uniform_failure())?);
    let sealed_context = privkey_context::seal_context_for_client(config, &context, client_x25519)?;

    let (access_token, _) = mint_access(config, &user_id, &session_pub, now);
    let (refresh_token, refresh_expires_at) =
        mint_refresh(config, &user_id, &session_pub, &binding.ui_host, now);

    let username = user_id_to_username(&user_id);
    info!("🔓 Magic link redeemed for {}", username);

    Ok(RedeemedSession {
        user_id,
        username,
        session_pub,
        access_token,
        refresh_token,
        refresh_expires_at,
        ui_host: binding.ui_host,
        next: binding.next,
        encrypted_privkey_context: codec::b64url_encode(&sealed_context),
    })
}
