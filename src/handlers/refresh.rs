//! Token refresh: `POST /api/refresh`
//!
//! The request is a signed envelope `{new_pub_key}` signed with the
//! *current* session key, accompanied by the refresh cookie. The renewal
//! outcome is computed from timestamps alone and each branch executes
//! deterministically:
//!
//! - `NoOp`: access still valid — acknowledge, mint nothing
//! - `AccessOnly`: new access token on the existing key; `new_pub_key`
//!   must equal it
//! - `FullRotation`: new access token + refresh cookie bound to
//!   `new_pub_key`; the response signs with the old session key and embeds
//!   the new `server_pub_key`
//! - `Denied`: 401 `BothTokensExpired` plus a clearing cookie

use chrono::Utc;
use serde::Deserialize;
use spin_sdk::http::{Request, Response};
use tracing::info;

use super::serialize_signed;
use crate::auth::user_id::user_id_to_username;
use crate::codec;
use crate::config::CoreConfig;
use crate::crypto::primitives::ct_eq;
use crate::envelope::sign::{sign_payload, sign_payload_with_rotation};
use crate::envelope::verify::{
    decode_payload, detect_payload_auth, parse_signed_request, payload_value, verify_with_key,
    PayloadAuth,
};
use crate::token::authority::{mint_access, mint_refresh, verify_access, verify_refresh_integrity};
use crate::token::cookie::{build_refresh_cookie, clear_refresh_cookie, extract_refresh_cookie};
use crate::token::policy::{evaluate, RenewalOutcome};
use crate::token::RefreshClaims;
use crate::types::responses::{AuthResponse, StatusResponse};
use crate::types::CoreError;

/// Wire payload of `POST /api/refresh`
#[derive(Debug, Deserialize)]
struct RefreshRequest {
    /// Hex Ed25519 public key the client wants the session bound to next
    new_pub_key: String,
}

/// Compatibility header duplicating the payload-embedded access token;
/// scheduled for removal after the documented migration window
const NEW_ACCESS_TOKEN_HEADER: &str = "x-new-access-token";

pub fn handle_refresh(config: &CoreConfig, req: Request) -> anyhow::Result<Response> {
    match refresh(config, &req) {
        Ok(response) => Ok(response),
        Err(e) => Ok(e.into_response()),
    }
}

fn refresh(config: &CoreConfig, req: &Request) -> Result<Response, CoreError> {
    let now = Utc::now().timestamp();

    // The refresh cookie is the endpoint's credential
    // Fixed order: access token (if present) → refresh cookie → signed
    // envelope → renewal policy
    let access_claims = match bearer_token(req) {
        Some(token) => match verify_access(config, &token, now) {
            Ok(access) => Some(access),
            Err(CoreError::TokenExpired) => None,
            Err(other) => return Err(other),
        },
        None => None,
    };

    let cookie_header = req.header("cookie").and_then(|h| h.as_str()).unwrap_or("");
    let refresh_token = extract_refresh_cookie(cookie_header)
        .ok_or_else(|| CoreError::Unauthorized("missing refresh cookie".to_string()))?;
    let claims = verify_refresh_integrity(config, &refresh_token)?;

    // A valid bearer bound to a different key than the cookie is forged
    let access_valid = match &access_claims {
        Some(access) => {
            if !ct_eq(&access.session_pub, &claims.session_pub) {
                return Err(CoreError::Unauthorized("token key mismatch".to_string()));
            }
            true
        }
        None => false,
    };

    // The envelope must be signed with the currently bound session key
    let signed_request = parse_signed_request(req.body())?;
    let value = payload_value(&signed_request)?;
    if detect_payload_auth(&value)? != PayloadAuth::None {
        return Err(CoreError::BadEnvelope(
            "refresh request must not carry payload auth".to_string(),
        ));
    }
    verify_with_key(&signed_request, &claims.session_pub)?;
    let payload: RefreshRequest = decode_payload(&signed_request)?;

    match evaluate(access_valid, &claims, now) {
        RenewalOutcome::NoOp => respond_no_op(config, &claims),
        RenewalOutcome::AccessOnly => respond_access_only(config, &claims, &payload, now),
        RenewalOutcome::FullRotation => respond_full_rotation(config, &claims, &payload, now),
        RenewalOutcome::Denied => {
            let domain = (!claims.ui_host.is_empty()).then(|| claims.ui_host.clone());
            Err(CoreError::BothTokensExpired(domain))
        }
    }
}

fn respond_no_op(config: &CoreConfig, claims: &RefreshClaims) -> Result<Response, CoreError> {
    let signed = sign_payload(config, &claims.user_id, &claims.session_pub, &StatusResponse::ok())?;
    Ok(Response::builder()
        .status(200)
        .header("content-type", "application/json")
        .body(serialize_signed(&signed)?)
        .build())
}

/// First third of the window: refresh the access token only, same keys
fn respond_access_only(
    config: &CoreConfig,
    claims: &RefreshClaims,
    payload: &RefreshRequest,
    now: i64,
) -> Result<Response, CoreError> {
    // No-rotation assertion: inside the first third the client must keep
    // its session key
    let requested_pub = codec::hex_decode_array::<32>(&payload.new_pub_key)
        .map_err(|_| CoreError::ValidationFailed("new_pub_key must be 32 hex bytes".to_string()))?;
    if !ct_eq(&requested_pub, &claims.session_pub) {
        return Err(CoreError::ValidationFailed(
            "key rotation is only allowed in the 2/3 window".to_string(),
        ));
    }

    let (access_token, _) = mint_access(config, &claims.user_id, &claims.session_pub, now);
    let response_payload = AuthResponse::new(access_token.clone(), user_id_to_username(&claims.user_id));

    let signed = sign_payload(config, &claims.user_id, &claims.session_pub, &response_payload)?;
    info!("♻️ Refresh without rotation (1/3 window)");

    Ok(Response::builder()
        .status(200)
        .header("content-type", "application/json")
        .header(NEW_ACCESS_TOKEN_HEADER, &access_token)
        .body(serialize_signed(&signed)?)
        .build())
}

/// Last two thirds: rotate the session key, the cookie and the server key
fn respond_full_rotation(
    config: &CoreConfig,
    claims: &RefreshClaims,
    payload: &RefreshRequest,
    now: i64,
) -> Result<Response, CoreError> {
    let new_pub = codec::hex_decode_array::<32>(&payload.new_pub_key)
        .map_err(|_| CoreError::ValidationFailed("new_pub_key must be 32 hex bytes".to_string()))?;

    let (access_token, _) = mint_access(config, &claims.user_id, &new_pub, now);
    let (new_refresh_token, refresh_expires_at) =
        mint_refresh(config, &claims.user_id, &new_pub, &claims.ui_host, now);

    let mut response_payload =
        AuthResponse::new(access_token.clone(), user_id_to_username(&claims.user_id));
    response_payload.expires_at = Some(refresh_expires_at);

    // Sign with the OLD session key; the payload carries the NEW server key
    let signed = sign_payload_with_rotation(
        config,
        &claims.user_id,
        &claims.session_pub,
        &new_pub,
        &response_payload,
    )?;
    info!("🔄 Refresh with full key rotation (2/3 window)");

    let domain = (!claims.ui_host.is_empty()).then_some(claims.ui_host.as_str());

    // Delete the old cookie before setting the new one so the browser never
    // holds both (attributes must match the original exactly)
    Ok(Response::builder()
        .status(200)
        .header("content-type", "application/json")
        .header("set-cookie", &clear_refresh_cookie(domain))
        .header("set-cookie", &build_refresh_cookie(&new_refresh_token, config.refresh_ttl, domain))
        .header(NEW_ACCESS_TOKEN_HEADER, &access_token)
        .body(serialize_signed(&signed)?)
        .build())
}

fn bearer_token(req: &Request) -> Option<String> {
    let header = req.header("authorization")?.as_str()?;
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(|token| token.trim().to_string())
}
