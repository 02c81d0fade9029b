//! Endpoint guards: bearer authentication plus envelope verification
//!
//! The key bound into the bearer token is the only signer an authenticated
//! request may use — payload-embedded auth methods are rejected as
//! conflicting. Guards also detect the double-expiry case so any
//! authenticated call after the refresh window reports `BothTokensExpired`
//! with a clearing cookie.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use spin_sdk::http::Request;

use crate::config::CoreConfig;
use crate::envelope::query::verify_query_params;
use crate::envelope::verify::{
    detect_payload_auth, parse_signed_request, payload_value, verify_with_key, PayloadAuth,
};
use crate::token::authority::{verify_access, verify_refresh_integrity};
use crate::token::cookie::extract_refresh_cookie;
use crate::types::CoreError;

/// Verified bearer identity of a request
pub struct AuthContext {
    pub user_id: [u8; 16],
    pub session_pub: [u8; 32],
}

/// Authenticate the bearer token, upgrading an expired-access failure to
/// `BothTokensExpired` when the refresh cookie is dead too
pub fn authenticate_bearer(
    config: &CoreConfig,
    req: &Request,
    now: i64,
) -> Result<AuthContext, CoreError> {
    let token = bearer_token(req)
        .ok_or_else(|| CoreError::Unauthorized("missing bearer token".to_string()))?;

    match verify_access(config, &token, now) {
        Ok(claims) => Ok(AuthContext { user_id: claims.user_id, session_pub: claims.session_pub }),
        Err(CoreError::TokenExpired) => Err(classify_expiry(config, req, now)),
        Err(other) => Err(other),
    }
}

/// Validate a signed POST/DELETE body on an authenticated endpoint
pub fn validate_signed_body<T>(
    config: &CoreConfig,
    req: &Request,
    now: i64,
) -> Result<(AuthContext, T), CoreError>
where
    T: DeserializeOwned,
{
    let auth = authenticate_bearer(config, req, now)?;

    let signed_request = parse_signed_request(req.body())?;
    let value = payload_value(&signed_request)?;
    if detect_payload_auth(&value)? != PayloadAuth::None {
        return Err(CoreError::BadEnvelope(
            "bearer request must not carry payload auth".to_string(),
        ));
    }

    verify_with_key(&signed_request, &auth.session_pub)?;
    let payload = crate::envelope::verify::decode_payload(&signed_request)?;
    Ok((auth, payload))
}

/// Validate a signed query string on an authenticated GET/DELETE endpoint
///
/// Returns the verified parameters with `signature` removed.
pub fn validate_signed_query(
    config: &CoreConfig,
    req: &Request,
    mut params: HashMap<String, String>,
    now: i64,
) -> Result<(AuthContext, HashMap<String, String>), CoreError> {
    let auth = authenticate_bearer(config, req, now)?;
    verify_query_params(&mut params, &auth.session_pub)?;
    Ok((auth, params))
}

fn bearer_token(req: &Request) -> Option<String> {
    let header = req.header("authorization")?.as_str()?;
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(|token| token.trim().to_string())
}

/// Access token expired: decide between plain `TokenExpired` and the
/// terminal `BothTokensExpired`
fn classify_expiry(config: &CoreConfig, req: &Request, now: i64) -> CoreError {
    let cookie_header = req
        .header("cookie")
        .and_then(|h| h.as_str())
        .unwrap_or("");
    let Some(refresh_token) = extract_refresh_cookie(cookie_header) else {
        return CoreError::TokenExpired;
    };
    match verify_refresh_integrity(config, &refresh_token) {
        Ok(claims) if now >= claims.exp => {
            let domain = (!claims.ui_host.is_empty()).then(|| claims.ui_host.clone());
            CoreError::BothTokensExpired(domain)
        }
        _ => CoreError::TokenExpired,
    }
}
