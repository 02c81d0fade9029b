//! Login endpoints: magic-link issuance, redemption, logout
//!
//! - `POST /api/login/` — request a magic link (self-signed bootstrap)
//! - `POST /api/login/magiclink/` — redeem it for session credentials
//! - `DELETE /api/login/` — clear the refresh cookie (signed query)

use std::collections::HashMap;

use chrono::Utc;
use serde::Deserialize;
use spin_sdk::http::{Request, Response};
use tracing::{info, warn};

use super::serialize_signed;
use crate::auth::magic_token::{self, MagicBinding};
use crate::auth::redemption;
use crate::auth::user_id::{derive_user_id, validate_email};
use crate::codec;
use crate::config::CoreConfig;
use crate::envelope::sign::{sign_payload, sign_payload_with_server_key};
use crate::envelope::verify::{decode_payload, parse_signed_request, verify_self_signed};
use crate::envelope::query::verify_query_params;
use crate::mailer;
use crate::storage;
use crate::token::authority::verify_refresh_integrity;
use crate::token::cookie::{build_refresh_cookie, clear_refresh_cookie, extract_refresh_cookie};
use crate::types::responses::{AuthResponse, StatusResponse};
use crate::types::CoreError;

/// Wire payload of `POST /api/login/`
#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    #[serde(default = "default_lang")]
    email_lang: String,
    #[serde(default = "default_next")]
    next: String,
    /// One-shot X25519 public key (hex) for private-context delivery
    ///
    /// The session Ed25519 key travels as the payload's `pub_key` field and
    /// is consumed by the self-signed envelope verification.
    x25519_pub: String,
    ui_host: String,
}

fn default_lang() -> String {
    "en".to_string()
}

fn default_next() -> String {
    "/".to_string()
}

/// Handle `POST /api/login/` — issue a magic link
pub async fn handle_login_request(config: &CoreConfig, req: Request) -> anyhow::Result<Response> {
    let now = Utc::now().timestamp();

    // Login traffic doubles as the magic-link sweep
    if let Err(e) = storage::magic_links::purge_expired(config, now) {
        warn!("Magic-link sweep failed: {}", e);
    }

    match issue_magic_link(config, &req, now).await {
        Ok(response) => Ok(response),
        Err(e) => Ok(e.into_response()),
    }
}

async fn issue_magic_link(
    config: &CoreConfig,
    req: &Request,
    now: i64,
) -> Result<Response, CoreError> {
    let signed_request = parse_signed_request(req.body())?;
    let signer_pub = verify_self_signed(&signed_request)?;
    let payload: LoginRequest = decode_payload(&signed_request)?;

    validate_email(&payload.email)?;
    if payload.ui_host.is_empty() {
        return Err(CoreError::ValidationFailed("ui_host cannot be empty".to_string()));
    }
    // Both client keys must be well-formed before anything is stored
    let x25519_pub = codec::hex_decode_array::<32>(&payload.x25519_pub)
        .map_err(|_| CoreError::ValidationFailed("x25519_pub must be 32 hex bytes".to_string()))?;

    let user_id = derive_user_id(config, &payload.email);
    let magic_id = magic_token::generate_magic_id()?;

    let binding = MagicBinding {
        user_id: hex::encode(user_id),
        ed25519_pub: hex::encode(signer_pub),
        x25519_pub: hex::encode(x25519_pub),
        ui_host: payload.ui_host.clone(),
        next: payload.next.clone(),
        email_lang: payload.email_lang.clone(),
        created_at: now,
    };

    let token_ref = magic_token::token_ref(config, &magic_id);
    let sealed_binding = magic_token::seal_binding(config, &magic_id, &binding)?;
    storage::magic_links::store_magic_link(
        config,
        &token_ref,
        &sealed_binding,
        now + config.magic_ttl,
    )?;

    // Best-effort delivery: the binding stays valid even if the send fails
    let link = magic_token::magic_link_url(&payload.ui_host, &magic_id);
    if let Err(e) = mailer::send_magic_link_email(&payload.email, &link).await {
        warn!("Magic-link email failed: {}", e);
    }

    info!("🔗 Magic link issued");
    let signed = sign_payload_with_server_key(config, &user_id, &signer_pub, &StatusResponse::ok())?;
    Ok(Response::builder()
        .status(200)
        .header("content-type", "application/json")
        .body(serialize_signed(&signed)?)
        .build())
}

/// Handle `POST /api/login/magiclink/` — redeem a magic link
pub fn handle_redeem(config: &CoreConfig, req: Request) -> anyhow::Result<Response> {
    let now = Utc::now().timestamp();

    let result = parse_signed_request(req.body())
        .and_then(|signed_request| redemption::redeem(config, &signed_request, now));
    let session = match result {
        Ok(session) => session,
        Err(e) => return Ok(e.into_response()),
    };

    let mut payload = AuthResponse::new(session.access_token.clone(), session.username.clone());
    payload.expires_at = Some(session.refresh_expires_at);
    payload.next = Some(session.next.clone());
    payload.server_x25519_pub_key = Some(hex::encode(config.server_x25519_public().to_bytes()));
    payload.encrypted_privkey_context = Some(session.encrypted_privkey_context.clone());

    let signed = match sign_payload_with_server_key(
        config,
        &session.user_id,
        &session.session_pub,
        &payload,
    ) {
        Ok(signed) => signed,
        Err(e) => return Ok(e.into_response()),
    };

    let domain = (!session.ui_host.is_empty()).then_some(session.ui_host.as_str());
    let cookie = build_refresh_cookie(&session.refresh_token, config.refresh_ttl, domain);

    Ok(Response::builder()
        .status(200)
        .header("content-type", "application/json")
        .header("set-cookie", &cookie)
        .body(serialize_signed(&signed)?)
        .build())
}

/// Handle `DELETE /api/login/` — logout, clearing the refresh cookie
///
/// The signed query proves possession of the session key, so a third party
/// cannot log the user out.
pub fn handle_logout(
    config: &CoreConfig,
    req: Request,
    params: HashMap<String, String>,
) -> anyhow::Result<Response> {
    match logout(config, &req, params) {
        Ok(response) => Ok(response),
        Err(e) => Ok(e.into_response()),
    }
}

fn logout(
    config: &CoreConfig,
    req: &Request,
    mut params: HashMap<String, String>,
) -> Result<Response, CoreError> {
    let cookie_header = req.header("cookie").and_then(|h| h.as_str()).unwrap_or("");
    let refresh_token = extract_refresh_cookie(cookie_header)
        .ok_or_else(|| CoreError::Unauthorized("not authenticated".to_string()))?;
    let claims = verify_refresh_integrity(config, &refresh_token)?;

    verify_query_params(&mut params, &claims.session_pub)?;

    info!("👋 Logout, clearing refresh cookie");
    let signed = sign_payload(config, &claims.user_id, &claims.session_pub, &StatusResponse::ok())?;

    let domain = (!claims.ui_host.is_empty()).then_some(claims.ui_host.as_str());
    Ok(Response::builder()
        .status(200)
        .header("content-type", "application/json")
        .header("set-cookie", &clear_refresh_cookie(domain))
        .body(serialize_signed(&signed)?)
        .build())
}
