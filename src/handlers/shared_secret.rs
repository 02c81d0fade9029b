//! Shared-secret endpoints
//!
//! - `POST /api/shared-secret/create` — create the dual-URL pair
//! - `GET /api/shared-secret/{hash}` — retrieve (signed query)
//! - `POST /api/shared-secret/{hash}` — retrieve with OTP (signed body)
//! - `DELETE /api/shared-secret/{hash}` — delete the caller's role row
//! - `GET /api/shared-secret/confirm-read?hash=…` — mark receiver read

use std::collections::HashMap;

use chrono::Utc;
use serde::Deserialize;
use spin_sdk::http::{Request, Response};
use tracing::warn;

use super::guard::{validate_signed_body, validate_signed_query};
use super::serialize_signed;
use crate::config::CoreConfig;
use crate::envelope::sign::sign_payload;
use crate::mailer;
use crate::secret::engine::{self, CreateSecretRequest, RetrievedSecret};
use crate::types::responses::{RetrieveSecretResponse, StatusResponse};
use crate::types::CoreError;

/// Wire payload of `POST /api/shared-secret/{hash}`
#[derive(Debug, Deserialize)]
struct OtpRequest {
    #[serde(default)]
    otp: Option<String>,
}

/// Handle `POST /api/shared-secret/create`
pub async fn handle_create_secret(config: &CoreConfig, req: Request) -> anyhow::Result<Response> {
    let now = Utc::now().timestamp();

    let (auth, payload): (_, CreateSecretRequest) =
        match validate_signed_body(config, &req, now) {
            Ok(result) => result,
            Err(e) => return Ok(e.into_response()),
        };

    let (response_payload, notifications) =
        match engine::create_secret(config, &auth.user_id, &payload, now) {
            Ok(result) => result,
            Err(e) => return Ok(e.into_response()),
        };

    // Rows are committed; delivery is best-effort
    for notification in notifications {
        if let Err(e) = mailer::send_secret_notification(
            &notification.recipient_email,
            &payload.ui_host,
            &notification.url_path,
            &notification.reference,
            notification.role,
        )
        .await
        {
            warn!("Secret notification email failed: {}", e);
        }
    }

    respond_signed(config, &auth.user_id, &auth.session_pub, &response_payload)
}

/// Handle `GET /api/shared-secret/{hash}` (no OTP in this form)
pub fn handle_retrieve_secret_get(
    config: &CoreConfig,
    req: Request,
    hash: &str,
    params: HashMap<String, String>,
) -> anyhow::Result<Response> {
    let now = Utc::now().timestamp();

    let (auth, _params) = match validate_signed_query(config, &req, params, now) {
        Ok(result) => result,
        Err(e) => return Ok(e.into_response()),
    };

    match engine::retrieve_secret(config, &auth.user_id, hash, None, now) {
        Ok(retrieved) => respond_signed(
            config,
            &auth.user_id,
            &auth.session_pub,
            &retrieval_payload(&retrieved),
        ),
        Err(e) => Ok(e.into_response()),
    }
}

/// Handle `POST /api/shared-secret/{hash}` — retrieval with OTP
pub fn handle_retrieve_secret_post(
    config: &CoreConfig,
    req: Request,
    hash: &str,
) -> anyhow::Result<Response> {
    let now = Utc::now().timestamp();

    let (auth, payload): (_, OtpRequest) = match validate_signed_body(config, &req, now) {
        Ok(result) => result,
        Err(e) => return Ok(e.into_response()),
    };

    match engine::retrieve_secret(config, &auth.user_id, hash, payload.otp.as_deref(), now) {
        Ok(retrieved) => respond_signed(
            config,
            &auth.user_id,
            &auth.session_pub,
            &retrieval_payload(&retrieved),
        ),
        Err(e) => Ok(e.into_response()),
    }
}

/// Handle `DELETE /api/shared-secret/{hash}`
pub fn handle_delete_secret(
    config: &CoreConfig,
    req: Request,
    hash: &str,
    params: HashMap<String, String>,
) -> anyhow::Result<Response> {
    let now = Utc::now().timestamp();

    let (auth, _params) = match validate_signed_query(config, &req, params, now) {
        Ok(result) => result,
        Err(e) => return Ok(e.into_response()),
    };

    match engine::delete_secret(config, &auth.user_id, hash, now) {
        Ok(()) => respond_signed(config, &auth.user_id, &auth.session_pub, &StatusResponse::ok()),
        Err(e) => Ok(e.into_response()),
    }
}

/// Handle `GET /api/shared-secret/confirm-read?hash=…`
pub fn handle_confirm_read(
    config: &CoreConfig,
    req: Request,
    params: HashMap<String, String>,
) -> anyhow::Result<Response> {
    let now = Utc::now().timestamp();

    let (auth, params) = match validate_signed_query(config, &req, params, now) {
        Ok(result) => result,
        Err(e) => return Ok(e.into_response()),
    };

    let Some(hash) = params.get("hash") else {
        return Ok(
            CoreError::ValidationFailed("missing hash parameter".to_string()).into_response()
        );
    };

    match engine::confirm_read(config, &auth.user_id, hash, now) {
        Ok(confirmation) => respond_signed(config, &auth.user_id, &auth.session_pub, &confirmation),
        Err(e) => Ok(e.into_response()),
    }
}

fn retrieval_payload(retrieved: &RetrievedSecret) -> RetrieveSecretResponse {
    RetrieveSecretResponse {
        role: retrieved.role.as_str().to_string(),
        pending_reads: retrieved.pending_reads,
        secret_text: retrieved.record.secret_text.clone(),
        sender: retrieved.record.sender.clone(),
        receiver: retrieved.record.receiver.clone(),
        reference: retrieved.record.reference.clone(),
        expires_at: retrieved.expires_at,
    }
}

fn respond_signed<T: serde::Serialize>(
    config: &CoreConfig,
    user_id: &[u8; 16],
    session_pub: &[u8; 32],
    payload: &T,
) -> anyhow::Result<Response> {
    let signed = match sign_payload(config, user_id, session_pub, payload) {
        Ok(signed) => signed,
        Err(e) => return Ok(e.into_response()),
    };
    Ok(Response::builder()
        .status(200)
        .header("content-type", "application/json")
        .body(serialize_signed(&signed)?)
        .build())
}
