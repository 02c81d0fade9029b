//! Shared-secret engine: create, retrieve, delete, confirm-read
//!
//! One creation inserts two independent rows — a sender copy with an
//! unlimited-read sentinel and a receiver copy with a bounded read budget —
//! sharing one reference id and one sealed record, each addressable only by
//! its own user-bound URL hash. Access control is the address itself plus a
//! constant-time user binding check; every denial is presented as not-found.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use zeroize::Zeroizing;

use super::material;
use super::types::*;
use super::url_hash::{self, RowAddress};
use crate::auth::user_id::{derive_user_id, user_id_to_username, validate_email};
use crate::codec;
use crate::config::CoreConfig;
use crate::crypto::primitives::ct_eq;
use crate::storage;
use crate::types::responses::{ConfirmReadResponse, CreateSecretResponse};
use crate::types::CoreError;

/// Wire payload of `POST /api/shared-secret/create`
#[derive(Debug, Deserialize, Serialize)]
pub struct CreateSecretRequest {
    pub sender_email: String,
    pub receiver_email: String,
    pub secret_text: String,
    #[serde(default = "default_expires_hours")]
    pub expires_hours: i64,
    #[serde(default = "default_max_reads")]
    pub max_reads: i64,
    #[serde(default)]
    pub require_otp: bool,
    #[serde(default)]
    pub send_copy_to_sender: bool,
    pub ui_host: String,
}

fn default_expires_hours() -> i64 {
    24
}

fn default_max_reads() -> i64 {
    3
}

/// Email to send after a successful creation
pub struct SecretNotification {
    pub recipient_email: String,
    pub url_path: String,
    pub role: SecretRole,
    pub reference: String,
}

/// A successfully retrieved secret
pub struct RetrievedSecret {
    pub role: SecretRole,
    /// Remaining budget after this read (-1 for the sender copy)
    pub pending_reads: i64,
    pub record: SecretRecord,
    pub expires_at: i64,
}

/// Create the dual-URL secret pair
pub fn create_secret(
    config: &CoreConfig,
    claims_user_id: &[u8; 16],
    request: &CreateSecretRequest,
    now: i64,
) -> Result<(CreateSecretResponse, Vec<SecretNotification>), CoreError> {
    validate_create_request(request)?;

    // The creator must be who they claim to be
    let sender_user_id = derive_user_id(config, &request.sender_email);
    if !ct_eq(&sender_user_id, claims_user_id) {
        return Err(CoreError::Unauthorized("sender does not match session".to_string()));
    }
    let receiver_user_id = derive_user_id(config, &request.receiver_email);

    let reference_id = material::generate_reference_id()?;
    let reference = codec::b58_encode(&reference_id);
    let otp = if request.require_otp {
        Some(material::generate_otp()?)
    } else {
        None
    };

    let record = SecretRecord {
        sender: user_id_to_username(&sender_user_id),
        receiver: user_id_to_username(&receiver_user_id),
        secret_text: request.secret_text.clone(),
        otp: otp.as_ref().map(|o| o.to_string()),
        created_at: now,
        reference: reference.clone(),
    };

    let key_material = material::generate_key_material()?;
    let record_json = Zeroizing::new(codec::canonical_json(&record)?);
    let record_ct = material::seal_record(&key_material, record_json.as_bytes())?;

    let expires_at = now + request.expires_hours * 3600;

    // Opportunistic sweep before growing the tables
    storage::shared_secrets::purge_expired(config, now)?;
    storage::tracking::purge_expired(config, now)?;

    let sender_hash =
        url_hash::build_row_hash(config, &reference_id, &sender_user_id, SecretRole::Sender);
    let receiver_hash =
        url_hash::build_row_hash(config, &reference_id, &receiver_user_id, SecretRole::Receiver);
    let sender_payload = row_payload(config, &sender_hash, &key_material, &record_ct);
    let receiver_payload = row_payload(config, &receiver_hash, &key_material, &record_ct);

    storage::shared_secrets::insert_creation(
        config,
        &[
            storage::shared_secrets::NewRow {
                row_hash: &sender_hash,
                payload: &sender_payload,
                pending_reads: material::initial_pending_reads(SecretRole::Sender, request.max_reads),
                role: SecretRole::Sender,
            },
            storage::shared_secrets::NewRow {
                row_hash: &receiver_hash,
                payload: &receiver_payload,
                pending_reads: material::initial_pending_reads(SecretRole::Receiver, request.max_reads),
                role: SecretRole::Receiver,
            },
        ],
        &reference_id,
        expires_at,
        now,
    )?;
    info!("🤝 Created shared secret {} (expires_at={})", reference, expires_at);

    let url_sender = format!("/shared-secret/{}", url_hash::encode_url_hash(&sender_hash));
    let url_receiver = format!("/shared-secret/{}", url_hash::encode_url_hash(&receiver_hash));
    let mut notifications = vec![SecretNotification {
        recipient_email: request.receiver_email.clone(),
        url_path: url_receiver.clone(),
        role: SecretRole::Receiver,
        reference: reference.clone(),
    }];
    if request.send_copy_to_sender {
        notifications.push(SecretNotification {
            recipient_email: request.sender_email.clone(),
            url_path: url_sender.clone(),
            role: SecretRole::Sender,
            reference: reference.clone(),
        });
    }

    let response = CreateSecretResponse {
        url_sender,
        url_receiver,
        reference,
        otp: otp.map(|o| o.to_string()),
    };
    Ok((response, notifications))
}

/// Retrieve a secret by its URL hash, enforcing the OTP gate and the
/// receiver read budget
pub fn retrieve_secret(
    config: &CoreConfig,
    claims_user_id: &[u8; 16],
    hash_b58: &str,
    otp_input: Option<&str>,
    now: i64,
) -> Result<RetrievedSecret, CoreError> {
    let (row_hash, address, row) = resolve_row(config, claims_user_id, hash_b58, now)?;

    let (record, expires_at) = open_row(config, &row_hash, &row.payload, row.expires_at)?;

    // OTP gate, before any budget is spent; an extraneous OTP on a
    // non-gated secret is ignored
    if let Some(stored_otp) = &record.otp {
        match otp_input {
            None => return Err(CoreError::OtpRequired),
            Some(provided) => {
                if !ct_eq(provided.as_bytes(), stored_otp.as_bytes()) {
                    return Err(CoreError::OtpMismatch);
                }
            }
        }
    }

    let pending_reads = match address.role {
        SecretRole::Sender => UNLIMITED_READS,
        SecretRole::Receiver => {
            // Budget gate: exactly one concurrent reader wins each unit
            let Some(remaining) = storage::shared_secrets::decrement_pending(config, &row_hash)?
            else {
                return Err(CoreError::NotFound);
            };
            if remaining == 0 {
                storage::shared_secrets::delete_row(config, &row_hash)?;
                debug!("📖 Receiver row fully consumed, deleted");
            }
            remaining
        }
    };

    Ok(RetrievedSecret { role: address.role, pending_reads, record, expires_at })
}

/// Delete the caller's role row
pub fn delete_secret(
    config: &CoreConfig,
    claims_user_id: &[u8; 16],
    hash_b58: &str,
    now: i64,
) -> Result<(), CoreError> {
    let (row_hash, _address, row) = resolve_row(config, claims_user_id, hash_b58, now)?;

    if row.pending_reads == 0 {
        return Err(CoreError::ValidationFailed("secret already fully consumed".to_string()));
    }

    storage::shared_secrets::delete_row(config, &row_hash)?;
    info!("🗑️ Deleted shared-secret role row");
    Ok(())
}

/// Mark the logical secret as read (receiver only); idempotent
pub fn confirm_read(
    config: &CoreConfig,
    claims_user_id: &[u8; 16],
    hash_b58: &str,
    now: i64,
) -> Result<ConfirmReadResponse, CoreError> {
    let (_row_hash, address, row) = resolve_row(config, claims_user_id, hash_b58, now)?;

    if address.role != SecretRole::Receiver {
        return Err(CoreError::AccessDenied);
    }

    let freshly_set = storage::tracking::mark_read(config, &address.reference_id, now)?;
    debug!("📬 Confirm-read (freshly_set={})", freshly_set);

    Ok(ConfirmReadResponse {
        success: true,
        pending_reads: row.pending_reads,
        role: address.role.as_str().to_string(),
    })
}

/// Shared three-layer access resolution: address validity, user binding,
/// row existence and freshness — all failures collapse to not-found
fn resolve_row(
    config: &CoreConfig,
    claims_user_id: &[u8; 16],
    hash_b58: &str,
    now: i64,
) -> Result<([u8; ROW_HASH_LENGTH], RowAddress, storage::shared_secrets::StoredRow), CoreError> {
    let row_hash = url_hash::decode_url_hash(hash_b58)?;
    let address = url_hash::parse_row_hash(config, &row_hash)?;

    if !ct_eq(&address.user_id, claims_user_id) {
        return Err(CoreError::AccessDenied);
    }

    let Some(row) = storage::shared_secrets::fetch_row(config, &row_hash)? else {
        return Err(CoreError::NotFound);
    };
    if now >= row.expires_at {
        storage::shared_secrets::delete_row(config, &row_hash)?;
        return Err(CoreError::NotFound);
    }

    debug_assert_eq!(
        SecretRole::from_str(&row.role),
        Some(address.role),
        "row role must match its address"
    );

    Ok((row_hash, address, row))
}

/// Assemble a row's `encrypted_payload` column: wrapped key material
/// followed by the shared record ciphertext
fn row_payload(
    config: &CoreConfig,
    row_hash: &[u8; ROW_HASH_LENGTH],
    key_material: &[u8; KEY_MATERIAL_LENGTH],
    record_ct: &[u8],
) -> Vec<u8> {
    let wrapped = material::wrap_key_material(config, row_hash, key_material);
    let mut payload = Vec::with_capacity(KEY_MATERIAL_LENGTH + record_ct.len());
    payload.extend_from_slice(&wrapped);
    payload.extend_from_slice(record_ct);
    payload
}

/// Unwrap, open and parse a row's sealed record
fn open_row(
    config: &CoreConfig,
    row_hash: &[u8; ROW_HASH_LENGTH],
    row_payload: &[u8],
    expires_at: i64,
) -> Result<(SecretRecord, i64), CoreError> {
    if row_payload.len() <= KEY_MATERIAL_LENGTH {
        return Err(CoreError::Internal("row payload too short".to_string()));
    }
    let (wrapped, record_ct) = row_payload.split_at(KEY_MATERIAL_LENGTH);

    let key_material = material::unwrap_key_material(config, row_hash, wrapped)?;
    let record_bytes = material::open_record(&key_material, record_ct)?;
    let record: SecretRecord = serde_json::from_slice(&record_bytes)
        .map_err(|e| CoreError::Internal(format!("record json: {}", e)))?;

    Ok((record, expires_at))
}

fn validate_create_request(request: &CreateSecretRequest) -> Result<(), CoreError> {
    validate_email(&request.sender_email)?;
    validate_email(&request.receiver_email)?;

    if request.secret_text.is_empty() {
        return Err(CoreError::ValidationFailed("secret text cannot be empty".to_string()));
    }
    if request.secret_text.len() > MAX_SECRET_TEXT_BYTES {
        return Err(CoreError::ValidationFailed(format!(
            "secret text exceeds {} bytes",
            MAX_SECRET_TEXT_BYTES
        )));
    }
    if !(MIN_EXPIRES_HOURS..=MAX_EXPIRES_HOURS).contains(&request.expires_hours) {
        return Err(CoreError::ValidationFailed(format!(
            "expiration must be between {} and {} hours",
            MIN_EXPIRES_HOURS, MAX_EXPIRES_HOURS
        )));
    }
    if !(MIN_READS..=MAX_READS).contains(&request.max_reads) {
        return Err(CoreError::ValidationFailed(format!(
            "max reads must be between {} and {}",
            MIN_READS, MAX_READS
        )));
    }
    if request.ui_host.is_empty() {
        return Err(CoreError::ValidationFailed("ui_host cannot be empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateSecretRequest {
        CreateSecretRequest {
            sender_email: "sender@example.com".to_string(),
            receiver_email: "receiver@example.com".to_string(),
            secret_text: "the launch code".to_string(),
            expires_hours: 24,
            max_reads: 3,
            require_otp: false,
            send_copy_to_sender: false,
            ui_host: "app.example.com".to_string(),
        }
    }

    #[test]
    fn defaults_apply_to_omitted_fields() {
        let parsed: CreateSecretRequest = serde_json::from_str(
            r#"{"sender_email":"a@x.org","receiver_email":"b@x.org",
                "secret_text":"s","ui_host":"localhost"}"#,
        )
        .unwrap();
        assert_eq!(parsed.expires_hours, 24);
        assert_eq!(parsed.max_reads, 3);
        assert!(!parsed.require_otp);
        assert!(!parsed.send_copy_to_sender);
    }

    #[test]
    fn validation_catches_each_bound() {
        let ok = request();
        assert!(validate_create_request(&ok).is_ok());

        let mut bad = request();
        bad.secret_text = "x".repeat(MAX_SECRET_TEXT_BYTES + 1);
        assert!(validate_create_request(&bad).is_err());

        let mut bad = request();
        bad.secret_text.clear();
        assert!(validate_create_request(&bad).is_err());

        let mut bad = request();
        bad.expires_hours = 0;
        assert!(validate_create_request(&bad).is_err());
        bad.expires_hours = 73;
        assert!(validate_create_request(&bad).is_err());

        let mut bad = request();
        bad.max_reads = 0;
        assert!(validate_create_request(&bad).is_err());
        bad.max_reads = 11;
        assert!(validate_create_request(&bad).is_err());

        let mut bad = request();
        bad.receiver_email = "not-an-email".to_string();
        assert!(validate_create_request(&bad).is_err());
    }

    #[test]
    fn secret_text_limit_counts_bytes_not_chars() {
        let mut bad = request();
        // 171 three-byte chars = 513 bytes but only 171 chars
        bad.secret_text = "€".repeat(171);
        assert!(validate_create_request(&bad).is_err());
    }
}
