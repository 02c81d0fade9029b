//! Shared-secret role rows
//!
//! One row per role copy, addressed by its encrypted 40-byte hash. The
//! receiver read budget is spent through a guarded decrement so parallel
//! reads cannot overdraw it.

use spin_sdk::sqlite::Value;
use tracing::{debug, warn};

use super::connection;
use crate::config::CoreConfig;
use crate::secret::types::{SecretRole, ROW_HASH_LENGTH};
use crate::types::CoreError;

/// A fetched role row
pub struct StoredRow {
    pub payload: Vec<u8>,
    pub expires_at: i64,
    pub pending_reads: i64,
    pub role: String,
}

/// One role row of a creation, ready for insertion
pub struct NewRow<'a> {
    pub row_hash: &'a [u8; ROW_HASH_LENGTH],
    pub payload: &'a [u8],
    pub pending_reads: i64,
    pub role: SecretRole,
}

/// Insert both role rows and the tracking row in one transaction
///
/// A creation is all-or-nothing: a cancelled request must not leave one
/// role row without its twin or its tracking row.
pub fn insert_creation(
    config: &CoreConfig,
    rows: &[NewRow<'_>; 2],
    reference_id: &[u8],
    expires_at: i64,
    created_at: i64,
) -> Result<(), CoreError> {
    let connection = connection(config)?;
    connection.execute("BEGIN IMMEDIATE", &[])?;

    let inserts = || -> Result<(), CoreError> {
        for row in rows {
            connection.execute(
                "INSERT INTO shared_secrets (hash, encrypted_payload, expires_at, pending_reads, role)
                 VALUES (?, ?, ?, ?, ?)",
                &[
                    Value::Blob(row.row_hash.to_vec()),
                    Value::Blob(row.payload.to_vec()),
                    Value::Integer(expires_at),
                    Value::Integer(row.pending_reads),
                    Value::Text(row.role.as_str().to_string()),
                ],
            )?;
        }
        connection.execute(
            "INSERT INTO shared_secrets_tracking (reference_id, read_at, expires_at, created_at)
             VALUES (?, NULL, ?, ?)",
            &[
                Value::Blob(reference_id.to_vec()),
                Value::Integer(expires_at),
                Value::Integer(created_at),
            ],
        )?;
        Ok(())
    };

    match inserts() {
        Ok(()) => {
            connection.execute("COMMIT", &[])?;
            debug!("💾 Inserted secret pair + tracking (expires_at={})", expires_at);
            Ok(())
        }
        Err(e) => {
            let _ = connection.execute("ROLLBACK", &[]);
            Err(e)
        }
    }
}

/// Fetch a role row by its hash
pub fn fetch_row(
    config: &CoreConfig,
    row_hash: &[u8; ROW_HASH_LENGTH],
) -> Result<Option<StoredRow>, CoreError> {
    let connection = connection(config)?;
    let result = connection.execute(
        "SELECT encrypted_payload, expires_at, pending_reads, role
         FROM shared_secrets WHERE hash = ?",
        &[Value::Blob(row_hash.to_vec())],
    )?;

    let Some(row) = result.rows.first() else {
        return Ok(None);
    };

    let payload = match row.values.first() {
        Some(Value::Blob(blob)) => blob.clone(),
        _ => return Err(CoreError::Internal("bad encrypted_payload type".to_string())),
    };
    let expires_at = match row.values.get(1) {
        Some(Value::Integer(v)) => *v,
        _ => return Err(CoreError::Internal("bad expires_at type".to_string())),
    };
    let pending_reads = match row.values.get(2) {
        Some(Value::Integer(v)) => *v,
        _ => return Err(CoreError::Internal("bad pending_reads type".to_string())),
    };
    let role = match row.values.get(3) {
        Some(Value::Text(v)) => v.clone(),
        _ => return Err(CoreError::Internal("bad role type".to_string())),
    };

    Ok(Some(StoredRow { payload, expires_at, pending_reads, role }))
}

/// Read-budget gate: decrement the receiver budget if any remains
///
/// Returns the remaining budget after this read, or `None` if no unit was
/// available (row gone, sender row, or a concurrent reader took the last
/// one).
pub fn decrement_pending(
    config: &CoreConfig,
    row_hash: &[u8; ROW_HASH_LENGTH],
) -> Result<Option<i64>, CoreError> {
    let connection = connection(config)?;
    let result = connection.execute(
        "UPDATE shared_secrets SET pending_reads = pending_reads - 1
         WHERE hash = ? AND role = 'receiver' AND pending_reads > 0
         RETURNING pending_reads",
        &[Value::Blob(row_hash.to_vec())],
    )?;

    match result.rows.first().map(|row| row.values.first()) {
        Some(Some(Value::Integer(remaining))) => Ok(Some(*remaining)),
        Some(_) => Err(CoreError::Internal("bad pending_reads type".to_string())),
        None => {
            warn!("📖 Read-budget decrement found no spendable row");
            Ok(None)
        }
    }
}

/// Delete one role row
pub fn delete_row(config: &CoreConfig, row_hash: &[u8; ROW_HASH_LENGTH]) -> Result<(), CoreError> {
    let connection = connection(config)?;
    connection.execute(
        "DELETE FROM shared_secrets WHERE hash = ?",
        &[Value::Blob(row_hash.to_vec())],
    )?;
    Ok(())
}

/// Drop expired role rows
pub fn purge_expired(config: &CoreConfig, now: i64) -> Result<(), CoreError> {
    let connection = connection(config)?;
    connection.execute(
        "DELETE FROM shared_secrets WHERE expires_at <= ?",
        &[Value::Integer(now)],
    )?;
    Ok(())
}
