//! Tracking rows: one per creation, shared by both role rows
//!
//! Insertion happens inside the creation transaction (see
//! `shared_secrets::insert_creation`). `read_at` moves null→timestamp
//! exactly once; the guarded UPDATE makes repeat confirmations no-ops by
//! construction.

use spin_sdk::sqlite::Value;
use tracing::debug;

use super::connection;
use crate::config::CoreConfig;
use crate::secret::types::REFERENCE_ID_LENGTH;
use crate::types::CoreError;

/// Set `read_at` if still unset; returns true iff this call set it
pub fn mark_read(
    config: &CoreConfig,
    reference_id: &[u8; REFERENCE_ID_LENGTH],
    now: i64,
) -> Result<bool, CoreError> {
    let connection = connection(config)?;
    let result = connection.execute(
        "UPDATE shared_secrets_tracking SET read_at = ?2
         WHERE reference_id = ?1 AND read_at IS NULL
         RETURNING reference_id",
        &[Value::Blob(reference_id.to_vec()), Value::Integer(now)],
    )?;

    let freshly_set = result.rows.len() == 1;
    debug!("📬 mark_read (freshly_set={})", freshly_set);
    Ok(freshly_set)
}

/// Drop expired tracking rows; their role rows share the same expiry, so
/// expiry implies both copies are gone or about to be
pub fn purge_expired(config: &CoreConfig, now: i64) -> Result<(), CoreError> {
    let connection = connection(config)?;
    connection.execute(
        "DELETE FROM shared_secrets_tracking WHERE expires_at <= ?",
        &[Value::Integer(now)],
    )?;
    Ok(())
}
