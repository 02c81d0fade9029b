//! Magic-link rows
//!
//! Rows are indexed by the keyed token reference and hold the sealed
//! binding. Consumption is a guarded UPDATE: whichever request flips
//! `consumed_at` first wins; everyone else sees the same failure as an
//! unknown token.

use spin_sdk::sqlite::Value;
use tracing::debug;

use super::connection;
use crate::config::CoreConfig;
use crate::types::CoreError;

/// Store a freshly issued magic link
pub fn store_magic_link(
    config: &CoreConfig,
    token_ref: &[u8; 16],
    encrypted_binding: &[u8],
    expires_at: i64,
) -> Result<(), CoreError> {
    let connection = connection(config)?;
    connection.execute(
        "INSERT INTO magic_links (token_ref, encrypted_binding, expires_at, consumed_at)
         VALUES (?, ?, ?, NULL)",
        &[
            Value::Blob(token_ref.to_vec()),
            Value::Blob(encrypted_binding.to_vec()),
            Value::Integer(expires_at),
        ],
    )?;
    debug!("💾 Stored magic link (expires_at={})", expires_at);
    Ok(())
}

/// Fetch the sealed binding of a live (unconsumed, unexpired) magic link
pub fn fetch_binding(
    config: &CoreConfig,
    token_ref: &[u8; 16],
    now: i64,
) -> Result<Option<Vec<u8>>, CoreError> {
    let connection = connection(config)?;
    let result = connection.execute(
        "SELECT encrypted_binding FROM magic_links
         WHERE token_ref = ? AND consumed_at IS NULL AND expires_at > ?",
        &[Value::Blob(token_ref.to_vec()), Value::Integer(now)],
    )?;

    match result.rows.first().map(|row| row.values.first()) {
        Some(Some(Value::Blob(blob))) => Ok(Some(blob.clone())),
        Some(_) => Err(CoreError::Internal("bad encrypted_binding type".to_string())),
        None => Ok(None),
    }
}

/// Single-use gate: returns true iff this call consumed the link
pub fn consume(config: &CoreConfig, token_ref: &[u8; 16], now: i64) -> Result<bool, CoreError> {
    let connection = connection(config)?;
    let result = connection.execute(
        "UPDATE magic_links SET consumed_at = ?2
         WHERE token_ref = ?1 AND consumed_at IS NULL AND expires_at > ?2
         RETURNING token_ref",
        &[Value::Blob(token_ref.to_vec()), Value::Integer(now)],
    )?;
    Ok(result.rows.len() == 1)
}

/// Drop expired and consumed rows; called opportunistically on login traffic
pub fn purge_expired(config: &CoreConfig, now: i64) -> Result<(), CoreError> {
    let connection = connection(config)?;
    connection.execute(
        "DELETE FROM magic_links WHERE expires_at <= ? OR consumed_at IS NOT NULL",
        &[Value::Integer(now)],
    )?;
    Ok(())
}
