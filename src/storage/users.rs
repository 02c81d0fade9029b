//! User rows: derived id plus the sealed private-key context
//!
//! Rows are created on first login. `INSERT OR IGNORE` keeps concurrent
//! first logins convergent: whichever context lands first is the one every
//! caller reads back.

use spin_sdk::sqlite::Value;

use super::connection;
use crate::config::CoreConfig;
use crate::types::CoreError;

/// Insert the user row if absent (no-op when it already exists)
pub fn insert_user(
    config: &CoreConfig,
    user_id: &[u8; 16],
    sealed_context: &[u8],
    now: i64,
) -> Result<(), CoreError> {
    let connection = connection(config)?;
    connection.execute(
        "INSERT OR IGNORE INTO users (user_id, privkey_context, created_at) VALUES (?, ?, ?)",
        &[
            Value::Blob(user_id.to_vec()),
            Value::Blob(sealed_context.to_vec()),
            Value::Integer(now),
        ],
    )?;
    Ok(())
}

/// Fetch the sealed private-key context, if the user exists
pub fn fetch_privkey_blob(
    config: &CoreConfig,
    user_id: &[u8; 16],
) -> Result<Option<Vec<u8>>, CoreError> {
    let connection = connection(config)?;
    let result = connection.execute(
        "SELECT privkey_context FROM users WHERE user_id = ?",
        &[Value::Blob(user_id.to_vec())],
    )?;

    match result.rows.first().map(|row| row.values.first()) {
        Some(Some(Value::Blob(blob))) => Ok(Some(blob.clone())),
        Some(_) => Err(CoreError::Internal("bad privkey_context type".to_string())),
        None => Ok(None),
    }
}
