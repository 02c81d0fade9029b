//! SQLite storage layer
//!
//! All persisted state lives in four tables; every single-use or
//! read-budget mutation is one `UPDATE … WHERE <guard> RETURNING` statement
//! so concurrent requests cannot double-spend a gate (the Spin SQLite API
//! exposes no affected-row count; `RETURNING` rows serve that role).

pub mod magic_links;
pub mod shared_secrets;
pub mod tracking;
pub mod users;

use spin_sdk::sqlite::Connection;

use crate::config::CoreConfig;
use crate::types::CoreError;

/// Open the configured database
pub fn connection(config: &CoreConfig) -> Result<Connection, CoreError> {
    Connection::open(&config.database_name).map_err(CoreError::from)
}

/// Create the schema if it does not exist yet
pub fn initialize_database(config: &CoreConfig) -> Result<(), CoreError> {
    let connection = connection(config)?;

    connection.execute(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            user_id BLOB PRIMARY KEY,
            privkey_context BLOB NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
        &[],
    )?;

    connection.execute(
        r#"
        CREATE TABLE IF NOT EXISTS magic_links (
            token_ref BLOB PRIMARY KEY,
            encrypted_binding BLOB NOT NULL,
            expires_at INTEGER NOT NULL,
            consumed_at INTEGER
        )
        "#,
        &[],
    )?;

    connection.execute(
        r#"
        CREATE TABLE IF NOT EXISTS shared_secrets (
            hash BLOB PRIMARY KEY,
            encrypted_payload BLOB NOT NULL,
            expires_at INTEGER NOT NULL,
            pending_reads INTEGER NOT NULL,
            role TEXT NOT NULL
        )
        "#,
        &[],
    )?;

    connection.execute(
        r#"
        CREATE TABLE IF NOT EXISTS shared_secrets_tracking (
            reference_id BLOB PRIMARY KEY,
            read_at INTEGER,
            expires_at INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
        &[],
    )?;

    Ok(())
}
