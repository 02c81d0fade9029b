//! Process-wide configuration
//!
//! All master keys, server key pairs and TTLs are loaded from Spin variables
//! exactly once, into a `CoreConfig` value that handlers receive by shared
//! reference. No module reads variables after construction, so every secret
//! the core uses is visible in this one structure.

use spin_sdk::variables;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret as X25519StaticSecret};

use crate::types::CoreError;

/// Default token lifetimes (dev profile), used when a duration variable is
/// absent
const DEFAULT_ACCESS_TTL: i64 = 60;
const DEFAULT_REFRESH_TTL: i64 = 300;
const DEFAULT_MAGIC_TTL: i64 = 900;

/// Immutable configuration of the cryptographic core
pub struct CoreConfig {
    /// HMAC key for user-id derivation (K_user)
    pub user_id_hmac_key: [u8; 64],
    /// Master key for row-hash encryption and key-material wrapping (K_row)
    pub row_hash_key: [u8; 64],
    /// MAC key for access tokens (K_jwt)
    pub access_token_hmac_key: [u8; 64],
    /// MAC key for refresh cookies (K_refresh)
    pub refresh_token_hmac_key: [u8; 64],
    /// MAC key for magic-token bindings (K_magic)
    pub magic_link_hmac_key: [u8; 64],
    /// Seed from which per-session Ed25519 signing keys are derived
    pub server_signing_seed: [u8; 64],
    /// Server X25519 private key for key-material delivery
    pub server_x25519_sk: [u8; 32],
    /// Access token lifetime in seconds
    pub access_ttl: i64,
    /// Refresh cookie lifetime in seconds
    pub refresh_ttl: i64,
    /// Magic link lifetime in seconds
    pub magic_ttl: i64,
    /// SQLite database name
    pub database_name: String,
}

impl CoreConfig {
    /// Load the configuration from Spin variables
    pub fn load() -> Result<Self, CoreError> {
        Ok(Self {
            user_id_hmac_key: get_key_bytes("user_id_hmac_key")?,
            row_hash_key: get_key_bytes("row_hash_key")?,
            access_token_hmac_key: get_key_bytes("access_token_hmac_key")?,
            refresh_token_hmac_key: get_key_bytes("refresh_token_hmac_key")?,
            magic_link_hmac_key: get_key_bytes("magic_link_hmac_key")?,
            server_signing_seed: get_key_bytes("server_ed25519_sk")?,
            server_x25519_sk: get_key_bytes("server_x25519_sk")?,
            access_ttl: get_duration_seconds("access_token_duration_seconds", DEFAULT_ACCESS_TTL)?,
            refresh_ttl: get_duration_seconds("refresh_token_duration_seconds", DEFAULT_REFRESH_TTL)?,
            magic_ttl: get_duration_seconds("magic_link_duration_seconds", DEFAULT_MAGIC_TTL)?,
            database_name: variables::get("database_name")
                .map_err(|e| CoreError::Internal(format!("database_name variable: {}", e)))?,
        })
    }

    /// Server X25519 private key as a usable secret
    pub fn server_x25519_secret(&self) -> X25519StaticSecret {
        X25519StaticSecret::from(self.server_x25519_sk)
    }

    /// Server X25519 public key, handed to clients at redemption
    pub fn server_x25519_public(&self) -> X25519PublicKey {
        X25519PublicKey::from(&self.server_x25519_secret())
    }
}

/// Read a hex-encoded key of exactly `N` bytes from a Spin variable
fn get_key_bytes<const N: usize>(var_name: &str) -> Result<[u8; N], CoreError> {
    let hex_value = variables::get(var_name)
        .map_err(|e| CoreError::Internal(format!("{} variable: {}", var_name, e)))?;

    let decoded = hex::decode(hex_value.trim())
        .map_err(|_| CoreError::Internal(format!("{} must be a hex string", var_name)))?;

    decoded
        .try_into()
        .map_err(|_| CoreError::Internal(format!("{} must be exactly {} bytes", var_name, N)))
}

/// Read a positive duration in seconds, falling back to the dev default
fn get_duration_seconds(var_name: &str, default: i64) -> Result<i64, CoreError> {
    let Ok(raw) = variables::get(var_name) else {
        return Ok(default);
    };
    let seconds: i64 = raw
        .trim()
        .parse()
        .map_err(|_| CoreError::Internal(format!("{} must be a number of seconds", var_name)))?;
    if seconds <= 0 {
        return Err(CoreError::Internal(format!("{} must be positive", var_name)));
    }
    Ok(seconds)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Fixed configuration for unit tests; mirrors the dev defaults
    pub fn test_config() -> CoreConfig {
        CoreConfig {
            user_id_hmac_key: [0x11; 64],
            row_hash_key: [0x22; 64],
            access_token_hmac_key: [0x33; 64],
            refresh_token_hmac_key: [0x44; 64],
            magic_link_hmac_key: [0x55; 64],
            server_signing_seed: [0x66; 64],
            server_x25519_sk: [0x77; 32],
            access_ttl: 60,
            refresh_ttl: 300,
            magic_ttl: 900,
            database_name: "hushlink-test".to_string(),
        }
    }
}
