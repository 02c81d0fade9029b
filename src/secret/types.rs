//! Shared-secret domain types and constants

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::types::CoreError;

/// 16-byte reference id shared by the two role rows of one creation
pub const REFERENCE_ID_LENGTH: usize = 16;
/// Plain row-hash layout: reference_id[16] ‖ user_id[16] ‖ checksum[8]
pub const ROW_HASH_LENGTH: usize = 40;
/// Keyed checksum prefix inside the row hash
pub const CHECKSUM_LENGTH: usize = 8;
/// Per-secret key material: nonce[12] ‖ cipher_key[32]
pub const KEY_MATERIAL_LENGTH: usize = 44;
pub const NONCE_LENGTH: usize = 12;

/// Validation bounds for creation requests
pub const MAX_SECRET_TEXT_BYTES: usize = 512;
pub const MIN_EXPIRES_HOURS: i64 = 1;
pub const MAX_EXPIRES_HOURS: i64 = 72;
pub const MIN_READS: i64 = 1;
pub const MAX_READS: i64 = 10;
pub const OTP_LENGTH: usize = 9;

/// Sender rows carry this sentinel instead of a read budget
pub const UNLIMITED_READS: i64 = -1;

/// Which copy of the secret a row is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretRole {
    Sender,
    Receiver,
}

impl SecretRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretRole::Sender => "sender",
            SecretRole::Receiver => "receiver",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "sender" => Some(SecretRole::Sender),
            "receiver" => Some(SecretRole::Receiver),
            _ => None,
        }
    }

    /// Role byte embedded in the row-hash checksum
    pub fn as_byte(&self) -> u8 {
        match self {
            SecretRole::Sender => 0x01,
            SecretRole::Receiver => 0x02,
        }
    }

    pub fn from_byte(value: u8) -> Result<Self, CoreError> {
        match value {
            0x01 => Ok(SecretRole::Sender),
            0x02 => Ok(SecretRole::Receiver),
            _ => Err(CoreError::AccessDenied),
        }
    }
}

/// Plaintext record sealed into both role rows
///
/// `sender`/`receiver` are Base58 user ids — no raw emails at rest. The
/// whole record zeroizes on drop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct SecretRecord {
    pub sender: String,
    pub receiver: String,
    pub secret_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp: Option<String>,
    pub created_at: i64,
    /// Base58 reference id
    pub reference: String,
}
