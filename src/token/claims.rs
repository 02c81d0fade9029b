//! Token claims and their binary wire format
//!
//! Both token kinds are a fixed binary claims block followed by an
//! HMAC-SHA-256 tag over the block, Base58-encoded as one opaque string:
//!
//! ```text
//! access:  0x01 ‖ user_id[16] ‖ session_pub[32] ‖ iat_be[8] ‖ exp_be[8]
//! refresh: same ‖ ui_host_len_be[2] ‖ ui_host
//! token  = Base58( claims ‖ HMAC-SHA-256(K, claims) )
//! ```

use crate::codec;
use crate::crypto::primitives::{ct_eq, hmac_sha256};
use crate::types::CoreError;

/// Claims format version
pub const TOKEN_VERSION: u8 = 0x01;

const FIXED_LEN: usize = 1 + 16 + 32 + 8 + 8;
const MAC_LEN: usize = 32;

/// Access token claims
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessClaims {
    /// Derived user id
    pub user_id: [u8; 16],
    /// Ed25519 session key every signed request is verified against
    pub session_pub: [u8; 32],
    /// Issued at (epoch seconds)
    pub iat: i64,
    /// Expiration (epoch seconds)
    pub exp: i64,
}

/// Refresh cookie claims; additionally remembers the cookie's UI host so
/// rotation can re-issue the cookie with a matching `Domain` attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshClaims {
    pub user_id: [u8; 16],
    pub session_pub: [u8; 32],
    pub iat: i64,
    pub exp: i64,
    pub ui_host: String,
}

fn encode_fixed(user_id: &[u8; 16], session_pub: &[u8; 32], iat: i64, exp: i64) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(FIXED_LEN);
    bytes.push(TOKEN_VERSION);
    bytes.extend_from_slice(user_id);
    bytes.extend_from_slice(session_pub);
    bytes.extend_from_slice(&iat.to_be_bytes());
    bytes.extend_from_slice(&exp.to_be_bytes());
    bytes
}

fn decode_fixed(bytes: &[u8]) -> Result<([u8; 16], [u8; 32], i64, i64), CoreError> {
    if bytes.len() < FIXED_LEN {
        return Err(CoreError::Unauthorized("token too short".to_string()));
    }
    if bytes[0] != TOKEN_VERSION {
        return Err(CoreError::Unauthorized("unknown token version".to_string()));
    }
    let mut user_id = [0u8; 16];
    user_id.copy_from_slice(&bytes[1..17]);
    let mut session_pub = [0u8; 32];
    session_pub.copy_from_slice(&bytes[17..49]);
    let iat = i64::from_be_bytes(bytes[49..57].try_into().expect("slice length"));
    let exp = i64::from_be_bytes(bytes[57..65].try_into().expect("slice length"));
    Ok((user_id, session_pub, iat, exp))
}

impl AccessClaims {
    pub fn to_bytes(&self) -> Vec<u8> {
        encode_fixed(&self.user_id, &self.session_pub, self.iat, self.exp)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        if bytes.len() != FIXED_LEN {
            return Err(CoreError::Unauthorized("bad access token length".to_string()));
        }
        let (user_id, session_pub, iat, exp) = decode_fixed(bytes)?;
        Ok(Self { user_id, session_pub, iat, exp })
    }
}

impl RefreshClaims {
    pub fn to_bytes(&self) -> Vec<u8> {
        let host = self.ui_host.as_bytes();
        let mut bytes = encode_fixed(&self.user_id, &self.session_pub, self.iat, self.exp);
        bytes.extend_from_slice(&(host.len() as u16).to_be_bytes());
        bytes.extend_from_slice(host);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let (user_id, session_pub, iat, exp) = decode_fixed(bytes)?;
        let rest = &bytes[FIXED_LEN..];
        if rest.len() < 2 {
            return Err(CoreError::Unauthorized("bad refresh token length".to_string()));
        }
        let host_len = u16::from_be_bytes(rest[0..2].try_into().expect("slice length")) as usize;
        if rest.len() != 2 + host_len {
            return Err(CoreError::Unauthorized("bad refresh token length".to_string()));
        }
        let ui_host = String::from_utf8(rest[2..].to_vec())
            .map_err(|_| CoreError::Unauthorized("bad refresh token host".to_string()))?;
        Ok(Self { user_id, session_pub, iat, exp, ui_host })
    }
}

/// MAC a claims block and encode the token string
pub fn seal_claims(mac_key: &[u8; 64], claims_bytes: &[u8]) -> String {
    let tag = hmac_sha256(mac_key, claims_bytes);
    let mut combined = Vec::with_capacity(claims_bytes.len() + MAC_LEN);
    combined.extend_from_slice(claims_bytes);
    combined.extend_from_slice(&tag);
    codec::b58_encode(&combined)
}

/// Decode a token string and verify its MAC (constant-time); expiry is the
/// caller's concern
pub fn open_claims(mac_key: &[u8; 64], token: &str) -> Result<Vec<u8>, CoreError> {
    let combined =
        codec::b58_decode(token).map_err(|_| CoreError::Unauthorized("bad token".to_string()))?;
    if combined.len() <= MAC_LEN {
        return Err(CoreError::Unauthorized("token too short".to_string()));
    }
    let (claims_bytes, tag) = combined.split_at(combined.len() - MAC_LEN);
    let expected = hmac_sha256(mac_key, claims_bytes);
    if !ct_eq(tag, &expected) {
        return Err(CoreError::Unauthorized("token MAC mismatch".to_string()));
    }
    Ok(claims_bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_claims_round_trip() {
        let claims = AccessClaims {
            user_id: [1u8; 16],
            session_pub: [2u8; 32],
            iat: 1_700_000_000,
            exp: 1_700_000_060,
        };
        assert_eq!(AccessClaims::from_bytes(&claims.to_bytes()).unwrap(), claims);
    }

    #[test]
    fn refresh_claims_round_trip_with_host() {
        let claims = RefreshClaims {
            user_id: [3u8; 16],
            session_pub: [4u8; 32],
            iat: 100,
            exp: 400,
            ui_host: "app.example.com".to_string(),
        };
        assert_eq!(RefreshClaims::from_bytes(&claims.to_bytes()).unwrap(), claims);
    }

    #[test]
    fn refresh_claims_round_trip_with_empty_host() {
        let claims = RefreshClaims {
            user_id: [5u8; 16],
            session_pub: [6u8; 32],
            iat: 0,
            exp: 300,
            ui_host: String::new(),
        };
        assert_eq!(RefreshClaims::from_bytes(&claims.to_bytes()).unwrap(), claims);
    }

    #[test]
    fn sealed_claims_verify_and_reject_tamper() {
        let key = [7u8; 64];
        let claims = AccessClaims {
            user_id: [8u8; 16],
            session_pub: [9u8; 32],
            iat: 10,
            exp: 70,
        };
        let token = seal_claims(&key, &claims.to_bytes());
        let opened = open_claims(&key, &token).unwrap();
        assert_eq!(AccessClaims::from_bytes(&opened).unwrap(), claims);

        // Flip one byte inside the token
        let mut raw = bs58::decode(&token).into_vec().unwrap();
        raw[20] ^= 0x01;
        let forged = bs58::encode(&raw).into_string();
        assert!(open_claims(&key, &forged).is_err());

        // Wrong MAC key
        assert!(open_claims(&[10u8; 64], &token).is_err());
    }

    #[test]
    fn truncated_host_length_is_rejected() {
        let claims = RefreshClaims {
            user_id: [1u8; 16],
            session_pub: [2u8; 32],
            iat: 0,
            exp: 1,
            ui_host: "localhost".to_string(),
        };
        let mut bytes = claims.to_bytes();
        bytes.truncate(bytes.len() - 3);
        assert!(RefreshClaims::from_bytes(&bytes).is_err());
    }
}
