//! Token minting and verification
//!
//! The access token and the refresh cookie are the two credentials of the
//! session. An access token is only ever accepted together with an Ed25519
//! signature made by its bound session key; the token authority checks the
//! MAC and the clock, the envelope layer checks the signature.

use tracing::debug;

use super::claims::{open_claims, seal_claims, AccessClaims, RefreshClaims};
use crate::config::CoreConfig;
use crate::types::CoreError;

/// Mint an access token bound to `(user_id, session_pub)`
///
/// Returns the token and its expiration.
pub fn mint_access(
    config: &CoreConfig,
    user_id: &[u8; 16],
    session_pub: &[u8; 32],
    now: i64,
) -> (String, i64) {
    let claims = AccessClaims {
        user_id: *user_id,
        session_pub: *session_pub,
        iat: now,
        exp: now + config.access_ttl,
    };
    let token = seal_claims(&config.access_token_hmac_key, &claims.to_bytes());
    debug!("🎫 Minted access token (exp={})", claims.exp);
    (token, claims.exp)
}

/// Verify an access token's MAC and expiry
pub fn verify_access(
    config: &CoreConfig,
    token: &str,
    now: i64,
) -> Result<AccessClaims, CoreError> {
    let claims_bytes = open_claims(&config.access_token_hmac_key, token)?;
    let claims = AccessClaims::from_bytes(&claims_bytes)?;
    if now >= claims.exp {
        return Err(CoreError::TokenExpired);
    }
    Ok(claims)
}

/// Mint a refresh cookie value bound to `(user_id, session_pub, ui_host)`
pub fn mint_refresh(
    config: &CoreConfig,
    user_id: &[u8; 16],
    session_pub: &[u8; 32],
    ui_host: &str,
    now: i64,
) -> (String, i64) {
    let claims = RefreshClaims {
        user_id: *user_id,
        session_pub: *session_pub,
        iat: now,
        exp: now + config.refresh_ttl,
        ui_host: ui_host.to_string(),
    };
    let token = seal_claims(&config.refresh_token_hmac_key, &claims.to_bytes());
    debug!("🎫 Minted refresh cookie (exp={})", claims.exp);
    (token, claims.exp)
}

/// Verify a refresh cookie's MAC only
///
/// Expiry is judged by the renewal policy so the double-expiry case can be
/// reported as its own kind.
pub fn verify_refresh_integrity(
    config: &CoreConfig,
    token: &str,
) -> Result<RefreshClaims, CoreError> {
    let claims_bytes = open_claims(&config.refresh_token_hmac_key, token)?;
    RefreshClaims::from_bytes(&claims_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::test_config;

    #[test]
    fn access_token_mint_verify_round_trip() {
        let config = test_config();
        let (token, exp) = mint_access(&config, &[1u8; 16], &[2u8; 32], 1000);
        assert_eq!(exp, 1060);

        let claims = verify_access(&config, &token, 1030).unwrap();
        assert_eq!(claims.user_id, [1u8; 16]);
        assert_eq!(claims.session_pub, [2u8; 32]);
        assert_eq!(claims.iat, 1000);
    }

    #[test]
    fn expired_access_token_is_token_expired() {
        let config = test_config();
        let (token, exp) = mint_access(&config, &[1u8; 16], &[2u8; 32], 1000);
        assert!(matches!(
            verify_access(&config, &token, exp),
            Err(CoreError::TokenExpired)
        ));
    }

    #[test]
    fn forged_access_token_is_unauthorized_not_expired() {
        let config = test_config();
        let (token, _) = mint_access(&config, &[1u8; 16], &[2u8; 32], 1000);

        let mut other = test_config();
        other.access_token_hmac_key = [0xaa; 64];
        assert!(matches!(
            verify_access(&other, &token, 1010),
            Err(CoreError::Unauthorized(_))
        ));
    }

    #[test]
    fn refresh_cookie_round_trip_preserves_host() {
        let config = test_config();
        let (token, exp) = mint_refresh(&config, &[3u8; 16], &[4u8; 32], "app.example.com", 2000);
        assert_eq!(exp, 2300);

        let claims = verify_refresh_integrity(&config, &token).unwrap();
        assert_eq!(claims.ui_host, "app.example.com");
        assert_eq!(claims.iat, 2000);
        assert_eq!(claims.exp, 2300);
    }

    #[test]
    fn refresh_integrity_check_ignores_expiry() {
        let config = test_config();
        let (token, exp) = mint_refresh(&config, &[3u8; 16], &[4u8; 32], "localhost", 2000);
        // Still opens long after expiry; the renewal policy decides what it means
        assert!(verify_refresh_integrity(&config, &token).is_ok());
        assert!(exp < 10_000);
    }

    #[test]
    fn access_and_refresh_tokens_are_not_interchangeable() {
        let config = test_config();
        let (access, _) = mint_access(&config, &[5u8; 16], &[6u8; 32], 100);
        assert!(verify_refresh_integrity(&config, &access).is_err());
    }
}
