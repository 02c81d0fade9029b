//! Zero-knowledge user identity
//!
//! A user is identified by 16 bytes derived from their email through a keyed
//! MAC; the raw email is never persisted. Derivation is deterministic for
//! the lifetime of the HMAC key, so the same address always maps to the
//! same identity.

use crate::codec;
use crate::config::CoreConfig;
use crate::crypto::primitives::hmac_sha256;
use crate::types::CoreError;

/// Canonical form of an email address: trimmed, lowercased
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Derive the 16-byte user id: `HMAC-SHA-256(K_user, normalize(email))[0..16]`
pub fn derive_user_id(config: &CoreConfig, email: &str) -> [u8; 16] {
    let normalized = normalize_email(email);
    let mac = hmac_sha256(&config.user_id_hmac_key, normalized.as_bytes());
    let mut user_id = [0u8; 16];
    user_id.copy_from_slice(&mac[0..16]);
    user_id
}

/// Base58 display form of a user id
pub fn user_id_to_username(user_id: &[u8; 16]) -> String {
    codec::b58_encode(user_id)
}

/// Parse a Base58 username back into the 16-byte user id
pub fn username_to_user_id(username: &str) -> Result<[u8; 16], CoreError> {
    codec::b58_decode_array::<16>(username)
}

/// Structural email validation
///
/// Deliberately strict about shape and dangerous characters; full RFC 5322
/// is not the goal.
pub fn validate_email(email: &str) -> Result<(), CoreError> {
    let fail = |msg: &str| Err(CoreError::ValidationFailed(msg.to_string()));

    if email.is_empty() {
        return fail("email cannot be empty");
    }
    if email.len() > 254 {
        return fail("email too long");
    }
    if email.matches('@').count() != 1 {
        return fail("email must contain exactly one @");
    }

    let (local, domain) = email.split_once('@').expect("one @ present");
    if local.is_empty() || local.len() > 64 {
        return fail("email local part invalid");
    }
    if domain.is_empty() || domain.len() > 253 || !domain.contains('.') {
        return fail("email domain invalid");
    }

    let dangerous = ['<', '>', '"', '\'', '&', ' ', '\n', '\r', '\t'];
    if email.chars().any(|c| dangerous.contains(&c)) {
        return fail("email contains invalid characters");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::test_config;

    #[test]
    fn derivation_is_deterministic() {
        let config = test_config();
        assert_eq!(
            derive_user_id(&config, "test@example.com"),
            derive_user_id(&config, "test@example.com")
        );
    }

    #[test]
    fn normalization_folds_case_and_whitespace() {
        let config = test_config();
        assert_eq!(normalize_email("  Me@X.org "), "me@x.org");
        assert_eq!(
            derive_user_id(&config, "  Me@X.org "),
            derive_user_id(&config, "me@x.org")
        );
    }

    #[test]
    fn different_emails_give_different_ids() {
        let config = test_config();
        assert_ne!(
            derive_user_id(&config, "a@x.org"),
            derive_user_id(&config, "b@x.org")
        );
    }

    #[test]
    fn username_round_trip() {
        let config = test_config();
        let user_id = derive_user_id(&config, "round@trip.io");
        let username = user_id_to_username(&user_id);
        assert_eq!(username_to_user_id(&username).unwrap(), user_id);
    }

    #[test]
    fn email_validation_accepts_normal_rejects_hostile() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("a.b+c@sub.example.org").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("two@@example.com").is_err());
        assert!(validate_email("user@nodot").is_err());
        assert!(validate_email("user<script>@example.com").is_err());
    }
}
