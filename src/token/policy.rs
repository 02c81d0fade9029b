//! Renewal policy: the 1/3 vs 2/3 window split
//!
//! With `T = exp - iat` of the refresh cookie and `elapsed = now - iat`:
//!
//! - access valid                       → `NoOp` (nothing to renew)
//! - access expired, `elapsed < T/3`    → `AccessOnly` (same session key,
//!   no new cookie; the request's `new_pub_key` must equal the bound key)
//! - access expired, `T/3 ≤ elapsed < T`→ `FullRotation` (new session key,
//!   new cookie, new `server_pub_key` in the signed response)
//! - `elapsed ≥ T`                      → `Denied` (401 BothTokensExpired,
//!   clearing cookie)
//!
//! An active client therefore slides forward indefinitely, an idle client
//! loses its session at `T`, and a compromised key rotates out within `T`.

use super::claims::RefreshClaims;

/// Outcome of a refresh evaluation, computed from timestamps alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalOutcome {
    /// Access token still valid: mint nothing
    NoOp,
    /// First third of the refresh window: new access token, same key
    AccessOnly,
    /// Last two thirds: new access token + cookie + rotated keys
    FullRotation,
    /// Refresh cookie expired too
    Denied,
}

/// Evaluate the renewal state machine
pub fn evaluate(access_valid: bool, refresh: &RefreshClaims, now: i64) -> RenewalOutcome {
    if now >= refresh.exp {
        return RenewalOutcome::Denied;
    }
    if access_valid {
        return RenewalOutcome::NoOp;
    }

    let window = refresh.exp - refresh.iat;
    let elapsed = now - refresh.iat;
    if elapsed < window / 3 {
        RenewalOutcome::AccessOnly
    } else {
        RenewalOutcome::FullRotation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refresh(iat: i64, exp: i64) -> RefreshClaims {
        RefreshClaims {
            user_id: [0u8; 16],
            session_pub: [0u8; 32],
            iat,
            exp,
            ui_host: "localhost".to_string(),
        }
    }

    #[test]
    fn valid_access_is_a_no_op() {
        let claims = refresh(0, 300);
        assert_eq!(evaluate(true, &claims, 150), RenewalOutcome::NoOp);
    }

    #[test]
    fn first_third_renews_access_only() {
        let claims = refresh(0, 300);
        for elapsed in [0, 1, 50, 99] {
            assert_eq!(
                evaluate(false, &claims, elapsed),
                RenewalOutcome::AccessOnly,
                "elapsed={}",
                elapsed
            );
        }
    }

    #[test]
    fn last_two_thirds_rotate_fully() {
        let claims = refresh(0, 300);
        for elapsed in [100, 101, 200, 299] {
            assert_eq!(
                evaluate(false, &claims, elapsed),
                RenewalOutcome::FullRotation,
                "elapsed={}",
                elapsed
            );
        }
    }

    #[test]
    fn expired_window_is_denied_regardless_of_access() {
        let claims = refresh(0, 300);
        assert_eq!(evaluate(false, &claims, 300), RenewalOutcome::Denied);
        assert_eq!(evaluate(false, &claims, 10_000), RenewalOutcome::Denied);
        // A (forged-clock) valid access token cannot outlive the window
        assert_eq!(evaluate(true, &claims, 300), RenewalOutcome::Denied);
    }

    #[test]
    fn boundary_sits_at_exactly_one_third() {
        let claims = refresh(1000, 1300);
        assert_eq!(evaluate(false, &claims, 1099), RenewalOutcome::AccessOnly);
        assert_eq!(evaluate(false, &claims, 1100), RenewalOutcome::FullRotation);
    }
}
