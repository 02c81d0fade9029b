//! Token authority: access tokens, refresh cookies, renewal policy
//!
//! Access tokens live ~1 minute (dev) and bind the Ed25519 session key that
//! all signed requests are verified against; refresh cookies live ~5
//! minutes (dev) and drive the 1/3 vs 2/3 renewal windows.

pub mod authority;
pub mod claims;
pub mod cookie;
pub mod policy;

pub use claims::{AccessClaims, RefreshClaims};
pub use policy::RenewalOutcome;
