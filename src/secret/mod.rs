//! Dual-URL shared secrets
//!
//! - `types`: roles, record, validation bounds
//! - `url_hash`: user-bound row addressing (address = access check)
//! - `material`: per-secret key material and the two encryption layers
//! - `engine`: operation orchestration over storage

pub mod engine;
pub mod material;
pub mod types;
pub mod url_hash;

pub use types::{SecretRecord, SecretRole};
