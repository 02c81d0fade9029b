//! Signed request / signed response envelope protocol
//!
//! Every client→server and server→client message body is an Ed25519-signed,
//! canonically-serialized, Base64URL-encoded payload. The Base64URL string
//! is the signing input on both directions; GET/DELETE requests sign their
//! canonicalized query parameters instead.

pub mod query;
pub mod sign;
pub mod types;
pub mod verify;

pub use types::{SignedRequest, SignedResponse};
