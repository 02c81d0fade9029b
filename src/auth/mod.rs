//! Magic-link authentication
//!
//! Issuance binds a magic token to `(user, session keys, ui host)`;
//! redemption verifies the same session key, consumes the token exactly
//! once, bootstraps the user's private-key context and mints the session
//! tokens.

pub mod magic_token;
pub mod privkey_context;
pub mod redemption;
pub mod user_id;
