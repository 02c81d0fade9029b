//! Cryptographic building blocks
//!
//! - `primitives`: the adapter over the cipher crates (the only module that
//!   calls them directly)
//! - `kdf`: the keyed Blake3 derivation pipeline for all subkeys
//! - `ecdh`: X25519 + Blake3 + ChaCha20-Poly1305 sealing of key material

pub mod ecdh;
pub mod kdf;
pub mod primitives;
