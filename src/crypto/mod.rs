//! ALFA Media Vault - Cryptographic Core
//!
//! Password-derived master key (PBKDF2-HMAC-SHA256) and AES-256-GCM
//! envelope encryption.

pub mod keys;
pub mod aead;

pub use keys::*;
pub use aead::*;
