//! Cipherpad - passphrase-based text encryption using AES-256-GCM
//!
//! Plaintext is sealed under a key derived from a passphrase and handed
//! back as a two-field base64 text envelope (ciphertext and IV).

#![forbid(unsafe_code)]

pub mod envelope;
pub mod error;
pub mod keyderive;
pub mod passphrase;
pub mod secretcrypt;
pub mod text_ops;
