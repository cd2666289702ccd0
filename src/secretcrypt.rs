//! Encryption/decryption using SHA-256 key derivation + AES-256-GCM
//!
//! This module implements passphrase-based encryption using:
//! - a single SHA-256 pass over the passphrase as the key (see [`crate::keyderive`])
//! - AES-256-GCM for authenticated encryption
//!
//! Every call to [`encrypt`] draws a fresh 12-byte IV from the operating
//! system RNG. There is no public way to encrypt under an IV obtained from
//! parsing, apart from [`encrypt_deterministic`], which exists for test
//! vectors only.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use rand::rngs::OsRng;
use tracing::debug;

use crate::envelope::Envelope;
use crate::error::{CipherpadError, ErrorCategory, ErrorKind, Result};
use crate::keyderive::{DerivedKey, derive_key};

/// Length of IV in bytes (96-bit GCM nonce)
pub const IV_LEN: usize = 12;

/// Length of the GCM authentication tag appended to every ciphertext
pub const TAG_LEN: usize = 16;

/// A per-encryption GCM nonce.
pub type Iv = [u8; IV_LEN];

/// Generate a fresh random IV.
pub fn generate_iv() -> Iv {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);
    iv
}

/// Seal plaintext under `key` and `iv`. The result carries the tag at its end.
pub fn seal(key: &DerivedKey, iv: &Iv, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    cipher.encrypt(Nonce::from_slice(iv), plaintext).map_err(|e| {
        CipherpadError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::CipherFailure,
            format!("encryption failed: {}", e),
        )
    })
}

/// Open a sealed ciphertext. Any tag mismatch is reported as
/// [`ErrorKind::AuthenticationFailed`] and yields no plaintext.
pub fn open(key: &DerivedKey, iv: &Iv, ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.len() < TAG_LEN {
        return Err(CipherpadError::with_kind(
            ErrorCategory::User,
            ErrorKind::AuthenticationFailed,
            "ciphertext shorter than authentication tag; likely truncated",
        ));
    }

    let cipher = Aes256Gcm::new(key.as_bytes().into());
    cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map_err(|_| {
            debug!(len = ciphertext.len(), "authentication tag did not verify");
            CipherpadError::with_kind(
                ErrorCategory::User,
                ErrorKind::AuthenticationFailed,
                "corrupt input, tampered-with data, wrong IV, or bad passphrase",
            )
        })
}

/// Encrypt plaintext with a passphrase using a fresh random IV
pub fn encrypt(passphrase: &[u8], plaintext: &[u8]) -> Result<Envelope> {
    encrypt_deterministic(passphrase, plaintext, &generate_iv())
}

/// Encrypt plaintext with a passphrase using the provided IV
///
/// This function is ONLY for testing purposes to generate deterministic output.
/// NEVER use this in production - always use `encrypt()` which generates a random IV.
pub fn encrypt_deterministic(passphrase: &[u8], plaintext: &[u8], iv: &Iv) -> Result<Envelope> {
    let key = derive_key(passphrase);
    let ciphertext = seal(&key, iv, plaintext)?;
    Ok(Envelope {
        ciphertext,
        iv: *iv,
    })
}

/// Decrypt an envelope with a passphrase
pub fn decrypt(passphrase: &[u8], envelope: &Envelope) -> Result<Vec<u8>> {
    let key = derive_key(passphrase);
    open(&key, &envelope.iv, &envelope.ciphertext)
}
