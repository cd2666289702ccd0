//! Passphrase to key derivation
//!
//! The key is the SHA-256 digest of the passphrase bytes, used directly as
//! AES-256 key material. There is no salt and no iteration count: the same
//! passphrase always yields the same key, so confidentiality rests on IV
//! uniqueness and passphrase strength alone.
//!
//! Offline guessing is cheap against this scheme. It is kept because
//! existing envelopes carry no salt field; moving to a salted or iterated
//! derivation changes the envelope format and would need a new format
//! version.

use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of derived key in bytes
pub const KEY_LEN: usize = 32;

/// A 256-bit key derived from a passphrase. Wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; KEY_LEN]);

impl DerivedKey {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKey(..)")
    }
}

/// Derive a 32-byte key from a passphrase.
///
/// Accepts any input, including the empty passphrase; rejecting empty
/// passphrases is the caller's policy (see
/// [`require_passphrase`](crate::passphrase::require_passphrase)).
pub fn derive_key(passphrase: &[u8]) -> DerivedKey {
    let digest = Sha256::digest(passphrase);
    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&digest);
    DerivedKey(key)
}
