use std::error::Error as StdError;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Any failure that cannot be confidently attributed to any other error
    /// category in this enum.
    ///
    /// Use of Internal is never a guarantee that the error was not caused
    /// by the user, merely that the code cannot tell.
    Internal,

    /// The user provided invalid input or performed an action that is
    /// unsupported or impossible to complete.
    User,
}

/// Fine-grained condition flags for consumers that want to branch on error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The passphrase was empty. Raised before any cryptographic work.
    MissingPassphrase,
    /// No IV could be found in the envelope, carried over from a previously
    /// loaded file, or supplied by the caller.
    MissingIv,
    /// The input held no usable ciphertext.
    EnvelopeNotFound,
    /// A field was not valid standard base64, or the IV had the wrong length.
    EncodingInvalid,
    /// Authentication failed due to an incorrect passphrase, a wrong IV,
    /// tampering or corruption.
    AuthenticationFailed,
    /// Passphrase could not be obtained from the configured reader.
    PassphraseUnavailable,
    /// AES-GCM refused to seal the plaintext.
    CipherFailure,
    /// Unexpected state reached within cipherpad logic.
    InternalInvariant,
    /// Interaction with the filesystem, stdin/stdout, or other I/O failed.
    Io,
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct CipherpadError {
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Optional specific condition tag for consumers that need to
    /// branch their behavior. Any code consuming errors MUST handle
    /// the absence of a defined kind.
    pub kind: Option<ErrorKind>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl CipherpadError {
    /// Creates a new error with a required category and display message.
    pub fn new(category: ErrorCategory, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: None,
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that also tags the failure with a kind.
    pub fn with_kind(category: ErrorCategory, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that carries both a kind tag and the originating source error.
    pub fn with_kind_and_source(
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// Shorthand for an I/O failure with its originating error.
    pub fn io(category: ErrorCategory, msg: impl Into<String>, source: std::io::Error) -> Self {
        Self::with_kind_and_source(category, ErrorKind::Io, msg, source)
    }

    /// The user-facing message carried by the error.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// True when the envelope cannot be decrypted with the inputs given:
    /// bad encoding or a failed authentication check. Callers can treat
    /// both the same way when reporting to users.
    pub fn is_undecryptable(&self) -> bool {
        matches!(
            self.kind,
            Some(ErrorKind::EncodingInvalid) | Some(ErrorKind::AuthenticationFailed)
        )
    }

    /// Wraps the current error with a higher-level message while preserving the original as source.
    pub fn with_context(self, msg: impl Into<String>) -> Self {
        let category = self.category;
        let kind = self.kind;
        Self {
            category,
            kind,
            source: Some(Box::new(self)),
            msg: msg.into(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, CipherpadError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_context_preserves_kind_and_chain() {
        let inner = CipherpadError::with_kind(
            ErrorCategory::User,
            ErrorKind::AuthenticationFailed,
            "bad tag",
        );
        let outer = inner.with_context("failed to decrypt");

        assert_eq!(outer.kind, Some(ErrorKind::AuthenticationFailed));
        assert_eq!(outer.category, ErrorCategory::User);
        assert_eq!(outer.message(), "failed to decrypt");
        assert_eq!(outer.source().unwrap().to_string(), "bad tag");
    }

    #[test]
    fn test_undecryptable_groups_encoding_and_auth() {
        let enc = CipherpadError::with_kind(ErrorCategory::User, ErrorKind::EncodingInvalid, "x");
        let auth =
            CipherpadError::with_kind(ErrorCategory::User, ErrorKind::AuthenticationFailed, "x");
        let iv = CipherpadError::with_kind(ErrorCategory::User, ErrorKind::MissingIv, "x");
        let plain = CipherpadError::new(ErrorCategory::Internal, "x");

        assert!(enc.is_undecryptable());
        assert!(auth.is_undecryptable());
        assert!(!iv.is_undecryptable());
        assert!(!plain.is_undecryptable());
    }
}
