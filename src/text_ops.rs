//! One-shot encrypt/decrypt operations
//!
//! Everything the command-line front end does goes through here: text in,
//! envelope text out (and back), plus loading input files and saving
//! results. Each call reads the passphrase once, derives its own key and,
//! when encrypting, its own IV. Nothing is shared between calls.

use crate::envelope::{self, EnvelopeFields};
use crate::error::{CipherpadError, ErrorCategory, ErrorKind, Result};
use crate::passphrase::{PassphraseReader, require_passphrase};
use crate::secretcrypt;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tracing::{debug, info};

/// File name offered for saved results when the caller has none in mind.
pub const DEFAULT_EXPORT_NAME: &str = "encrypted_output.txt";

/// Where to find an IV when the input is bare ciphertext.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IvSource {
    /// IV kept from a previously loaded envelope file.
    pub carried: Option<String>,
    /// IV handed in out-of-band by the caller.
    pub supplied: Option<String>,
}

impl IvSource {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn supplied(iv: impl Into<String>) -> Self {
        Self {
            carried: None,
            supplied: Some(iv.into()),
        }
    }
}

/// Result of loading a file for decryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Imported {
    /// The file held a complete envelope.
    Envelope(EnvelopeFields),
    /// No envelope was recognised; the contents are returned untouched.
    Raw(String),
}

impl Imported {
    /// The IV to carry over into a later decryption, if the file had one.
    pub fn carried_iv(&self) -> Option<&str> {
        match self {
            Imported::Envelope(fields) => Some(fields.iv.as_str()),
            Imported::Raw(_) => None,
        }
    }

    /// Text to hand to [`decrypt_text`]: the bare ciphertext for an
    /// envelope, the whole contents otherwise.
    pub fn input_text(&self) -> &str {
        match self {
            Imported::Envelope(fields) => fields.ciphertext.as_str(),
            Imported::Raw(contents) => contents.as_str(),
        }
    }
}

/// Encrypt `plaintext` and return the serialized envelope.
pub fn encrypt_text(
    plaintext: &[u8],
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<String> {
    let passphrase = passphrase_reader.read_passphrase()?;
    require_passphrase(&passphrase)?;

    let envelope = secretcrypt::encrypt(&passphrase, plaintext)
        .map_err(|e| e.with_context("encryption failed"))?;
    debug!(
        plaintext_len = plaintext.len(),
        ciphertext_len = envelope.ciphertext.len(),
        "sealed plaintext"
    );
    Ok(envelope.to_text())
}

/// Decrypt envelope text, or bare ciphertext paired with an IV from `iv`.
pub fn decrypt_text(
    input: &str,
    iv: &IvSource,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<Vec<u8>> {
    let passphrase = passphrase_reader.read_passphrase()?;
    require_passphrase(&passphrase)?;

    let fields = envelope::resolve(input, iv.carried.as_deref(), iv.supplied.as_deref())?;
    let envelope =
        envelope::decode_fields(&fields).map_err(|e| e.with_context("failed to read envelope"))?;
    let plaintext = secretcrypt::decrypt(&passphrase, &envelope)
        .map_err(|e| e.with_context("failed to decrypt"))?;
    debug!(plaintext_len = plaintext.len(), "opened envelope");
    Ok(plaintext)
}

/// Load a text file, recognising an envelope if it contains one.
pub fn import_file(path: &Path) -> Result<Imported> {
    let bytes = fs::read(path).map_err(|e| read_error(path, e))?;
    let contents = String::from_utf8(bytes).map_err(|e| {
        CipherpadError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("{} is not valid UTF-8", path.display()),
            e,
        )
    })?;

    match envelope::parse(&contents) {
        Some(fields) => {
            debug!(path = %path.display(), "loaded envelope");
            Ok(Imported::Envelope(fields))
        }
        None => {
            debug!(path = %path.display(), "no envelope found; using raw contents");
            Ok(Imported::Raw(contents))
        }
    }
}

/// Read a file only for the `IV:` value it carries, such as a previously
/// saved envelope or a note holding just the IV line.
///
/// A file without an IV yields `None`; whether that matters is decided
/// later by [`envelope::resolve`].
pub fn read_iv_file(path: &Path) -> Result<Option<String>> {
    let iv = match import_file(path)? {
        Imported::Envelope(fields) => Some(fields.iv),
        Imported::Raw(contents) => envelope::find_iv(&contents),
    };
    if iv.is_none() {
        debug!(path = %path.display(), "no IV to carry over");
    }
    Ok(iv)
}

/// Write a result verbatim.
///
/// The file is created with mode 0o600 (read/write for owner only) on Unix systems.
pub fn export_file(path: &Path, contents: &[u8]) -> Result<()> {
    write_file_secure(path, contents)
        .map_err(|e| e.with_context(format!("failed to write to {}", path.display())))?;
    info!(path = %path.display(), bytes = contents.len(), "saved result");
    Ok(())
}

/// Encrypt a file, writing the envelope to `output_path`.
pub fn encrypt_file(
    input_path: &Path,
    output_path: &Path,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<()> {
    let plaintext = fs::read(input_path).map_err(|e| read_error(input_path, e))?;
    let armored = encrypt_text(&plaintext, passphrase_reader)?;
    export_file(output_path, armored.as_bytes())
}

/// Decrypt a file, writing the plaintext to `output_path`.
///
/// An IV found in the file is carried over; `iv.supplied` only matters
/// when the file holds bare ciphertext.
pub fn decrypt_file(
    input_path: &Path,
    output_path: &Path,
    iv: &IvSource,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<()> {
    let imported = import_file(input_path)?;
    let iv = IvSource {
        carried: imported
            .carried_iv()
            .map(str::to_string)
            .or_else(|| iv.carried.clone()),
        supplied: iv.supplied.clone(),
    };
    let plaintext = decrypt_text(imported.input_text(), &iv, passphrase_reader)?;
    export_file(output_path, &plaintext)
}

/// Write file with secure permissions (0o600 on Unix)
fn write_file_secure(path: &Path, contents: &[u8]) -> Result<()> {
    #[cfg(unix)]
    {
        use std::fs::OpenOptions;
        use std::os::unix::fs::OpenOptionsExt;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .map_err(|e| {
                CipherpadError::io(
                    ErrorCategory::User,
                    format!("failed to open {}", path.display()),
                    e,
                )
            })?;

        file.write_all(contents).map_err(|e| {
            CipherpadError::io(
                ErrorCategory::Internal,
                format!("failed to write {}", path.display()),
                e,
            )
        })?;
        Ok(())
    }

    #[cfg(not(unix))]
    {
        fs::write(path, contents).map_err(|e| {
            CipherpadError::io(
                ErrorCategory::User,
                format!("failed to write {}", path.display()),
                e,
            )
        })?;
        Ok(())
    }
}

fn read_error(path: &Path, err: io::Error) -> CipherpadError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    CipherpadError::io(
        category,
        format!("failed to read from {}", path.display()),
        err,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passphrase::ConstantPassphraseReader;
    use tempfile::TempDir;

    #[cfg(unix)]
    use std::os::unix::fs::PermissionsExt;

    fn reader(passphrase: &str) -> ConstantPassphraseReader {
        ConstantPassphraseReader::new(passphrase)
    }

    #[test]
    fn test_text_roundtrip() {
        let armored = encrypt_text(b"hello world", &mut reader("correct horse")).unwrap();
        assert!(armored.starts_with("Encrypted Text:\n"));

        let plaintext =
            decrypt_text(&armored, &IvSource::none(), &mut reader("correct horse")).unwrap();
        assert_eq!(plaintext, b"hello world");
    }

    #[test]
    fn test_wrong_passphrase() {
        let armored = encrypt_text(b"hello world", &mut reader("correct horse")).unwrap();
        let err = decrypt_text(&armored, &IvSource::none(), &mut reader("wrong horse"))
            .expect_err("expected authentication failure");
        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
        assert!(err.is_undecryptable());
    }

    #[test]
    fn test_empty_passphrase_rejected() {
        let err = encrypt_text(b"hello", &mut reader("")).expect_err("expected rejection");
        assert_eq!(err.kind, Some(ErrorKind::MissingPassphrase));

        let err = decrypt_text("anything", &IvSource::none(), &mut reader(""))
            .expect_err("expected rejection");
        assert_eq!(err.kind, Some(ErrorKind::MissingPassphrase));
    }

    #[test]
    fn test_bare_ciphertext_with_supplied_iv() {
        let armored = encrypt_text(b"split apart", &mut reader("pw")).unwrap();
        let fields = envelope::parse(&armored).unwrap();

        let plaintext = decrypt_text(
            &fields.ciphertext,
            &IvSource::supplied(fields.iv.clone()),
            &mut reader("pw"),
        )
        .unwrap();
        assert_eq!(plaintext, b"split apart");
    }

    #[test]
    fn test_bare_ciphertext_without_iv() {
        let armored = encrypt_text(b"split apart", &mut reader("pw")).unwrap();
        let fields = envelope::parse(&armored).unwrap();

        let err = decrypt_text(&fields.ciphertext, &IvSource::none(), &mut reader("pw"))
            .expect_err("expected missing IV");
        assert_eq!(err.kind, Some(ErrorKind::MissingIv));
    }

    #[test]
    fn test_tampered_envelope_text() {
        let armored = encrypt_text(b"integrity", &mut reader("pw")).unwrap();
        let fields = envelope::parse(&armored).unwrap();

        // Swap the first base64 character for a different valid one.
        let first = fields.ciphertext.chars().next().unwrap();
        let replacement = if first == 'A' { 'B' } else { 'A' };
        let tampered = armored.replacen(
            &fields.ciphertext,
            &format!("{}{}", replacement, &fields.ciphertext[1..]),
            1,
        );

        let err = decrypt_text(&tampered, &IvSource::none(), &mut reader("pw"))
            .expect_err("expected authentication failure");
        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
    }

    #[test]
    fn test_file_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("plain.txt");
        let crypt_path = temp_dir.path().join(DEFAULT_EXPORT_NAME);
        let decrypted_path = temp_dir.path().join("decrypted.txt");

        fs::write(&plain_path, b"Hello, cipherpad!").unwrap();

        encrypt_file(&plain_path, &crypt_path, &mut reader("test password")).unwrap();
        decrypt_file(
            &crypt_path,
            &decrypted_path,
            &IvSource::none(),
            &mut reader("test password"),
        )
        .unwrap();

        assert_eq!(fs::read(&decrypted_path).unwrap(), b"Hello, cipherpad!");
    }

    #[test]
    fn test_import_envelope_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("saved.txt");
        let armored = encrypt_text(b"x", &mut reader("pw")).unwrap();
        fs::write(&path, format!("my note\n{}\n", armored)).unwrap();

        let imported = import_file(&path).unwrap();
        let fields = envelope::parse(&armored).unwrap();
        assert_eq!(imported.carried_iv(), Some(fields.iv.as_str()));
        assert_eq!(imported.input_text(), fields.ciphertext);
    }

    #[test]
    fn test_import_raw_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("notes.txt");
        fs::write(&path, "plain old notes\n").unwrap();

        let imported = import_file(&path).unwrap();
        assert_eq!(imported, Imported::Raw("plain old notes\n".to_string()));
        assert_eq!(imported.carried_iv(), None);
    }

    #[test]
    fn test_import_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err =
            import_file(&temp_dir.path().join("absent.txt")).expect_err("expected I/O error");
        assert_eq!(err.kind, Some(ErrorKind::Io));
        assert_eq!(err.category, ErrorCategory::User);
    }

    #[test]
    fn test_carried_iv_from_previous_file() {
        let temp_dir = TempDir::new().unwrap();
        let envelope_path = temp_dir.path().join("envelope.txt");
        let bare_path = temp_dir.path().join("bare.txt");
        let decrypted_path = temp_dir.path().join("decrypted.txt");

        let armored = encrypt_text(b"carried", &mut reader("pw")).unwrap();
        let fields = envelope::parse(&armored).unwrap();
        fs::write(&envelope_path, &armored).unwrap();
        fs::write(&bare_path, &fields.ciphertext).unwrap();

        let previous = import_file(&envelope_path).unwrap();
        let iv = IvSource {
            carried: previous.carried_iv().map(str::to_string),
            supplied: None,
        };
        decrypt_file(&bare_path, &decrypted_path, &iv, &mut reader("pw")).unwrap();

        assert_eq!(fs::read(&decrypted_path).unwrap(), b"carried");
    }

    #[test]
    fn test_read_iv_file() {
        let temp_dir = TempDir::new().unwrap();
        let iv_only = temp_dir.path().join("iv.txt");
        let notes = temp_dir.path().join("notes.txt");

        fs::write(&iv_only, "iv:\n  ERERERERERERERER\n").unwrap();
        fs::write(&notes, "just notes").unwrap();

        assert_eq!(
            read_iv_file(&iv_only).unwrap().as_deref(),
            Some("ERERERERERERERER")
        );
        assert_eq!(read_iv_file(&notes).unwrap(), None);

        let err = read_iv_file(&temp_dir.path().join("absent.txt"))
            .expect_err("expected I/O error");
        assert_eq!(err.kind, Some(ErrorKind::Io));
    }

    #[test]
    fn test_iv_file_without_iv_does_not_block_envelope() {
        let temp_dir = TempDir::new().unwrap();
        let notes = temp_dir.path().join("notes.txt");
        fs::write(&notes, "just notes").unwrap();

        let armored = encrypt_text(b"hello", &mut reader("pw")).unwrap();
        let iv = IvSource {
            carried: read_iv_file(&notes).unwrap(),
            supplied: None,
        };
        assert_eq!(decrypt_text(&armored, &iv, &mut reader("pw")).unwrap(), b"hello");
    }

    #[test]
    fn test_failed_decrypt_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("plain.txt");
        let crypt_path = temp_dir.path().join("crypt.txt");
        let decrypted_path = temp_dir.path().join("decrypted.txt");

        fs::write(&plain_path, b"secret").unwrap();
        encrypt_file(&plain_path, &crypt_path, &mut reader("correct")).unwrap();

        let result = decrypt_file(
            &crypt_path,
            &decrypted_path,
            &IvSource::none(),
            &mut reader("wrong"),
        );
        assert!(result.is_err());
        assert!(!decrypted_path.exists());
    }

    #[test]
    #[cfg(unix)]
    fn test_file_permissions() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(DEFAULT_EXPORT_NAME);

        export_file(&path, b"Encrypted Text:\nAAAA\n\nIV:\nAAAA").unwrap();

        let permissions = fs::metadata(&path).unwrap().permissions();
        assert_eq!(permissions.mode() & 0o777, 0o600);
    }
}
