//! Passphrase sources and the empty-passphrase policy

use crate::error::{CipherpadError, ErrorCategory, ErrorKind, Result};
use std::io::{self, Read};
use zeroize::Zeroizing;

/// Trait for reading passphrases from various sources
pub trait PassphraseReader {
    /// Read a passphrase as arbitrary bytes (not necessarily UTF-8)
    ///
    /// Returns the passphrase wrapped in `Zeroizing` to ensure it is securely
    /// wiped from memory when dropped.
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>>;
}

/// Reject an empty passphrase before any key is derived.
pub fn require_passphrase(passphrase: &[u8]) -> Result<()> {
    if passphrase.is_empty() {
        return Err(CipherpadError::with_kind(
            ErrorCategory::User,
            ErrorKind::MissingPassphrase,
            "enter a passphrase",
        ));
    }
    Ok(())
}

/// Read a passphrase once and reject it if empty.
pub fn read_required(
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<Zeroizing<Vec<u8>>> {
    let passphrase = passphrase_reader.read_passphrase()?;
    require_passphrase(&passphrase)?;
    Ok(passphrase)
}

/// Returns a fixed passphrase
pub struct ConstantPassphraseReader {
    passphrase: Zeroizing<Vec<u8>>,
}

impl ConstantPassphraseReader {
    pub fn new(passphrase: impl Into<Vec<u8>>) -> Self {
        Self {
            passphrase: Zeroizing::new(passphrase.into()),
        }
    }
}

impl PassphraseReader for ConstantPassphraseReader {
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        Ok(Zeroizing::new((*self.passphrase).clone()))
    }
}

/// Reads passphrase from any io::Read source
///
/// One trailing line ending is dropped so that `echo secret | cipherpad ...`
/// and `printf secret | cipherpad ...` agree.
pub struct ReaderPassphraseReader {
    reader: Box<dyn Read>,
}

impl ReaderPassphraseReader {
    pub fn new(reader: Box<dyn Read>) -> Self {
        Self { reader }
    }
}

impl PassphraseReader for ReaderPassphraseReader {
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let mut data = Zeroizing::new(Vec::new());
        self.reader.read_to_end(&mut data).map_err(|e| {
            CipherpadError::io(
                ErrorCategory::Internal,
                format!("error reading passphrase: {}", e),
                e,
            )
        })?;
        if data.ends_with(b"\n") {
            data.pop();
            if data.ends_with(b"\r") {
                data.pop();
            }
        }
        Ok(data)
    }
}

/// Reads passphrase from terminal with no echo
#[derive(Default)]
pub struct TerminalPassphraseReader;

impl TerminalPassphraseReader {
    pub fn new() -> Self {
        Self
    }
}

impl PassphraseReader for TerminalPassphraseReader {
    /// Read passphrase from terminal.
    ///
    /// Terminal input is limited to UTF-8 by rpassword. For other byte
    /// sequences, use --passphrase-stdin.
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        // rpassword prompts on and reads from the controlling terminal, so
        // stdin and stderr may both be redirected.
        open_terminal().map_err(terminal_unavailable)?;

        let passphrase = Zeroizing::new(
            rpassword::prompt_password("Passphrase (cipherpad): ").map_err(|e| {
                CipherpadError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::PassphraseUnavailable,
                    format!("failure reading passphrase: {}", e),
                    e,
                )
            })?,
        );

        Ok(Zeroizing::new(passphrase.as_bytes().to_vec()))
    }
}

#[cfg(unix)]
fn open_terminal() -> io::Result<()> {
    std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open("/dev/tty")
        .map(drop)
}

#[cfg(not(unix))]
fn open_terminal() -> io::Result<()> {
    use std::io::IsTerminal;

    if io::stdin().is_terminal() {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            "stdin is not a terminal",
        ))
    }
}

fn terminal_unavailable(err: io::Error) -> CipherpadError {
    CipherpadError::with_kind_and_source(
        ErrorCategory::User,
        ErrorKind::PassphraseUnavailable,
        "cannot read passphrase from terminal - no terminal available; use --passphrase-stdin",
        err,
    )
}
