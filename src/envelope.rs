//! Text envelope carrying ciphertext and IV
//!
//! The serialized form is
//!
//! ```text
//! Encrypted Text:
//! <base64 ciphertext>
//!
//! IV:
//! <base64 iv>
//! ```
//!
//! using the standard base64 alphabet with padding and no line wrapping.
//! Parsing is lenient: labels match case-insensitively anywhere in the
//! input, and whitespace between a label and its value is skipped.

use base64::{Engine, engine::general_purpose::STANDARD};

use crate::error::{CipherpadError, ErrorCategory, ErrorKind, Result};
use crate::secretcrypt::{IV_LEN, Iv};

const CIPHERTEXT_LABEL: &str = "Encrypted Text:";

const IV_LABEL: &str = "IV:";

/// Decoded envelope: raw ciphertext (tag included) and its IV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub ciphertext: Vec<u8>,
    pub iv: Iv,
}

/// Envelope fields as found in text, still base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeFields {
    pub ciphertext: String,
    pub iv: String,
}

/// Serialize ciphertext and IV into the text envelope.
pub fn serialize(ciphertext: &[u8], iv: &Iv) -> String {
    format!(
        "{}\n{}\n\n{}\n{}",
        CIPHERTEXT_LABEL,
        STANDARD.encode(ciphertext),
        IV_LABEL,
        STANDARD.encode(iv)
    )
}

impl Envelope {
    pub fn to_text(&self) -> String {
        serialize(&self.ciphertext, &self.iv)
    }
}

/// Extract both fields from arbitrary text.
///
/// Returns `None` unless both labels are present with non-empty values.
pub fn parse(text: &str) -> Option<EnvelopeFields> {
    let ciphertext = find_labeled(text, CIPHERTEXT_LABEL)?;
    let iv = find_labeled(text, IV_LABEL)?;
    Some(EnvelopeFields { ciphertext, iv })
}

/// Extract only the `IV:` value from arbitrary text.
pub fn find_iv(text: &str) -> Option<String> {
    find_labeled(text, IV_LABEL)
}

/// Work out which ciphertext and IV to decrypt.
///
/// In order of preference: the combined envelope in `input`; the whole of
/// `input` as ciphertext paired with `carried_iv` (an IV kept from a
/// previously loaded file); the whole of `input` paired with
/// `supplied_iv` (given out-of-band by the caller). Without any IV this
/// fails with [`ErrorKind::MissingIv`].
pub fn resolve(
    input: &str,
    carried_iv: Option<&str>,
    supplied_iv: Option<&str>,
) -> Result<EnvelopeFields> {
    if let Some(fields) = parse(input) {
        return Ok(fields);
    }

    let iv = non_blank(carried_iv)
        .or_else(|| non_blank(supplied_iv))
        .ok_or_else(|| {
            CipherpadError::with_kind(
                ErrorCategory::User,
                ErrorKind::MissingIv,
                "no IV found in input; supply one to decrypt bare ciphertext",
            )
        })?;

    let ciphertext = input.trim();
    if ciphertext.is_empty() {
        return Err(CipherpadError::with_kind(
            ErrorCategory::User,
            ErrorKind::EnvelopeNotFound,
            "input contains no ciphertext",
        ));
    }

    Ok(EnvelopeFields {
        ciphertext: ciphertext.to_string(),
        iv: iv.to_string(),
    })
}

/// Decode the base64 fields into raw bytes.
pub fn decode_fields(fields: &EnvelopeFields) -> Result<Envelope> {
    let ciphertext = decode_b64(&fields.ciphertext, "ciphertext")?;
    let iv_bytes = decode_b64(&fields.iv, "IV")?;
    let iv: Iv = iv_bytes.as_slice().try_into().map_err(|_| {
        CipherpadError::with_kind(
            ErrorCategory::User,
            ErrorKind::EncodingInvalid,
            format!("IV must be {} bytes, got {}", IV_LEN, iv_bytes.len()),
        )
    })?;
    Ok(Envelope { ciphertext, iv })
}

fn decode_b64(value: &str, what: &str) -> Result<Vec<u8>> {
    STANDARD.decode(value.trim()).map_err(|e| {
        CipherpadError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::EncodingInvalid,
            format!("{} is not valid base64: {}", what, e),
            e,
        )
    })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// First occurrence of `label` (ASCII case-insensitive), then skip
/// whitespace and take the rest of that line, trimmed.
fn find_labeled(text: &str, label: &str) -> Option<String> {
    // ASCII lowercasing keeps byte offsets aligned with `text`.
    let haystack = text.to_ascii_lowercase();
    let start = haystack.find(&label.to_ascii_lowercase())? + label.len();

    let rest = text[start..].trim_start();
    let line = rest.split(['\r', '\n']).next().unwrap_or_default().trim();
    if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}
