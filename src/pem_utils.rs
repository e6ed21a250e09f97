use crate::error::{CrtAuthError, Result};
use crate::key::{EC_PRIVATE_KEY_LABEL, KeyPair, RSA_PRIVATE_KEY_LABEL};

/// Convert DER-encoded data into a PEM-encoded string with the provided label.
///
/// Lines end with `\n` on every platform.
pub fn der_to_pem(der: &[u8], label: &str) -> String {
    let pem = pem::Pem::new(label, der);
    pem::encode_config(
        &pem,
        pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF),
    )
}

/// Returns the first block of a PEM stream whose label is one of `labels`.
///
/// Labels are compared ignoring case and surrounding whitespace. Blocks with other labels are
/// skipped.
pub fn find_block(data: &[u8], labels: &[&'static str]) -> Result<pem::Pem> {
    let (_, block) = scan(data, labels)?
        .ok_or(CrtAuthError::BlockNotFound(labels.first().copied().unwrap_or("PEM")))?;
    Ok(block)
}

/// Reads the first RSA or EC private key block of a PEM stream.
pub fn find_key_block(data: &[u8]) -> Result<KeyPair> {
    let (label, block) = scan(data, &[RSA_PRIVATE_KEY_LABEL, EC_PRIVATE_KEY_LABEL])?
        .ok_or(CrtAuthError::BlockNotFound("PRIVATE KEY"))?;
    KeyPair::from_der(label, block.contents())
}

fn scan(data: &[u8], labels: &[&'static str]) -> Result<Option<(&'static str, pem::Pem)>> {
    for block in pem::parse_many(data)? {
        let tag = block.tag().trim();
        if let Some(label) = labels.iter().copied().find(|label| label.eq_ignore_ascii_case(tag)) {
            return Ok(Some((label, block)));
        }
    }
    Ok(None)
}
