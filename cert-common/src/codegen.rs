//! Deterministic certificate codes.
//!
//! A certificate's public code is derived from the mention it was issued for and the
//! subject it was issued to, so re-submitting the same pair always lands on the same
//! code and verification links stay stable.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};

/// Maximum length of a derived code.
pub const CODE_LENGTH: usize = 12;

/// Derives the public code for a `(selection_key, subject_key)` pair.
///
/// The pair is joined as `"{selection_key}-{subject_key}"`, hashed with SHA-256, base-64
/// encoded, stripped of everything outside `[A-Za-z0-9]` and truncated to [`CODE_LENGTH`].
/// Returns an empty string when either key is empty, which callers read as "no code yet".
/// The result may be shorter than [`CODE_LENGTH`] if stripping leaves too few characters.
pub fn generate_code(selection_key: &str, subject_key: &str) -> String {
    if selection_key.is_empty() || subject_key.is_empty() {
        return String::new();
    }

    let digest = Sha256::digest(format!("{selection_key}-{subject_key}").as_bytes());
    STANDARD
        .encode(digest)
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(CODE_LENGTH)
        .collect()
}

/// Whether `code` could have come out of [`generate_code`], or been assigned by the
/// backend in the same shape. Used to reject typos before hitting the network.
pub fn is_code_shaped(code: &str) -> bool {
    !code.is_empty()
        && code.len() <= CODE_LENGTH
        && code.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Public verification link for a certificate code.
pub fn share_link(public_base_url: &str, code: &str) -> String {
    format!("{}/certificado/{code}", public_base_url.trim_end_matches('/'))
}
