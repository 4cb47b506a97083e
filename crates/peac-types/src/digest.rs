//! SHA-256 digests in the two forms this workspace moves between:
//! bare lowercase hex (as stored in `manifest.files[].sha256`) and the
//! self-describing `sha256:<hex>` form (as stored in
//! `manifest.content_hash` and `report_hash`).

use sha2::{Digest, Sha256};

pub const SHA256_PREFIX: &str = "sha256:";

/// Lowercase hex SHA-256 of `bytes`, with no prefix.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// `sha256:<hex>` digest of `bytes`.
#[must_use]
pub fn sha256_prefixed(bytes: &[u8]) -> String {
    format!("{SHA256_PREFIX}{}", sha256_hex(bytes))
}

/// Strip a `sha256:` prefix if present, returning the bare hex either way.
#[must_use]
pub fn strip_prefix(digest: &str) -> &str {
    digest.strip_prefix(SHA256_PREFIX).unwrap_or(digest)
}

#[derive(Debug, thiserror::Error)]
pub enum DigestFormatError {
    #[error("digest has wrong length: expected 64 hex characters, got {0}")]
    WrongLength(usize),
    #[error("digest contains non-hex characters")]
    NotHex,
}

/// Validate that `digest` (with or without a `sha256:` prefix) is 64 lowercase
/// hex characters.
pub fn validate_hex(digest: &str) -> Result<(), DigestFormatError> {
    let hex_part = strip_prefix(digest);
    if hex_part.len() != 64 {
        return Err(DigestFormatError::WrongLength(hex_part.len()));
    }
    if !hex_part.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()) {
        return Err(DigestFormatError::NotHex);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_and_prefixed_agree() {
        let bytes = b"hello";
        let hex = sha256_hex(bytes);
        let prefixed = sha256_prefixed(bytes);
        assert_eq!(prefixed, format!("sha256:{hex}"));
        assert_eq!(strip_prefix(&prefixed), hex);
    }

    #[test]
    fn validates_length_and_charset() {
        assert!(validate_hex(&sha256_prefixed(b"x")).is_ok());
        assert!(validate_hex("sha256:deadbeef").is_err());
        assert!(validate_hex(&"Z".repeat(64)).is_err());
    }

    #[test]
    fn hex_is_64_lowercase_chars() {
        let hex = sha256_hex(b"");
        assert_eq!(hex.len(), 64);
        assert!(hex.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
    }
}
