//! Entry path allow-listing and zip-slip defense (spec §4.6).

use crate::error::BundleError;

const ALLOWED_LITERALS: [&str; 3] = ["manifest.json", "bundle.sig", "receipts.ndjson"];
const ALLOWED_PREFIXES: [&str; 2] = ["keys/", "policy/"];

/// Validate a ZIP entry path against the fixed allow-list. Rejects any path
/// that could escape the archive root (zip-slip) or isn't one of the
/// recognized bundle members.
pub fn validate_entry_path(path: &str) -> Result<(), BundleError> {
    let reject = || BundleError::PathTraversal { path: path.to_string() };

    if path.contains('\\') || path.contains('\0') {
        return Err(reject());
    }
    if path.starts_with('/') || path == "." || path.split('/').any(|seg| seg == "..") {
        return Err(reject());
    }
    if !ALLOWED_LITERALS.contains(&path) && !ALLOWED_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return Err(reject());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_known_entries() {
        assert!(validate_entry_path("manifest.json").is_ok());
        assert!(validate_entry_path("bundle.sig").is_ok());
        assert!(validate_entry_path("receipts.ndjson").is_ok());
        assert!(validate_entry_path("keys/keys.json").is_ok());
        assert!(validate_entry_path("policy/policy.yaml").is_ok());
        assert!(validate_entry_path("policy/peac.txt").is_ok());
    }

    #[test]
    fn rejects_backslash_and_nul() {
        assert!(validate_entry_path("keys\\keys.json").is_err());
        assert!(validate_entry_path("keys/keys.json\0").is_err());
    }

    #[test]
    fn rejects_absolute_and_dotdot() {
        assert!(validate_entry_path("/etc/passwd").is_err());
        assert!(validate_entry_path("keys/../../../etc/passwd").is_err());
        assert!(validate_entry_path(".").is_err());
    }

    #[test]
    fn rejects_paths_outside_the_allow_list() {
        assert!(validate_entry_path("evil.txt").is_err());
        assert!(validate_entry_path("other/thing").is_err());
    }
}
