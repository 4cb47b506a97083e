//! The closed `E_*` error alphabet shared by every layer of the engine.
//!
//! Each crate defines its own `thiserror` enum for the errors it can
//! raise directly (see [`CanonError`] and [`ReceiptSchemaError`] here,
//! `peac_crypto::JwsError`, `peac_receipt::VerifyError`, and
//! `peac_bundle::BundleError` downstream). Every variant carries a stable
//! `code()` token drawn from the specification's error alphabet and a
//! human-readable message; none of them are meant to be pattern-matched
//! on their `Display` text.

use serde::Serialize;
use thiserror::Error;

/// One structural problem found while validating a receipt claim tree.
///
/// Bounded to at most 25 entries per parse (see [`MAX_SCHEMA_ISSUES`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaIssue {
    pub path: String,
    pub message: String,
}

impl SchemaIssue {
    #[must_use]
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Maximum number of [`SchemaIssue`]s a single parse error carries.
pub const MAX_SCHEMA_ISSUES: usize = 25;

/// Canonicalization failures (component 1, JCS).
#[derive(Debug, Error)]
pub enum CanonError {
    #[error("E_CANON_INVALID_VALUE: {reason}")]
    InvalidValue { reason: String },
}

impl CanonError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidValue { .. } => "E_CANON_INVALID_VALUE",
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            reason: reason.into(),
        }
    }
}

pub type CanonResult<T> = Result<T, CanonError>;

/// Receipt schema validation failures (component 3).
#[derive(Debug, Error)]
pub enum ReceiptSchemaError {
    #[error("E_PARSE_COMMERCE_INVALID: {} issue(s)", .issues.len())]
    CommerceInvalid { issues: Vec<SchemaIssue> },

    #[error("E_PARSE_ATTESTATION_INVALID: {} issue(s)", .issues.len())]
    AttestationInvalid { issues: Vec<SchemaIssue> },
}

impl ReceiptSchemaError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::CommerceInvalid { .. } => "E_PARSE_COMMERCE_INVALID",
            Self::AttestationInvalid { .. } => "E_PARSE_ATTESTATION_INVALID",
        }
    }

    #[must_use]
    pub fn issues(&self) -> &[SchemaIssue] {
        match self {
            Self::CommerceInvalid { issues } | Self::AttestationInvalid { issues } => issues,
        }
    }
}

pub type ReceiptSchemaResult<T> = Result<T, ReceiptSchemaError>;

/// Serializable `{code, message, details?}` view of any engine error.
///
/// Public operations in this workspace return idiomatic `Result<T, E>`
/// with a concrete `E` per crate; `ApiError` exists alongside that for
/// callers doing cross-implementation parity testing (see spec §7) who
/// want the `{ok, error}` discriminated shape as data rather than as a
/// Rust enum.
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<&CanonError> for ApiError {
    fn from(err: &CanonError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

impl From<&ReceiptSchemaError> for ApiError {
    fn from(err: &ReceiptSchemaError) -> Self {
        Self::new(err.code(), err.to_string()).with_details(serde_json::json!({
            "issues": err.issues(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canon_error_code() {
        let err = CanonError::invalid("NaN is not finite");
        assert_eq!(err.code(), "E_CANON_INVALID_VALUE");
        assert!(err.to_string().starts_with("E_CANON_INVALID_VALUE"));
    }

    #[test]
    fn schema_error_issue_count_in_message() {
        let err = ReceiptSchemaError::CommerceInvalid {
            issues: vec![
                SchemaIssue::new("$.amt", "missing"),
                SchemaIssue::new("$.cur", "missing"),
            ],
        };
        assert_eq!(err.code(), "E_PARSE_COMMERCE_INVALID");
        assert!(err.to_string().contains("2 issue(s)"));
        assert_eq!(err.issues().len(), 2);
    }

    #[test]
    fn api_error_carries_details_for_schema_errors() {
        let err = ReceiptSchemaError::AttestationInvalid {
            issues: vec![SchemaIssue::new("$.rid", "missing")],
        };
        let api: ApiError = (&err).into();
        assert_eq!(api.code, "E_PARSE_ATTESTATION_INVALID");
        assert!(api.details.is_some());
    }
}
