//! Fatal bundle writer/reader errors (spec §4.5, §4.6).
//!
//! Per-receipt problems surfaced while *reading* a bundle for a
//! verification report (e.g. a missing `kid`) are not fatal and are not
//! represented here — `peac-report` records those as strings inside each
//! receipt's check record instead of raising a crate error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("E_BUNDLE_MISSING_RECEIPTS: a bundle requires at least one receipt")]
    MissingReceipts,

    #[error("E_BUNDLE_MISSING_KEYS: a bundle requires at least one key")]
    MissingKeys,

    #[error("E_BUNDLE_SIZE_EXCEEDED: {reason}")]
    SizeExceeded { reason: String },

    #[error("E_BUNDLE_RECEIPT_INVALID: receipt at index {index}: {reason}")]
    ReceiptInvalid { index: usize, reason: String },

    #[error("E_BUNDLE_DUPLICATE_RECEIPT: receipt id {rid} appears more than once")]
    DuplicateReceipt { rid: String },

    #[error("E_BUNDLE_MANIFEST_MISSING: archive has no manifest.json entry")]
    ManifestMissing,

    #[error("E_BUNDLE_MANIFEST_INVALID: {reason}")]
    ManifestInvalid { reason: String },

    #[error("E_BUNDLE_HASH_MISMATCH: {reason}")]
    HashMismatch { reason: String },

    #[error("E_BUNDLE_RECEIPTS_UNORDERED: receipts.ndjson is not sorted by (iat, rid, receipt_hash)")]
    ReceiptsUnordered,

    #[error("E_BUNDLE_POLICY_HASH_MISMATCH: declared policy_hash does not match policy/policy.yaml")]
    PolicyHashMismatch,

    #[error("E_BUNDLE_PATH_TRAVERSAL: entry path {path:?} is not allowed")]
    PathTraversal { path: String },

    #[error("E_BUNDLE_INVALID_FORMAT: {0}")]
    Io(#[from] std::io::Error),

    #[error("E_BUNDLE_INVALID_FORMAT: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl BundleError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingReceipts => "E_BUNDLE_MISSING_RECEIPTS",
            Self::MissingKeys => "E_BUNDLE_MISSING_KEYS",
            Self::SizeExceeded { .. } => "E_BUNDLE_SIZE_EXCEEDED",
            Self::ReceiptInvalid { .. } => "E_BUNDLE_RECEIPT_INVALID",
            Self::DuplicateReceipt { .. } => "E_BUNDLE_DUPLICATE_RECEIPT",
            Self::ManifestMissing => "E_BUNDLE_MANIFEST_MISSING",
            Self::ManifestInvalid { .. } => "E_BUNDLE_MANIFEST_INVALID",
            Self::HashMismatch { .. } => "E_BUNDLE_HASH_MISMATCH",
            Self::ReceiptsUnordered => "E_BUNDLE_RECEIPTS_UNORDERED",
            Self::PolicyHashMismatch => "E_BUNDLE_POLICY_HASH_MISMATCH",
            Self::PathTraversal { .. } => "E_BUNDLE_PATH_TRAVERSAL",
            Self::Io(_) => "E_BUNDLE_INVALID_FORMAT",
            Self::Zip(_) => "E_BUNDLE_INVALID_FORMAT",
        }
    }
}

pub type BundleResult<T> = Result<T, BundleError>;
