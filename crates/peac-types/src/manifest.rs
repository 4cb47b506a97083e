//! Bundle manifest types (spec §3, `manifest.json`).
//!
//! [`Manifest`] is assembled by `peac-bundle`'s writer and re-parsed by its
//! reader; the `content_hash` field is always computed over the manifest
//! with that field itself removed (see [`Manifest::content_hash_input`]).

use serde::{Deserialize, Serialize};

use crate::key::KeyDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleKind {
    Dispute,
    Audit,
    Archive,
}

impl Default for BundleKind {
    fn default() -> Self {
        Self::Dispute
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefType {
    Dispute,
    Receipt,
    AuditCase,
    External,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefEntry {
    #[serde(rename = "type")]
    pub ref_type: RefType,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: String,
    pub end: String,
}

/// One entry in `manifest.receipts[]`. Sort key is `(issued_at, receipt_id,
/// receipt_hash)` per spec §4.5 step 2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestReceiptEntry {
    pub receipt_id: String,
    pub issued_at: String,
    pub receipt_hash: String,
}

/// One entry in `manifest.files[]`. `sha256` is bare hex, not self-describing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestFileEntry {
    pub path: String,
    pub sha256: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub kind: BundleKind,
    pub bundle_id: String,
    #[serde(default)]
    pub refs: Vec<RefEntry>,
    pub created_by: String,
    pub created_at: String,
    pub time_range: TimeRange,
    pub receipts: Vec<ManifestReceiptEntry>,
    pub keys: Vec<KeyDescriptor>,
    pub files: Vec<ManifestFileEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peac_txt_hash: Option<String>,
    /// Present on every manifest this crate emits; only `None` in the
    /// transient value passed to [`Manifest::content_hash_input`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

/// Current `manifest.version` tag this workspace emits and accepts.
pub const MANIFEST_VERSION: &str = "peac-bundle/0.1";

impl Manifest {
    /// Clone of `self` with `content_hash` cleared, ready to pass to
    /// [`crate::canon::canonicalize`] when computing or verifying the hash.
    #[must_use]
    pub fn content_hash_input(&self) -> Manifest {
        let mut m = self.clone();
        m.content_hash = None;
        m
    }
}
