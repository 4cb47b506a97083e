//! Verification report types (spec §3, §4.7, `peac-report`'s output shape).
//!
//! Kept in `peac-types` rather than `peac-report` so that `peac-bundle` and
//! other consumers can share the wire shape without depending on the report
//! crate's generation logic.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Valid,
    Invalid,
    NeedsReview,
}

/// `{present, valid, key_id?, error?}` record for `bundle.sig` (spec §4.7
/// step 2). `present = false` means the bundle carried no signature at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleSignatureResult {
    pub present: bool,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BundleSignatureResult {
    #[must_use]
    pub fn absent() -> Self {
        Self {
            present: false,
            valid: false,
            key_id: None,
            error: None,
        }
    }
}

/// Per-receipt verification outcome (spec §4.7 step 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptCheckRecord {
    pub receipt_id: String,
    pub signature_valid: bool,
    pub claims_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    pub errors: Vec<String>,
    /// Present only when both signature and claims are valid (spec §4.7).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claims: Option<serde_json::Value>,
}

impl ReceiptCheckRecord {
    #[must_use]
    pub fn is_fully_valid(&self) -> bool {
        self.signature_valid && self.claims_valid
    }
}

/// One row of the key-usage table: a `kid` and every receipt that cited it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyUsageEntry {
    pub kid: String,
    pub receipt_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditorSummary {
    pub headline: String,
    pub issues: Vec<String>,
    pub recommendation: Recommendation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub version: String,
    pub content_hash: String,
    pub bundle_signature: BundleSignatureResult,
    pub receipts: Vec<ReceiptCheckRecord>,
    pub key_usage: Vec<KeyUsageEntry>,
    pub auditor_summary: AuditorSummary,
    /// Present on every report this crate emits; `None` only in the
    /// transient value passed through canonicalization when computing it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_hash: Option<String>,
}

pub const REPORT_VERSION: &str = "peac-verification-report/0.1";

impl VerificationReport {
    #[must_use]
    pub fn report_hash_input(&self) -> VerificationReport {
        let mut r = self.clone();
        r.report_hash = None;
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_hash_input_clears_the_field() {
        let report = VerificationReport {
            version: REPORT_VERSION.to_string(),
            content_hash: "sha256:abc".to_string(),
            bundle_signature: BundleSignatureResult::absent(),
            receipts: vec![],
            key_usage: vec![],
            auditor_summary: AuditorSummary {
                headline: "0/0 receipts valid".to_string(),
                issues: vec![],
                recommendation: Recommendation::Valid,
            },
            report_hash: Some("sha256:def".to_string()),
        };
        assert!(report.report_hash_input().report_hash.is_none());
    }

    #[test]
    fn recommendation_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Recommendation::NeedsReview).unwrap(),
            "\"needs_review\""
        );
    }
}
