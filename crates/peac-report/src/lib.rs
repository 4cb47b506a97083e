//! # peac-report
//!
//! Offline dispute-bundle verification reports (spec §4.7).
//!
//! [`verify_bundle`] reads an archive with [`peac_bundle::read_bundle`],
//! checks the optional `bundle.sig` against the bundle's own key set,
//! cryptographically verifies every receipt it can resolve a key for, and
//! assembles a [`VerificationReport`] whose `report_hash` is stable for
//! identical archive bytes and identical `now` — a malformed or tampered
//! receipt never aborts the run, it is only recorded against that
//! receipt's check record (spec §7 propagation policy).

mod error;

pub use error::{ReportError, ReportResult};

use std::collections::BTreeMap;

use tracing::{debug, info};

use peac_bundle::{read_bundle, BundleContents, BundleLimits};
use peac_crypto::JwsError;
use peac_types::{
    canonicalize, parse_claims, sha256_prefixed, AuditorSummary, BundleSignatureResult, KeySet,
    KeyUsageEntry, Recommendation, ReceiptCheckRecord, VerificationReport, REPORT_VERSION,
};

const DEFAULT_MAX_CLOCK_SKEW_SECS: i64 = 300;

/// Options accepted by [`verify_bundle`] (spec §4.7).
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Resolve every signing key from the bundle's own key set, with no
    /// external fetches. Non-offline key resolution (fetching an unknown
    /// `kid` over the network) is outside this engine's scope — there is
    /// no transport in the core (spec §5) — so `offline: false` currently
    /// behaves identically to `offline: true`.
    pub offline: bool,
    pub now: Option<i64>,
    pub max_clock_skew: Option<i64>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            offline: true,
            now: None,
            max_clock_skew: None,
        }
    }
}

impl ReportOptions {
    fn max_clock_skew(&self) -> i64 {
        self.max_clock_skew.unwrap_or(DEFAULT_MAX_CLOCK_SKEW_SECS)
    }
}

fn check_bundle_signature(contents: &BundleContents) -> BundleSignatureResult {
    let Some(sig) = &contents.bundle_sig else {
        return BundleSignatureResult::absent();
    };

    let (header, _payload) = match peac_crypto::peek_unverified(sig) {
        Ok(v) => v,
        Err(e) => {
            return BundleSignatureResult {
                present: true,
                valid: false,
                key_id: None,
                error: Some(e.code().to_string()),
            }
        }
    };
    let kid = header.kid;

    let Some(jwk) = contents.keys.find(&kid) else {
        return BundleSignatureResult {
            present: true,
            valid: false,
            key_id: Some(kid),
            error: Some("E_BUNDLE_KEY_MISSING".to_string()),
        };
    };
    let Ok(public_key) = jwk.public_key_bytes() else {
        return BundleSignatureResult {
            present: true,
            valid: false,
            key_id: Some(kid),
            error: Some("E_BUNDLE_KEY_MISSING".to_string()),
        };
    };

    let verified = match peac_crypto::verify(sig, &public_key) {
        Ok(v) => v,
        Err(e) => {
            return BundleSignatureResult {
                present: true,
                valid: false,
                key_id: Some(kid),
                error: Some(e.code().to_string()),
            }
        }
    };

    let declared = verified.payload.get("content_hash").and_then(|v| v.as_str());
    if declared != contents.manifest.content_hash.as_deref() {
        return BundleSignatureResult {
            present: true,
            valid: false,
            key_id: Some(kid),
            error: Some("E_BUNDLE_HASH_MISMATCH".to_string()),
        };
    }

    BundleSignatureResult {
        present: true,
        valid: true,
        key_id: Some(kid),
        error: None,
    }
}

/// Check one receipt against the bundle's key set (spec §4.7 step 3).
///
/// `jti`/`iss`/`iat` presence isn't checked separately: `CoreClaims`'s
/// non-optional fields already guarantee it once parsing succeeds.
fn check_receipt(receipt_id: &str, jws: &str, keys: &KeySet, now: i64, max_clock_skew: i64) -> ReceiptCheckRecord {
    let not_found = |reason: &str| ReceiptCheckRecord {
        receipt_id: receipt_id.to_string(),
        signature_valid: false,
        claims_valid: false,
        key_id: None,
        errors: vec![reason.to_string()],
        claims: None,
    };

    let (header, _payload) = match peac_crypto::peek_unverified(jws) {
        Ok(v) => v,
        Err(_) => return not_found("E_RECEIPT_CLAIMS_INVALID"),
    };
    let kid = header.kid;

    let Some(jwk) = keys.find(&kid) else {
        return not_found("E_BUNDLE_KEY_MISSING");
    };
    let Ok(public_key) = jwk.public_key_bytes() else {
        return not_found("E_BUNDLE_KEY_MISSING");
    };

    let verified = match peac_crypto::verify(jws, &public_key) {
        Ok(v) => v,
        Err(JwsError::SignatureInvalid) => {
            return ReceiptCheckRecord {
                receipt_id: receipt_id.to_string(),
                signature_valid: false,
                claims_valid: false,
                key_id: Some(kid),
                errors: vec!["E_RECEIPT_SIGNATURE_INVALID".to_string()],
                claims: None,
            }
        }
        Err(_) => {
            return ReceiptCheckRecord {
                receipt_id: receipt_id.to_string(),
                signature_valid: false,
                claims_valid: false,
                key_id: Some(kid),
                errors: vec!["E_RECEIPT_CLAIMS_INVALID".to_string()],
                claims: None,
            }
        }
    };

    let variant = match parse_claims(&verified.payload) {
        Ok(v) => v,
        Err(_) => {
            return ReceiptCheckRecord {
                receipt_id: receipt_id.to_string(),
                signature_valid: true,
                claims_valid: false,
                key_id: Some(kid),
                errors: vec!["E_RECEIPT_CLAIMS_INVALID".to_string()],
                claims: None,
            }
        }
    };
    let claims = variant.to_core_claims();

    let mut errors = Vec::new();
    if claims.iat > now + max_clock_skew {
        errors.push("E_RECEIPT_NOT_YET_VALID".to_string());
    }
    if let Some(exp) = claims.exp {
        if exp < now {
            errors.push("E_RECEIPT_EXPIRED".to_string());
        }
    }

    let claims_valid = errors.is_empty();
    let claims_value = claims_valid.then(|| serde_json::to_value(&claims).expect("CoreClaims always serializes"));

    ReceiptCheckRecord {
        receipt_id: receipt_id.to_string(),
        signature_valid: true,
        claims_valid,
        key_id: Some(kid),
        errors,
        claims: claims_value,
    }
}

/// Generate a verification report for an archive (spec §4.7).
///
/// # Errors
/// Propagates every [`peac_bundle::BundleError`] from reading the archive
/// (spec §4.7 step 1). Per-receipt problems never abort this call; they
/// land in that receipt's [`ReceiptCheckRecord::errors`] instead.
pub fn verify_bundle(bytes: &[u8], options: &ReportOptions, limits: &BundleLimits) -> ReportResult<VerificationReport> {
    if !options.offline {
        debug!("non-offline key resolution is unimplemented; resolving from the bundle's own key set");
    }

    let contents = read_bundle(bytes, limits)?;
    let now = options.now.unwrap_or_else(|| chrono::Utc::now().timestamp());
    let skew = options.max_clock_skew();

    let bundle_signature = check_bundle_signature(&contents);

    // Step 3.
    let mut records: Vec<ReceiptCheckRecord> = contents
        .manifest
        .receipts
        .iter()
        .map(|entry| match contents.receipts.get(&entry.receipt_id) {
            Some(jws) => check_receipt(&entry.receipt_id, jws, &contents.keys, now, skew),
            None => ReceiptCheckRecord {
                receipt_id: entry.receipt_id.clone(),
                signature_valid: false,
                claims_valid: false,
                key_id: None,
                errors: vec!["E_BUNDLE_RECEIPT_NOT_FOUND".to_string()],
                claims: None,
            },
        })
        .collect();

    // Step 4.
    records.sort_by(|a, b| a.receipt_id.cmp(&b.receipt_id));

    // Step 5.
    let mut usage: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for record in &records {
        if let Some(kid) = &record.key_id {
            usage.entry(kid.clone()).or_default().push(record.receipt_id.clone());
        }
    }
    let key_usage: Vec<KeyUsageEntry> = usage
        .into_iter()
        .map(|(kid, mut receipt_ids)| {
            receipt_ids.sort();
            KeyUsageEntry { kid, receipt_ids }
        })
        .collect();

    // Step 6.
    let total = records.len();
    let valid = records.iter().filter(|r| r.is_fully_valid()).count();
    let mut issues: Vec<String> = records
        .iter()
        .filter(|r| !r.is_fully_valid())
        .map(|r| format!("Receipt {}: {}", r.receipt_id, r.errors.join(", ")))
        .collect();
    issues.sort();
    let recommendation = if valid == total {
        Recommendation::Valid
    } else if valid == 0 {
        Recommendation::Invalid
    } else {
        Recommendation::NeedsReview
    };
    let auditor_summary = AuditorSummary {
        headline: format!("{valid}/{total} receipts valid"),
        issues,
        recommendation,
    };

    // Step 7.
    let content_hash = contents.manifest.content_hash.clone().ok_or_else(|| {
        peac_bundle::BundleError::ManifestInvalid {
            reason: "manifest missing content_hash".to_string(),
        }
    })?;
    let mut report = VerificationReport {
        version: REPORT_VERSION.to_string(),
        content_hash,
        bundle_signature,
        receipts: records,
        key_usage,
        auditor_summary,
        report_hash: None,
    };
    let canonical = canonicalize(
        &serde_json::to_value(&report.report_hash_input()).expect("VerificationReport always serializes"),
    )?;
    report.report_hash = Some(sha256_prefixed(&canonical));

    info!(total, valid, "generated verification report");
    Ok(report)
}
