//! Deterministic dispute-bundle writer (spec §4.5).

use std::io::Write as _;

use chrono::{DateTime, Utc};
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use peac_types::{
    canonicalize, sha256_hex, sha256_prefixed, BundleId, BundleKind, KeySet, Manifest, ManifestFileEntry,
    ManifestReceiptEntry, RefEntry, TimeRange, MANIFEST_VERSION,
};

use crate::error::{BundleError, BundleResult};
use crate::jws_peek::peek;
use crate::limits::BundleLimits;

/// Inputs to [`write_bundle`] (spec §4.5).
pub struct WriteRequest<'a> {
    pub kind: BundleKind,
    pub refs: Vec<RefEntry>,
    pub created_by: String,
    pub receipts: Vec<String>,
    pub keys: &'a KeySet,
    pub policy: Option<Vec<u8>>,
    pub peac_txt: Option<Vec<u8>>,
    pub bundle_id: Option<BundleId>,
    pub created_at: Option<DateTime<Utc>>,
    pub signing_key: Option<&'a [u8; 32]>,
    pub signing_kid: Option<&'a str>,
}

impl<'a> WriteRequest<'a> {
    #[must_use]
    pub fn new(created_by: impl Into<String>, receipts: Vec<String>, keys: &'a KeySet) -> Self {
        Self {
            kind: BundleKind::Dispute,
            refs: Vec::new(),
            created_by: created_by.into(),
            receipts,
            keys,
            policy: None,
            peac_txt: None,
            bundle_id: None,
            created_at: None,
            signing_key: None,
            signing_kid: None,
        }
    }
}

struct ExtractedReceipt {
    jws: String,
    receipt_id: String,
    iat: i64,
    issued_at: String,
    receipt_hash: String,
}

fn extract(req: &WriteRequest<'_>, limits: &BundleLimits) -> BundleResult<Vec<ExtractedReceipt>> {
    if req.receipts.is_empty() {
        return Err(BundleError::MissingReceipts);
    }
    if req.receipts.len() > limits.max_receipts {
        return Err(BundleError::SizeExceeded {
            reason: format!("{} receipts exceeds the limit of {}", req.receipts.len(), limits.max_receipts),
        });
    }
    if req.keys.is_empty() {
        return Err(BundleError::MissingKeys);
    }

    let mut extracted = Vec::with_capacity(req.receipts.len());
    for (index, jws) in req.receipts.iter().enumerate() {
        let peeked = peek(jws).map_err(|_| BundleError::ReceiptInvalid {
            index,
            reason: "payload must carry rid (or jti) and iat".to_string(),
        })?;
        let issued_at = DateTime::<Utc>::from_timestamp(peeked.iat, 0)
            .ok_or_else(|| BundleError::ReceiptInvalid {
                index,
                reason: "iat is not a valid Unix timestamp".to_string(),
            })?
            .to_rfc3339();
        let receipt_hash = sha256_prefixed(jws.as_bytes());
        extracted.push(ExtractedReceipt {
            jws: jws.clone(),
            receipt_id: peeked.rid,
            iat: peeked.iat,
            issued_at,
            receipt_hash,
        });
    }

    let mut seen = std::collections::HashSet::with_capacity(extracted.len());
    for e in &extracted {
        if !seen.insert(e.receipt_id.clone()) {
            return Err(BundleError::DuplicateReceipt { rid: e.receipt_id.clone() });
        }
    }

    // Step 2: sort by (issued_at, receipt_id, receipt_hash).
    extracted.sort_by(|a, b| {
        (&a.issued_at, &a.receipt_id, &a.receipt_hash).cmp(&(&b.issued_at, &b.receipt_id, &b.receipt_hash))
    });
    Ok(extracted)
}

/// Build the deterministic ZIP archive described by spec §4.5.
///
/// # Errors
/// See [`BundleError`].
pub fn write_bundle(req: WriteRequest<'_>, limits: &BundleLimits) -> BundleResult<Vec<u8>> {
    let extracted = extract(&req, limits)?;

    // Step 3: receipts.ndjson.
    let mut receipts_ndjson = extracted.iter().map(|e| e.jws.as_str()).collect::<Vec<_>>().join("\n");
    receipts_ndjson.push('\n');

    // Step 4: keys/keys.json.
    let keys_json = req
        .keys
        .to_pretty_json()
        .map_err(|e| BundleError::ManifestInvalid { reason: e.to_string() })?;

    // Step 5: optional policy files.
    let policy_hash = req.policy.as_ref().map(|bytes| sha256_prefixed(bytes));
    let peac_txt_hash = req.peac_txt.as_ref().map(|bytes| sha256_prefixed(bytes));

    let bundle_id = req.bundle_id.unwrap_or_default();
    let created_at = req.created_at.unwrap_or_else(Utc::now);
    let created_at_str = created_at.to_rfc3339();

    // Step 6: files[] — everything except manifest.json/bundle.sig.
    let mut files: Vec<(String, Vec<u8>)> = vec![
        ("receipts.ndjson".to_string(), receipts_ndjson.into_bytes()),
        ("keys/keys.json".to_string(), keys_json.into_bytes()),
    ];
    if let Some(policy) = &req.policy {
        files.push(("policy/policy.yaml".to_string(), policy.clone()));
    }
    if let Some(peac_txt) = &req.peac_txt {
        files.push(("policy/peac.txt".to_string(), peac_txt.clone()));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let file_entries: Vec<ManifestFileEntry> = files
        .iter()
        .map(|(path, bytes)| ManifestFileEntry {
            path: path.clone(),
            sha256: sha256_hex(bytes),
            size: bytes.len() as u64,
        })
        .collect();

    let receipt_entries: Vec<ManifestReceiptEntry> = extracted
        .iter()
        .map(|e| ManifestReceiptEntry {
            receipt_id: e.receipt_id.clone(),
            issued_at: e.issued_at.clone(),
            receipt_hash: e.receipt_hash.clone(),
        })
        .collect();

    let time_range = {
        let min_iat = extracted.iter().map(|e| e.iat).min().unwrap();
        let max_iat = extracted.iter().map(|e| e.iat).max().unwrap();
        TimeRange {
            start: DateTime::<Utc>::from_timestamp(min_iat, 0).unwrap().to_rfc3339(),
            end: DateTime::<Utc>::from_timestamp(max_iat, 0).unwrap().to_rfc3339(),
        }
    };

    // Step 7: assemble manifest without content_hash, then compute it.
    let mut manifest = Manifest {
        version: MANIFEST_VERSION.to_string(),
        kind: req.kind,
        bundle_id: bundle_id.to_string(),
        refs: req.refs,
        created_by: req.created_by,
        created_at: created_at_str.clone(),
        time_range,
        receipts: receipt_entries,
        keys: req.keys.descriptors_sorted(),
        files: file_entries,
        policy_hash,
        peac_txt_hash,
        content_hash: None,
    };
    let canonical = canonicalize(&serde_json::to_value(&manifest).expect("Manifest always serializes"))
        .map_err(|e| BundleError::ManifestInvalid { reason: e.to_string() })?;
    let content_hash = sha256_prefixed(&canonical);

    // Step 8: insert content_hash and serialize with 2-space indent.
    manifest.content_hash = Some(content_hash.clone());
    let manifest_json = serde_json::to_string_pretty(&manifest)
        .map_err(|e| BundleError::ManifestInvalid { reason: e.to_string() })?;

    // Step 9: optional bundle.sig.
    let bundle_sig = match (req.signing_key, req.signing_kid) {
        (Some(key), Some(kid)) => {
            let payload = serde_json::json!({ "content_hash": content_hash });
            Some(
                peac_crypto::sign(&payload, key, kid, "peac-bundle-sig/0.1")
                    .map_err(|e| BundleError::ManifestInvalid { reason: e.to_string() })?,
            )
        }
        _ => None,
    };

    // Step 10: emit ZIP, stored entries, fixed mtime.
    let mtime = zip_date_time(&created_at);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .last_modified_time(mtime);

    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (path, bytes) in &files {
        zip.start_file(path, options)?;
        zip.write_all(bytes)?;
    }
    zip.start_file("manifest.json", options)?;
    zip.write_all(manifest_json.as_bytes())?;
    if let Some(sig) = &bundle_sig {
        zip.start_file("bundle.sig", options)?;
        zip.write_all(sig.as_bytes())?;
    }
    let cursor = zip.finish()?;

    info!(bundle_id = %bundle_id, receipts = extracted.len(), "wrote dispute bundle");
    Ok(cursor.into_inner())
}

/// Convert a UTC timestamp to the ZIP DOS date-time format, clamping to the
/// format's 1980-2107 range (a bundle's `created_at` is never outside it in
/// practice; this only guards against pathological caller-supplied values).
fn zip_date_time(at: &DateTime<Utc>) -> zip::DateTime {
    use chrono::{Datelike, Timelike};
    let year = at.year().clamp(1980, 2107) as u16;
    zip::DateTime::from_date_and_time(
        year,
        at.month() as u8,
        at.day() as u8,
        at.hour() as u8,
        at.minute() as u8,
        at.second().min(59) as u8,
    )
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use peac_types::{Jwk, KeySet};

    fn sample_keyset(kid: &str, pk: [u8; 32]) -> KeySet {
        KeySet::new(vec![Jwk::ed25519(kid, &pk)]).unwrap()
    }

    fn sample_receipt(sk: &[u8; 32], kid: &str, iat: i64) -> String {
        peac_crypto::sign(
            &serde_json::json!({"iss": "i", "aud": "a", "rid": uuid::Uuid::new_v4().to_string(), "iat": iat, "amt": 1.0, "cur": "USD", "payment": {"rail":"card","reference":"r","amount":1.0,"currency":"USD"}}),
            sk,
            kid,
            "peac-receipt/0.1",
        )
        .unwrap()
    }

    #[test]
    fn rejects_empty_receipts() {
        let (_sk, pk) = peac_crypto::generate_keypair();
        let keys = sample_keyset("k1", pk);
        let req = WriteRequest::new("urn:issuer:1", vec![], &keys);
        let err = write_bundle(req, &BundleLimits::default()).unwrap_err();
        assert_eq!(err.code(), "E_BUNDLE_MISSING_RECEIPTS");
    }

    #[test]
    fn writes_a_valid_zip_with_manifest() {
        let (sk, pk) = peac_crypto::generate_keypair();
        let keys = sample_keyset("k1", pk);
        let receipts = vec![sample_receipt(&sk, "k1", 1_700_000_000), sample_receipt(&sk, "k1", 1_700_000_100)];
        let req = WriteRequest::new("urn:issuer:1", receipts, &keys);
        let bytes = write_bundle(req, &BundleLimits::default()).unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert!(names.contains(&"manifest.json".to_string()));
        assert!(names.contains(&"receipts.ndjson".to_string()));
        assert!(names.contains(&"keys/keys.json".to_string()));
    }

    #[test]
    fn is_deterministic_given_identical_inputs() {
        let (sk, pk) = peac_crypto::generate_keypair();
        let keys = sample_keyset("k1", pk);
        let jws = sample_receipt(&sk, "k1", 1_700_000_000);
        let bundle_id = BundleId::new();
        let created_at = Utc::now();

        let mut req1 = WriteRequest::new("urn:issuer:1", vec![jws.clone()], &keys);
        req1.bundle_id = Some(bundle_id);
        req1.created_at = Some(created_at);
        let bytes1 = write_bundle(req1, &BundleLimits::default()).unwrap();

        let mut req2 = WriteRequest::new("urn:issuer:1", vec![jws], &keys);
        req2.bundle_id = Some(bundle_id);
        req2.created_at = Some(created_at);
        let bytes2 = write_bundle(req2, &BundleLimits::default()).unwrap();

        assert_eq!(bytes1, bytes2);
    }

    #[test]
    fn rejects_duplicate_receipt_ids() {
        let (sk, pk) = peac_crypto::generate_keypair();
        let keys = sample_keyset("k1", pk);
        let jws = sample_receipt(&sk, "k1", 1_700_000_000);
        let req = WriteRequest::new("urn:issuer:1", vec![jws.clone(), jws], &keys);
        let err = write_bundle(req, &BundleLimits::default()).unwrap_err();
        assert_eq!(err.code(), "E_BUNDLE_DUPLICATE_RECEIPT");
    }
}
