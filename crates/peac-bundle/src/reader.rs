//! Dispute-bundle reader: DoS/path-safety limits, hash verification,
//! ordering checks (spec §4.6).

use std::collections::HashMap;
use std::io::Read as _;

use peac_types::{canonicalize, sha256_hex, sha256_prefixed, Manifest, MANIFEST_VERSION};

use crate::error::{BundleError, BundleResult};
use crate::jws_peek::peek;
use crate::limits::BundleLimits;
use crate::path::validate_entry_path;

/// Parsed view of a bundle's contents (spec §4.6).
pub struct BundleContents {
    pub manifest: Manifest,
    pub receipts: HashMap<String, String>,
    pub keys: peac_types::KeySet,
    pub policy: Option<Vec<u8>>,
    pub peac_txt: Option<Vec<u8>>,
    pub bundle_sig: Option<String>,
}

fn read_entry_capped(
    mut file: zip::read::ZipFile<'_>,
    limits: &BundleLimits,
    total_read: &mut u64,
) -> BundleResult<Vec<u8>> {
    let mut buf = Vec::new();
    let cap = limits.max_entry_bytes;
    let mut limited = (&mut file).take(cap.saturating_add(1));
    limited.read_to_end(&mut buf).map_err(BundleError::Io)?;
    if buf.len() as u64 > cap {
        return Err(BundleError::SizeExceeded {
            reason: format!("entry exceeds the per-entry limit of {cap} bytes"),
        });
    }
    *total_read += buf.len() as u64;
    if *total_read > limits.max_total_bytes {
        return Err(BundleError::SizeExceeded {
            reason: format!("archive exceeds the total limit of {} bytes", limits.max_total_bytes),
        });
    }
    Ok(buf)
}

/// Parse and validate an archive, enforcing the limits in `limits`.
///
/// # Errors
/// See [`BundleError`].
pub fn read_bundle(bytes: &[u8], limits: &BundleLimits) -> BundleResult<BundleContents> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))?;

    if archive.len() > limits.max_entries {
        return Err(BundleError::SizeExceeded {
            reason: format!("{} entries exceeds the limit of {}", archive.len(), limits.max_entries),
        });
    }

    let mut files: HashMap<String, Vec<u8>> = HashMap::with_capacity(archive.len());
    let mut total_read = 0u64;
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        let name = entry.name().to_string();
        validate_entry_path(&name)?;
        let bytes = read_entry_capped(entry, limits, &mut total_read)?;
        files.insert(name, bytes);
    }

    // Step 1: manifest.json must exist.
    let manifest_bytes = files.get("manifest.json").ok_or(BundleError::ManifestMissing)?;
    let manifest: Manifest = serde_json::from_slice(manifest_bytes)
        .map_err(|e| BundleError::ManifestInvalid { reason: e.to_string() })?;

    // Step 2: version check.
    if manifest.version != MANIFEST_VERSION {
        return Err(BundleError::ManifestInvalid {
            reason: format!("unrecognized manifest version {:?}", manifest.version),
        });
    }

    // Step 3: recompute content_hash.
    let without_hash = manifest.content_hash_input();
    let canonical = canonicalize(&serde_json::to_value(&without_hash).expect("Manifest always serializes"))
        .map_err(|e| BundleError::ManifestInvalid { reason: e.to_string() })?;
    let recomputed = sha256_prefixed(&canonical);
    match &manifest.content_hash {
        Some(declared) if declared == &recomputed => {}
        _ => {
            return Err(BundleError::HashMismatch {
                reason: "manifest content_hash does not match recomputed digest".to_string(),
            })
        }
    }

    // Step 4: per-file hash/size checks.
    for entry in &manifest.files {
        let bytes = files.get(&entry.path).ok_or_else(|| BundleError::HashMismatch {
            reason: format!("manifest references file {:?} which is not present in the archive", entry.path),
        })?;
        if bytes.len() as u64 != entry.size {
            return Err(BundleError::HashMismatch {
                reason: format!("file {:?} size mismatch", entry.path),
            });
        }
        if sha256_hex(bytes) != entry.sha256 {
            return Err(BundleError::HashMismatch {
                reason: format!("file {:?} sha256 mismatch", entry.path),
            });
        }
    }

    // Step 5: receipts.ndjson.
    let ndjson = files.get("receipts.ndjson").ok_or_else(|| BundleError::HashMismatch {
        reason: "receipts.ndjson missing from archive".to_string(),
    })?;
    let ndjson_str = String::from_utf8_lossy(ndjson);
    let mut receipts = HashMap::new();
    let mut prev_key: Option<(i64, String, String)> = None;
    for (index, line) in ndjson_str.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let peeked = peek(line).map_err(|e| match e {
            BundleError::ReceiptInvalid { reason, .. } => BundleError::ReceiptInvalid { index, reason },
            other => other,
        })?;
        let receipt_hash = sha256_prefixed(line.as_bytes());
        let key = (peeked.iat, peeked.rid.clone(), receipt_hash);
        if let Some(prev) = &prev_key {
            if key < *prev {
                return Err(BundleError::ReceiptsUnordered);
            }
        }
        if receipts.insert(peeked.rid.clone(), line.to_string()).is_some() {
            return Err(BundleError::DuplicateReceipt { rid: peeked.rid });
        }
        prev_key = Some(key);
    }

    // Step 6: optional policy hash.
    if let Some(declared) = &manifest.policy_hash {
        let policy_bytes = files.get("policy/policy.yaml").ok_or(BundleError::PolicyHashMismatch)?;
        if &sha256_prefixed(policy_bytes) != declared {
            return Err(BundleError::PolicyHashMismatch);
        }
    }

    let keys_bytes = files.get("keys/keys.json").ok_or_else(|| BundleError::HashMismatch {
        reason: "keys/keys.json missing from archive".to_string(),
    })?;
    let keys = peac_types::KeySet::from_json_bytes(keys_bytes)
        .map_err(|e| BundleError::ManifestInvalid { reason: e.to_string() })?;

    // Step 7: attach bundle.sig unchanged.
    let bundle_sig = files.get("bundle.sig").map(|b| String::from_utf8_lossy(b).to_string());

    Ok(BundleContents {
        manifest,
        receipts,
        keys,
        policy: files.get("policy/policy.yaml").cloned(),
        peac_txt: files.get("policy/peac.txt").cloned(),
        bundle_sig,
    })
}
