//! Decode a compact JWS's payload without verifying its signature.
//!
//! The bundle writer and reader need a receipt's `rid`/`iat` to sort and
//! index it, but signature verification against the right `kid`'s public
//! key is `peac-report`'s job (spec §4.7), not the archive layer's. This
//! module does the minimal, signature-blind decode both `peac-bundle`
//! operations need.

use base64::Engine as _;
use serde_json::Value;

use crate::error::BundleError;

const B64: base64::engine::GeneralPurpose = base64::engine::general_purpose::URL_SAFE_NO_PAD;

/// The only fields a receipt needs to carry to be bundle-eligible: a
/// `kid` to index it by signer, and a `rid`/`jti` plus `iat` to sort it.
/// Full claims-schema validation (commerce vs. attestation, `iss`/`aud`,
/// nested `payment`) is deferred to `peac-report`'s verification step.
pub struct PeekedReceipt {
    pub kid: String,
    pub rid: String,
    pub iat: i64,
}

pub fn peek(jws: &str) -> Result<PeekedReceipt, BundleError> {
    let segments: Vec<&str> = jws.split('.').collect();
    if segments.len() != 3 {
        return Err(BundleError::ReceiptInvalid {
            index: 0,
            reason: "expected 3 dot-separated JWS segments".to_string(),
        });
    }
    let header_bytes = B64.decode(segments[0]).map_err(|e| BundleError::ReceiptInvalid {
        index: 0,
        reason: format!("header not valid base64url: {e}"),
    })?;
    let header: Value = serde_json::from_slice(&header_bytes).map_err(|e| BundleError::ReceiptInvalid {
        index: 0,
        reason: format!("header not valid JSON: {e}"),
    })?;
    let kid = header
        .get("kid")
        .and_then(Value::as_str)
        .ok_or_else(|| BundleError::ReceiptInvalid {
            index: 0,
            reason: "header missing kid".to_string(),
        })?
        .to_string();

    let payload_bytes = B64.decode(segments[1]).map_err(|e| BundleError::ReceiptInvalid {
        index: 0,
        reason: format!("payload not valid base64url: {e}"),
    })?;
    let payload: Value = serde_json::from_slice(&payload_bytes).map_err(|e| BundleError::ReceiptInvalid {
        index: 0,
        reason: format!("payload not valid JSON: {e}"),
    })?;
    let rid = payload
        .get("rid")
        .or_else(|| payload.get("jti"))
        .and_then(Value::as_str)
        .ok_or_else(|| BundleError::ReceiptInvalid {
            index: 0,
            reason: "payload missing rid/jti".to_string(),
        })?
        .to_string();
    let iat = payload
        .get("iat")
        .and_then(Value::as_i64)
        .ok_or_else(|| BundleError::ReceiptInvalid {
            index: 0,
            reason: "payload missing iat".to_string(),
        })?;

    Ok(PeekedReceipt { kid, rid, iat })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peeks_rid_and_iat_without_verifying_signature() {
        let (sk, _pk) = peac_crypto::generate_keypair();
        let jws = peac_crypto::sign(
            &serde_json::json!({"iss": "i", "aud": "a", "rid": "r1", "iat": 42}),
            &sk,
            "k1",
            "t",
        )
        .unwrap();
        let peeked = peek(&jws).unwrap();
        assert_eq!(peeked.kid, "k1");
        assert_eq!(peeked.rid, "r1");
        assert_eq!(peeked.iat, 42);
    }

    #[test]
    fn peeks_a_receipt_missing_iss_and_aud() {
        let (sk, _pk) = peac_crypto::generate_keypair();
        let jws = peac_crypto::sign(&serde_json::json!({"rid": "r2", "iat": 7}), &sk, "k1", "t").unwrap();
        let peeked = peek(&jws).unwrap();
        assert_eq!(peeked.rid, "r2");
        assert_eq!(peeked.iat, 7);
    }

    #[test]
    fn rejects_malformed_jws() {
        assert!(peek("not-a-jws").is_err());
    }
}
