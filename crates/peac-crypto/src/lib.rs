//! # peac-crypto
//!
//! Ed25519 keypair generation and compact JWS sign/verify (spec §4.2).
//!
//! Every signature in this workspace — receipt issuance, bundle signatures —
//! goes through [`sign`] and [`verify`]. The wire format is a three-segment
//! compact JWS: `base64url(header).base64url(payload).base64url(signature)`,
//! with a fixed header policy (`alg: "EdDSA"`, a caller-supplied `kid`, and a
//! caller-supplied `typ`).

use base64::Engine as _;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use peac_types::canonicalize;

const B64: base64::engine::GeneralPurpose = base64::engine::general_purpose::URL_SAFE_NO_PAD;

/// Compact-JWS-level failures (spec §4.2).
#[derive(Debug, Error)]
pub enum JwsError {
    #[error("E_JWS_MALFORMED: expected 3 dot-separated segments, found {found}")]
    Malformed { found: usize },

    #[error("E_JWS_HEADER_INVALID: {reason}")]
    HeaderInvalid { reason: String },

    #[error("E_JWS_ALG_UNSUPPORTED: expected \"EdDSA\", found {found:?}")]
    AlgUnsupported { found: String },

    #[error("E_JWS_KID_MISSING")]
    KidMissing,

    #[error("E_JWS_PAYLOAD_INVALID: {reason}")]
    PayloadInvalid { reason: String },

    #[error("E_JWS_SIGNATURE_INVALID")]
    SignatureInvalid,
}

impl JwsError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Malformed { .. } => "E_JWS_MALFORMED",
            Self::HeaderInvalid { .. } => "E_JWS_HEADER_INVALID",
            Self::AlgUnsupported { .. } => "E_JWS_ALG_UNSUPPORTED",
            Self::KidMissing => "E_JWS_KID_MISSING",
            Self::PayloadInvalid { .. } => "E_JWS_PAYLOAD_INVALID",
            Self::SignatureInvalid => "E_JWS_SIGNATURE_INVALID",
        }
    }
}

pub type JwsResult<T> = Result<T, JwsError>;

/// The fixed JWS header this workspace emits. `alg` is always `"EdDSA"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwsHeader {
    pub alg: String,
    pub kid: String,
    pub typ: String,
}

/// A successfully verified compact JWS: its header and decoded payload.
#[derive(Debug, Clone)]
pub struct VerifiedJws {
    pub header: JwsHeader,
    pub payload: Value,
}

/// Generate a fresh Ed25519 keypair. Returns `(private_scalar, public_point)`,
/// each 32 bytes.
#[must_use]
pub fn generate_keypair() -> ([u8; 32], [u8; 32]) {
    let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
    (signing_key.to_bytes(), signing_key.verifying_key().to_bytes())
}

/// Sign `payload` and emit a compact JWS.
///
/// Canonicalizes `payload` (spec §4.1) before signing, so verification is
/// stable against insignificant JSON formatting differences upstream.
///
/// # Errors
/// Returns [`JwsError::PayloadInvalid`] if `payload` is not canonicalizable
/// (non-finite numbers, non-string keys).
pub fn sign(payload: &Value, private_key: &[u8; 32], kid: &str, typ: &str) -> JwsResult<String> {
    let signing_key = SigningKey::from_bytes(private_key);
    let header = JwsHeader {
        alg: "EdDSA".to_string(),
        kid: kid.to_string(),
        typ: typ.to_string(),
    };
    let header_json = serde_json::to_vec(&header)
        .map_err(|e| JwsError::HeaderInvalid { reason: e.to_string() })?;
    let payload_bytes = canonicalize(payload)
        .map_err(|e| JwsError::PayloadInvalid { reason: e.to_string() })?;

    let header_b64 = B64.encode(header_json);
    let payload_b64 = B64.encode(payload_bytes);
    let signing_input = format!("{header_b64}.{payload_b64}");

    let signature: Signature = signing_key.sign(signing_input.as_bytes());
    let signature_b64 = B64.encode(signature.to_bytes());

    debug!(kid, "signed compact jws");
    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Verify a compact JWS against a public key.
///
/// Enforces, in order: exactly three segments; header decodes to valid
/// JSON; `alg == "EdDSA"`; `kid` present and non-empty; payload decodes to
/// a JSON object; signature verifies.
///
/// # Errors
/// See [`JwsError`] variants.
pub fn verify(compact_jws: &str, public_key: &[u8; 32]) -> JwsResult<VerifiedJws> {
    let segments: Vec<&str> = compact_jws.split('.').collect();
    if segments.len() != 3 {
        return Err(JwsError::Malformed { found: segments.len() });
    }
    let [header_b64, payload_b64, signature_b64] = [segments[0], segments[1], segments[2]];

    let header_bytes = B64
        .decode(header_b64)
        .map_err(|e| JwsError::HeaderInvalid { reason: e.to_string() })?;
    let header: JwsHeader = serde_json::from_slice(&header_bytes)
        .map_err(|e| JwsError::HeaderInvalid { reason: e.to_string() })?;

    if header.alg != "EdDSA" {
        return Err(JwsError::AlgUnsupported { found: header.alg });
    }
    if header.kid.is_empty() {
        return Err(JwsError::KidMissing);
    }

    let payload_bytes = B64
        .decode(payload_b64)
        .map_err(|e| JwsError::PayloadInvalid { reason: e.to_string() })?;
    let payload: Value = serde_json::from_slice(&payload_bytes)
        .map_err(|e| JwsError::PayloadInvalid { reason: e.to_string() })?;
    if !payload.is_object() {
        return Err(JwsError::PayloadInvalid {
            reason: "payload must decode to a JSON object".to_string(),
        });
    }

    let signature_bytes: [u8; 64] = B64
        .decode(signature_b64)
        .map_err(|_| JwsError::SignatureInvalid)?
        .try_into()
        .map_err(|_| JwsError::SignatureInvalid)?;
    let signature = Signature::from_bytes(&signature_bytes);

    let verifying_key = VerifyingKey::from_bytes(public_key).map_err(|_| JwsError::SignatureInvalid)?;
    let signing_input = format!("{header_b64}.{payload_b64}");
    verifying_key
        .verify(signing_input.as_bytes(), &signature)
        .map_err(|_| {
            warn!(kid = %header.kid, "signature verification failed");
            JwsError::SignatureInvalid
        })?;

    Ok(VerifiedJws { header, payload })
}

/// Decode a compact JWS's header and payload without checking its signature.
///
/// Callers that need to resolve *which* public key to verify against (by
/// `kid`) before they can call [`verify`] use this; it makes no trust
/// decision and must never be treated as proof of authenticity.
///
/// # Errors
/// [`JwsError::Malformed`], [`JwsError::HeaderInvalid`], or
/// [`JwsError::PayloadInvalid`] if the header/payload segments don't decode.
pub fn peek_unverified(compact_jws: &str) -> JwsResult<(JwsHeader, Value)> {
    let segments: Vec<&str> = compact_jws.split('.').collect();
    if segments.len() != 3 {
        return Err(JwsError::Malformed { found: segments.len() });
    }
    let header_bytes = B64
        .decode(segments[0])
        .map_err(|e| JwsError::HeaderInvalid { reason: e.to_string() })?;
    let header: JwsHeader = serde_json::from_slice(&header_bytes)
        .map_err(|e| JwsError::HeaderInvalid { reason: e.to_string() })?;
    let payload_bytes = B64
        .decode(segments[1])
        .map_err(|e| JwsError::PayloadInvalid { reason: e.to_string() })?;
    let payload: Value = serde_json::from_slice(&payload_bytes)
        .map_err(|e| JwsError::PayloadInvalid { reason: e.to_string() })?;
    Ok((header, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sign_then_verify_round_trips() {
        let (sk, pk) = generate_keypair();
        let payload = json!({"iss": "issuer-1", "aud": "aud-1", "rid": "r1", "iat": 1});
        let jws = sign(&payload, &sk, "k1", "peac-receipt/0.1").unwrap();
        let verified = verify(&jws, &pk).unwrap();
        assert_eq!(verified.header.kid, "k1");
        assert_eq!(verified.payload, payload);
    }

    #[test]
    fn rejects_wrong_key() {
        let (sk, _pk) = generate_keypair();
        let (_, other_pk) = generate_keypair();
        let jws = sign(&json!({"a": 1}), &sk, "k1", "t").unwrap();
        let err = verify(&jws, &other_pk).unwrap_err();
        assert_eq!(err.code(), "E_JWS_SIGNATURE_INVALID");
    }

    #[test]
    fn rejects_malformed_segment_count() {
        let err = verify("a.b", &[0u8; 32]).unwrap_err();
        assert_eq!(err.code(), "E_JWS_MALFORMED");
        let err = verify("a.b.c.d", &[0u8; 32]).unwrap_err();
        assert_eq!(err.code(), "E_JWS_MALFORMED");
    }

    #[test]
    fn rejects_tampered_payload() {
        let (sk, pk) = generate_keypair();
        let jws = sign(&json!({"a": 1}), &sk, "k1", "t").unwrap();
        let mut segments: Vec<&str> = jws.split('.').collect();
        let tampered_payload = B64.encode(br#"{"a":2}"#);
        segments[1] = &tampered_payload;
        let tampered = segments.join(".");
        let err = verify(&tampered, &pk).unwrap_err();
        assert_eq!(err.code(), "E_JWS_SIGNATURE_INVALID");
    }

    #[test]
    fn rejects_non_eddsa_alg() {
        let (sk, pk) = generate_keypair();
        let header = JwsHeader {
            alg: "HS256".to_string(),
            kid: "k1".to_string(),
            typ: "t".to_string(),
        };
        let header_b64 = B64.encode(serde_json::to_vec(&header).unwrap());
        let payload_b64 = B64.encode(canonicalize(&json!({"a": 1})).unwrap());
        let signing_input = format!("{header_b64}.{payload_b64}");
        let signing_key = SigningKey::from_bytes(&sk);
        let sig = signing_key.sign(signing_input.as_bytes());
        let jws = format!("{signing_input}.{}", B64.encode(sig.to_bytes()));
        let err = verify(&jws, &pk).unwrap_err();
        assert_eq!(err.code(), "E_JWS_ALG_UNSUPPORTED");
    }

    #[test]
    fn rejects_empty_kid() {
        let (sk, pk) = generate_keypair();
        let jws = sign(&json!({"a": 1}), &sk, "", "t").unwrap();
        let err = verify(&jws, &pk).unwrap_err();
        assert_eq!(err.code(), "E_JWS_KID_MISSING");
    }

    #[test]
    fn rejects_non_object_payload() {
        let (sk, pk) = generate_keypair();
        let jws = sign(&json!([1, 2, 3]), &sk, "k1", "t").unwrap();
        let err = verify(&jws, &pk).unwrap_err();
        assert_eq!(err.code(), "E_JWS_PAYLOAD_INVALID");
    }

    #[test]
    fn peek_unverified_reads_kid_without_checking_signature() {
        let (sk, _pk) = generate_keypair();
        let jws = sign(&json!({"a": 1}), &sk, "k1", "peac-receipt/0.1").unwrap();
        let mut segments: Vec<&str> = jws.split('.').collect();
        let garbage_sig = B64.encode([0u8; 64]);
        segments[2] = &garbage_sig;
        let tampered = segments.join(".");
        let (header, payload) = peek_unverified(&tampered).unwrap();
        assert_eq!(header.kid, "k1");
        assert_eq!(payload, json!({"a": 1}));
    }
}
