//! Key descriptors, key sets, and the Ed25519 JWK wire form.
//!
//! This crate never holds a private scalar — signing lives in
//! `peac-crypto`. What lives here is everything needed to describe and
//! look up a *public* key: the [`Jwk`] wire format written to
//! `keys/keys.json`, and the in-memory [`KeySet`] bundles and reports
//! search by `kid`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Signature algorithm tag. `EdDSA` is the only value this engine emits
/// or accepts (spec §4.2); the enum exists so an unknown `alg` in a
/// parsed JWK round-trips as data instead of silently aliasing to EdDSA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyAlg {
    EdDSA,
}

impl std::fmt::Display for KeyAlg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EdDSA => write!(f, "EdDSA"),
        }
    }
}

/// An Ed25519 public key in JWK form, as stored in `keys/keys.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub crv: String,
    /// base64url(no padding)-encoded 32-byte public point.
    pub x: String,
    pub kid: String,
    pub alg: KeyAlg,
    #[serde(rename = "use")]
    pub key_use: String,
}

impl Jwk {
    /// Build the JWK for an Ed25519 public key.
    #[must_use]
    pub fn ed25519(kid: impl Into<String>, public_key: &[u8; 32]) -> Self {
        use base64::Engine as _;
        Self {
            kty: "OKP".to_string(),
            crv: "Ed25519".to_string(),
            x: base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(public_key),
            kid: kid.into(),
            alg: KeyAlg::EdDSA,
            key_use: "sig".to_string(),
        }
    }

    /// Decode the embedded public key bytes.
    pub fn public_key_bytes(&self) -> Result<[u8; 32], JwkDecodeError> {
        use base64::Engine as _;
        let raw = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(&self.x)
            .map_err(|_| JwkDecodeError::InvalidBase64)?;
        raw.try_into().map_err(|_| JwkDecodeError::WrongLength)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JwkDecodeError {
    #[error("JWK `x` is not valid unpadded base64url")]
    InvalidBase64,
    #[error("JWK `x` does not decode to a 32-byte Ed25519 public key")]
    WrongLength,
}

/// A lightweight `{kid, alg}` descriptor, as embedded in
/// `manifest.keys[]` and verification report key-usage tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDescriptor {
    pub kid: String,
    pub alg: KeyAlg,
}

/// An ordered set of public key descriptors, keyed by `kid`. Duplicate
/// `kid`s within one set are rejected at construction (spec §3).
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    jwks: Vec<Jwk>,
}

#[derive(Debug, thiserror::Error)]
#[error("duplicate key id in key set: {0}")]
pub struct DuplicateKeyId(pub String);

impl KeySet {
    pub fn new(jwks: Vec<Jwk>) -> Result<Self, DuplicateKeyId> {
        let mut seen = HashSet::with_capacity(jwks.len());
        for jwk in &jwks {
            if !seen.insert(jwk.kid.clone()) {
                return Err(DuplicateKeyId(jwk.kid.clone()));
            }
        }
        Ok(Self { jwks })
    }

    #[must_use]
    pub fn jwks(&self) -> &[Jwk] {
        &self.jwks
    }

    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.jwks.iter().find(|j| j.kid == kid)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.jwks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jwks.is_empty()
    }

    /// `{kid, alg}` descriptors sorted by `kid`, as embedded in the
    /// bundle manifest.
    #[must_use]
    pub fn descriptors_sorted(&self) -> Vec<KeyDescriptor> {
        let mut out: Vec<KeyDescriptor> = self
            .jwks
            .iter()
            .map(|j| KeyDescriptor {
                kid: j.kid.clone(),
                alg: j.alg,
            })
            .collect();
        out.sort_by(|a, b| a.kid.cmp(&b.kid));
        out
    }

    /// Serialize as the `{"keys": [...]}` object stored at
    /// `keys/keys.json`, with two-space indentation (spec §4.5 step 4).
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&serde_json::json!({ "keys": self.jwks }))
    }

    pub fn from_json_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        #[derive(Deserialize)]
        struct Wire {
            keys: Vec<Jwk>,
        }
        let wire: Wire = serde_json::from_slice(bytes)?;
        // Duplicates in a parsed key set are a bundle integrity concern,
        // not a type-construction concern; surface them as-is and let
        // `peac-bundle` decide what to do (this mirrors rid duplication
        // handling during bundle reads, spec §4.6 step 5).
        Ok(Self { jwks: wire.keys })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_jwk(kid: &str) -> Jwk {
        Jwk::ed25519(kid, &[7u8; 32])
    }

    #[test]
    fn rejects_duplicate_kid() {
        let err = KeySet::new(vec![sample_jwk("k1"), sample_jwk("k1")]).unwrap_err();
        assert_eq!(err.0, "k1");
    }

    #[test]
    fn descriptors_sorted_by_kid() {
        let set = KeySet::new(vec![sample_jwk("zzz"), sample_jwk("aaa")]).unwrap();
        let descriptors = set.descriptors_sorted();
        assert_eq!(descriptors[0].kid, "aaa");
        assert_eq!(descriptors[1].kid, "zzz");
    }

    #[test]
    fn jwk_public_key_roundtrip() {
        let pk = [42u8; 32];
        let jwk = Jwk::ed25519("k1", &pk);
        assert_eq!(jwk.public_key_bytes().unwrap(), pk);
    }

    #[test]
    fn find_by_kid() {
        let set = KeySet::new(vec![sample_jwk("a"), sample_jwk("b")]).unwrap();
        assert!(set.find("a").is_some());
        assert!(set.find("missing").is_none());
    }

    #[test]
    fn pretty_json_round_trips_through_from_json_bytes() {
        let set = KeySet::new(vec![sample_jwk("a")]).unwrap();
        let json = set.to_pretty_json().unwrap();
        assert!(json.contains("  "));
        let back = KeySet::from_json_bytes(json.as_bytes()).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back.find("a").unwrap().kid, "a");
    }
}
