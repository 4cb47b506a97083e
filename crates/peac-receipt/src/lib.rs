//! # peac-receipt
//!
//! Receipt issuance and local verification (spec §4.4), composing
//! [`peac_types`]'s claim model with [`peac_crypto`]'s JWS primitive.
//!
//! [`issue`] only ever produces commerce receipts — attestation receipts
//! are assembled and signed directly against [`peac_crypto::sign`] by
//! callers who need that variant, since the spec scopes issuance to the
//! commerce case. [`verify_local`] accepts either variant.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use peac_crypto::{self, JwsError};
use peac_types::{canonicalize, is_commerce, parse_claims, sha256_prefixed, Control, CoreClaims, Payment, Subject};

pub const RECEIPT_TYP: &str = "peac-receipt/0.1";
const DEFAULT_MAX_CLOCK_SKEW_SECS: i64 = 300;

/// Inputs to [`issue`]. Borrow the signing key rather than owning it —
/// this crate never stores key material.
pub struct IssueRequest<'a> {
    pub iss: String,
    pub aud: String,
    pub amt: f64,
    pub cur: String,
    pub rail: String,
    pub reference: String,
    pub asset: Option<String>,
    pub env: Option<String>,
    pub evidence: Option<Value>,
    pub subject: Option<Subject>,
    pub exp: Option<i64>,
    pub signing_key: &'a [u8; 32],
    pub kid: &'a str,
}

/// `{receipt_hash, issuer, kid, duration_ms}` passed to an issuance hook
/// strictly after a successful issuance (spec §4.4).
#[derive(Debug, Clone)]
pub struct IssuanceEvent {
    pub receipt_hash: String,
    pub issuer: String,
    pub kid: String,
    pub duration_ms: u64,
}

#[derive(Debug, Error)]
pub enum IssueError {
    #[error("E_CANON_INVALID_VALUE: {reason}")]
    InvalidClaims { reason: String },

    #[error("{0}")]
    Signing(JwsError),
}

impl IssueError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidClaims { .. } => "E_CANON_INVALID_VALUE",
            Self::Signing(e) => e.code(),
        }
    }
}

pub type IssueResult<T> = Result<T, IssueError>;

fn build_control(asset: Option<String>, env: Option<String>, evidence: Option<Value>) -> Option<Control> {
    if asset.is_none() && env.is_none() && evidence.is_none() {
        return None;
    }
    let mut obj = serde_json::Map::new();
    if let Some(asset) = asset {
        obj.insert("asset".to_string(), Value::String(asset));
    }
    if let Some(env) = env {
        obj.insert("env".to_string(), Value::String(env));
    }
    if let Some(evidence) = evidence {
        obj.insert("evidence".to_string(), evidence);
    }
    Some(Value::Object(obj))
}

/// Issue a commerce receipt as a compact JWS.
///
/// `now` lets callers inject a deterministic clock (tests, replay); when
/// `None`, `iat` is filled from the system clock. `hook`, if supplied, runs
/// strictly after a successful issuance and never affects the result — a
/// panicking or erroring hook is swallowed at the call site.
///
/// # Errors
/// Returns [`IssueError::InvalidClaims`] if the assembled claim object is
/// not canonicalizable, or [`IssueError::Signing`] if signing fails.
pub fn issue(
    req: IssueRequest<'_>,
    now: Option<i64>,
    hook: Option<&(dyn Fn(IssuanceEvent) + Sync)>,
) -> IssueResult<String> {
    let start = Instant::now();
    let iat = now.unwrap_or_else(|| chrono::Utc::now().timestamp());
    let rid = peac_types::new_receipt_id();

    let payment = Payment {
        rail: req.rail,
        reference: req.reference,
        amount: req.amt,
        currency: req.cur.clone(),
    };
    let control = build_control(req.asset, req.env, req.evidence);

    let mut claims = json!({
        "iss": req.iss,
        "aud": req.aud,
        "rid": rid,
        "iat": iat,
        "amt": req.amt,
        "cur": req.cur,
        "payment": payment,
    });
    if let Some(exp) = req.exp {
        claims["exp"] = json!(exp);
    }
    if let Some(subject) = &req.subject {
        claims["subject"] = json!(subject);
    }
    if let Some(control) = &control {
        claims["control"] = control.clone();
    }
    debug_assert!(is_commerce(&claims));

    let canonical = canonicalize(&claims).map_err(|e| IssueError::InvalidClaims { reason: e.to_string() })?;
    let receipt_hash = sha256_prefixed(&canonical);

    let jws = peac_crypto::sign(&claims, req.signing_key, req.kid, RECEIPT_TYP).map_err(IssueError::Signing)?;

    info!(rid = %rid, kid = req.kid, "issued commerce receipt");

    if let Some(hook) = hook {
        let event = IssuanceEvent {
            receipt_hash,
            issuer: claims["iss"].as_str().unwrap_or_default().to_string(),
            kid: req.kid.to_string(),
            #[allow(clippy::cast_possible_truncation)]
            duration_ms: start.elapsed().as_millis() as u64,
        };
        if catch_unwind(AssertUnwindSafe(|| hook(event))).is_err() {
            warn!("issuance telemetry hook panicked; ignoring");
        }
    }

    Ok(jws)
}

/// Options accepted by [`verify_local`] (spec §4.4 table).
#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub subject_uri: Option<String>,
    pub rid: Option<String>,
    pub now: Option<i64>,
    pub max_clock_skew: Option<i64>,
    pub require_exp: bool,
}

impl VerifyOptions {
    fn max_clock_skew(&self) -> i64 {
        self.max_clock_skew.unwrap_or(DEFAULT_MAX_CLOCK_SKEW_SECS)
    }
}

/// Successful [`verify_local`] outcome: `{variant, claims, kid}`.
#[derive(Debug, Clone)]
pub struct VerifiedReceipt {
    pub variant: &'static str,
    pub claims: CoreClaims,
    pub kid: String,
}

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("E_INVALID_FORMAT: {reason}")]
    InvalidFormat { reason: String, parse_code: Option<String> },

    #[error("E_INVALID_SIGNATURE")]
    InvalidSignature,

    #[error("E_INVALID_ISSUER")]
    InvalidIssuer,

    #[error("E_INVALID_AUDIENCE")]
    InvalidAudience,

    #[error("E_INVALID_SUBJECT")]
    InvalidSubject,

    #[error("E_INVALID_RECEIPT_ID")]
    InvalidReceiptId,

    #[error("E_MISSING_EXP")]
    MissingExp,

    #[error("E_NOT_YET_VALID")]
    NotYetValid,

    #[error("E_EXPIRED")]
    Expired,
}

impl VerifyError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidFormat { .. } => "E_INVALID_FORMAT",
            Self::InvalidSignature => "E_INVALID_SIGNATURE",
            Self::InvalidIssuer => "E_INVALID_ISSUER",
            Self::InvalidAudience => "E_INVALID_AUDIENCE",
            Self::InvalidSubject => "E_INVALID_SUBJECT",
            Self::InvalidReceiptId => "E_INVALID_RECEIPT_ID",
            Self::MissingExp => "E_MISSING_EXP",
            Self::NotYetValid => "E_NOT_YET_VALID",
            Self::Expired => "E_EXPIRED",
        }
    }
}

pub type VerifyResult<T> = Result<T, VerifyError>;

/// Verify a receipt locally against a public key, with the ordered checks
/// from spec §4.4 (first failure wins).
///
/// # Errors
/// See [`VerifyError`] variants.
pub fn verify_local(jws: &str, public_key: &[u8; 32], options: &VerifyOptions) -> VerifyResult<VerifiedReceipt> {
    // Checks 1-2: JWS well-formed, signature valid, payload parses.
    let verified = peac_crypto::verify(jws, public_key).map_err(|e| match e {
        JwsError::SignatureInvalid => VerifyError::InvalidSignature,
        other => VerifyError::InvalidFormat {
            reason: other.to_string(),
            parse_code: Some(other.code().to_string()),
        },
    })?;

    let variant = parse_claims(&verified.payload).map_err(|e| VerifyError::InvalidFormat {
        reason: e.to_string(),
        parse_code: Some(e.code().to_string()),
    })?;
    let is_commerce_variant = matches!(variant, peac_types::ReceiptVariant::Commerce(_));
    let claims = variant.to_core_claims();

    // Check 3: issuer.
    if let Some(expected) = &options.issuer {
        if &claims.iss != expected {
            return Err(VerifyError::InvalidIssuer);
        }
    }
    // Check 4: audience.
    if let Some(expected) = &options.audience {
        if &claims.aud != expected {
            return Err(VerifyError::InvalidAudience);
        }
    }
    // Check 5: subject.
    if let Some(expected) = &options.subject_uri {
        let actual = claims.subject.as_ref().map(|s| s.uri.as_str());
        if actual != Some(expected.as_str()) {
            return Err(VerifyError::InvalidSubject);
        }
    }
    // Check 6: receipt id.
    if let Some(expected) = &options.rid {
        if &claims.rid != expected {
            return Err(VerifyError::InvalidReceiptId);
        }
    }
    // Check 7: exp required.
    if options.require_exp && claims.exp.is_none() {
        return Err(VerifyError::MissingExp);
    }

    let now = options.now.unwrap_or_else(|| chrono::Utc::now().timestamp());
    let skew = options.max_clock_skew();

    // Check 8: not-yet-valid.
    if claims.iat > now + skew {
        return Err(VerifyError::NotYetValid);
    }
    // Check 9: expiry.
    if let Some(exp) = claims.exp {
        if exp < now - skew {
            return Err(VerifyError::Expired);
        }
    }

    Ok(VerifiedReceipt {
        variant: if is_commerce_variant { "commerce" } else { "attestation" },
        claims,
        kid: verified.header.kid,
    })
}
