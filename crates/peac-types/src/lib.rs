//! # peac-types
//!
//! Shared data model, canonicalizer, and error alphabet for the PEAC
//! receipt and dispute-bundle engine.
//!
//! This crate is the leaf dependency of the workspace — every other crate
//! depends on it. It defines:
//!
//! - **Canonicalizer**: [`canon::canonicalize`], JCS (RFC 8785) over `serde_json::Value`
//! - **Identifiers**: [`ids::new_receipt_id`], [`BundleId`]
//! - **Digests**: [`digest::sha256_hex`], [`digest::sha256_prefixed`]
//! - **Keys**: [`Jwk`], [`KeyDescriptor`], [`KeySet`], [`KeyAlg`]
//! - **Receipt model**: [`ReceiptVariant`], [`CommerceClaims`], [`AttestationClaims`], [`CoreClaims`]
//! - **Bundle manifest**: [`Manifest`], [`ManifestReceiptEntry`], [`ManifestFileEntry`]
//! - **Verification report**: [`VerificationReport`], [`ReceiptCheckRecord`], [`AuditorSummary`]
//! - **Errors**: the closed `E_*` alphabet — [`CanonError`], [`ReceiptSchemaError`], [`ApiError`]

pub mod canon;
pub mod digest;
pub mod error;
pub mod ids;
pub mod key;
pub mod manifest;
pub mod receipt;
pub mod report;

// Re-export all primary types at crate root for ergonomic imports:
//   use peac_types::{canonicalize, ReceiptVariant, Manifest, VerificationReport, ...};

pub use canon::{absent, canonicalize, canonicalize_to_string, strip_absent};
pub use digest::{sha256_hex, sha256_prefixed};
pub use error::*;
pub use ids::*;
pub use key::*;
pub use manifest::*;
pub use receipt::*;
pub use report::*;
