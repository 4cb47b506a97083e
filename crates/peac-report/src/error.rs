//! Report-generation errors (spec §4.7 step 1: "invoke §4.6; propagate errors").
//!
//! Everything else §4.7 finds wrong with an individual receipt is *not*
//! fatal — it is recorded on that receipt's [`crate::ReceiptCheckRecord`]
//! instead, per the spec's propagation policy (§7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Bundle(#[from] peac_bundle::BundleError),

    #[error(transparent)]
    Canon(#[from] peac_types::CanonError),
}

impl ReportError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Bundle(e) => e.code(),
            Self::Canon(e) => e.code(),
        }
    }
}

pub type ReportResult<T> = Result<T, ReportError>;
