//! Identifiers used throughout the receipt and bundle model.
//!
//! `rid` is an opaque, caller-meaningful string on the wire (spec §3);
//! [`new_receipt_id`] is this crate's default generator (UUIDv7, for
//! lexicographic time-ordering) but any stable string a caller supplies
//! is accepted on parse — ULIDs included.

use std::fmt;

use serde::{Deserialize, Serialize};
use ulid::Ulid;
use uuid::Uuid;

/// Generate a fresh receipt identifier (UUIDv7).
#[must_use]
pub fn new_receipt_id() -> String {
    Uuid::now_v7().to_string()
}

/// Globally unique, time-ordered identifier for a dispute bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BundleId(pub Ulid);

impl BundleId {
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for BundleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BundleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for BundleId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipt_ids_are_unique() {
        let a = new_receipt_id();
        let b = new_receipt_id();
        assert_ne!(a, b);
    }

    #[test]
    fn receipt_id_parses_as_uuid() {
        let id = new_receipt_id();
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn bundle_id_roundtrips_through_string() {
        let id = BundleId::new();
        let s = id.to_string();
        let back: BundleId = s.parse().unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn bundle_id_serde_roundtrip() {
        let id = BundleId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: BundleId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn bundle_ids_sort_by_creation_order() {
        let a = BundleId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = BundleId::new();
        assert!(a < b);
    }
}
