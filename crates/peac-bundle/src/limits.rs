//! DoS/size limits enforced by the bundle writer and reader (spec §4.5,
//! §4.6). A typed, `serde`-deserializable config struct rather than
//! ambient constants, so callers embedding this engine can tighten limits
//! for their own threat model.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleLimits {
    pub max_receipts: usize,
    pub max_entries: usize,
    pub max_entry_bytes: u64,
    pub max_total_bytes: u64,
}

pub const DEFAULT_MAX_RECEIPTS: usize = 10_000;
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;
pub const DEFAULT_MAX_ENTRY_BYTES: u64 = 64 * 1024 * 1024;
pub const DEFAULT_MAX_TOTAL_BYTES: u64 = 512 * 1024 * 1024;

impl Default for BundleLimits {
    fn default() -> Self {
        Self {
            max_receipts: DEFAULT_MAX_RECEIPTS,
            max_entries: DEFAULT_MAX_ENTRIES,
            max_entry_bytes: DEFAULT_MAX_ENTRY_BYTES,
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_limits() {
        let limits = BundleLimits::default();
        assert_eq!(limits.max_receipts, 10_000);
        assert_eq!(limits.max_entries, 10_000);
        assert_eq!(limits.max_entry_bytes, 64 * 1024 * 1024);
        assert_eq!(limits.max_total_bytes, 512 * 1024 * 1024);
    }

    #[test]
    fn partial_json_fills_remaining_fields_from_default() {
        let limits: BundleLimits = serde_json::from_str(r#"{"max_receipts": 5}"#).unwrap();
        assert_eq!(limits.max_receipts, 5);
        assert_eq!(limits.max_total_bytes, DEFAULT_MAX_TOTAL_BYTES);
    }
}
