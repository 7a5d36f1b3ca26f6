//! Clock and identifier factory.
//!
//! Commit and report identifiers are short monotonic strings (`c0001`,
//! `r0001`) whose counters are owned by the repository; this module provides
//! the formatting, parsing, and timestamp primitives they share. Run and
//! variant identifiers are process-local.

use chrono::{SecondsFormat, Utc};
use uuid::Uuid;

/// Digit width of commit/report id suffixes.
pub const ID_WIDTH: usize = 4;

/// Prefix for commit ids.
pub const COMMIT_PREFIX: &str = "c";

/// Prefix for comparison report ids.
pub const REPORT_PREFIX: &str = "r";

/// Format a sequential id such as `c0001` or `r0042`.
///
/// Numbers wider than [`ID_WIDTH`] keep all their digits.
pub fn format_id(prefix: &str, number: u64) -> String {
    format!("{prefix}{number:0width$}", width = ID_WIDTH)
}

/// Parse the numeric suffix out of a sequential id.
///
/// Returns `None` when the prefix does not match or the suffix is not a
/// plain decimal number.
pub fn parse_id_number(identifier: &str, prefix: &str) -> Option<u64> {
    let suffix = identifier.strip_prefix(prefix)?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

/// Variant id for a zero-based index: `v01`, `v02`, ...
pub fn variant_id(index: usize) -> String {
    format!("v{:02}", index + 1)
}

/// A fresh run id combining the current timestamp with a random suffix.
pub fn new_run_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("run_{}_{}", Utc::now().timestamp_millis(), &suffix[..8])
}

/// Current UTC time as RFC 3339 with millisecond precision (`...Z`).
///
/// Millisecond precision keeps parent/child `created_at` ordering observable
/// and makes the strings lexicographically sortable.
pub fn utc_now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_fixed_width() {
        assert_eq!(format_id(COMMIT_PREFIX, 1), "c0001");
        assert_eq!(format_id(REPORT_PREFIX, 42), "r0042");
        assert_eq!(format_id(COMMIT_PREFIX, 12345), "c12345");
    }

    #[test]
    fn parses_back_what_it_formats() {
        for n in [1u64, 9, 10, 9999, 10000] {
            let id = format_id(COMMIT_PREFIX, n);
            assert_eq!(parse_id_number(&id, COMMIT_PREFIX), Some(n));
        }
    }

    #[test]
    fn rejects_foreign_prefixes_and_garbage() {
        assert_eq!(parse_id_number("r0001", COMMIT_PREFIX), None);
        assert_eq!(parse_id_number("c", COMMIT_PREFIX), None);
        assert_eq!(parse_id_number("c12x4", COMMIT_PREFIX), None);
        assert_eq!(parse_id_number("", COMMIT_PREFIX), None);
    }

    #[test]
    fn variant_ids_are_one_based_and_padded() {
        assert_eq!(variant_id(0), "v01");
        assert_eq!(variant_id(1), "v02");
        assert_eq!(variant_id(9), "v10");
    }

    #[test]
    fn run_ids_are_unique_and_prefixed() {
        let a = new_run_id();
        let b = new_run_id();
        assert!(a.starts_with("run_"));
        assert_ne!(a, b);
    }

    #[test]
    fn timestamps_are_utc_millis_and_ordered() {
        let a = utc_now_iso();
        let b = utc_now_iso();
        assert!(a.ends_with('Z'));
        // 2026-08-02T12:34:56.789Z
        assert_eq!(a.len(), 24);
        assert!(a <= b);
    }
}
