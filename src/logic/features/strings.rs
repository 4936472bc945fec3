//! Suspicious String Ratio
//!
//! Scans raw bytes for maximal runs of printable ASCII and computes the
//! fraction of qualifying runs that exactly match a fixed set of API names
//! favored by malware: process-memory writes, dynamic library loading,
//! service creation and raw network primitives.

use std::collections::HashSet;

use once_cell::sync::Lazy;

/// Minimum printable-run length to qualify
const MIN_RUN_LEN: usize = 4;

/// Known-suspicious API names, lowercase
pub const SUSPICIOUS_APIS: &[&str] = &[
    // Process memory manipulation
    "writeprocessmemory",
    "readprocessmemory",
    "virtualalloc",
    "virtualallocex",
    "createremotethread",
    "ntcreatethreadex",
    "openprocess",
    // Dynamic library loading
    "loadlibrarya",
    "loadlibraryw",
    "getprocaddress",
    // Service creation
    "createservicea",
    "createservicew",
    "openscmanagera",
    "startservicea",
    // Network primitives
    "wsastartup",
    "socket",
    "connect",
    "internetopena",
    "internetopenurla",
    "urldownloadtofilea",
    // Execution / persistence helpers
    "shellexecutea",
    "winexec",
    "regsetvalueexa",
    "setwindowshookexa",
];

static SUSPICIOUS_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| SUSPICIOUS_APIS.iter().copied().collect());

/// Fraction of printable-ASCII runs (length >= 4, lower-cased) that exactly
/// match the suspicious API set. Returns 0 when no qualifying runs exist.
pub fn string_score(bytes: &[u8]) -> f64 {
    let mut total_runs = 0u64;
    let mut matched_runs = 0u64;

    let mut run = String::new();
    for &b in bytes {
        if (0x20..=0x7E).contains(&b) {
            run.push(b.to_ascii_lowercase() as char);
            continue;
        }
        close_run(&mut run, &mut total_runs, &mut matched_runs);
    }
    close_run(&mut run, &mut total_runs, &mut matched_runs);

    if total_runs == 0 {
        return 0.0;
    }
    matched_runs as f64 / total_runs as f64
}

fn close_run(run: &mut String, total: &mut u64, matched: &mut u64) {
    if run.len() >= MIN_RUN_LEN {
        *total += 1;
        if SUSPICIOUS_SET.contains(run.as_str()) {
            *matched += 1;
        }
    }
    run.clear();
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn join_runs(runs: &[&str]) -> Vec<u8> {
        let mut out = Vec::new();
        for r in runs {
            out.extend_from_slice(r.as_bytes());
            out.push(0x00);
        }
        out
    }

    #[test]
    fn test_no_qualifying_runs_is_zero() {
        assert_eq!(string_score(&[]), 0.0);
        assert_eq!(string_score(&[0x00, 0x01, 0xFF, 0x02]), 0.0);
        // Printable but too short to qualify
        assert_eq!(string_score(b"ab\0cd\0ef"), 0.0);
    }

    #[test]
    fn test_one_match_among_ten_runs() {
        // "connect" is a 7-character member of the suspicious set
        let data = join_runs(&[
            "connect", "harmless", "banana", "window", "report",
            "update", "config", "readme", "sample", "values",
        ]);
        let score = string_score(&data);
        assert!((score - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let data = join_runs(&["WriteProcessMemory", "LOADLIBRARYA"]);
        assert_eq!(string_score(&data), 1.0);
    }

    #[test]
    fn test_exact_match_only() {
        // Substring containment does not count; the run must equal the name
        let data = join_runs(&["xconnectx", "connected"]);
        assert_eq!(string_score(&data), 0.0);
    }

    #[test]
    fn test_trailing_run_counts() {
        // No terminator after the final run
        let mut data = join_runs(&["harmless"]);
        data.extend_from_slice(b"socket");
        let score = string_score(&data);
        assert!((score - 0.5).abs() < 1e-12);
    }
}
