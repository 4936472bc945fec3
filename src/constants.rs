//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.
//! To point the core at different verdict services, only edit this file
//! or set the corresponding environment variables.

/// App name
pub const APP_NAME: &str = "MalScan";

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default classifier service URL (numeric scoring model)
pub const DEFAULT_CLASSIFIER_URL: &str = "http://127.0.0.1:5000";

/// Default secondary analyzer service URL (textual analysis)
pub const DEFAULT_ANALYZER_URL: &str = "http://127.0.0.1:5001";

/// Number of scan worker threads
pub const SCAN_WORKERS: usize = 4;

/// Capacity of the bounded scan queue between watcher and workers
pub const SCAN_QUEUE_CAPACITY: usize = 256;

/// Files larger than this are never scanned (bytes)
pub const MAX_SCAN_FILE_SIZE: u64 = 5 * 1024 * 1024;

/// Classifier request timeout (seconds) - the model answers in milliseconds
pub const CLASSIFIER_TIMEOUT_SECS: u64 = 10;

/// Analyzer request timeout (seconds) - textual analysis can take a while
pub const ANALYZER_TIMEOUT_SECS: u64 = 120;

/// How often the scheduler re-checks whether a periodic scan is due (seconds)
pub const SCHEDULE_CHECK_INTERVAL_SECS: u64 = 3600;

/// File extensions considered scannable (scripts + executables)
pub const SCANNABLE_EXTENSIONS: &[&str] = &[
    "py", "js", "php", "pl", "rb", "sh", "bat", "cmd", "ps1", "vbs",
    "jar", "exe", "dll", "scr", "com", "html", "htm", "asp", "aspx", "jsp",
];

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Get classifier service URL from environment or use default
pub fn get_classifier_url() -> String {
    std::env::var("MALSCAN_CLASSIFIER_URL")
        .unwrap_or_else(|_| DEFAULT_CLASSIFIER_URL.to_string())
}

/// Get analyzer service URL from environment or use default
pub fn get_analyzer_url() -> String {
    std::env::var("MALSCAN_ANALYZER_URL")
        .unwrap_or_else(|_| DEFAULT_ANALYZER_URL.to_string())
}

/// Whether to also scan files that already exist under the watch root
/// at startup
pub fn get_scan_existing() -> bool {
    std::env::var("MALSCAN_SCAN_EXISTING")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Get scan worker count from environment or use default
pub fn get_scan_workers() -> usize {
    std::env::var("MALSCAN_SCAN_WORKERS")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|&n| n > 0)
        .unwrap_or(SCAN_WORKERS)
}
