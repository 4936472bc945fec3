//! Scheduled Full Scans
//!
//! Periodic sweep of the whole watch tree, independent of filesystem
//! events. Cheaper than the real-time path: feature extraction plus the
//! classifier only, no secondary analysis and no quarantine. The result is
//! one aggregate history record per sweep.
//!
//! Due-ness is calendar-based, not interval-based: a Daily scan runs on
//! the first check of a new calendar day, Monthly on the first check of a
//! new calendar month.

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Datelike, TimeZone, Utc};

use crate::constants::SCHEDULE_CHECK_INTERVAL_SECS;
use crate::logic::config::{ScheduleMode, SettingsHandle};
use crate::logic::pipeline::{is_scannable, ScanEngine};
use crate::logic::verdict::CLASSIFIER_THRESHOLD;

// ============================================================================
// DUE CHECK
// ============================================================================

/// Whether a periodic scan should run now, given the last recorded scan.
pub fn is_due(mode: ScheduleMode, last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    if mode == ScheduleMode::Never {
        return false;
    }
    let last = match last {
        Some(last) => last,
        // No scan on record yet
        None => return true,
    };

    match mode {
        ScheduleMode::Never => false,
        ScheduleMode::Daily => last.date_naive() != now.date_naive(),
        ScheduleMode::Monthly => (last.year(), last.month()) != (now.year(), now.month()),
    }
}

// ============================================================================
// FULL SCAN
// ============================================================================

/// Walk the tree under `root` and count classifier-confirmed files.
///
/// Unreadable directories and files are logged and skipped; the sweep
/// always completes. One aggregate history record is written at the end.
pub fn run_full_scan(engine: &ScanEngine, root: &Path) -> u32 {
    let started = Utc::now();
    let mut scanned: u64 = 0;
    let mut infected: u32 = 0;
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Full scan cannot enter {}: {}", dir.display(), e);
                continue;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            if !is_scannable(&path) {
                continue;
            }

            let features = match crate::logic::features::extract_file(&path) {
                Ok(features) => features,
                Err(e) => {
                    log::debug!("Full scan skipping {}: {}", path.display(), e);
                    continue;
                }
            };
            scanned += 1;

            let score = match engine.classifier().score(&features) {
                Ok(score) => score,
                Err(e) => {
                    log::warn!("Classifier failed during full scan: {}", e);
                    0.0
                }
            };
            if score >= CLASSIFIER_THRESHOLD {
                log::warn!("Full scan flagged {} (score {:.3})", path.display(), score);
                infected += 1;
            }
        }
    }

    if let Err(e) = engine.history_store().insert(infected, Utc::now()) {
        log::error!("Failed to record full scan: {}", e);
    }

    log::info!(
        "Full scan of {} done: {} files scanned, {} flagged ({}s)",
        root.display(),
        scanned,
        infected,
        (Utc::now() - started).num_seconds()
    );
    infected
}

// ============================================================================
// LOOP
// ============================================================================

/// Spawn the scheduler thread. It wakes hourly, consults the schedule mode
/// and the latest history record, and runs a full scan when one is due.
pub fn start(engine: Arc<ScanEngine>, settings: SettingsHandle) {
    thread::Builder::new()
        .name("scan-scheduler".to_string())
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    log::error!("Scheduler runtime failed to start: {}", e);
                    return;
                }
            };

            rt.block_on(async {
                loop {
                    let mode = settings.schedule();
                    if mode != ScheduleMode::Never {
                        let last = match engine.history_store().latest() {
                            Ok(record) => record
                                .and_then(|r| Utc.timestamp_millis_opt(r.timestamp_ms).single()),
                            Err(e) => {
                                log::error!("Cannot read scan history: {}", e);
                                None
                            }
                        };

                        if is_due(mode, last, Utc::now()) {
                            let root = settings.watch_root();
                            log::info!(
                                "Scheduled {} scan starting under {}",
                                mode.as_str(),
                                root.display()
                            );
                            run_full_scan(&engine, &root);
                        }
                    }

                    tokio::time::sleep(Duration::from_secs(SCHEDULE_CHECK_INTERVAL_SECS)).await;
                }
            });
        })
        .expect("failed to spawn scheduler thread");
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::external_intel::AnalyzerClient;
    use crate::logic::history::HistoryStore;
    use crate::logic::model::ClassifierClient;
    use crate::logic::quarantine::QuarantineStore;
    use std::io::Write;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_never_is_never_due() {
        assert!(!is_due(ScheduleMode::Never, None, Utc::now()));
        assert!(!is_due(
            ScheduleMode::Never,
            Some(at(2020, 1, 1, 0)),
            Utc::now()
        ));
    }

    #[test]
    fn test_no_history_means_due() {
        assert!(is_due(ScheduleMode::Daily, None, Utc::now()));
        assert!(is_due(ScheduleMode::Monthly, None, Utc::now()));
    }

    #[test]
    fn test_daily_uses_calendar_days() {
        let now = at(2025, 6, 10, 1);
        // Same calendar day, even hours apart: not due
        assert!(!is_due(ScheduleMode::Daily, Some(at(2025, 6, 10, 0)), now));
        // Previous day, even one hour apart across midnight: due
        assert!(is_due(ScheduleMode::Daily, Some(at(2025, 6, 9, 23)), now));
    }

    #[test]
    fn test_monthly_uses_calendar_months() {
        let now = at(2025, 7, 1, 0);
        assert!(!is_due(ScheduleMode::Monthly, Some(at(2025, 7, 31, 0)), now));
        assert!(is_due(ScheduleMode::Monthly, Some(at(2025, 6, 30, 23)), now));
        // Same month number, different year
        assert!(is_due(ScheduleMode::Monthly, Some(at(2024, 7, 1, 0)), now));
    }

    #[test]
    fn test_full_scan_walks_and_records() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("nested");
        std::fs::create_dir(&sub).unwrap();

        for (parent, name) in [(dir.path(), "a.py"), (&*sub, "b.exe"), (&*sub, "skip.txt")] {
            let mut file = std::fs::File::create(parent.join(name)).unwrap();
            file.write_all(b"content").unwrap();
        }

        let engine = ScanEngine::new(
            ClassifierClient::new("http://127.0.0.1:9"),
            AnalyzerClient::new("http://127.0.0.1:9"),
            Arc::new(QuarantineStore::open(dir.path()).unwrap()),
            Arc::new(HistoryStore::open(dir.path()).unwrap()),
        );

        // Classifier unreachable: every score degrades to 0, nothing flagged
        let infected = run_full_scan(&engine, dir.path());
        assert_eq!(infected, 0);

        // One aggregate record regardless of file count
        let records = engine.history_store().query_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].threats, 0);
    }
}
