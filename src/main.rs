//! MalScan Core Service
//!
//! Startup wiring: open the stores, spawn the scan worker pool, attach the
//! real-time watcher to the configured root and start the scheduler. The
//! main thread then idles, logging scan statistics periodically.

mod constants;
mod logic;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::logic::config::SettingsHandle;
use crate::logic::external_intel::AnalyzerClient;
use crate::logic::history::HistoryStore;
use crate::logic::model::ClassifierClient;
use crate::logic::pipeline::{self, ScanEngine};
use crate::logic::quarantine::QuarantineStore;
use crate::logic::scheduler;
use crate::logic::watcher::DirectoryWatcher;

const STATS_LOG_INTERVAL_SECS: u64 = 300;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("{} core v{} starting", constants::APP_NAME, constants::APP_VERSION);

    let data_dir = dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(constants::APP_NAME);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        log::error!("Cannot create data directory {}: {}", data_dir.display(), e);
        std::process::exit(1);
    }

    let settings = SettingsHandle::load(&data_dir);

    let quarantine = match QuarantineStore::open(&data_dir) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            log::error!("Cannot open quarantine store: {}", e);
            std::process::exit(1);
        }
    };
    let history = match HistoryStore::open(&data_dir) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            log::error!("Cannot open history store: {}", e);
            std::process::exit(1);
        }
    };

    let engine = Arc::new(ScanEngine::new(
        ClassifierClient::new(&constants::get_classifier_url()),
        AnalyzerClient::new(&constants::get_analyzer_url()),
        quarantine,
        history,
    ));

    let scan_tx = pipeline::start_workers(
        Arc::clone(&engine),
        constants::get_scan_workers(),
        constants::SCAN_QUEUE_CAPACITY,
    );

    let watch_root = settings.watch_root();
    let _watcher = match DirectoryWatcher::start(&watch_root, settings.clone(), scan_tx.clone()) {
        Ok(watcher) => {
            let (watching, failed) = watcher.coverage();
            log::info!(
                "Watching {} ({} directories, {} failed)",
                watch_root.display(),
                watching,
                failed
            );
            Some(watcher)
        }
        Err(e) => {
            // Scheduled scans still work without real-time coverage
            log::error!("Real-time protection unavailable: {}", e);
            None
        }
    };

    if constants::get_scan_existing() {
        let queued = pipeline::enqueue_existing(&watch_root, &scan_tx);
        log::info!("Queued {} existing files for scanning", queued);
    }
    drop(scan_tx);

    scheduler::start(Arc::clone(&engine), settings);

    loop {
        thread::sleep(Duration::from_secs(STATS_LOG_INTERVAL_SECS));
        let stats = pipeline::get_stats();
        log::debug!(
            "Stats: scanned={} clean={} infected={} quarantined={} skipped={} whitelisted={}",
            stats.scanned,
            stats.clean,
            stats.infected,
            stats.quarantined,
            stats.skipped,
            stats.whitelisted
        );
    }
}
