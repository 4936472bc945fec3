//! Scan Pipeline
//!
//! Per-file scan orchestration plus the worker pool that drains the scan
//! queue. One file flows: read -> whitelist check -> feature extraction ->
//! classifier score -> secondary analysis -> verdict fusion -> quarantine
//! on a positive.
//!
//! Every step failure is contained to the file being scanned; workers
//! never panic and never stop.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread;

use chrono::Utc;
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::constants::{MAX_SCAN_FILE_SIZE, SCANNABLE_EXTENSIONS};
use crate::logic::external_intel::AnalyzerClient;
use crate::logic::history::HistoryStore;
use crate::logic::model::ClassifierClient;
use crate::logic::quarantine::{whitelist, QuarantineError, QuarantineStore};
use crate::logic::verdict::{self, Verdict};

// ============================================================================
// STATE
// ============================================================================

/// Running counters since process start
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanStats {
    pub scanned: u64,
    pub clean: u64,
    pub infected: u64,
    pub quarantined: u64,
    pub skipped: u64,
    pub whitelisted: u64,
}

static SCAN_STATS: Lazy<RwLock<ScanStats>> = Lazy::new(|| RwLock::new(ScanStats::default()));

pub fn get_stats() -> ScanStats {
    SCAN_STATS.read().clone()
}

// ============================================================================
// TYPES
// ============================================================================

/// What caused a scan to be enqueued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScanTrigger {
    Created,
    Modified,
    Scheduled,
    Manual,
}

impl ScanTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanTrigger::Created => "created",
            ScanTrigger::Modified => "modified",
            ScanTrigger::Scheduled => "scheduled",
            ScanTrigger::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub path: PathBuf,
    pub trigger: ScanTrigger,
}

#[derive(Debug)]
pub enum ScanOutcome {
    Clean(Verdict),
    Quarantined { verdict: Verdict, record_id: i64 },
    Whitelisted,
    Skipped { reason: String },
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct ScanEngine {
    classifier: ClassifierClient,
    analyzer: AnalyzerClient,
    quarantine: Arc<QuarantineStore>,
    history: Arc<HistoryStore>,
}

impl ScanEngine {
    pub fn new(
        classifier: ClassifierClient,
        analyzer: AnalyzerClient,
        quarantine: Arc<QuarantineStore>,
        history: Arc<HistoryStore>,
    ) -> Self {
        Self {
            classifier,
            analyzer,
            quarantine,
            history,
        }
    }

    pub fn quarantine_store(&self) -> &Arc<QuarantineStore> {
        &self.quarantine
    }

    pub fn history_store(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    pub fn classifier(&self) -> &ClassifierClient {
        &self.classifier
    }

    /// Run the full scan pipeline on one file.
    pub fn scan_file(&self, path: &Path, trigger: ScanTrigger) -> ScanOutcome {
        SCAN_STATS.write().scanned += 1;

        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                // Transient files from installers and build tools vanish
                // between the event and the scan all the time
                log::debug!("Skipping {}: {}", path.display(), e);
                SCAN_STATS.write().skipped += 1;
                return ScanOutcome::Skipped {
                    reason: format!("unreadable: {}", e),
                };
            }
        };

        let hash = whitelist::hash_bytes(&data);
        if self.quarantine.is_whitelisted(&hash) {
            log::debug!("Whitelisted, skipping: {}", path.display());
            SCAN_STATS.write().whitelisted += 1;
            return ScanOutcome::Whitelisted;
        }

        let features = crate::logic::features::extract_bytes(&data);

        let classifier_score = match self.classifier.score(&features) {
            Ok(score) => score,
            Err(e) => {
                log::warn!("Classifier failed for {}: {}", path.display(), e);
                0.0
            }
        };

        let secondary = self.analyzer.analyze(path);
        let verdict = verdict::fuse(classifier_score, &secondary);

        log::info!(
            "Scanned {} [{}]: score={:.3} secondary={} -> {}",
            path.display(),
            trigger.as_str(),
            verdict.classifier_score,
            verdict.secondary_label.as_str(),
            if verdict.final_decision { "INFECTED" } else { "clean" }
        );

        if !verdict.final_decision {
            SCAN_STATS.write().clean += 1;
            return ScanOutcome::Clean(verdict);
        }

        SCAN_STATS.write().infected += 1;
        match self.quarantine.quarantine(path, verdict.threat_score()) {
            Ok(record_id) => {
                SCAN_STATS.write().quarantined += 1;
                if let Err(e) = self.history.insert(1, Utc::now()) {
                    log::error!("History insert failed: {}", e);
                }
                ScanOutcome::Quarantined { verdict, record_id }
            }
            Err(QuarantineError::SourceVanished { path }) => {
                log::warn!("Infected file vanished before isolation: {}", path);
                SCAN_STATS.write().skipped += 1;
                ScanOutcome::Skipped {
                    reason: "vanished before isolation".to_string(),
                }
            }
            Err(QuarantineError::AlreadyInFlight { path }) => {
                log::debug!("Quarantine already in flight: {}", path);
                ScanOutcome::Skipped {
                    reason: "quarantine in flight".to_string(),
                }
            }
            Err(e) => {
                log::error!("Quarantine failed for {}: {}", path.display(), e);
                ScanOutcome::Skipped {
                    reason: format!("quarantine failed: {}", e),
                }
            }
        }
    }
}

// ============================================================================
// FILTERING
// ============================================================================

/// Whether a path is worth scanning at all: known risky extension and
/// within the size cap.
pub fn is_scannable(path: &Path) -> bool {
    let ext = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => ext.to_lowercase(),
        None => return false,
    };
    if !SCANNABLE_EXTENSIONS.contains(&ext.as_str()) {
        return false;
    }
    match fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.len() <= MAX_SCAN_FILE_SIZE,
        Err(_) => false,
    }
}

/// Walk the tree under `root` and enqueue every scannable file for a
/// manual scan. Used for the optional scan of files that already existed
/// before the watcher came up.
pub fn enqueue_existing(root: &Path, tx: &SyncSender<ScanRequest>) -> usize {
    let mut queued = 0;
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Initial scan cannot enter {}: {}", dir.display(), e);
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
            let request = ScanRequest {
                path: path.clone(),
                trigger: ScanTrigger::Manual,
            };
            match tx.try_send(request) {
                Ok(()) => queued += 1,
                Err(TrySendError::Full(_)) => {
                    log::warn!("Scan queue full, skipping {}", path.display());
                }
                Err(TrySendError::Disconnected(_)) => return queued,
            }
        }
    }
    queued
}

// ============================================================================
// WORKER POOL
// ============================================================================

/// Spawn the scan workers and return the queue's sending side.
///
/// The queue is bounded; producers use `try_send` and drop on overflow
/// rather than stalling the filesystem watcher.
pub fn start_workers(
    engine: Arc<ScanEngine>,
    workers: usize,
    capacity: usize,
) -> SyncSender<ScanRequest> {
    let (tx, rx) = sync_channel::<ScanRequest>(capacity);
    let rx = Arc::new(Mutex::new(rx));

    for i in 0..workers {
        let engine = Arc::clone(&engine);
        let rx: Arc<Mutex<Receiver<ScanRequest>>> = Arc::clone(&rx);
        thread::Builder::new()
            .name(format!("scan-worker-{}", i))
            .spawn(move || loop {
                let request = {
                    let guard = rx.lock();
                    guard.recv()
                };
                match request {
                    Ok(req) => {
                        engine.scan_file(&req.path, req.trigger);
                    }
                    // All senders gone; shut the worker down
                    Err(_) => break,
                }
            })
            .expect("failed to spawn scan worker");
    }

    log::info!("Started {} scan workers (queue capacity {})", workers, capacity);
    tx
}

// ============================================================================
// TESTS
// ============================================================================
