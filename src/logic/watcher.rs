//! Real-Time Directory Watcher
//!
//! Watches a directory tree for created and modified files and feeds them
//! into the scan queue. Each directory gets its own non-recursive watch so
//! one unwatchable subdirectory never takes down the rest of the tree;
//! directories created later are attached on the fly.
//!
//! Watch registration happens on a dedicated control thread that owns the
//! OS watcher. The event callback never calls back into the watcher; it
//! only forwards new directory paths over a channel.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;

use crate::logic::config::SettingsHandle;
use crate::logic::pipeline::{is_scannable, ScanRequest, ScanTrigger};

// ============================================================================
// TYPES
// ============================================================================

/// Per-directory watch status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Watching,
    /// Registration failed; the subtree below is not covered
    Failed,
}

#[derive(Debug)]
pub struct WatchError(pub String);

impl std::fmt::Display for WatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Watcher error: {}", self.0)
    }
}

impl std::error::Error for WatchError {}

pub struct DirectoryWatcher {
    states: Arc<RwLock<HashMap<PathBuf, WatchState>>>,
    _control: thread::JoinHandle<()>,
}

// ============================================================================
// EVENT FILTERING
// ============================================================================

/// Only creations and content modifications matter; renames, metadata
/// changes and removals are noise here.
pub fn event_is_relevant(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}

fn trigger_for(kind: &EventKind) -> ScanTrigger {
    match kind {
        EventKind::Create(_) => ScanTrigger::Created,
        _ => ScanTrigger::Modified,
    }
}

// ============================================================================
// WATCHER
// ============================================================================

impl DirectoryWatcher {
    /// Start watching `root` and all its subdirectories.
    pub fn start(
        root: &Path,
        settings: SettingsHandle,
        scan_tx: SyncSender<ScanRequest>,
    ) -> Result<Self, WatchError> {
        if !root.is_dir() {
            return Err(WatchError(format!(
                "watch root is not a directory: {}",
                root.display()
            )));
        }

        let states: Arc<RwLock<HashMap<PathBuf, WatchState>>> =
            Arc::new(RwLock::new(HashMap::new()));

        // New directories discovered by the event callback are attached by
        // the control thread, which owns the OS watcher
        let (dir_tx, dir_rx) = mpsc::channel::<PathBuf>();

        let handler_dir_tx = dir_tx.clone();
        let handler = move |result: Result<Event, notify::Error>| {
            let event = match result {
                Ok(event) => event,
                Err(e) => {
                    log::warn!("Watch event error: {}", e);
                    return;
                }
            };
            if !event_is_relevant(&event.kind) {
                return;
            }

            for path in event.paths {
                if path.is_dir() {
                    let _ = handler_dir_tx.send(path);
                    continue;
                }
                // Protection flag is read at event time, not at startup
                if !settings.protection_enabled() {
                    continue;
                }
                if !is_scannable(&path) {
                    continue;
                }
                let request = ScanRequest {
                    path: path.clone(),
                    trigger: trigger_for(&event.kind),
                };
                match scan_tx.try_send(request) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        log::warn!("Scan queue full, dropping {}", path.display());
                    }
                    Err(TrySendError::Disconnected(_)) => {
                        log::error!("Scan queue disconnected");
                    }
                }
            }
        };

        let mut watcher = notify::recommended_watcher(handler)
            .map_err(|e| WatchError(e.to_string()))?;

        // Attach the initial tree synchronously so the caller can inspect
        // coverage right after start
        attach_tree(&mut watcher, root, &states);

        if !states.read().values().any(|s| *s == WatchState::Watching) {
            return Err(WatchError(format!(
                "no directory under {} could be watched",
                root.display()
            )));
        }

        let control_states = Arc::clone(&states);
        let control = thread::Builder::new()
            .name("watch-control".to_string())
            .spawn(move || {
                // The watcher lives on this thread; dropping it detaches
                // every watch
                let mut watcher = watcher;
                while let Ok(new_dir) = dir_rx.recv() {
                    attach_tree(&mut watcher, &new_dir, &control_states);
                }
            })
            .map_err(|e| WatchError(e.to_string()))?;

        Ok(Self {
            states,
            _control: control,
        })
    }

    /// Snapshot of every directory's watch status.
    pub fn states(&self) -> HashMap<PathBuf, WatchState> {
        self.states.read().clone()
    }

    /// (watching, failed) directory counts.
    pub fn coverage(&self) -> (usize, usize) {
        let states = self.states.read();
        let watching = states.values().filter(|s| **s == WatchState::Watching).count();
        (watching, states.len() - watching)
    }
}

/// Register `dir` and everything below it, one non-recursive watch per
/// directory. A failure marks that directory Failed and skips its subtree.
fn attach_tree(
    watcher: &mut RecommendedWatcher,
    dir: &Path,
    states: &Arc<RwLock<HashMap<PathBuf, WatchState>>>,
) {
    let mut stack = vec![dir.to_path_buf()];

    while let Some(current) = stack.pop() {
        if states.read().contains_key(&current) {
            continue;
        }

        if let Err(e) = watcher.watch(&current, RecursiveMode::NonRecursive) {
            log::warn!("Cannot watch {}: {}", current.display(), e);
            states.write().insert(current, WatchState::Failed);
            continue;
        }
        states.write().insert(current.clone(), WatchState::Watching);

        let entries = match std::fs::read_dir(&current) {
            Ok(entries) => entries,
            Err(e) => {
                // Watched but unenumerable: children created later still
                // arrive as events, existing ones are out of reach
                log::warn!("Cannot enumerate {}: {}", current.display(), e);
                continue;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
