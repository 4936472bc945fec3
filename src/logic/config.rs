//! Persisted Settings
//!
//! The scanning core reads exactly three settings: the watch root, the
//! real-time protection flag and the periodic scan mode. They are stored
//! as a small JSON file in the app data directory.
//!
//! The protection flag is shared as an atomic boolean so watcher callbacks
//! read the live value at event time. The only writer is [`SettingsHandle::set_protection`],
//! which also persists the new value.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

const SETTINGS_FILE: &str = "settings.json";

// ============================================================================
// TYPES
// ============================================================================

/// Periodic full-scan mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleMode {
    Never,
    Daily,
    Monthly,
}

impl ScheduleMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleMode::Never => "never",
            ScheduleMode::Daily => "daily",
            ScheduleMode::Monthly => "monthly",
        }
    }
}

impl Default for ScheduleMode {
    fn default() -> Self {
        ScheduleMode::Never
    }
}

/// On-disk settings shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Root directory watched for real-time protection.
    /// `None` falls back to the user's downloads directory.
    pub watch_root: Option<PathBuf>,
    pub real_time_protection: bool,
    pub schedule: ScheduleMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            watch_root: None,
            real_time_protection: true,
            schedule: ScheduleMode::Never,
        }
    }
}

// ============================================================================
// HANDLE
// ============================================================================

/// Shared, cloneable settings handle
#[derive(Clone)]
pub struct SettingsHandle {
    inner: Arc<SettingsInner>,
}

struct SettingsInner {
    path: PathBuf,
    protection: AtomicBool,
    state: RwLock<Settings>,
}

impl SettingsHandle {
    /// Load settings from `<data_dir>/settings.json`, falling back to defaults
    /// when the file is missing or unreadable.
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(SETTINGS_FILE);

        let settings = fs::read_to_string(&path)
            .ok()
            .and_then(|content| serde_json::from_str::<Settings>(&content).ok())
            .unwrap_or_else(|| {
                log::info!("No settings found at {}, using defaults", path.display());
                Settings::default()
            });

        Self {
            inner: Arc::new(SettingsInner {
                path,
                protection: AtomicBool::new(settings.real_time_protection),
                state: RwLock::new(settings),
            }),
        }
    }

    /// Live protection flag, read at event time by watcher callbacks
    pub fn protection_enabled(&self) -> bool {
        self.inner.protection.load(Ordering::Relaxed)
    }

    /// Toggle real-time protection and persist the new value
    pub fn set_protection(&self, enabled: bool) {
        self.inner.protection.store(enabled, Ordering::Relaxed);
        {
            let mut state = self.inner.state.write();
            state.real_time_protection = enabled;
        }
        self.persist();
        log::info!("Real-time protection {}", if enabled { "enabled" } else { "disabled" });
    }

    /// Resolved watch root: configured path, or the user's downloads directory
    pub fn watch_root(&self) -> PathBuf {
        if let Some(root) = self.inner.state.read().watch_root.clone() {
            return root;
        }
        dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn set_watch_root(&self, root: Option<PathBuf>) {
        self.inner.state.write().watch_root = root;
        self.persist();
    }

    pub fn schedule(&self) -> ScheduleMode {
        self.inner.state.read().schedule
    }

    pub fn set_schedule(&self, mode: ScheduleMode) {
        self.inner.state.write().schedule = mode;
        self.persist();
    }

    fn persist(&self) {
        let state = self.inner.state.read().clone();
        match serde_json::to_string_pretty(&state) {
            Ok(json) => {
                if let Err(e) = fs::write(&self.inner.path, json) {
                    log::warn!("Failed to persist settings to {}: {}", self.inner.path.display(), e);
                }
            }
            Err(e) => log::warn!("Failed to serialize settings: {}", e),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let handle = SettingsHandle::load(dir.path());

        assert!(handle.protection_enabled());
        assert_eq!(handle.schedule(), ScheduleMode::Never);
    }

    #[test]
    fn test_persist_roundtrip() {
        let dir = tempfile::tempdir().unwrap();

        let handle = SettingsHandle::load(dir.path());
        handle.set_protection(false);
        handle.set_schedule(ScheduleMode::Daily);
        handle.set_watch_root(Some(PathBuf::from("/tmp/watched")));

        let reloaded = SettingsHandle::load(dir.path());
        assert!(!reloaded.protection_enabled());
        assert_eq!(reloaded.schedule(), ScheduleMode::Daily);
        assert_eq!(reloaded.watch_root(), PathBuf::from("/tmp/watched"));
    }

    #[test]
    fn test_toggle_is_visible_to_clones() {
        let dir = tempfile::tempdir().unwrap();
        let handle = SettingsHandle::load(dir.path());
        let clone = handle.clone();

        handle.set_protection(false);
        assert!(!clone.protection_enabled());

        clone.set_protection(true);
        assert!(handle.protection_enabled());
    }
}
