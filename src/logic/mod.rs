//! Core Scanning Logic
//!
//! Everything between a filesystem event and an isolated threat:
//! feature extraction, the two verdict services, fusion, quarantine,
//! history, the watcher and the scheduler.

pub mod config;
pub mod external_intel;
pub mod features;
pub mod history;
pub mod model;
pub mod pipeline;
pub mod quarantine;
pub mod scheduler;
pub mod verdict;
pub mod watcher;
