//! Features Module - Binary Feature Extraction
//!
//! Turns raw file bytes into the normalized [`FeatureVector`] the external
//! classifier was trained on: file size, Shannon entropy, PE import count
//! and the suspicious-string ratio.

use std::fs;
use std::path::Path;

pub mod entropy;
pub mod imports;
pub mod strings;
pub mod vector;

pub use vector::{FeatureVector, FEATURE_COUNT};

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone)]
pub enum FeatureError {
    /// File could not be read; the scan of this file is skipped
    Io { path: String, message: String },
}

impl std::fmt::Display for FeatureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureError::Io { path, message } => {
                write!(f, "Cannot read {}: {}", path, message)
            }
        }
    }
}

impl std::error::Error for FeatureError {}

// ============================================================================
// EXTRACTION
// ============================================================================

/// Extract features from a file on disk.
///
/// An unreadable file fails only this scan; callers log and continue.
pub fn extract_file(path: &Path) -> Result<FeatureVector, FeatureError> {
    let data = fs::read(path).map_err(|e| FeatureError::Io {
        path: path.to_string_lossy().to_string(),
        message: e.to_string(),
    })?;
    Ok(extract_bytes(&data))
}

/// Extract features from an in-memory buffer.
pub fn extract_bytes(data: &[u8]) -> FeatureVector {
    FeatureVector::from_raw(
        data.len() as u64,
        entropy::entropy(data),
        imports::count_imports(data),
        strings::string_score(data),
    )
}

// ============================================================================
// TESTS
// ============================================================================
