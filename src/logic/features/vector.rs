//! Feature Vector - classifier input
//!
//! Ordered, normalized 4-tuple matching the external classifier's training
//! layout. The calibration divisors below are paired with that model's
//! training distribution; they are versioned together with the layout via
//! a CRC32 hash so a model swap is detectable.

use serde::{Deserialize, Serialize};

// ============================================================================
// LAYOUT & CALIBRATION
// ============================================================================

pub const FEATURE_COUNT: usize = 4;

/// Feature order expected by the classifier. Never reorder independently
/// of the model.
pub const FEATURE_LAYOUT: [&str; FEATURE_COUNT] = [
    "size_norm",
    "entropy_norm",
    "imports_norm",
    "string_score_norm",
];

/// Bump when the layout or calibration changes together with the model
pub const CALIBRATION_VERSION: u8 = 1;

/// Calibration divisors (fixed, matched to the classifier)
pub const SIZE_DIVISOR: f64 = 1e7;
pub const ENTROPY_DIVISOR: f64 = 8.0;
pub const IMPORTS_DIVISOR: f64 = 150.0;

/// CRC32 over the layout names and calibration constants.
/// Changes whenever either is touched.
pub fn layout_hash() -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    for name in FEATURE_LAYOUT {
        hasher.update(name.as_bytes());
        hasher.update(b";");
    }
    hasher.update(&SIZE_DIVISOR.to_le_bytes());
    hasher.update(&ENTROPY_DIVISOR.to_le_bytes());
    hasher.update(&IMPORTS_DIVISOR.to_le_bytes());
    hasher.finalize()
}

// ============================================================================
// FEATURE VECTOR
// ============================================================================

/// Normalized feature vector, immutable once built
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureVector {
    pub version: u8,
    pub layout_hash: u32,
    /// Values in [0,1], ordered per FEATURE_LAYOUT
    pub values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    /// Normalize raw signals into the fixed layout, clamping every
    /// component to [0,1].
    pub fn from_raw(size: u64, entropy: f64, imports: u32, string_score: f64) -> Self {
        let values = [
            (size as f64 / SIZE_DIVISOR).clamp(0.0, 1.0),
            (entropy / ENTROPY_DIVISOR).clamp(0.0, 1.0),
            (imports as f64 / IMPORTS_DIVISOR).clamp(0.0, 1.0),
            string_score.clamp(0.0, 1.0),
        ];
        Self {
            version: CALIBRATION_VERSION,
            layout_hash: layout_hash(),
            values,
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn size_norm(&self) -> f64 {
        self.values[0]
    }

    pub fn entropy_norm(&self) -> f64 {
        self.values[1]
    }

    pub fn imports_norm(&self) -> f64 {
        self.values[2]
    }

    pub fn string_score_norm(&self) -> f64 {
        self.values[3]
    }
}

// ============================================================================
// TESTS
// ============================================================================
