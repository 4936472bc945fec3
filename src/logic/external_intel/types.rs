//! Secondary Analysis Types

use serde::{Deserialize, Serialize};

/// Label assigned by the textual analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecondaryLabel {
    Malicious,
    Suspicious,
    Clean,
    /// The analyzer had no opinion. Never to be conflated with Clean.
    Unavailable,
}

impl SecondaryLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecondaryLabel::Malicious => "MALICIOUS",
            SecondaryLabel::Suspicious => "SUSPICIOUS",
            SecondaryLabel::Clean => "CLEAN",
            SecondaryLabel::Unavailable => "UNAVAILABLE",
        }
    }

    /// Map the analyzer's verdict string. Unknown labels yield `None`;
    /// the caller treats that as no opinion, not as clean.
    pub fn from_verdict(verdict: &str) -> Option<Self> {
        match verdict.trim().to_ascii_uppercase().as_str() {
            "MALICIOUS" => Some(SecondaryLabel::Malicious),
            "SUSPICIOUS" => Some(SecondaryLabel::Suspicious),
            // The analyzer grades borderline files QUESTIONABLE; neither
            // fusion branch fires on those, so they fold into Clean.
            "CLEAN" | "QUESTIONABLE" => Some(SecondaryLabel::Clean),
            _ => None,
        }
    }
}

/// Parsed analyzer verdict
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecondaryReport {
    pub label: SecondaryLabel,
    pub confidence: f64,
    pub explanation: String,
}

/// Outcome of one analyze() call
#[derive(Debug, Clone)]
pub enum SecondaryOutcome {
    Report(SecondaryReport),
    Unavailable { reason: String },
}

// ============================================================================
// TESTS
// ============================================================================
