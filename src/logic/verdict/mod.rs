//! Verdict Fusion
//!
//! Combines the classifier score with the secondary analyzer's opinion.
//! Fusion is disjunctive: either signal alone confirming danger is enough,
//! and no signal can override a positive from the other. Over-flagging is
//! recoverable through restore; a missed infection is not.

use serde::{Deserialize, Serialize};

use crate::logic::external_intel::{SecondaryLabel, SecondaryOutcome};

// ============================================================================
// THRESHOLDS
// ============================================================================

/// Classifier score at or above this confirms on its own
pub const CLASSIFIER_THRESHOLD: f64 = 0.5;

/// A SUSPICIOUS secondary label needs at least this confidence
pub const SUSPICIOUS_CONFIDENCE_MIN: f64 = 0.7;

// ============================================================================
// VERDICT
// ============================================================================

/// Final fused decision for one scan. Derived per scan, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub classifier_score: f64,
    pub secondary_label: SecondaryLabel,
    /// Meaningful only when the secondary analyzer actually ran
    pub secondary_confidence: f64,
    pub explanation: String,
    pub final_decision: bool,
}

impl Verdict {
    /// Threat score recorded with a quarantined file: the strongest signal
    /// that contributed to the positive decision.
    pub fn threat_score(&self) -> f64 {
        let secondary = match self.secondary_label {
            SecondaryLabel::Malicious | SecondaryLabel::Suspicious => self.secondary_confidence,
            _ => 0.0,
        };
        self.classifier_score.max(secondary)
    }
}

/// Fuse the two signals. An unavailable secondary degrades to
/// classifier-only; it never counts as clean.
pub fn fuse(classifier_score: f64, secondary: &SecondaryOutcome) -> Verdict {
    let (label, confidence, explanation) = match secondary {
        SecondaryOutcome::Report(report) => (
            report.label,
            report.confidence,
            report.explanation.clone(),
        ),
        SecondaryOutcome::Unavailable { reason } => (
            SecondaryLabel::Unavailable,
            0.0,
            format!("secondary analysis unavailable: {}", reason),
        ),
    };

    let final_decision = classifier_score >= CLASSIFIER_THRESHOLD
        || label == SecondaryLabel::Malicious
        || (label == SecondaryLabel::Suspicious && confidence >= SUSPICIOUS_CONFIDENCE_MIN);

    Verdict {
        classifier_score,
        secondary_label: label,
        secondary_confidence: confidence,
        explanation,
        final_decision,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::external_intel::SecondaryReport;

    fn report(label: SecondaryLabel, confidence: f64) -> SecondaryOutcome {
        SecondaryOutcome::Report(SecondaryReport {
            label,
            confidence,
            explanation: String::new(),
        })
    }

    fn unavailable() -> SecondaryOutcome {
        SecondaryOutcome::Unavailable {
            reason: "connection refused".to_string(),
        }
    }

    #[test]
    fn test_high_classifier_alone_confirms() {
        let v = fuse(0.9, &unavailable());
        assert!(v.final_decision);
        assert_eq!(v.secondary_label, SecondaryLabel::Unavailable);
    }

    #[test]
    fn test_low_confidence_suspicious_is_clean() {
        let v = fuse(0.1, &report(SecondaryLabel::Suspicious, 0.5));
        assert!(!v.final_decision);
    }

    #[test]
    fn test_malicious_label_overrides_low_score() {
        // Even a zero-confidence MALICIOUS label confirms
        let v = fuse(0.1, &report(SecondaryLabel::Malicious, 0.0));
        assert!(v.final_decision);
    }

    #[test]
    fn test_suspicious_confidence_boundary() {
        assert!(fuse(0.0, &report(SecondaryLabel::Suspicious, 0.7)).final_decision);
        assert!(!fuse(0.0, &report(SecondaryLabel::Suspicious, 0.69)).final_decision);
    }

    #[test]
    fn test_classifier_threshold_boundary() {
        assert!(fuse(0.5, &report(SecondaryLabel::Clean, 1.0)).final_decision);
        assert!(!fuse(0.49, &report(SecondaryLabel::Clean, 1.0)).final_decision);
    }

    #[test]
    fn test_unavailable_is_not_clean_evidence() {
        // Unavailable carries no confidence, but it also must not suppress
        // the classifier signal
        let v = fuse(0.6, &unavailable());
        assert!(v.final_decision);

        let v = fuse(0.4, &unavailable());
        assert!(!v.final_decision);
    }

    #[test]
    fn test_threat_score_takes_strongest_signal() {
        let v = fuse(0.2, &report(SecondaryLabel::Malicious, 0.95));
        assert_eq!(v.threat_score(), 0.95);

        let v = fuse(0.8, &report(SecondaryLabel::Clean, 0.99));
        assert_eq!(v.threat_score(), 0.8);
    }
}
