//! Secondary Analysis Adapter
//!
//! Submits a file path to the external textual-analysis service and parses
//! its verdict. The call can take seconds; it runs only on scan worker
//! threads and holds no locks.
//!
//! The response is treated as opaque JSON and parsed field by field. Any
//! transport failure, missing key or unknown verdict string degrades to
//! `Unavailable` - never a crash, and never mistaken for a clean verdict.

use std::path::Path;
use std::time::Duration;

use super::types::{SecondaryLabel, SecondaryOutcome, SecondaryReport};
use crate::constants::ANALYZER_TIMEOUT_SECS;

pub struct AnalyzerClient {
    url: String,
    agent: ureq::Agent,
}

impl AnalyzerClient {
    pub fn new(url: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(3))
            .timeout_read(Duration::from_secs(ANALYZER_TIMEOUT_SECS))
            .build();
        Self {
            url: url.trim_end_matches('/').to_string(),
            agent,
        }
    }

    /// Ask the analyzer for an opinion on one file.
    pub fn analyze(&self, path: &Path) -> SecondaryOutcome {
        let endpoint = format!("{}/analyze", self.url);
        let payload = serde_json::json!({
            "path": path.to_string_lossy(),
        });

        let response = match self.agent.post(&endpoint).send_json(payload) {
            Ok(resp) => resp,
            Err(e) => {
                return SecondaryOutcome::Unavailable {
                    reason: format!("transport: {}", e),
                }
            }
        };

        let body: serde_json::Value = match response.into_json() {
            Ok(body) => body,
            Err(e) => {
                return SecondaryOutcome::Unavailable {
                    reason: format!("invalid JSON: {}", e),
                }
            }
        };

        parse_report(&body)
    }
}

/// Parse the analyzer body defensively: `final_verdict` and `confidence`
/// are required, `explanation` is optional.
pub fn parse_report(body: &serde_json::Value) -> SecondaryOutcome {
    let verdict = match body.get("final_verdict").and_then(|v| v.as_str()) {
        Some(v) => v,
        None => {
            return SecondaryOutcome::Unavailable {
                reason: "missing final_verdict".to_string(),
            }
        }
    };

    let label = match SecondaryLabel::from_verdict(verdict) {
        Some(label) => label,
        None => {
            return SecondaryOutcome::Unavailable {
                reason: format!("unknown verdict '{}'", verdict),
            }
        }
    };

    let confidence = match body.get("confidence").and_then(|v| v.as_f64()) {
        Some(c) => c.clamp(0.0, 1.0),
        None => {
            return SecondaryOutcome::Unavailable {
                reason: "missing confidence".to_string(),
            }
        }
    };

    let explanation = body
        .get("explanation")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    SecondaryOutcome::Report(SecondaryReport {
        label,
        confidence,
        explanation,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_report() {
        let body = serde_json::json!({
            "final_verdict": "MALICIOUS",
            "confidence": 0.92,
            "explanation": "subprocess calls with base64 payloads",
        });

        match parse_report(&body) {
            SecondaryOutcome::Report(report) => {
                assert_eq!(report.label, SecondaryLabel::Malicious);
                assert_eq!(report.confidence, 0.92);
                assert!(report.explanation.contains("base64"));
            }
            SecondaryOutcome::Unavailable { reason } => panic!("unavailable: {}", reason),
        }
    }

    #[test]
    fn test_missing_verdict_is_unavailable() {
        let body = serde_json::json!({ "confidence": 0.5 });
        assert!(matches!(
            parse_report(&body),
            SecondaryOutcome::Unavailable { .. }
        ));
    }

    #[test]
    fn test_missing_confidence_is_unavailable() {
        let body = serde_json::json!({ "final_verdict": "CLEAN" });
        assert!(matches!(
            parse_report(&body),
            SecondaryOutcome::Unavailable { .. }
        ));
    }

    #[test]
    fn test_unknown_verdict_is_unavailable_not_clean() {
        let body = serde_json::json!({
            "final_verdict": "ERROR",
            "confidence": 1.0,
        });
        match parse_report(&body) {
            SecondaryOutcome::Unavailable { reason } => assert!(reason.contains("ERROR")),
            SecondaryOutcome::Report(r) => panic!("parsed {:?} from an error verdict", r.label),
        }
    }

    #[test]
    fn test_confidence_clamped_and_explanation_optional() {
        let body = serde_json::json!({
            "final_verdict": "SUSPICIOUS",
            "confidence": 7.0,
        });
        match parse_report(&body) {
            SecondaryOutcome::Report(report) => {
                assert_eq!(report.confidence, 1.0);
                assert!(report.explanation.is_empty());
            }
            SecondaryOutcome::Unavailable { reason } => panic!("unavailable: {}", reason),
        }
    }

    #[test]
    fn test_unreachable_service_is_unavailable() {
        let client = AnalyzerClient::new("http://127.0.0.1:9");
        let outcome = client.analyze(Path::new("/tmp/sample.py"));
        assert!(matches!(outcome, SecondaryOutcome::Unavailable { .. }));
    }
}
