//! Classifier Adapter
//!
//! Submits a feature vector to the external scoring service and returns a
//! probability in [0,1]. Pure boundary wrapper: the request is the ordered
//! 4 floats, the response a single number.
//!
//! Failure here is non-fatal to a scan; the pipeline treats the file as not
//! classifier-confirmed (score 0) and still consults the secondary analyzer.

use std::time::Duration;

use crate::constants::CLASSIFIER_TIMEOUT_SECS;
use crate::logic::features::FeatureVector;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone)]
pub enum ClassifierError {
    /// Service unreachable, timed out or returned an error status
    Unavailable { message: String },
    /// Service answered but the body had no usable prediction
    BadResponse { message: String },
}

impl std::fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassifierError::Unavailable { message } => {
                write!(f, "Classifier unavailable: {}", message)
            }
            ClassifierError::BadResponse { message } => {
                write!(f, "Bad classifier response: {}", message)
            }
        }
    }
}

impl std::error::Error for ClassifierError {}

// ============================================================================
// CLIENT
// ============================================================================

pub struct ClassifierClient {
    url: String,
    agent: ureq::Agent,
}

impl ClassifierClient {
    pub fn new(url: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(3))
            .timeout_read(Duration::from_secs(CLASSIFIER_TIMEOUT_SECS))
            .build();
        Self {
            url: url.trim_end_matches('/').to_string(),
            agent,
        }
    }

    /// Score a feature vector. Returns a probability clamped to [0,1].
    pub fn score(&self, features: &FeatureVector) -> Result<f64, ClassifierError> {
        let endpoint = format!("{}/predict", self.url);
        let payload = serde_json::json!({ "input": features.values });

        let response = self
            .agent
            .post(&endpoint)
            .send_json(payload)
            .map_err(|e| ClassifierError::Unavailable { message: e.to_string() })?;

        let body: serde_json::Value = response
            .into_json()
            .map_err(|e| ClassifierError::BadResponse { message: e.to_string() })?;

        parse_prediction(&body)
    }
}

/// Pull the prediction out of the response body, defensively.
fn parse_prediction(body: &serde_json::Value) -> Result<f64, ClassifierError> {
    body.get("prediction")
        .and_then(|v| v.as_f64())
        .map(|score| score.clamp(0.0, 1.0))
        .ok_or_else(|| ClassifierError::BadResponse {
            message: format!("missing or non-numeric 'prediction' in {}", body),
        })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_float_prediction() {
        let body = serde_json::json!({ "prediction": 0.73 });
        assert_eq!(parse_prediction(&body).unwrap(), 0.73);
    }

    #[test]
    fn test_parse_integer_prediction() {
        // The service may answer with a bare class label
        let body = serde_json::json!({ "prediction": 1 });
        assert_eq!(parse_prediction(&body).unwrap(), 1.0);
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        let body = serde_json::json!({ "prediction": 3.5 });
        assert_eq!(parse_prediction(&body).unwrap(), 1.0);

        let body = serde_json::json!({ "prediction": -0.2 });
        assert_eq!(parse_prediction(&body).unwrap(), 0.0);
    }

    #[test]
    fn test_missing_prediction_is_bad_response() {
        let body = serde_json::json!({ "score": 0.9 });
        assert!(matches!(
            parse_prediction(&body),
            Err(ClassifierError::BadResponse { .. })
        ));

        let body = serde_json::json!({ "prediction": "high" });
        assert!(matches!(
            parse_prediction(&body),
            Err(ClassifierError::BadResponse { .. })
        ));
    }

    #[test]
    fn test_unreachable_service_is_unavailable() {
        // Port 9 (discard) is almost certainly closed
        let client = ClassifierClient::new("http://127.0.0.1:9");
        let fv = FeatureVector::from_raw(100, 2.0, 3, 0.0);
        assert!(matches!(
            client.score(&fv),
            Err(ClassifierError::Unavailable { .. })
        ));
    }
}
