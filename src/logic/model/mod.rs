//! Model Module - Classifier Boundary
//!
//! The trained malware classifier runs as an external service. This module
//! only wraps request/response; no scoring logic lives here.

pub mod classifier;

pub use classifier::{ClassifierClient, ClassifierError};
