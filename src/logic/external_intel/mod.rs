//! External Intel Module - Secondary Analysis Boundary
//!
//! Wraps the textual-analysis service that renders an independent opinion
//! on suspect files. Slow, opaque and allowed to fail; the pipeline treats
//! an unavailable analyzer as "no opinion" and falls back to the
//! classifier alone.

pub mod analyzer;
pub mod types;

pub use analyzer::AnalyzerClient;
pub use types::{SecondaryLabel, SecondaryOutcome, SecondaryReport};
