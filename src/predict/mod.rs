//! Fixture scoring
//!
//! Probability calibration, fair odds and prediction upserts.

pub mod predictor;

pub use predictor::Predictor;
