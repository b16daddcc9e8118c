//! Classifier and its scoped configuration
//!
//! A seeded random forest over the 15 match features, with per-scope
//! hyperparameters and feature weights resolved from the config store.

pub mod config;
pub mod forest;

pub use config::{Hyperparameters, ResolvedConfig, ScopeConfig};
pub use forest::RandomForest;
