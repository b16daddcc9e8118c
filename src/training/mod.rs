//! Model training
//!
//! Dataset assembly, class balancing, fitting and cross-validation.

pub mod trainer;

pub use trainer::{TrainOutput, Trainer, MIN_TRAINING_MATCHES};
