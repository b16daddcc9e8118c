//! Feature extraction
//!
//! Point-in-time team statistics and the fixed 15-feature match vector.

pub mod engine;
pub mod vector;

pub use engine::{FeatureEngine, Venue, VenueRecord};
pub use vector::{extract_features, FeatureVector, FeatureWeights, MatchLike};
