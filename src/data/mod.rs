//! Storage access
//!
//! Narrow read/write traits consumed by the pipeline, and the SQLite
//! implementation backing them.

pub mod database;

pub use database::Database;

use chrono::NaiveDateTime;

use crate::model::config::ScopeConfig;
use crate::{HistoricalMatch, Player, Prediction, Result, Scope, TeamId};

/// Read-only access to a team's match history
///
/// Results are ordered most recent first. `before` is a strict cutoff:
/// only matches with `kickoff < before` are returned, which is what keeps
/// historical feature extraction free of future information.
pub trait HistoryQuery {
    fn matches_for(
        &self,
        team: TeamId,
        before: Option<NaiveDateTime>,
        scope: Scope,
        limit: Option<usize>,
    ) -> Result<Vec<HistoricalMatch>>;
}

/// Read-only access to team rosters
pub trait RosterQuery {
    fn players_for(&self, team: TeamId, season: &str) -> Result<Vec<Player>>;
}

/// Lookup of the active per-scope model configuration
pub trait ScopeConfigStore {
    fn active_config_for(&self, scope: Scope) -> Result<Option<ScopeConfig>>;
}

/// Write path for predictions
///
/// Upserts are keyed by fixture id and must run inside a transaction so
/// "at most one prediction per fixture" holds even under concurrent
/// retrains of overlapping scopes.
pub trait PredictionStore {
    fn upsert_prediction(&self, prediction: &Prediction) -> Result<()>;
}
