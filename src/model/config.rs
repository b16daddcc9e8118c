//! Per-scope model configuration
//!
//! Hyperparameters and feature weights can be overridden per scope; the
//! resolver walks the candidate scopes in fixed priority order and falls
//! through to hard-coded defaults when nothing is active.

use serde::{Deserialize, Serialize};

use crate::data::ScopeConfigStore;
use crate::features::FeatureWeights;
use crate::{Result, Scope};

/// Forest hyperparameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hyperparameters {
    /// Number of trees in the ensemble
    pub trees: usize,
    /// None = unbounded depth
    pub max_depth: Option<usize>,
    /// Minimum samples required to split a node
    pub min_split: usize,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Hyperparameters {
            trees: 100,
            max_depth: Some(10),
            min_split: 5,
        }
    }
}

/// Stored configuration for one scope
///
/// At most one active row per scope; the scope is never `Global`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeConfig {
    pub scope: Scope,
    pub model_type: String,
    pub hyperparams: Hyperparameters,
    pub weights: FeatureWeights,
    pub active: bool,
}

/// Configuration actually used by a training/prediction run
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub hyperparams: Hyperparameters,
    pub weights: FeatureWeights,
    /// The scope whose config was used, None when defaults applied
    pub source: Option<Scope>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        ResolvedConfig {
            hyperparams: Hyperparameters::default(),
            weights: FeatureWeights::default(),
            source: None,
        }
    }
}

/// Candidate scopes in strict priority order: league > competition > country
///
/// Only the dimension the caller supplied is consulted; Global consults
/// none. No merging happens across scopes.
fn candidates(scope: Scope) -> Vec<Scope> {
    match scope {
        Scope::League(_) | Scope::Competition(_) | Scope::Country(_) => vec![scope],
        Scope::Global => vec![],
    }
}

/// Resolve the active configuration for a scope, defaults when none
pub fn resolve(store: &dyn ScopeConfigStore, scope: Scope) -> Result<ResolvedConfig> {
    for candidate in candidates(scope) {
        if let Some(config) = store.active_config_for(candidate)? {
            log::debug!("Using scope config for {}", candidate);
            return Ok(ResolvedConfig {
                hyperparams: config.hyperparams,
                weights: config.weights,
                source: Some(candidate),
            });
        }
    }
    log::debug!("No active scope config for {}, using defaults", scope);
    Ok(ResolvedConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Database;
    use crate::LeagueId;

    #[test]
    fn test_defaults_when_no_config() {
        let db = Database::in_memory().unwrap();
        let resolved = resolve(&db, Scope::League(LeagueId(1))).unwrap();
        assert_eq!(resolved.hyperparams, Hyperparameters::default());
        assert_eq!(resolved.weights, FeatureWeights::default());
        assert!(resolved.source.is_none());
    }

    #[test]
    fn test_active_config_wins() {
        let db = Database::in_memory().unwrap();
        let scope = Scope::League(LeagueId(5));
        let mut weights = FeatureWeights::default();
        weights.home_advantage = 2.0;
        db.insert_scope_config(&ScopeConfig {
            scope,
            model_type: "random_forest".to_string(),
            hyperparams: Hyperparameters {
                trees: 50,
                max_depth: None,
                min_split: 2,
            },
            weights: weights.clone(),
            active: true,
        })
        .unwrap();

        let resolved = resolve(&db, scope).unwrap();
        assert_eq!(resolved.hyperparams.trees, 50);
        assert_eq!(resolved.hyperparams.max_depth, None);
        assert_eq!(resolved.weights, weights);
        assert_eq!(resolved.source, Some(scope));
    }

    #[test]
    fn test_inactive_config_is_ignored() {
        let db = Database::in_memory().unwrap();
        let scope = Scope::League(LeagueId(5));
        db.insert_scope_config(&ScopeConfig {
            scope,
            model_type: "random_forest".to_string(),
            hyperparams: Hyperparameters {
                trees: 50,
                max_depth: None,
                min_split: 2,
            },
            weights: FeatureWeights::default(),
            active: false,
        })
        .unwrap();

        let resolved = resolve(&db, scope).unwrap();
        assert_eq!(resolved.hyperparams, Hyperparameters::default());
    }

    #[test]
    fn test_global_always_defaults() {
        let db = Database::in_memory().unwrap();
        let resolved = resolve(&db, Scope::Global).unwrap();
        assert!(resolved.source.is_none());
    }

    #[test]
    fn test_only_requested_dimension_is_consulted() {
        let db = Database::in_memory().unwrap();
        // A country config must not leak into a league-scoped run
        db.insert_scope_config(&ScopeConfig {
            scope: Scope::Country(crate::CountryId(3)),
            model_type: "random_forest".to_string(),
            hyperparams: Hyperparameters {
                trees: 17,
                max_depth: Some(3),
                min_split: 2,
            },
            weights: FeatureWeights::default(),
            active: true,
        })
        .unwrap();

        let resolved = resolve(&db, Scope::League(LeagueId(1))).unwrap();
        assert_eq!(resolved.hyperparams, Hyperparameters::default());
    }
}
