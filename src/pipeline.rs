//! The train-then-predict entry point
//!
//! Callers go through [`train_and_predict`]; it always returns a structured
//! report, never an unhandled error.

use std::path::{Path, PathBuf};

use crate::data::Database;
use crate::model::{config, RandomForest, ResolvedConfig};
use crate::predict::Predictor;
use crate::training::Trainer;
use crate::{Config, Result, Scope};

/// Outcome of one scoped pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Fail,
}

/// Structured result of a pipeline run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub scope: Scope,
    pub status: RunStatus,
    pub accuracy: Option<f64>,
    pub cv_score: Option<f64>,
    pub matches_predicted: Option<usize>,
    pub reason: Option<String>,
}

impl RunReport {
    fn fail(scope: Scope, reason: String) -> Self {
        RunReport {
            scope,
            status: RunStatus::Fail,
            accuracy: None,
            cv_score: None,
            matches_predicted: None,
            reason: Some(reason),
        }
    }
}

/// Train a model for the scope and predict its upcoming fixtures.
///
/// Scope-wide failures (insufficient data, nothing trainable) come back as a
/// `Fail` report with a reason string.
pub fn train_and_predict(db: &Database, scope: Scope, config: &Config) -> RunReport {
    run(db, scope, config, true)
}

/// Like [`train_and_predict`] but reuses a cached model when one exists.
///
/// A cached run skips training, so accuracy and cv score are absent from
/// the report.
pub fn predict_with_cache(db: &Database, scope: Scope, config: &Config) -> RunReport {
    run(db, scope, config, false)
}

fn run(db: &Database, scope: Scope, config: &Config, retrain: bool) -> RunReport {
    let resolved = match config::resolve(db, scope) {
        Ok(resolved) => resolved,
        Err(e) => return RunReport::fail(scope, e.to_string()),
    };

    let cache = model_cache_path(config, scope);
    let (model, accuracy, cv_score) = if !retrain && cache.exists() {
        match RandomForest::load(&cache) {
            Ok(model) => {
                log::info!("using cached model {}", cache.display());
                (model, None, None)
            }
            Err(e) => {
                log::warn!("cached model unreadable ({}), retraining", e);
                match train(db, scope, config, &resolved, &cache) {
                    Ok((model, accuracy, cv)) => (model, Some(accuracy), Some(cv)),
                    Err(e) => return RunReport::fail(scope, e.to_string()),
                }
            }
        }
    } else {
        match train(db, scope, config, &resolved, &cache) {
            Ok((model, accuracy, cv)) => (model, Some(accuracy), Some(cv)),
            Err(e) => return RunReport::fail(scope, e.to_string()),
        }
    };

    let predictor = Predictor::new(db, scope, config, &model, &resolved);
    match predictor.predict_all() {
        Ok(stored) => RunReport {
            scope,
            status: RunStatus::Success,
            accuracy,
            cv_score,
            matches_predicted: Some(stored),
            reason: None,
        },
        Err(e) => RunReport::fail(scope, e.to_string()),
    }
}

fn train(
    db: &Database,
    scope: Scope,
    config: &Config,
    resolved: &ResolvedConfig,
    cache: &Path,
) -> Result<(RandomForest, f64, f64)> {
    let output = Trainer::new(db, scope, config).train(resolved)?;
    if let Err(e) = output.model.save(cache) {
        log::warn!("could not cache model at {}: {}", cache.display(), e);
    }
    Ok((output.model, output.accuracy, output.cv_score))
}

fn model_cache_path(config: &Config, scope: Scope) -> PathBuf {
    Path::new(&config.data.model_path).join(format!("{}.json", scope.tag()))
}
