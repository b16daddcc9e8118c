//! Dataset assembly and classifier training for a scope

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::data::Database;
use crate::features::extract_features;
use crate::model::{Hyperparameters, RandomForest, ResolvedConfig};
use crate::{Config, FootyError, Outcome, Result, Scope};

/// Hard minimum of labelled matches before a scope is trainable.
pub const MIN_TRAINING_MATCHES: usize = 20;

const SPLIT_SEED: u64 = 42;

/// Result of one training run
#[derive(Debug)]
pub struct TrainOutput {
    pub model: RandomForest,
    /// Held-out accuracy on the 20% split
    pub accuracy: f64,
    /// Mean k-fold cross-validation accuracy, reporting only
    pub cv_score: f64,
    /// Rows that survived feature extraction
    pub samples: usize,
}

/// Trains a forest on the labelled history of one scope
pub struct Trainer<'a> {
    db: &'a Database,
    scope: Scope,
    config: &'a Config,
}

impl<'a> Trainer<'a> {
    pub fn new(db: &'a Database, scope: Scope, config: &'a Config) -> Self {
        Trainer { db, scope, config }
    }

    /// Assemble the dataset, fit and evaluate
    pub fn train(&self, resolved: &ResolvedConfig) -> Result<TrainOutput> {
        let matches = self.db.labelled_matches(self.scope)?;
        if matches.len() < MIN_TRAINING_MATCHES {
            return Err(FootyError::InsufficientData {
                scope: self.scope,
                found: matches.len(),
                required: MIN_TRAINING_MATCHES,
            });
        }
        log::info!(
            "training scope {}: {} labelled matches",
            self.scope.tag(),
            matches.len()
        );

        // Cutoff is each match's own kickoff so training rows only see
        // history available before that match was played.
        let mut rows: Vec<Vec<f64>> = Vec::with_capacity(matches.len());
        let mut labels: Vec<usize> = Vec::with_capacity(matches.len());
        for m in &matches {
            let result = match m.result {
                Some(r) => r,
                None => continue,
            };
            match extract_features(self.db, m, self.scope, &self.config.features, None) {
                Ok(vector) => {
                    rows.push(vector.weighted(&resolved.weights).to_vec());
                    labels.push(result.class_index());
                }
                Err(e) => {
                    log::warn!("skipping match {}: {}", m.id, e);
                }
            }
        }
        if rows.is_empty() {
            return Err(FootyError::NoTrainableData { scope: self.scope });
        }

        let (train_idx, test_idx) = stratified_split(&labels, SPLIT_SEED);
        let train_rows: Vec<Vec<f64>> = train_idx.iter().map(|&i| rows[i].clone()).collect();
        let train_labels: Vec<usize> = train_idx.iter().map(|&i| labels[i]).collect();
        let weights = sample_weights(&train_labels, Outcome::ALL.len());

        let model = RandomForest::fit(
            &train_rows,
            &train_labels,
            &weights,
            Outcome::ALL.len(),
            &resolved.hyperparams,
            SPLIT_SEED,
        );

        let accuracy = if test_idx.is_empty() {
            model.accuracy(&train_rows, &train_labels)
        } else {
            let test_rows: Vec<Vec<f64>> = test_idx.iter().map(|&i| rows[i].clone()).collect();
            let test_labels: Vec<usize> = test_idx.iter().map(|&i| labels[i]).collect();
            model.accuracy(&test_rows, &test_labels)
        };
        let cv_score = cross_validate(&rows, &labels, &resolved.hyperparams, accuracy);

        log::info!(
            "scope {}: accuracy {:.3}, cv {:.3}, {} samples",
            self.scope.tag(),
            accuracy,
            cv_score,
            rows.len()
        );

        Ok(TrainOutput {
            model,
            accuracy,
            cv_score,
            samples: rows.len(),
        })
    }
}

/// Per-class 80/20 split, deterministic for a given seed
fn stratified_split(labels: &[usize], seed: u64) -> (Vec<usize>, Vec<usize>) {
    let n_classes = labels.iter().copied().max().map_or(0, |m| m + 1);
    let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
    for (i, &label) in labels.iter().enumerate() {
        by_class[label].push(i);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();
    for mut group in by_class {
        if group.is_empty() {
            continue;
        }
        group.shuffle(&mut rng);
        let take = (group.len() * 4 / 5).max(1);
        train.extend_from_slice(&group[..take]);
        test.extend_from_slice(&group[take..]);
    }
    (train, test)
}

/// Inverse-frequency weights so minority classes are not starved
fn sample_weights(labels: &[usize], n_classes: usize) -> Vec<f64> {
    let mut counts = vec![0usize; n_classes];
    for &label in labels {
        counts[label] += 1;
    }
    let present = counts.iter().filter(|&&c| c > 0).count().max(1);
    let total = labels.len() as f64;
    labels
        .iter()
        .map(|&label| total / (present as f64 * counts[label] as f64))
        .collect()
}

/// Mean accuracy over k seeded folds, k = min(5, n)
fn cross_validate(
    rows: &[Vec<f64>],
    labels: &[usize],
    hyperparams: &Hyperparameters,
    fallback: f64,
) -> f64 {
    let n = rows.len();
    let k = n.min(5);
    if k < 2 {
        return fallback;
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(SPLIT_SEED);
    indices.shuffle(&mut rng);

    let mut scores = Vec::with_capacity(k);
    for fold in 0..k {
        let held: Vec<usize> = indices.iter().copied().skip(fold).step_by(k).collect();
        let kept: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|i| !held.contains(i))
            .collect();
        if held.is_empty() || kept.is_empty() {
            continue;
        }

        let fold_rows: Vec<Vec<f64>> = kept.iter().map(|&i| rows[i].clone()).collect();
        let fold_labels: Vec<usize> = kept.iter().map(|&i| labels[i]).collect();
        let weights = sample_weights(&fold_labels, Outcome::ALL.len());
        let model = RandomForest::fit(
            &fold_rows,
            &fold_labels,
            &weights,
            Outcome::ALL.len(),
            hyperparams,
            SPLIT_SEED + fold as u64,
        );

        let held_rows: Vec<Vec<f64>> = held.iter().map(|&i| rows[i].clone()).collect();
        let held_labels: Vec<usize> = held.iter().map(|&i| labels[i]).collect();
        scores.push(model.accuracy(&held_rows, &held_labels));
    }

    if scores.is_empty() {
        fallback
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::config;
    use crate::{HistoricalMatch, LeagueId, TeamId};
    use chrono::{Duration, NaiveDate};

    fn kickoff(day_offset: i64) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 8, 1)
            .unwrap()
            .and_hms_opt(15, 0, 0)
            .unwrap()
            + Duration::days(day_offset)
    }

    fn seed_league(db: &Database, league: i64, count: usize, id_base: i64) -> Vec<TeamId> {
        let teams: Vec<TeamId> = (0..4)
            .map(|i| {
                db.get_or_create_team(&format!("L{} Team {}", league, i), "England", None)
                    .unwrap()
                    .id
            })
            .collect();
        for i in 0..count {
            let home = teams[i % 4];
            let away = teams[(i + 1) % 4];
            // Mix of wins, draws and losses
            let (hs, aw) = match i % 5 {
                0 | 3 => (2, 0),
                1 => (1, 1),
                2 => (0, 2),
                _ => (3, 1),
            };
            db.upsert_match(&HistoricalMatch {
                id: id_base + i as i64,
                home_team: home,
                away_team: away,
                kickoff: kickoff(i as i64),
                league: Some(LeagueId(league)),
                competition: None,
                country: None,
                season: Some("2024-2025".to_string()),
                home_score: Some(hs),
                away_score: Some(aw),
                result: Some(Outcome::from_scores(hs, aw)),
            })
            .unwrap();
        }
        teams
    }

    fn resolved(db: &Database, scope: Scope) -> ResolvedConfig {
        config::resolve(db, scope).unwrap()
    }

    #[test]
    fn test_nineteen_matches_is_insufficient() {
        let db = Database::in_memory().unwrap();
        seed_league(&db, 1, 19, 1000);
        let cfg = Config::default();
        let scope = Scope::League(LeagueId(1));
        let trainer = Trainer::new(&db, scope, &cfg);
        let err = trainer.train(&resolved(&db, scope)).unwrap_err();
        assert!(matches!(
            err,
            FootyError::InsufficientData {
                found: 19,
                required: 20,
                ..
            }
        ));
    }

    #[test]
    fn test_twenty_matches_trains() {
        let db = Database::in_memory().unwrap();
        seed_league(&db, 1, 20, 1000);
        let cfg = Config::default();
        let scope = Scope::League(LeagueId(1));
        let trainer = Trainer::new(&db, scope, &cfg);
        let output = trainer.train(&resolved(&db, scope)).unwrap();
        assert_eq!(output.samples, 20);
        assert!(output.accuracy >= 0.0 && output.accuracy <= 1.0);
        assert!(output.cv_score >= 0.0 && output.cv_score <= 1.0);
    }

    #[test]
    fn test_scope_isolation() {
        let db = Database::in_memory().unwrap();
        seed_league(&db, 1, 25, 1000);
        let cfg = Config::default();
        let scope = Scope::League(LeagueId(1));

        let before = Trainer::new(&db, scope, &cfg)
            .train(&resolved(&db, scope))
            .unwrap();

        // An extreme out-of-scope match must not move L1's metrics
        let other = seed_league(&db, 2, 1, 5000);
        db.upsert_match(&HistoricalMatch {
            id: 9999,
            home_team: other[0],
            away_team: other[1],
            kickoff: kickoff(2),
            league: Some(LeagueId(2)),
            competition: None,
            country: None,
            season: Some("2024-2025".to_string()),
            home_score: Some(12),
            away_score: Some(0),
            result: Some(Outcome::Win),
        })
        .unwrap();

        let after = Trainer::new(&db, scope, &cfg)
            .train(&resolved(&db, scope))
            .unwrap();
        assert_eq!(before.accuracy, after.accuracy);
        assert_eq!(before.cv_score, after.cv_score);
        assert_eq!(before.samples, after.samples);
    }

    #[test]
    fn test_training_is_deterministic() {
        let db = Database::in_memory().unwrap();
        seed_league(&db, 1, 30, 1000);
        let cfg = Config::default();
        let scope = Scope::League(LeagueId(1));

        let a = Trainer::new(&db, scope, &cfg)
            .train(&resolved(&db, scope))
            .unwrap();
        let b = Trainer::new(&db, scope, &cfg)
            .train(&resolved(&db, scope))
            .unwrap();
        assert_eq!(a.accuracy, b.accuracy);
        assert_eq!(a.cv_score, b.cv_score);
    }

    #[test]
    fn test_sample_weights_balance_classes() {
        // 6 wins, 2 draws: draw samples weigh three times a win sample
        let labels = vec![0, 0, 0, 0, 0, 0, 1, 1];
        let weights = sample_weights(&labels, 3);
        assert!((weights[6] / weights[0] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_stratified_split_is_deterministic() {
        let labels: Vec<usize> = (0..30).map(|i| i % 3).collect();
        let (train_a, test_a) = stratified_split(&labels, SPLIT_SEED);
        let (train_b, test_b) = stratified_split(&labels, SPLIT_SEED);
        assert_eq!(train_a, train_b);
        assert_eq!(test_a, test_b);
        assert_eq!(train_a.len(), 24);
        assert_eq!(test_a.len(), 6);
    }
}
