//! Scores upcoming fixtures and stores calibrated predictions

use crate::data::{Database, PredictionStore};
use crate::features::extract_features;
use crate::model::{RandomForest, ResolvedConfig};
use crate::{Config, Outcome, Prediction, Result, Scope, UpcomingFixture};

const SMOOTHING: f64 = 0.01;
const DRAW_BOOST: f64 = 0.03;
const DRAW_CAP: f64 = 0.95;

/// Scores not-yet-started fixtures within one scope
pub struct Predictor<'a> {
    db: &'a Database,
    scope: Scope,
    config: &'a Config,
    model: &'a RandomForest,
    resolved: &'a ResolvedConfig,
    model_version: String,
}

impl<'a> Predictor<'a> {
    pub fn new(
        db: &'a Database,
        scope: Scope,
        config: &'a Config,
        model: &'a RandomForest,
        resolved: &'a ResolvedConfig,
    ) -> Self {
        Predictor {
            db,
            scope,
            config,
            model,
            resolved,
            model_version: format!("v3-{}", scope.tag()),
        }
    }

    /// Predict all upcoming fixtures in scope, returning how many were stored.
    ///
    /// Per-fixture failures are logged and skipped, never fatal to the batch.
    pub fn predict_all(&self) -> Result<usize> {
        let fixtures = self.db.upcoming_fixtures(self.scope)?;
        log::info!(
            "predicting {} fixtures in scope {}",
            fixtures.len(),
            self.scope.tag()
        );

        let mut stored = 0;
        for fixture in &fixtures {
            match self.predict_fixture(fixture) {
                Ok(prediction) => {
                    if let Err(e) = self.db.upsert_prediction(&prediction) {
                        log::warn!("failed to store prediction for fixture {}: {}", fixture.id, e);
                    } else {
                        stored += 1;
                    }
                }
                Err(e) => {
                    log::warn!("skipping fixture {}: {}", fixture.id, e);
                }
            }
        }
        Ok(stored)
    }

    fn predict_fixture(&self, fixture: &UpcomingFixture) -> Result<Prediction> {
        // Cutoff is the fixture's own kickoff, matching the training-time
        // convention exactly.
        let vector = extract_features(self.db, fixture, self.scope, &self.config.features, None)?;
        let row = vector.weighted(&self.resolved.weights);

        let raw = self.model.predict_proba(&row);
        // Predicted label comes from the raw model output; the calibrated
        // probabilities only drive confidence and odds.
        let result = argmax_outcome(&raw);

        let mut probs = smooth(&raw);
        boost_draw(&mut probs);
        let confidence = probs.iter().cloned().fold(0.0, f64::max);

        Ok(Prediction {
            fixture_id: fixture.id,
            result,
            confidence,
            // Strength difference from the unweighted vector, so the stored
            // estimate keeps its goals-per-match meaning.
            goal_diff: vector.home_strength - vector.away_strength,
            fair_odds_home: fair_odds(probs[Outcome::Win.class_index()]),
            fair_odds_draw: fair_odds(probs[Outcome::Draw.class_index()]),
            fair_odds_away: fair_odds(probs[Outcome::Loss.class_index()]),
            model_version: self.model_version.clone(),
        })
    }
}

fn argmax_outcome(probs: &[f64]) -> Outcome {
    let mut best = 0;
    for (i, &p) in probs.iter().enumerate() {
        if p > probs[best] {
            best = i;
        }
    }
    Outcome::from_class_index(best).unwrap_or(Outcome::Draw)
}

/// Add a small constant to every class and renormalize.
///
/// Keeps every probability strictly positive so fair odds stay finite.
fn smooth(probs: &[f64]) -> Vec<f64> {
    let bumped: Vec<f64> = probs.iter().map(|p| p + SMOOTHING).collect();
    let total: f64 = bumped.iter().sum();
    bumped.iter().map(|p| p / total).collect()
}

/// Nudge the draw probability up, capped, then renormalize.
///
/// Tree ensembles systematically underestimate draws in this domain.
fn boost_draw(probs: &mut [f64]) {
    let draw = Outcome::Draw.class_index();
    probs[draw] = (probs[draw] + DRAW_BOOST).min(DRAW_CAP);
    let total: f64 = probs.iter().sum();
    for p in probs.iter_mut() {
        *p /= total;
    }
}

/// Fair odds = 1 / probability, rounded to 2 decimal places
fn fair_odds(probability: f64) -> f64 {
    (100.0 / probability).round() / 100.0
}
