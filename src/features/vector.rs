//! The fixed 15-feature match vector
//!
//! Combines the two sides' statistics into one named vector for a fixture
//! or historical match. Per-statistic store failures resolve to the
//! documented league-average defaults here, visibly, so sparse data
//! degrades instead of aborting a run.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::data::{HistoryQuery, RosterQuery};
use crate::features::engine::{
    FeatureEngine, Venue, VenueRecord, DEFAULT_FORM, DEFAULT_GOAL_AVG, DEFAULT_INJURY_RATE,
    DEFAULT_STRENGTH,
};
use crate::{FeatureConfig, FootyError, HistoricalMatch, Result, Scope, TeamId, UpcomingFixture};

/// Anything with two teams and a kickoff time
///
/// Implemented by historical matches and upcoming fixtures so the same
/// extraction path serves training and inference.
pub trait MatchLike {
    fn home_team(&self) -> Option<TeamId>;
    fn away_team(&self) -> Option<TeamId>;
    fn kickoff(&self) -> NaiveDateTime;
    fn season(&self) -> Option<&str>;
}

impl MatchLike for HistoricalMatch {
    fn home_team(&self) -> Option<TeamId> {
        Some(self.home_team)
    }
    fn away_team(&self) -> Option<TeamId> {
        Some(self.away_team)
    }
    fn kickoff(&self) -> NaiveDateTime {
        self.kickoff
    }
    fn season(&self) -> Option<&str> {
        self.season.as_deref()
    }
}

impl MatchLike for UpcomingFixture {
    fn home_team(&self) -> Option<TeamId> {
        Some(self.home_team)
    }
    fn away_team(&self) -> Option<TeamId> {
        Some(self.away_team)
    }
    fn kickoff(&self) -> NaiveDateTime {
        self.kickoff
    }
    fn season(&self) -> Option<&str> {
        self.season.as_deref()
    }
}

/// The match feature vector, in fixed column order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub home_form: f64,
    pub away_form: f64,
    pub home_strength: f64,
    pub away_strength: f64,
    pub home_injuries: f64,
    pub away_injuries: f64,
    pub home_goal_avg: f64,
    pub away_goal_avg: f64,
    pub form_diff: f64,
    pub strength_diff: f64,
    pub home_win_rate: f64,
    pub home_draw_rate: f64,
    pub away_win_rate: f64,
    pub away_draw_rate: f64,
    pub home_advantage: f64,
}

impl FeatureVector {
    pub const DIM: usize = 15;

    pub const NAMES: [&'static str; Self::DIM] = [
        "home_form",
        "away_form",
        "home_strength",
        "away_strength",
        "home_injuries",
        "away_injuries",
        "home_goal_avg",
        "away_goal_avg",
        "form_diff",
        "strength_diff",
        "home_win_rate",
        "home_draw_rate",
        "away_win_rate",
        "away_draw_rate",
        "home_advantage",
    ];

    pub fn to_array(&self) -> [f64; Self::DIM] {
        [
            self.home_form,
            self.away_form,
            self.home_strength,
            self.away_strength,
            self.home_injuries,
            self.away_injuries,
            self.home_goal_avg,
            self.away_goal_avg,
            self.form_diff,
            self.strength_diff,
            self.home_win_rate,
            self.home_draw_rate,
            self.away_win_rate,
            self.away_draw_rate,
            self.home_advantage,
        ]
    }

    /// Training/inference row with per-feature weight multipliers applied
    pub fn weighted(&self, weights: &FeatureWeights) -> [f64; Self::DIM] {
        let mut row = self.to_array();
        let w = weights.to_array();
        for (value, weight) in row.iter_mut().zip(w.iter()) {
            *value *= weight;
        }
        row
    }
}

/// Per-feature weight multipliers, 1.0 = neutral
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureWeights {
    pub home_form: f64,
    pub away_form: f64,
    pub home_strength: f64,
    pub away_strength: f64,
    pub home_injuries: f64,
    pub away_injuries: f64,
    pub home_goal_avg: f64,
    pub away_goal_avg: f64,
    pub form_diff: f64,
    pub strength_diff: f64,
    pub home_win_rate: f64,
    pub home_draw_rate: f64,
    pub away_win_rate: f64,
    pub away_draw_rate: f64,
    pub home_advantage: f64,
}

impl Default for FeatureWeights {
    fn default() -> Self {
        FeatureWeights {
            home_form: 1.0,
            away_form: 1.0,
            home_strength: 1.0,
            away_strength: 1.0,
            home_injuries: 1.0,
            away_injuries: 1.0,
            home_goal_avg: 1.0,
            away_goal_avg: 1.0,
            form_diff: 1.0,
            strength_diff: 1.0,
            home_win_rate: 1.0,
            home_draw_rate: 1.0,
            away_win_rate: 1.0,
            away_draw_rate: 1.0,
            home_advantage: 1.0,
        }
    }
}

impl FeatureWeights {
    pub fn to_array(&self) -> [f64; FeatureVector::DIM] {
        [
            self.home_form,
            self.away_form,
            self.home_strength,
            self.away_strength,
            self.home_injuries,
            self.away_injuries,
            self.home_goal_avg,
            self.away_goal_avg,
            self.form_diff,
            self.strength_diff,
            self.home_win_rate,
            self.home_draw_rate,
            self.away_win_rate,
            self.away_draw_rate,
            self.home_advantage,
        ]
    }
}

/// Replace a failed statistic with its documented default
fn stat_or_default(stat: Result<f64>, default: f64, name: &str, team: TeamId) -> f64 {
    match stat {
        Ok(value) => value,
        Err(e) => {
            log::debug!("{} for {} defaulted to {}: {}", name, team, default, e);
            default
        }
    }
}

fn record_or_default(stat: Result<VenueRecord>, name: &str, team: TeamId) -> VenueRecord {
    match stat {
        Ok(value) => value,
        Err(e) => {
            log::debug!("{} for {} defaulted: {}", name, team, e);
            VenueRecord::default()
        }
    }
}

/// Build the feature vector for one match-like entity
///
/// The cutoff defaults to the entity's own kickoff, so historical samples
/// only ever see matches played before them. Identical inputs produce a
/// bit-for-bit identical vector.
pub fn extract_features<S>(
    store: &S,
    entity: &dyn MatchLike,
    scope: Scope,
    config: &FeatureConfig,
    cutoff: Option<NaiveDateTime>,
) -> Result<FeatureVector>
where
    S: HistoryQuery + RosterQuery + ?Sized,
{
    let home = entity.home_team().ok_or(FootyError::MissingTeams)?;
    let away = entity.away_team().ok_or(FootyError::MissingTeams)?;
    let cutoff = Some(cutoff.unwrap_or_else(|| entity.kickoff()));
    let season = entity.season();

    let engine = FeatureEngine::new(store, scope, config);

    let home_form = stat_or_default(engine.form(home, cutoff), DEFAULT_FORM, "form", home);
    let away_form = stat_or_default(engine.form(away, cutoff), DEFAULT_FORM, "form", away);
    let home_strength =
        stat_or_default(engine.strength(home, cutoff), DEFAULT_STRENGTH, "strength", home);
    let away_strength =
        stat_or_default(engine.strength(away, cutoff), DEFAULT_STRENGTH, "strength", away);
    let home_injuries = stat_or_default(
        engine.injury_rate(home, season, cutoff),
        DEFAULT_INJURY_RATE,
        "injury_rate",
        home,
    );
    let away_injuries = stat_or_default(
        engine.injury_rate(away, season, cutoff),
        DEFAULT_INJURY_RATE,
        "injury_rate",
        away,
    );
    let home_goal_avg = stat_or_default(
        engine.goal_average(home, Some(Venue::Home), cutoff),
        DEFAULT_GOAL_AVG,
        "goal_average",
        home,
    );
    let away_goal_avg = stat_or_default(
        engine.goal_average(away, Some(Venue::Away), cutoff),
        DEFAULT_GOAL_AVG,
        "goal_average",
        away,
    );
    let home_record = record_or_default(engine.venue_record(home, true, cutoff), "venue_record", home);
    let away_record = record_or_default(engine.venue_record(away, false, cutoff), "venue_record", away);

    Ok(FeatureVector {
        home_form,
        away_form,
        home_strength,
        away_strength,
        home_injuries,
        away_injuries,
        home_goal_avg,
        away_goal_avg,
        form_diff: home_form - away_form,
        strength_diff: home_strength - away_strength,
        home_win_rate: home_record.win_rate,
        home_draw_rate: home_record.draw_rate,
        away_win_rate: away_record.win_rate,
        away_draw_rate: away_record.draw_rate,
        home_advantage: home_record.win_rate - away_record.win_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Database;
    use crate::{Config, FixtureStatus, Outcome, Player};
    use chrono::NaiveDate;

    fn kickoff(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 4, day)
            .unwrap()
            .and_hms_opt(15, 0, 0)
            .unwrap()
    }

    struct Teamless;

    impl MatchLike for Teamless {
        fn home_team(&self) -> Option<TeamId> {
            None
        }
        fn away_team(&self) -> Option<TeamId> {
            Some(TeamId(2))
        }
        fn kickoff(&self) -> NaiveDateTime {
            kickoff(1)
        }
        fn season(&self) -> Option<&str> {
            None
        }
    }

    fn fixture(home: TeamId, away: TeamId, day: u32) -> UpcomingFixture {
        UpcomingFixture {
            id: 1,
            home_team: home,
            away_team: away,
            kickoff: kickoff(day),
            league: None,
            competition: None,
            country: None,
            season: None,
            status: FixtureStatus::NotStarted,
        }
    }

    #[test]
    fn test_missing_teams_is_an_error() {
        let db = Database::in_memory().unwrap();
        let config = Config::default();
        let err = extract_features(&db, &Teamless, Scope::Global, &config.features, None)
            .unwrap_err();
        assert!(matches!(err, FootyError::MissingTeams));
    }

    #[test]
    fn test_vector_uses_defaults_without_history() {
        let db = Database::in_memory().unwrap();
        let a = db.get_or_create_team("Alpha", "England", None).unwrap().id;
        let b = db.get_or_create_team("Beta", "England", None).unwrap().id;
        let config = Config::default();

        let v = extract_features(&db, &fixture(a, b, 1), Scope::Global, &config.features, None)
            .unwrap();
        assert_eq!(v.home_form, 0.0);
        assert_eq!(v.home_strength, 0.0);
        assert_eq!(v.home_goal_avg, 1.5);
        assert_eq!(v.home_injuries, 0.1);
        assert_eq!(v.home_win_rate, 0.0);
        assert_eq!(v.form_diff, 0.0);
        assert!(v.to_array().iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_diffs_are_arithmetic_differences() {
        let db = Database::in_memory().unwrap();
        let a = db.get_or_create_team("Alpha", "England", None).unwrap().id;
        let b = db.get_or_create_team("Beta", "England", None).unwrap().id;
        let config = Config::default();

        // Alpha keeps beating Beta at home
        for (id, day) in [(1i64, 1u32), (2, 2), (3, 3)] {
            db.upsert_match(&crate::HistoricalMatch {
                id,
                home_team: a,
                away_team: b,
                kickoff: kickoff(day),
                league: None,
                competition: None,
                country: None,
                season: None,
                home_score: Some(2),
                away_score: Some(0),
                result: Some(Outcome::Win),
            })
            .unwrap();
        }

        let v = extract_features(&db, &fixture(a, b, 10), Scope::Global, &config.features, None)
            .unwrap();
        assert!((v.form_diff - (v.home_form - v.away_form)).abs() < 1e-12);
        assert!((v.strength_diff - (v.home_strength - v.away_strength)).abs() < 1e-12);
        assert!((v.home_advantage - (v.home_win_rate - v.away_win_rate)).abs() < 1e-12);
        assert!(v.form_diff > 0.0);
    }

    #[test]
    fn test_determinism() {
        let db = Database::in_memory().unwrap();
        let a = db.get_or_create_team("Alpha", "England", None).unwrap().id;
        let b = db.get_or_create_team("Beta", "England", None).unwrap().id;
        db.upsert_player(&Player {
            name: "One".to_string(),
            team: a,
            season: "2024-2025".to_string(),
            injured: Some(false),
        })
        .unwrap();
        let config = Config::default();
        let fx = fixture(a, b, 5);

        let v1 = extract_features(&db, &fx, Scope::Global, &config.features, None).unwrap();
        let v2 = extract_features(&db, &fx, Scope::Global, &config.features, None).unwrap();
        assert_eq!(v1, v2);
    }

    #[test]
    fn test_weighted_row() {
        let v = FeatureVector {
            home_form: 0.5,
            away_form: 0.25,
            home_strength: 1.0,
            away_strength: -1.0,
            home_injuries: 0.1,
            away_injuries: 0.1,
            home_goal_avg: 1.5,
            away_goal_avg: 1.5,
            form_diff: 0.25,
            strength_diff: 2.0,
            home_win_rate: 0.6,
            home_draw_rate: 0.2,
            away_win_rate: 0.3,
            away_draw_rate: 0.3,
            home_advantage: 0.3,
        };
        let mut weights = FeatureWeights::default();
        weights.home_form = 2.0;
        let row = v.weighted(&weights);
        assert_eq!(row[0], 1.0);
        assert_eq!(row[1], 0.25);
        assert_eq!(row.len(), FeatureVector::DIM);
    }
}
