//! Point-in-time team statistics
//!
//! All five statistics query match history strictly before a cutoff, so a
//! value computed "as of" a match date reflects only information that was
//! available before that match was played. Store failures propagate as
//! errors; the vector builder substitutes the documented defaults.

use chrono::NaiveDateTime;

use crate::data::{HistoryQuery, RosterQuery};
use crate::{FeatureConfig, HistoricalMatch, Outcome, Result, Scope, TeamId};

/// Neutral strength when a team has no usable history
pub const DEFAULT_STRENGTH: f64 = 0.0;
/// Neutral form when a team has no usable history
pub const DEFAULT_FORM: f64 = 0.0;
/// League-average goals per match, used when no score data exists
pub const DEFAULT_GOAL_AVG: f64 = 1.5;
/// League-average injury prior, used when no roster data exists
pub const DEFAULT_INJURY_RATE: f64 = 0.1;

/// Venue filter for goal averages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Venue {
    Home,
    Away,
}

/// Win/draw/loss rates for one venue role
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VenueRecord {
    pub win_rate: f64,
    pub draw_rate: f64,
    pub loss_rate: f64,
}

/// Computes team statistics from a history store
pub struct FeatureEngine<'a, S: ?Sized> {
    store: &'a S,
    scope: Scope,
    lookback: usize,
    venue_lookback: usize,
}

impl<'a, S: HistoryQuery + RosterQuery + ?Sized> FeatureEngine<'a, S> {
    pub fn new(store: &'a S, scope: Scope, config: &FeatureConfig) -> Self {
        FeatureEngine {
            store,
            scope,
            lookback: config.lookback,
            venue_lookback: config.venue_lookback,
        }
    }

    /// Recent matches for a team, most recent first, strictly before cutoff
    fn recent(
        &self,
        team: TeamId,
        cutoff: Option<NaiveDateTime>,
        limit: usize,
    ) -> Result<Vec<HistoricalMatch>> {
        self.store.matches_for(team, cutoff, self.scope, Some(limit))
    }

    /// Average goal difference per match over the recent window
    ///
    /// Falls back to a point-based estimate `(points/max - 0.5) * 2` when
    /// the window has results but no scores, and to 0.0 with no matches.
    pub fn strength(&self, team: TeamId, cutoff: Option<NaiveDateTime>) -> Result<f64> {
        let matches = self.recent(team, cutoff, self.lookback)?;
        if matches.is_empty() {
            return Ok(DEFAULT_STRENGTH);
        }

        let mut diff_sum = 0.0;
        let mut scored_count = 0usize;
        for m in &matches {
            if let (Some(gf), Some(ga)) = (m.goals_for(team), m.goals_against(team)) {
                diff_sum += (gf - ga) as f64;
                scored_count += 1;
            }
        }
        if scored_count > 0 {
            return Ok(diff_sum / scored_count as f64);
        }

        // No score data: estimate from result labels instead
        let mut points = 0u32;
        let mut labelled = 0usize;
        for m in &matches {
            if let Some(outcome) = m.outcome_for(team) {
                points += outcome.points();
                labelled += 1;
            }
        }
        if labelled == 0 {
            return Ok(DEFAULT_STRENGTH);
        }
        let ratio = points as f64 / (labelled as f64 * 3.0);
        Ok((ratio - 0.5) * 2.0)
    }

    /// Normalised recent points in [0, 1]
    ///
    /// Win = 3, draw = 1, loss = 0, divided by `3 * matches_considered`.
    /// Uses scores when present, otherwise the result label (inverted when
    /// the team played away). 0.0 with no matches.
    pub fn form(&self, team: TeamId, cutoff: Option<NaiveDateTime>) -> Result<f64> {
        let matches = self.recent(team, cutoff, self.lookback)?;

        let mut points = 0u32;
        let mut considered = 0usize;
        for m in &matches {
            let outcome = match (m.goals_for(team), m.goals_against(team)) {
                (Some(gf), Some(ga)) => Some(Outcome::from_scores(gf, ga)),
                _ => m.outcome_for(team),
            };
            if let Some(outcome) = outcome {
                points += outcome.points();
                considered += 1;
            }
        }

        if considered == 0 {
            return Ok(DEFAULT_FORM);
        }
        Ok(points as f64 / (considered as f64 * 3.0))
    }

    /// Mean goals scored over the recent window, optionally one venue only
    ///
    /// With results but no score data the estimate is `1.0 + win_rate`;
    /// with no qualifying matches at all, the league-average placeholder.
    pub fn goal_average(
        &self,
        team: TeamId,
        venue: Option<Venue>,
        cutoff: Option<NaiveDateTime>,
    ) -> Result<f64> {
        let matches = self.recent(team, cutoff, self.venue_lookback)?;
        let subset: Vec<&HistoricalMatch> = matches
            .iter()
            .filter(|m| match venue {
                Some(Venue::Home) => m.home_team == team,
                Some(Venue::Away) => m.away_team == team,
                None => true,
            })
            .collect();

        let mut goals = 0.0;
        let mut scored_count = 0usize;
        for m in &subset {
            if let Some(gf) = m.goals_for(team) {
                goals += gf as f64;
                scored_count += 1;
            }
        }
        if scored_count > 0 {
            return Ok(goals / scored_count as f64);
        }

        let mut wins = 0usize;
        let mut labelled = 0usize;
        for m in &subset {
            if let Some(outcome) = m.outcome_for(team) {
                if outcome == Outcome::Win {
                    wins += 1;
                }
                labelled += 1;
            }
        }
        if labelled > 0 {
            return Ok(1.0 + wins as f64 / labelled as f64);
        }
        Ok(DEFAULT_GOAL_AVG)
    }

    /// Win/draw/loss rates from result labels, one venue role only
    pub fn venue_record(
        &self,
        team: TeamId,
        is_home: bool,
        cutoff: Option<NaiveDateTime>,
    ) -> Result<VenueRecord> {
        let matches = self.recent(team, cutoff, self.venue_lookback)?;

        let mut wins = 0usize;
        let mut draws = 0usize;
        let mut losses = 0usize;
        for m in &matches {
            let played_home = m.home_team == team;
            if played_home != is_home {
                continue;
            }
            match m.outcome_for(team) {
                Some(Outcome::Win) => wins += 1,
                Some(Outcome::Draw) => draws += 1,
                Some(Outcome::Loss) => losses += 1,
                None => {}
            }
        }

        let total = wins + draws + losses;
        if total == 0 {
            return Ok(VenueRecord::default());
        }
        Ok(VenueRecord {
            win_rate: wins as f64 / total as f64,
            draw_rate: draws as f64 / total as f64,
            loss_rate: losses as f64 / total as f64,
        })
    }

    /// Fraction of the roster marked injured for the resolved season
    ///
    /// The season is inferred from the most recent qualifying match when
    /// not supplied. With no roster data the league-average prior applies;
    /// a mostly-unknown roster nudges the rate up, capped at 0.3.
    pub fn injury_rate(
        &self,
        team: TeamId,
        season: Option<&str>,
        cutoff: Option<NaiveDateTime>,
    ) -> Result<f64> {
        let season = match season {
            Some(s) => s.to_string(),
            None => {
                let matches = self.recent(team, cutoff, self.lookback)?;
                match matches.iter().find_map(|m| m.season.clone()) {
                    Some(s) => s,
                    None => return Ok(DEFAULT_INJURY_RATE),
                }
            }
        };

        let players = self.store.players_for(team, &season)?;
        let total = players.len();
        if total == 0 {
            return Ok(DEFAULT_INJURY_RATE);
        }

        let confirmed = players.iter().filter(|p| p.injured == Some(true)).count();
        let unknown = players.iter().filter(|p| p.injured.is_none()).count();
        if unknown == total {
            return Ok(DEFAULT_INJURY_RATE);
        }

        let mut rate = confirmed as f64 / (total - unknown) as f64;
        if unknown as f64 > total as f64 * 0.3 {
            rate = (rate + 0.05).min(0.3);
        }
        Ok(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Database;
    use crate::{Config, Outcome, Player};
    use chrono::{Duration, NaiveDate};

    fn kickoff(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, day)
            .unwrap()
            .and_hms_opt(15, 0, 0)
            .unwrap()
    }

    fn engine(db: &Database) -> FeatureEngine<'_, Database> {
        FeatureEngine::new(db, Scope::Global, &Config::default().features)
    }

    fn seed_match(
        db: &Database,
        id: i64,
        home: TeamId,
        away: TeamId,
        day: u32,
        score: Option<(i32, i32)>,
    ) {
        let (home_score, away_score) = match score {
            Some((h, a)) => (Some(h), Some(a)),
            None => (None, None),
        };
        let result = score.map(|(h, a)| Outcome::from_scores(h, a));
        db.upsert_match(&HistoricalMatch {
            id,
            home_team: home,
            away_team: away,
            kickoff: kickoff(day),
            league: None,
            competition: None,
            country: None,
            season: Some("2024-2025".to_string()),
            home_score,
            away_score,
            result,
        })
        .unwrap();
    }

    fn seeded_db() -> (Database, TeamId, TeamId) {
        let db = Database::in_memory().unwrap();
        let a = db.get_or_create_team("Alpha", "England", None).unwrap().id;
        let b = db.get_or_create_team("Beta", "England", None).unwrap().id;
        (db, a, b)
    }

    #[test]
    fn test_form_no_leakage() {
        let (db, a, b) = seeded_db();
        // win at t1, loss at t2, win at t3
        seed_match(&db, 1, a, b, 1, Some((2, 0)));
        seed_match(&db, 2, a, b, 10, Some((0, 2)));
        seed_match(&db, 3, a, b, 20, Some((1, 0)));
        let eng = engine(&db);

        let just_before = |day: u32| Some(kickoff(day) - Duration::seconds(1));
        // before t1: nothing played yet
        assert_eq!(eng.form(a, just_before(1)).unwrap(), 0.0);
        // before t2: only the win counts
        assert_eq!(eng.form(a, just_before(10)).unwrap(), 1.0);
        // before t3: win + loss = 3 / 6
        assert_eq!(eng.form(a, just_before(20)).unwrap(), 0.5);
        // after t3: all three = 6 / 9
        let after = Some(kickoff(20) + Duration::seconds(1));
        assert!((eng.form(a, after).unwrap() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_defaults_with_no_history() {
        let (db, a, _) = seeded_db();
        let eng = engine(&db);

        assert_eq!(eng.strength(a, None).unwrap(), 0.0);
        assert_eq!(eng.form(a, None).unwrap(), 0.0);
        assert_eq!(eng.goal_average(a, None, None).unwrap(), 1.5);
        assert_eq!(eng.venue_record(a, true, None).unwrap(), VenueRecord::default());
        assert_eq!(eng.injury_rate(a, None, None).unwrap(), 0.1);
    }

    #[test]
    fn test_strength_mean_goal_difference() {
        let (db, a, b) = seeded_db();
        seed_match(&db, 1, a, b, 1, Some((3, 0)));
        seed_match(&db, 2, b, a, 2, Some((2, 1)));
        let eng = engine(&db);

        // +3 and -1 over two matches
        assert!((eng.strength(a, None).unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_strength_point_fallback_without_scores() {
        let (db, a, b) = seeded_db();
        for (id, day) in [(1i64, 1u32), (2, 2), (3, 3)] {
            db.upsert_match(&HistoricalMatch {
                id,
                home_team: a,
                away_team: b,
                kickoff: kickoff(day),
                league: None,
                competition: None,
                country: None,
                season: None,
                home_score: None,
                away_score: None,
                result: Some(Outcome::Win),
            })
            .unwrap();
        }
        let eng = engine(&db);

        // All wins maps to +1.0, and the away side to -1.0
        assert!((eng.strength(a, None).unwrap() - 1.0).abs() < 1e-9);
        assert!((eng.strength(b, None).unwrap() + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_goal_average_home_only() {
        let (db, a, b) = seeded_db();
        seed_match(&db, 1, a, b, 1, Some((4, 0)));
        seed_match(&db, 2, b, a, 2, Some((1, 1)));
        seed_match(&db, 3, a, b, 3, Some((2, 2)));
        let eng = engine(&db);

        // Home matches only: 4 and 2 goals
        assert!((eng.goal_average(a, Some(Venue::Home), None).unwrap() - 3.0).abs() < 1e-9);
        // Unfiltered: (4 + 1 + 2) / 3
        assert!((eng.goal_average(a, None, None).unwrap() - 7.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_goal_average_label_estimate() {
        let (db, a, b) = seeded_db();
        db.upsert_match(&HistoricalMatch {
            id: 1,
            home_team: a,
            away_team: b,
            kickoff: kickoff(1),
            league: None,
            competition: None,
            country: None,
            season: None,
            home_score: None,
            away_score: None,
            result: Some(Outcome::Win),
        })
        .unwrap();
        let eng = engine(&db);

        // Results but no scores: 1.0 + win_rate
        assert!((eng.goal_average(a, None, None).unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_venue_record_inverts_for_away() {
        let (db, a, b) = seeded_db();
        seed_match(&db, 1, b, a, 1, Some((0, 2)));
        seed_match(&db, 2, b, a, 2, Some((1, 1)));
        let eng = engine(&db);

        let record = eng.venue_record(a, false, None).unwrap();
        assert!((record.win_rate - 0.5).abs() < 1e-9);
        assert!((record.draw_rate - 0.5).abs() < 1e-9);
        assert_eq!(record.loss_rate, 0.0);
        // No home matches for team a
        assert_eq!(eng.venue_record(a, true, None).unwrap(), VenueRecord::default());
    }

    #[test]
    fn test_injury_rate_known_roster() {
        let (db, a, b) = seeded_db();
        seed_match(&db, 1, a, b, 1, Some((1, 0)));
        for (name, injured) in [("One", Some(true)), ("Two", Some(false)), ("Three", Some(false)), ("Four", Some(false))] {
            db.upsert_player(&Player {
                name: name.to_string(),
                team: a,
                season: "2024-2025".to_string(),
                injured,
            })
            .unwrap();
        }
        let eng = engine(&db);

        // Season resolved from the most recent match
        assert!((eng.injury_rate(a, None, None).unwrap() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_injury_rate_unknown_heavy_roster() {
        let (db, a, _) = seeded_db();
        let season = "2024-2025";
        for i in 0..10 {
            let injured = match i {
                0 => Some(true),
                1..=4 => Some(false),
                _ => None, // half the roster unknown
            };
            db.upsert_player(&Player {
                name: format!("P{}", i),
                team: a,
                season: season.to_string(),
                injured,
            })
            .unwrap();
        }
        let eng = engine(&db);

        // 1/5 known-injured, >30% unknown adds the 0.05 buffer
        assert!((eng.injury_rate(a, Some(season), None).unwrap() - 0.25).abs() < 1e-9);
    }
}
