//! Football match outcome prediction
//!
//! Turns a team's match history into point-in-time features, trains a
//! random forest per scope (league, competition or country) and converts
//! classifier output into calibrated probabilities and fair odds.

pub mod data;
pub mod features;
pub mod model;
pub mod pipeline;
pub mod predict;
pub mod training;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Unique identifier for a team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeamId(pub i64);

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Team({})", self.0)
    }
}

/// Unique identifier for a league
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeagueId(pub i64);

/// Unique identifier for a cup competition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompetitionId(pub i64);

/// Unique identifier for a country
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CountryId(pub i64);

/// A football team
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub country: String,
    /// External provider id, when the team came from an API feed
    pub api_id: Option<String>,
}

/// Match result from the home team's perspective
///
/// The single source of truth for every label/class-index mapping in the
/// crate. `Win` means the home side won.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Win,
    Draw,
    Loss,
}

impl Outcome {
    pub const ALL: [Outcome; 3] = [Outcome::Win, Outcome::Draw, Outcome::Loss];

    /// Classifier class index (win=0, draw=1, loss=2)
    pub fn class_index(&self) -> usize {
        match self {
            Outcome::Win => 0,
            Outcome::Draw => 1,
            Outcome::Loss => 2,
        }
    }

    pub fn from_class_index(idx: usize) -> Option<Outcome> {
        match idx {
            0 => Some(Outcome::Win),
            1 => Some(Outcome::Draw),
            2 => Some(Outcome::Loss),
            _ => None,
        }
    }

    /// Derive the home-perspective outcome from a final score
    pub fn from_scores(home: i32, away: i32) -> Outcome {
        match home.cmp(&away) {
            std::cmp::Ordering::Greater => Outcome::Win,
            std::cmp::Ordering::Equal => Outcome::Draw,
            std::cmp::Ordering::Less => Outcome::Loss,
        }
    }

    /// Same match seen from the away side
    pub fn invert(&self) -> Outcome {
        match self {
            Outcome::Win => Outcome::Loss,
            Outcome::Draw => Outcome::Draw,
            Outcome::Loss => Outcome::Win,
        }
    }

    /// League points awarded for this result
    pub fn points(&self) -> u32 {
        match self {
            Outcome::Win => 3,
            Outcome::Draw => 1,
            Outcome::Loss => 0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Win => "win",
            Outcome::Draw => "draw",
            Outcome::Loss => "loss",
        }
    }

    pub fn from_label(label: &str) -> Option<Outcome> {
        match label {
            "win" | "H" => Some(Outcome::Win),
            "draw" | "D" => Some(Outcome::Draw),
            "loss" | "A" => Some(Outcome::Loss),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Training/prediction scope
///
/// At most one dimension is honoured per run; `Global` means no filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scope {
    League(LeagueId),
    Competition(CompetitionId),
    Country(CountryId),
    Global,
}

impl Scope {
    /// Build a scope from at most one of the three optional ids
    pub fn from_ids(league: Option<i64>, competition: Option<i64>, country: Option<i64>) -> Scope {
        if let Some(id) = league {
            Scope::League(LeagueId(id))
        } else if let Some(id) = competition {
            Scope::Competition(CompetitionId(id))
        } else if let Some(id) = country {
            Scope::Country(CountryId(id))
        } else {
            Scope::Global
        }
    }

    /// Short tag used in model version strings
    pub fn tag(&self) -> String {
        match self {
            Scope::League(id) => format!("league-{}", id.0),
            Scope::Competition(id) => format!("competition-{}", id.0),
            Scope::Country(id) => format!("country-{}", id.0),
            Scope::Global => "global".to_string(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// A finished (or at least played-in-the-past) match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalMatch {
    pub id: i64,
    pub home_team: TeamId,
    pub away_team: TeamId,
    pub kickoff: NaiveDateTime,
    pub league: Option<LeagueId>,
    pub competition: Option<CompetitionId>,
    pub country: Option<CountryId>,
    pub season: Option<String>,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub result: Option<Outcome>,
}

impl HistoricalMatch {
    /// Stored result label, or one derived from the scores
    pub fn outcome(&self) -> Option<Outcome> {
        self.result.or_else(|| match (self.home_score, self.away_score) {
            (Some(h), Some(a)) => Some(Outcome::from_scores(h, a)),
            _ => None,
        })
    }

    /// Both scores present
    pub fn has_scores(&self) -> bool {
        self.home_score.is_some() && self.away_score.is_some()
    }

    /// Goals scored by the given team, if it played and scores exist
    pub fn goals_for(&self, team: TeamId) -> Option<i32> {
        if team == self.home_team {
            self.home_score
        } else if team == self.away_team {
            self.away_score
        } else {
            None
        }
    }

    /// Goals conceded by the given team
    pub fn goals_against(&self, team: TeamId) -> Option<i32> {
        if team == self.home_team {
            self.away_score
        } else if team == self.away_team {
            self.home_score
        } else {
            None
        }
    }

    /// Outcome from the given team's perspective
    pub fn outcome_for(&self, team: TeamId) -> Option<Outcome> {
        let home_outcome = self.outcome()?;
        if team == self.home_team {
            Some(home_outcome)
        } else if team == self.away_team {
            Some(home_outcome.invert())
        } else {
            None
        }
    }

    /// Check the stored result against the scores; false means the row is bad
    pub fn result_consistent(&self) -> bool {
        match (self.result, self.home_score, self.away_score) {
            (Some(r), Some(h), Some(a)) => r == Outcome::from_scores(h, a),
            _ => true,
        }
    }

    /// Does this match fall inside the given scope?
    pub fn in_scope(&self, scope: Scope) -> bool {
        match scope {
            Scope::League(id) => self.league == Some(id),
            Scope::Competition(id) => self.competition == Some(id),
            Scope::Country(id) => self.country == Some(id),
            Scope::Global => true,
        }
    }
}

/// Scheduling status of a fixture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixtureStatus {
    NotStarted,
    InPlay,
    Finished,
    Postponed,
}

impl FixtureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FixtureStatus::NotStarted => "not_started",
            FixtureStatus::InPlay => "in_play",
            FixtureStatus::Finished => "finished",
            FixtureStatus::Postponed => "postponed",
        }
    }

    pub fn parse(s: &str) -> FixtureStatus {
        match s {
            "in_play" => FixtureStatus::InPlay,
            "finished" => FixtureStatus::Finished,
            "postponed" => FixtureStatus::Postponed,
            _ => FixtureStatus::NotStarted,
        }
    }
}

/// A match that has not been played yet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpcomingFixture {
    pub id: i64,
    pub home_team: TeamId,
    pub away_team: TeamId,
    pub kickoff: NaiveDateTime,
    pub league: Option<LeagueId>,
    pub competition: Option<CompetitionId>,
    pub country: Option<CountryId>,
    pub season: Option<String>,
    pub status: FixtureStatus,
}

impl UpcomingFixture {
    pub fn in_scope(&self, scope: Scope) -> bool {
        match scope {
            Scope::League(id) => self.league == Some(id),
            Scope::Competition(id) => self.competition == Some(id),
            Scope::Country(id) => self.country == Some(id),
            Scope::Global => true,
        }
    }
}

/// Roster entry used by the injury-rate statistic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub team: TeamId,
    pub season: String,
    /// None means the injury status is unknown
    pub injured: Option<bool>,
}

/// Stored model output for one fixture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub fixture_id: i64,
    pub result: Outcome,
    pub confidence: f64,
    /// Signed goal-difference estimate (unweighted strength difference)
    pub goal_diff: f64,
    pub fair_odds_home: f64,
    pub fair_odds_draw: f64,
    pub fair_odds_away: f64,
    pub model_version: String,
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum FootyError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Unknown team: {0}")]
    UnknownTeam(String),

    #[error("Team not found with ID: {0}")]
    TeamNotFound(TeamId),

    #[error("Insufficient training data for {scope}: {found} labelled matches, need {required}")]
    InsufficientData {
        scope: Scope,
        found: usize,
        required: usize,
    },

    #[error("No trainable data for {scope}: feature extraction failed for every match")]
    NoTrainableData { scope: Scope },

    #[error("Entity has no home/away team references")]
    MissingTeams,

    #[error("Inconsistent match row: stored result contradicts the scores")]
    InconsistentResult,

    #[error("No trained model available - run `footy train` first")]
    NoModel,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, FootyError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub features: FeatureConfig,
    pub data: DataConfig,
}

/// Lookback windows for the feature engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Matches considered for form and strength
    pub lookback: usize,
    /// Matches considered for goal averages and venue records
    pub venue_lookback: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub database_path: String,
    pub model_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            features: FeatureConfig {
                lookback: 20,
                venue_lookback: 10,
            },
            data: DataConfig {
                database_path: "data/footy.db".to_string(),
                model_path: "model/forest".to_string(),
            },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FootyError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        toml::from_str(&content)
            .map_err(|e| FootyError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| FootyError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
