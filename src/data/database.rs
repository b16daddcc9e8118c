//! SQLite storage for teams, matches, fixtures and predictions

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;

use crate::data::{HistoryQuery, PredictionStore, RosterQuery, ScopeConfigStore};
use crate::features::FeatureWeights;
use crate::model::config::{Hyperparameters, ScopeConfig};
use crate::{
    CompetitionId, CountryId, FixtureStatus, FootyError, HistoricalMatch, LeagueId, Outcome,
    Player, Prediction, Result, Scope, Team, TeamId, UpcomingFixture,
};

const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Database connection and operations
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS teams (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                country TEXT NOT NULL,
                api_id TEXT,
                UNIQUE(name, country)
            );

            CREATE TABLE IF NOT EXISTS matches (
                id INTEGER PRIMARY KEY,
                home_team_id INTEGER NOT NULL REFERENCES teams(id),
                away_team_id INTEGER NOT NULL REFERENCES teams(id),
                kickoff TEXT NOT NULL,
                league_id INTEGER,
                competition_id INTEGER,
                country_id INTEGER,
                season TEXT,
                home_score INTEGER,
                away_score INTEGER,
                result TEXT
            );

            CREATE TABLE IF NOT EXISTS fixtures (
                id INTEGER PRIMARY KEY,
                home_team_id INTEGER NOT NULL REFERENCES teams(id),
                away_team_id INTEGER NOT NULL REFERENCES teams(id),
                kickoff TEXT NOT NULL,
                league_id INTEGER,
                competition_id INTEGER,
                country_id INTEGER,
                season TEXT,
                status TEXT NOT NULL DEFAULT 'not_started'
            );

            CREATE TABLE IF NOT EXISTS players (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                team_id INTEGER NOT NULL REFERENCES teams(id),
                season TEXT NOT NULL,
                injured INTEGER,
                UNIQUE(name, team_id, season)
            );

            CREATE TABLE IF NOT EXISTS scope_configs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                scope_kind TEXT NOT NULL,
                scope_id INTEGER NOT NULL,
                model_type TEXT NOT NULL,
                trees INTEGER NOT NULL,
                max_depth INTEGER,
                min_split INTEGER NOT NULL,
                weights TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS predictions (
                fixture_id INTEGER PRIMARY KEY REFERENCES fixtures(id),
                result TEXT NOT NULL,
                confidence REAL NOT NULL,
                goal_diff REAL NOT NULL,
                fair_odds_home REAL NOT NULL,
                fair_odds_draw REAL NOT NULL,
                fair_odds_away REAL NOT NULL,
                model_version TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_matches_kickoff ON matches(kickoff);
            CREATE INDEX IF NOT EXISTS idx_matches_teams ON matches(home_team_id, away_team_id);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_scope_configs_active
                ON scope_configs(scope_kind, scope_id) WHERE active = 1;
            "#,
        )?;
        Ok(())
    }

    // ==================== Team Operations ====================

    /// Get or create a team
    ///
    /// Identity is the external api id when present, (name, country)
    /// otherwise. Teams are never deleted during pipeline operation.
    pub fn get_or_create_team(
        &self,
        name: &str,
        country: &str,
        api_id: Option<&str>,
    ) -> Result<Team> {
        if let Some(api_id) = api_id {
            let existing: Option<Team> = self
                .conn
                .query_row(
                    "SELECT id, name, country, api_id FROM teams WHERE api_id = ?1",
                    params![api_id],
                    Self::row_to_team,
                )
                .optional()?;
            if let Some(team) = existing {
                return Ok(team);
            }
        }

        let existing: Option<Team> = self
            .conn
            .query_row(
                "SELECT id, name, country, api_id FROM teams WHERE name = ?1 AND country = ?2",
                params![name, country],
                Self::row_to_team,
            )
            .optional()?;
        if let Some(team) = existing {
            return Ok(team);
        }

        self.conn.execute(
            "INSERT INTO teams (name, country, api_id) VALUES (?1, ?2, ?3)",
            params![name, country, api_id],
        )?;
        Ok(Team {
            id: TeamId(self.conn.last_insert_rowid()),
            name: name.to_string(),
            country: country.to_string(),
            api_id: api_id.map(|s| s.to_string()),
        })
    }

    /// Get team by ID
    pub fn get_team(&self, id: TeamId) -> Result<Team> {
        self.conn
            .query_row(
                "SELECT id, name, country, api_id FROM teams WHERE id = ?1",
                params![id.0],
                Self::row_to_team,
            )
            .map_err(|_| FootyError::TeamNotFound(id))
    }

    /// Find a team by name (any country)
    pub fn find_team_by_name(&self, name: &str) -> Result<Option<Team>> {
        let team = self
            .conn
            .query_row(
                "SELECT id, name, country, api_id FROM teams WHERE LOWER(name) = LOWER(?1)",
                params![name],
                Self::row_to_team,
            )
            .optional()?;
        Ok(team)
    }

    fn row_to_team(row: &rusqlite::Row) -> rusqlite::Result<Team> {
        Ok(Team {
            id: TeamId(row.get(0)?),
            name: row.get(1)?,
            country: row.get(2)?,
            api_id: row.get(3)?,
        })
    }

    // ==================== Match Operations ====================

    /// Insert or update a historical match
    ///
    /// Rejects rows whose stored result contradicts the scores.
    pub fn upsert_match(&self, m: &HistoricalMatch) -> Result<()> {
        if !m.result_consistent() {
            return Err(FootyError::InconsistentResult);
        }
        self.conn.execute(
            r#"
            INSERT INTO matches (id, home_team_id, away_team_id, kickoff, league_id,
                                 competition_id, country_id, season, home_score, away_score, result)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(id) DO UPDATE SET
                home_score = excluded.home_score,
                away_score = excluded.away_score,
                result = excluded.result,
                season = COALESCE(excluded.season, season)
            "#,
            params![
                m.id,
                m.home_team.0,
                m.away_team.0,
                m.kickoff.format(DATETIME_FMT).to_string(),
                m.league.map(|l| l.0),
                m.competition.map(|c| c.0),
                m.country.map(|c| c.0),
                m.season,
                m.home_score,
                m.away_score,
                m.result.map(|r| r.label()),
            ],
        )?;
        Ok(())
    }

    /// All matches carrying a result label, within a scope
    pub fn labelled_matches(&self, scope: Scope) -> Result<Vec<HistoricalMatch>> {
        let mut sql = String::from(
            "SELECT id, home_team_id, away_team_id, kickoff, league_id, competition_id,
                    country_id, season, home_score, away_score, result
             FROM matches WHERE result IS NOT NULL",
        );
        let mut bindings: Vec<Value> = Vec::new();
        if let Some((column, id)) = scope_column(scope) {
            sql.push_str(&format!(" AND {} = ?1", column));
            bindings.push(Value::Integer(id));
        }
        sql.push_str(" ORDER BY kickoff");

        let mut stmt = self.conn.prepare(&sql)?;
        let matches = stmt
            .query_map(params_from_iter(bindings), Self::row_to_match)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(matches)
    }

    fn row_to_match(row: &rusqlite::Row) -> rusqlite::Result<HistoricalMatch> {
        let kickoff_str: String = row.get(3)?;
        let result_str: Option<String> = row.get(10)?;
        Ok(HistoricalMatch {
            id: row.get(0)?,
            home_team: TeamId(row.get(1)?),
            away_team: TeamId(row.get(2)?),
            kickoff: parse_datetime(&kickoff_str),
            league: row.get::<_, Option<i64>>(4)?.map(LeagueId),
            competition: row.get::<_, Option<i64>>(5)?.map(CompetitionId),
            country: row.get::<_, Option<i64>>(6)?.map(CountryId),
            season: row.get(7)?,
            home_score: row.get(8)?,
            away_score: row.get(9)?,
            result: result_str.as_deref().and_then(Outcome::from_label),
        })
    }

    // ==================== Fixture Operations ====================

    /// Insert or update an upcoming fixture
    pub fn upsert_fixture(&self, fixture: &UpcomingFixture) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO fixtures (id, home_team_id, away_team_id, kickoff, league_id,
                                  competition_id, country_id, season, status)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                kickoff = excluded.kickoff,
                status = excluded.status,
                season = COALESCE(excluded.season, season)
            "#,
            params![
                fixture.id,
                fixture.home_team.0,
                fixture.away_team.0,
                fixture.kickoff.format(DATETIME_FMT).to_string(),
                fixture.league.map(|l| l.0),
                fixture.competition.map(|c| c.0),
                fixture.country.map(|c| c.0),
                fixture.season,
                fixture.status.as_str(),
            ],
        )?;
        Ok(())
    }

    /// Not-yet-started fixtures within a scope
    pub fn upcoming_fixtures(&self, scope: Scope) -> Result<Vec<UpcomingFixture>> {
        let mut sql = String::from(
            "SELECT id, home_team_id, away_team_id, kickoff, league_id, competition_id,
                    country_id, season, status
             FROM fixtures WHERE status = 'not_started'",
        );
        let mut bindings: Vec<Value> = Vec::new();
        if let Some((column, id)) = scope_column(scope) {
            sql.push_str(&format!(" AND {} = ?1", column));
            bindings.push(Value::Integer(id));
        }
        sql.push_str(" ORDER BY kickoff");

        let mut stmt = self.conn.prepare(&sql)?;
        let fixtures = stmt
            .query_map(params_from_iter(bindings), |row| {
                let kickoff_str: String = row.get(3)?;
                let status_str: String = row.get(8)?;
                Ok(UpcomingFixture {
                    id: row.get(0)?,
                    home_team: TeamId(row.get(1)?),
                    away_team: TeamId(row.get(2)?),
                    kickoff: parse_datetime(&kickoff_str),
                    league: row.get::<_, Option<i64>>(4)?.map(LeagueId),
                    competition: row.get::<_, Option<i64>>(5)?.map(CompetitionId),
                    country: row.get::<_, Option<i64>>(6)?.map(CountryId),
                    season: row.get(7)?,
                    status: FixtureStatus::parse(&status_str),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(fixtures)
    }

    // ==================== Player Operations ====================

    /// Insert or update a roster entry
    pub fn upsert_player(&self, player: &Player) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO players (name, team_id, season, injured)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(name, team_id, season) DO UPDATE SET
                injured = excluded.injured
            "#,
            params![
                player.name,
                player.team.0,
                player.season,
                player.injured.map(|i| i as i64),
            ],
        )?;
        Ok(())
    }

    // ==================== Scope Config Operations ====================

    /// Insert a scope configuration row
    pub fn insert_scope_config(&self, config: &ScopeConfig) -> Result<()> {
        let (kind, id) = scope_kind_id(config.scope).ok_or_else(|| {
            FootyError::Config("scope configs require a concrete scope, not global".to_string())
        })?;
        let weights_json = serde_json::to_string(&config.weights)
            .map_err(|e| FootyError::Parse(e.to_string()))?;
        self.conn.execute(
            r#"
            INSERT INTO scope_configs (scope_kind, scope_id, model_type, trees, max_depth,
                                       min_split, weights, active)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                kind,
                id,
                config.model_type,
                config.hyperparams.trees as i64,
                config.hyperparams.max_depth.map(|d| d as i64),
                config.hyperparams.min_split as i64,
                weights_json,
                config.active as i64,
            ],
        )?;
        Ok(())
    }

    // ==================== Prediction Operations ====================

    /// Stored prediction for a fixture, if any
    pub fn prediction_for(&self, fixture_id: i64) -> Result<Option<Prediction>> {
        let prediction = self
            .conn
            .query_row(
                "SELECT fixture_id, result, confidence, goal_diff, fair_odds_home,
                        fair_odds_draw, fair_odds_away, model_version
                 FROM predictions WHERE fixture_id = ?1",
                params![fixture_id],
                |row| {
                    let result_str: String = row.get(1)?;
                    Ok(Prediction {
                        fixture_id: row.get(0)?,
                        result: Outcome::from_label(&result_str).unwrap_or(Outcome::Draw),
                        confidence: row.get(2)?,
                        goal_diff: row.get(3)?,
                        fair_odds_home: row.get(4)?,
                        fair_odds_draw: row.get(5)?,
                        fair_odds_away: row.get(6)?,
                        model_version: row.get(7)?,
                    })
                },
            )
            .optional()?;
        Ok(prediction)
    }

    /// Number of stored predictions
    pub fn prediction_count(&self) -> Result<usize> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM predictions", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // ==================== Statistics ====================

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let team_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM teams", [], |row| row.get(0))?;
        let match_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM matches", [], |row| row.get(0))?;
        let fixture_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM fixtures", [], |row| row.get(0))?;
        let prediction_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM predictions", [], |row| row.get(0))?;

        let min_date: Option<String> =
            self.conn
                .query_row("SELECT MIN(kickoff) FROM matches", [], |row| row.get(0))?;
        let max_date: Option<String> =
            self.conn
                .query_row("SELECT MAX(kickoff) FROM matches", [], |row| row.get(0))?;

        Ok(DatabaseStats {
            team_count: team_count as usize,
            match_count: match_count as usize,
            fixture_count: fixture_count as usize,
            prediction_count: prediction_count as usize,
            earliest_match: min_date.map(|s| parse_datetime(&s).date()),
            latest_match: max_date.map(|s| parse_datetime(&s).date()),
        })
    }
}

impl HistoryQuery for Database {
    fn matches_for(
        &self,
        team: TeamId,
        before: Option<NaiveDateTime>,
        scope: Scope,
        limit: Option<usize>,
    ) -> Result<Vec<HistoricalMatch>> {
        let mut sql = String::from(
            "SELECT id, home_team_id, away_team_id, kickoff, league_id, competition_id,
                    country_id, season, home_score, away_score, result
             FROM matches WHERE (home_team_id = ?1 OR away_team_id = ?1)",
        );
        let mut bindings: Vec<Value> = vec![Value::Integer(team.0)];

        if let Some(before) = before {
            bindings.push(Value::Text(before.format(DATETIME_FMT).to_string()));
            sql.push_str(&format!(" AND kickoff < ?{}", bindings.len()));
        }
        if let Some((column, id)) = scope_column(scope) {
            bindings.push(Value::Integer(id));
            sql.push_str(&format!(" AND {} = ?{}", column, bindings.len()));
        }
        sql.push_str(" ORDER BY kickoff DESC");
        if let Some(limit) = limit {
            bindings.push(Value::Integer(limit as i64));
            sql.push_str(&format!(" LIMIT ?{}", bindings.len()));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let matches = stmt
            .query_map(params_from_iter(bindings), Self::row_to_match)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(matches)
    }
}

impl RosterQuery for Database {
    fn players_for(&self, team: TeamId, season: &str) -> Result<Vec<Player>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, team_id, season, injured FROM players
             WHERE team_id = ?1 AND season = ?2",
        )?;
        let players = stmt
            .query_map(params![team.0, season], |row| {
                let injured: Option<i64> = row.get(3)?;
                Ok(Player {
                    name: row.get(0)?,
                    team: TeamId(row.get(1)?),
                    season: row.get(2)?,
                    injured: injured.map(|i| i != 0),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(players)
    }
}

impl ScopeConfigStore for Database {
    fn active_config_for(&self, scope: Scope) -> Result<Option<ScopeConfig>> {
        let (kind, id) = match scope_kind_id(scope) {
            Some(pair) => pair,
            None => return Ok(None),
        };
        let config = self
            .conn
            .query_row(
                "SELECT model_type, trees, max_depth, min_split, weights
                 FROM scope_configs
                 WHERE scope_kind = ?1 AND scope_id = ?2 AND active = 1",
                params![kind, id],
                |row| {
                    let weights_json: String = row.get(4)?;
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, Option<i64>>(2)?,
                        row.get::<_, i64>(3)?,
                        weights_json,
                    ))
                },
            )
            .optional()?;

        match config {
            Some((model_type, trees, max_depth, min_split, weights_json)) => {
                let weights: FeatureWeights = serde_json::from_str(&weights_json)
                    .map_err(|e| FootyError::Parse(e.to_string()))?;
                Ok(Some(ScopeConfig {
                    scope,
                    model_type,
                    hyperparams: Hyperparameters {
                        trees: trees as usize,
                        max_depth: max_depth.map(|d| d as usize),
                        min_split: min_split as usize,
                    },
                    weights,
                    active: true,
                }))
            }
            None => Ok(None),
        }
    }
}

impl PredictionStore for Database {
    fn upsert_prediction(&self, prediction: &Prediction) -> Result<()> {
        // Transaction keeps "one prediction per fixture" intact when
        // overlapping scopes retrain back to back.
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            r#"
            INSERT INTO predictions (fixture_id, result, confidence, goal_diff,
                                     fair_odds_home, fair_odds_draw, fair_odds_away,
                                     model_version, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, datetime('now'))
            ON CONFLICT(fixture_id) DO UPDATE SET
                result = excluded.result,
                confidence = excluded.confidence,
                goal_diff = excluded.goal_diff,
                fair_odds_home = excluded.fair_odds_home,
                fair_odds_draw = excluded.fair_odds_draw,
                fair_odds_away = excluded.fair_odds_away,
                model_version = excluded.model_version,
                updated_at = excluded.updated_at
            "#,
            params![
                prediction.fixture_id,
                prediction.result.label(),
                prediction.confidence,
                prediction.goal_diff,
                prediction.fair_odds_home,
                prediction.fair_odds_draw,
                prediction.fair_odds_away,
                prediction.model_version,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }
}

/// Scope filter column and id, None for global
fn scope_column(scope: Scope) -> Option<(&'static str, i64)> {
    match scope {
        Scope::League(id) => Some(("league_id", id.0)),
        Scope::Competition(id) => Some(("competition_id", id.0)),
        Scope::Country(id) => Some(("country_id", id.0)),
        Scope::Global => None,
    }
}

/// Scope kind tag and id for config rows, None for global
fn scope_kind_id(scope: Scope) -> Option<(&'static str, i64)> {
    match scope {
        Scope::League(id) => Some(("league", id.0)),
        Scope::Competition(id) => Some(("competition", id.0)),
        Scope::Country(id) => Some(("country", id.0)),
        Scope::Global => None,
    }
}

fn parse_datetime(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, DATETIME_FMT).unwrap_or_else(|_| {
        NaiveDate::from_ymd_opt(2000, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    })
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub team_count: usize,
    pub match_count: usize,
    pub fixture_count: usize,
    pub prediction_count: usize,
    pub earliest_match: Option<NaiveDate>,
    pub latest_match: Option<NaiveDate>,
}
