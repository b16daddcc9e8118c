//! Football Match Prediction CLI
//!
//! Trains scoped forest models on historical results and derives fair
//! betting odds for upcoming fixtures.

use clap::{Parser, Subcommand};
use footy::{Config, Result, Scope};

#[derive(Parser)]
#[command(name = "footy")]
#[command(about = "Football match outcome prediction and fair odds", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a scoped model and predict its upcoming fixtures
    Run {
        /// Restrict to a league
        #[arg(long)]
        league: Option<i64>,
        /// Restrict to a competition
        #[arg(long)]
        competition: Option<i64>,
        /// Restrict to a country
        #[arg(long)]
        country: Option<i64>,
        /// Reuse a cached model instead of retraining
        #[arg(long)]
        cached: bool,
    },
    /// Show the point-in-time statistics for a team
    Features {
        /// Team name
        team: String,
        /// Restrict history to a league
        #[arg(long)]
        league: Option<i64>,
        /// Restrict history to a competition
        #[arg(long)]
        competition: Option<i64>,
        /// Restrict history to a country
        #[arg(long)]
        country: Option<i64>,
    },
    /// Data management commands
    Data {
        #[command(subcommand)]
        action: DataCommands,
    },
    /// Initialize a new project with default config
    Init,
}

#[derive(Subcommand)]
enum DataCommands {
    /// Show database status
    Status,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let result = match cli.command {
        Commands::Run {
            league,
            competition,
            country,
            cached,
        } => commands::run(
            &config,
            Scope::from_ids(league, competition, country),
            cached,
        ),
        Commands::Features {
            team,
            league,
            competition,
            country,
        } => commands::features(
            &config,
            &team,
            Scope::from_ids(league, competition, country),
        ),
        Commands::Data { action } => match action {
            DataCommands::Status => commands::data_status(&config),
        },
        Commands::Init => commands::init(&cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use footy::data::Database;
    use footy::features::{FeatureEngine, Venue};
    use footy::pipeline::{self, RunStatus};
    use footy::FootyError;

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        std::fs::create_dir_all("data")?;
        std::fs::create_dir_all("model")?;
        println!("Created data/ and model/ directories");

        println!("\nNext steps:");
        println!("  1. Edit {} to customize settings", config_path);
        println!("  2. Load historical results into the database");
        println!("  3. Run 'footy run --league <ID>' to train and predict");

        Ok(())
    }

    pub fn run(config: &Config, scope: Scope, cached: bool) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;

        println!("Running pipeline for {}...", scope);
        let report = if cached {
            pipeline::predict_with_cache(&db, scope, config)
        } else {
            pipeline::train_and_predict(&db, scope, config)
        };

        match report.status {
            RunStatus::Success => {
                println!("Pipeline complete");
                if let Some(accuracy) = report.accuracy {
                    println!("  Accuracy:  {:.1}%", accuracy * 100.0);
                }
                if let Some(cv) = report.cv_score {
                    println!("  CV score:  {:.1}%", cv * 100.0);
                }
                if let Some(predicted) = report.matches_predicted {
                    println!("  Predicted: {} fixtures", predicted);
                }
            }
            RunStatus::Fail => {
                println!(
                    "Pipeline failed for {}: {}",
                    scope,
                    report.reason.unwrap_or_else(|| "unknown".to_string())
                );
            }
        }

        Ok(())
    }

    pub fn features(config: &Config, team_name: &str, scope: Scope) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let team = db
            .find_team_by_name(team_name)?
            .ok_or_else(|| FootyError::UnknownTeam(team_name.to_string()))?;

        let engine = FeatureEngine::new(&db, scope, &config.features);
        let cutoff = Some(chrono::Utc::now().naive_utc());

        println!("Features for {} ({})", team.name, scope);
        println!("───────────────────────────────");
        println!("  Strength:       {:+.3}", engine.strength(team.id, cutoff)?);
        println!("  Form:           {:.3}", engine.form(team.id, cutoff)?);
        println!(
            "  Goal avg:       {:.2}",
            engine.goal_average(team.id, None, cutoff)?
        );
        println!(
            "  Goal avg home:  {:.2}",
            engine.goal_average(team.id, Some(Venue::Home), cutoff)?
        );
        let home = engine.venue_record(team.id, true, cutoff)?;
        let away = engine.venue_record(team.id, false, cutoff)?;
        println!(
            "  Home record:    W {:.0}% / D {:.0}% / L {:.0}%",
            home.win_rate * 100.0,
            home.draw_rate * 100.0,
            home.loss_rate * 100.0
        );
        println!(
            "  Away record:    W {:.0}% / D {:.0}% / L {:.0}%",
            away.win_rate * 100.0,
            away.draw_rate * 100.0,
            away.loss_rate * 100.0
        );
        println!(
            "  Injury rate:    {:.2}",
            engine.injury_rate(team.id, None, cutoff)?
        );

        Ok(())
    }

    pub fn data_status(config: &Config) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let stats = db.get_stats()?;

        println!("Database Status");
        println!("───────────────────────────────");
        println!("  Path:        {}", config.data.database_path);
        println!("  Teams:       {}", stats.team_count);
        println!("  Matches:     {}", stats.match_count);
        println!("  Fixtures:    {}", stats.fixture_count);
        println!("  Predictions: {}", stats.prediction_count);
        if let (Some(earliest), Some(latest)) = (stats.earliest_match, stats.latest_match) {
            println!("  Range:       {} to {}", earliest, latest);
        }

        Ok(())
    }
}
