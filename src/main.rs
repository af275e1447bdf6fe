//! sql-chain - LLM-driven analytical questions, SQL generation and
//! evaluation against PostgreSQL.

use std::sync::Arc;

use sql_chain::cli::{Cli, Command, RunArgs};
use sql_chain::config::{Config, Settings, SettingsOverrides};
use sql_chain::db::{self, bootstrap, DatabaseClient, MockDatabaseClient};
use sql_chain::error::{ChainError, Result};
use sql_chain::llm::{create_client, LlmProvider};
use sql_chain::logging::{init_file_logging, init_stderr_logging};
use sql_chain::pipeline::{BatchRunner, Pipeline, PipelineDeps, PipelineState};
use tracing::{error, info, warn};

/// Statement used by `check-db`.
const CHECK_QUERY: &str = "SELECT current_timestamp";

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    match &cli.log_file {
        Some(path) => init_file_logging(path),
        None => init_stderr_logging(),
    }

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e);
        eprintln!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    load_env_file(&cli)?;

    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    match cli.command {
        Command::Run(args) => run_pipeline(config, &args).await,
        Command::CheckDb => check_db(config).await,
        Command::InitDb { script } => {
            let settings = database_only_settings(config)?;
            let database = require_database(&settings)?;
            let script = bootstrap::load_script(script.as_deref())?;
            bootstrap::init_database(database, &settings.config.database, &script).await
        }
    }
}

fn load_env_file(cli: &Cli) -> Result<()> {
    match &cli.env_file {
        Some(path) => dotenvy::from_path(path)
            .map_err(|e| ChainError::config(format!("Failed to load {}: {}", path.display(), e))),
        None => {
            if let Err(e) = dotenvy::dotenv() {
                if !e.not_found() {
                    warn!("Failed to load .env: {}", e);
                }
            }
            Ok(())
        }
    }
}

async fn run_pipeline(mut config: Config, args: &RunArgs) -> Result<()> {
    args.apply_to(&mut config);
    let settings = Settings::from_env(config, &args.overrides())?;

    let db = open_database(&settings).await?;
    let llm = create_client(&settings.llm, &settings.config.llm)?;
    info!("LLM: {} ({})", settings.llm.provider, settings.llm.model);

    let deps = PipelineDeps {
        db: db.clone(),
        llm,
        config: settings.config.clone(),
    };
    let pipeline = Pipeline::build(&deps);
    info!("Pipeline: {}", pipeline.stage_names().join(" -> "));

    let outcome = pipeline.run().await;
    if let Err(e) = db.close().await {
        warn!("Failed to close database: {}", e);
    }

    print_summary(&outcome?);
    Ok(())
}

async fn check_db(config: Config) -> Result<()> {
    let settings = database_only_settings(config)?;
    let database = require_database(&settings)?;
    println!("Checking {}", database.display_string());

    let db = db::connect(database, &settings.config.database).await?;
    let result = BatchRunner::new(db.clone(), true)
        .run_query(CHECK_QUERY)
        .await;
    db.close().await?;

    if !result.success {
        return Err(ChainError::query(result.error.unwrap_or_default()));
    }

    let data = result
        .data
        .map(|data| data.to_string())
        .unwrap_or_default();
    println!("Connection OK: {}", data);
    Ok(())
}

/// Settings for commands that only talk to the database.
fn database_only_settings(config: Config) -> Result<Settings> {
    let overrides = SettingsOverrides {
        llm_provider: Some(LlmProvider::Mock),
        mock_db: false,
    };
    Settings::from_env(config, &overrides)
}

fn require_database(settings: &Settings) -> Result<&sql_chain::config::DatabaseSettings> {
    settings
        .database
        .as_ref()
        .ok_or_else(|| ChainError::config("No database settings configured"))
}

async fn open_database(settings: &Settings) -> Result<Arc<dyn DatabaseClient>> {
    match &settings.database {
        Some(database) => {
            info!("Connecting to {}", database.display_string());
            db::connect(database, &settings.config.database).await
        }
        None => {
            info!("Using in-memory banking database");
            Ok(Arc::new(MockDatabaseClient::banking()))
        }
    }
}

fn print_summary(state: &PipelineState) {
    if let Some(questions) = &state.questions {
        println!("Questions:");
        for (i, question) in questions.iter().enumerate() {
            println!("  {}. {}", i + 1, question);
        }
    }

    if let Some(results) = &state.results {
        println!("Queries:");
        for (i, result) in results.iter().enumerate() {
            let rows = result
                .data
                .as_ref()
                .and_then(|data| data["results"].as_array())
                .map(Vec::len)
                .unwrap_or(0);
            match &result.error {
                None => println!("  {}. ok ({} rows)", i + 1, rows),
                Some(error) => println!("  {}. failed: {}", i + 1, error),
            }
        }
    }

    if let Some(evaluation) = &state.evaluation {
        println!("Evaluation score: {:.2}", evaluation.score);
        println!("{}", evaluation.comment);
    }
}
