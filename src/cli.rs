//! Command-line argument parsing for sql-chain.

use crate::config::{Config, SettingsOverrides, TerminalStage};
use crate::llm::LlmProvider;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Generate analytical questions about a PostgreSQL database, answer them
/// with SQL and optionally evaluate the answers.
#[derive(Parser, Debug)]
#[command(name = "sql-chain")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file path
    #[arg(long, global = true, value_name = "PATH", env = "SQL_CHAIN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Load environment variables from this file instead of ./.env
    #[arg(long, global = true, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Write logs to a file instead of stderr
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the pipeline
    Run(RunArgs),

    /// Check that the configured database answers a query
    CheckDb,

    /// Create the configured database if needed and load a schema script
    InitDb {
        /// SQL script to run (defaults to the bundled banking schema)
        #[arg(long, value_name = "PATH")]
        script: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Stage that ends the pipeline: execute or evaluate
    #[arg(long, value_name = "STAGE")]
    pub terminal: Option<TerminalStage>,

    /// Directory for questions.txt, sql_queries.txt and the JSON artifacts
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// LLM provider: gemini, anthropic, openai or mock
    #[arg(long, value_name = "PROVIDER")]
    pub llm: Option<LlmProvider>,

    /// Use the in-memory banking database instead of PostgreSQL
    #[arg(long)]
    pub mock_db: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }
}

impl RunArgs {
    /// Applies command-line values on top of the file configuration.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(terminal) = self.terminal {
            config.pipeline.terminal = terminal;
        }
        if let Some(dir) = &self.output_dir {
            config.pipeline.output_dir = dir.clone();
        }
    }

    pub fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            llm_provider: self.llm,
            mock_db: self.mock_db,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_args(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    fn run_args(cli: Cli) -> RunArgs {
        match cli.command {
            Command::Run(args) => args,
            other => panic!("expected run, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_run_defaults() {
        let args = run_args(parse_args(&["sql-chain", "run"]));
        assert!(args.terminal.is_none());
        assert!(!args.mock_db);
    }

    #[test]
    fn test_parse_run_options() {
        let args = run_args(parse_args(&[
            "sql-chain",
            "run",
            "--terminal",
            "evaluate",
            "--output-dir",
            "/tmp/out",
            "--llm",
            "mock",
            "--mock-db",
        ]));

        assert_eq!(args.terminal, Some(TerminalStage::Evaluate));
        assert_eq!(args.output_dir, Some(PathBuf::from("/tmp/out")));
        assert_eq!(args.llm, Some(LlmProvider::Mock));
        assert!(args.mock_db);
    }

    #[test]
    fn test_invalid_terminal_rejected() {
        assert!(Cli::try_parse_from(["sql-chain", "run", "--terminal", "review"]).is_err());
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = parse_args(&[
            "sql-chain",
            "check-db",
            "--config",
            "/custom/config.toml",
            "--log-file",
            "run.log",
        ]);
        assert!(matches!(cli.command, Command::CheckDb));
        assert_eq!(cli.config_path(), PathBuf::from("/custom/config.toml"));
        assert_eq!(cli.log_file, Some(PathBuf::from("run.log")));
    }

    #[test]
    fn test_parse_init_db_script() {
        let cli = parse_args(&["sql-chain", "init-db", "--script", "schema.sql"]);
        match cli.command {
            Command::InitDb { script } => assert_eq!(script, Some(PathBuf::from("schema.sql"))),
            other => panic!("expected init-db, got {:?}", other),
        }
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = Config::default();
        let args = RunArgs {
            terminal: Some(TerminalStage::Evaluate),
            output_dir: Some(PathBuf::from("artifacts")),
            llm: Some(LlmProvider::Anthropic),
            mock_db: true,
        };

        args.apply_to(&mut config);
        let overrides = args.overrides();

        assert_eq!(config.pipeline.terminal, TerminalStage::Evaluate);
        assert_eq!(config.pipeline.output_dir, PathBuf::from("artifacts"));
        assert_eq!(overrides.llm_provider, Some(LlmProvider::Anthropic));
        assert!(overrides.mock_db);
    }

    #[test]
    fn test_run_args_leave_config_alone() {
        let mut config = Config::default();
        RunArgs::default().apply_to(&mut config);
        assert_eq!(config.pipeline.terminal, TerminalStage::Execute);
        assert_eq!(config.pipeline.output_dir, PathBuf::from("."));
    }
}
