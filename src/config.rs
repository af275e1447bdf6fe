//! Configuration management for sql-chain.
//!
//! Settings are loaded once at startup: required connection and credential
//! values come from the environment (optionally seeded from a `.env` file),
//! tunable pipeline options come from an optional TOML file. The resulting
//! [`Settings`] is passed explicitly into every stage constructor.

use crate::error::{ChainError, Result};
use crate::llm::LlmProvider;
use crate::pipeline::BatchPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use url::Url;

/// Which stage ends the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalStage {
    /// Stop after executing the formulated queries.
    #[default]
    Execute,
    /// Execute, then ask the model to evaluate the results.
    Evaluate,
}

impl FromStr for TerminalStage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "execute" => Ok(Self::Execute),
            "evaluate" => Ok(Self::Evaluate),
            _ => Err(format!(
                "Invalid terminal stage: {s}. Expected: execute or evaluate"
            )),
        }
    }
}

impl fmt::Display for TerminalStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Execute => write!(f, "execute"),
            Self::Evaluate => write!(f, "evaluate"),
        }
    }
}

/// Optional file-based configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Pipeline shape and artifact options.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// LLM call options.
    #[serde(default)]
    pub llm: LlmOptions,

    /// Database driver options.
    #[serde(default)]
    pub database: DatabaseOptions,
}

/// Pipeline shape and artifact options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Stage that ends the pipeline.
    #[serde(default)]
    pub terminal: TerminalStage,

    /// Number of analytical questions requested from the model.
    #[serde(default = "default_question_count")]
    pub question_count: usize,

    /// Directory receiving the audit artifacts.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// How the query executor reacts to a failed statement.
    #[serde(default)]
    pub execution_policy: BatchPolicy,

    /// Upper bound on validation queries taken from the model.
    #[serde(default = "default_max_validation_queries")]
    pub max_validation_queries: usize,

    /// Refuse statements that would modify the database.
    #[serde(default = "default_true")]
    pub read_only: bool,

    /// Also write the final pipeline state as JSON.
    #[serde(default)]
    pub persist_state: bool,
}

fn default_question_count() -> usize {
    3
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_max_validation_queries() -> usize {
    3
}

fn default_true() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            terminal: TerminalStage::default(),
            question_count: default_question_count(),
            output_dir: default_output_dir(),
            execution_policy: BatchPolicy::default(),
            max_validation_queries: default_max_validation_queries(),
            read_only: default_true(),
            persist_state: false,
        }
    }
}

/// LLM call options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmOptions {
    /// Request timeout in seconds.
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Attempts per request; 1 disables retries.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Sampling temperature for question generation.
    #[serde(default)]
    pub question_temperature: f32,

    /// Sampling temperature for SQL formulation.
    #[serde(default)]
    pub sql_temperature: f32,

    /// Sampling temperature for both evaluation calls.
    #[serde(default = "default_evaluation_temperature")]
    pub evaluation_temperature: f32,
}

fn default_llm_timeout() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    1
}

fn default_evaluation_temperature() -> f32 {
    0.2
}

impl Default for LlmOptions {
    fn default() -> Self {
        Self {
            timeout_secs: default_llm_timeout(),
            max_attempts: default_max_attempts(),
            question_temperature: 0.0,
            sql_temperature: 0.0,
            evaluation_temperature: default_evaluation_temperature(),
        }
    }
}

/// Database driver options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseOptions {
    /// Per-statement timeout in seconds.
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,

    /// Maximum rows kept from a single statement.
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,

    /// Pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_query_timeout() -> u64 {
    30
}

fn default_max_rows() -> usize {
    1000
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            query_timeout_secs: default_query_timeout(),
            max_rows: default_max_rows(),
            max_connections: default_max_connections(),
        }
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sql-chain")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file, or defaults when it does not exist.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ChainError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            ChainError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }
}

/// PostgreSQL SSL negotiation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SslMode {
    Disable,
    Allow,
    #[default]
    Prefer,
    Require,
    VerifyCa,
    VerifyFull,
}

impl SslMode {
    /// Returns the libpq spelling of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disable => "disable",
            Self::Allow => "allow",
            Self::Prefer => "prefer",
            Self::Require => "require",
            Self::VerifyCa => "verify-ca",
            Self::VerifyFull => "verify-full",
        }
    }
}

impl FromStr for SslMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "disable" => Ok(Self::Disable),
            "allow" => Ok(Self::Allow),
            "prefer" => Ok(Self::Prefer),
            "require" => Ok(Self::Require),
            "verify-ca" => Ok(Self::VerifyCa),
            "verify-full" => Ok(Self::VerifyFull),
            _ => Err(format!("Invalid DB_SSLMODE '{s}'")),
        }
    }
}

/// Database connection settings sourced from the environment.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub sslmode: SslMode,
}

impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("name", &self.name)
            .field("sslmode", &self.sslmode)
            .finish()
    }
}

impl DatabaseSettings {
    /// Builds the `postgres://` connection string.
    ///
    /// Credentials are percent-encoded and the SSL mode is passed as a query
    /// parameter.
    pub fn to_connection_string(&self) -> Result<String> {
        let mut url = Url::parse(&format!("postgres://{}:{}", self.host, self.port))
            .map_err(|e| ChainError::config(format!("Invalid database host: {e}")))?;

        url.set_username(&self.user)
            .map_err(|_| ChainError::config("Cannot set database user"))?;
        if !self.password.is_empty() {
            url.set_password(Some(&self.password))
                .map_err(|_| ChainError::config("Cannot set database password"))?;
        }
        url.set_path(&format!("/{}", self.name));
        url.query_pairs_mut()
            .append_pair("sslmode", self.sslmode.as_str());

        Ok(url.to_string())
    }

    /// Returns a copy pointing at a different database on the same server.
    pub fn with_database(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Returns a display-safe string (no password) for logs.
    pub fn display_string(&self) -> String {
        format!(
            "{} @ {}:{} (sslmode={})",
            self.name,
            self.host,
            self.port,
            self.sslmode.as_str()
        )
    }
}

/// LLM provider settings sourced from the environment.
#[derive(Clone, PartialEq, Eq)]
pub struct LlmSettings {
    pub provider: LlmProvider,
    pub api_key: Option<String>,
    pub model: String,
}

impl fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmSettings")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .finish()
    }
}

/// Command-line choices that change which settings are required.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    /// Provider chosen on the command line (wins over `LLM_PROVIDER`).
    pub llm_provider: Option<LlmProvider>,
    /// Skip the database variables because an in-memory database is used.
    pub mock_db: bool,
}

/// Process-wide settings, constructed once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Absent when running against the in-memory database.
    pub database: Option<DatabaseSettings>,
    pub llm: LlmSettings,
    pub config: Config,
}

impl Settings {
    /// Loads settings from the process environment.
    pub fn from_env(config: Config, overrides: &SettingsOverrides) -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok(), config, overrides)
    }

    /// Loads settings using `lookup` to resolve variable names.
    ///
    /// Every missing required variable is reported in a single error.
    pub fn from_lookup<F>(lookup: F, config: Config, overrides: &SettingsOverrides) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut env = EnvReader::new(lookup);

        let provider = match overrides.llm_provider {
            Some(provider) => provider,
            None => match env.optional("LLM_PROVIDER") {
                Some(name) => name.parse().map_err(ChainError::config)?,
                None => LlmProvider::default(),
            },
        };

        let database = if overrides.mock_db {
            None
        } else {
            Some(read_database(&mut env)?)
        };
        let llm = read_llm(&mut env, provider);

        env.finish()?;

        Ok(Self {
            database,
            llm,
            config,
        })
    }
}

fn read_database<F>(env: &mut EnvReader<F>) -> Result<DatabaseSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let host = env.required("DB_HOST");
    let port = env.required("DB_PORT");
    let user = env.required("DB_USER");
    let password = env.required("DB_PASSWORD");
    let name = env.required("DB_NAME");
    let sslmode = env.required("DB_SSLMODE");

    let port = if port.is_empty() {
        0
    } else {
        port.trim()
            .parse::<u16>()
            .map_err(|_| ChainError::config(format!("DB_PORT must be a port number, got '{port}'")))?
    };
    let sslmode = if sslmode.is_empty() {
        SslMode::default()
    } else {
        sslmode.parse().map_err(ChainError::config)?
    };

    Ok(DatabaseSettings {
        host,
        port,
        user,
        password,
        name,
        sslmode,
    })
}

fn read_llm<F>(env: &mut EnvReader<F>, provider: LlmProvider) -> LlmSettings
where
    F: Fn(&str) -> Option<String>,
{
    let (key_var, model_var, default_model) = match provider {
        LlmProvider::Gemini => ("GOOGLE_API_KEY", "GEMINI_MODEL", "gemini-2.0-flash"),
        LlmProvider::Anthropic => (
            "ANTHROPIC_API_KEY",
            "CLAUDE_MODEL",
            "claude-3-7-sonnet-latest",
        ),
        LlmProvider::OpenAi => ("OPENAI_API_KEY", "OPENAI_MODEL", "gpt-4o"),
        LlmProvider::Mock => {
            return LlmSettings {
                provider,
                api_key: None,
                model: "mock".to_string(),
            }
        }
    };

    LlmSettings {
        provider,
        api_key: Some(env.required(key_var)),
        model: env
            .optional(model_var)
            .unwrap_or_else(|| default_model.to_string()),
    }
}

/// Reads variables through a lookup function while collecting missing names.
struct EnvReader<F> {
    lookup: F,
    missing: Vec<&'static str>,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn new(lookup: F) -> Self {
        Self {
            lookup,
            missing: Vec::new(),
        }
    }

    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|value| !value.trim().is_empty())
    }

    fn required(&mut self, key: &'static str) -> String {
        match self.optional(key) {
            Some(value) => value,
            None => {
                self.missing.push(key);
                String::new()
            }
        }
    }

    fn finish(self) -> Result<()> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(ChainError::config(format!(
                "missing environment variables: {}",
                self.missing.join(", ")
            )))
        }
    }
}
