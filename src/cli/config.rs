//! Per-command configuration.
//!
//! ## Environment Variables
//!
//! Connection settings not given on the command line are read from:
//!
//! - `MONGO_BENCH_URI` - connection string
//! - `MONGO_BENCH_USERNAME` - user name
//! - `MONGO_BENCH_PASSWORD` - password
//! - `MONGO_BENCH_DATABASE` - target database
//!
//! These can be set in a `.env` file in the working directory.

use std::fmt;
use std::time::Duration;

use clap::Args;

use crate::bench::DEFAULT_REPETITIONS;
use crate::error::{BenchError, BenchResult};
use crate::generator::{Schedule, DEFAULT_BULK_EVENTS};

pub const ENV_URI: &str = "MONGO_BENCH_URI";
pub const ENV_USERNAME: &str = "MONGO_BENCH_USERNAME";
pub const ENV_PASSWORD: &str = "MONGO_BENCH_PASSWORD";
pub const ENV_DATABASE: &str = "MONGO_BENCH_DATABASE";

pub const DEFAULT_URI: &str = "mongodb://localhost:27017";
pub const DEFAULT_USERNAME: &str = "admin";
pub const DEFAULT_PASSWORD: &str = "password";
pub const DEFAULT_DATABASE: &str = "eventstore";

pub const DEFAULT_CONCURRENCY: usize = 5;
pub const DEFAULT_INTERVAL_SECS: u64 = 60;
/// Longest `--duration` accepted, one year
pub const MAX_DURATION_MINUTES: u64 = 365 * 24 * 60;

/// Connection flags shared by every subcommand
#[derive(Args, Debug, Clone, Default)]
pub struct StoreArgs {
    /// MongoDB connection URI [default: mongodb://localhost:27017]
    #[arg(long)]
    pub uri: Option<String>,

    /// MongoDB username [default: admin]
    #[arg(long)]
    pub username: Option<String>,

    /// MongoDB password [default: password]
    #[arg(long)]
    pub password: Option<String>,

    /// Database name [default: eventstore]
    #[arg(long)]
    pub database: Option<String>,
}

/// Resolved connection settings
#[derive(Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub uri: String,
    pub username: String,
    pub password: String,
    pub database: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_URI.to_string(),
            username: DEFAULT_USERNAME.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            database: DEFAULT_DATABASE.to_string(),
        }
    }
}

// keep the password out of logs
impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("uri", &self.uri)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

impl StoreConfig {
    /// Flags win over environment variables, which win over defaults.
    pub fn resolve(args: &StoreArgs) -> BenchResult<Self> {
        Self::resolve_with(args, |key| std::env::var(key).ok())
    }

    /// Same as [`StoreConfig::resolve`] with an explicit environment lookup
    pub fn resolve_with<F>(args: &StoreArgs, env: F) -> BenchResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_env_overrides(&env);

        if let Some(uri) = &args.uri {
            config.uri = uri.clone();
        }
        if let Some(username) = &args.username {
            config.username = username.clone();
        }
        if let Some(password) = &args.password {
            config.password = password.clone();
        }
        if let Some(database) = &args.database {
            config.database = database.clone();
        }

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides<F>(&mut self, env: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(uri) = env(ENV_URI).filter(|v| !v.is_empty()) {
            self.uri = uri;
        }
        if let Some(username) = env(ENV_USERNAME) {
            self.username = username;
        }
        if let Some(password) = env(ENV_PASSWORD) {
            self.password = password;
        }
        if let Some(database) = env(ENV_DATABASE).filter(|v| !v.is_empty()) {
            self.database = database;
        }
    }

    pub fn validate(&self) -> BenchResult<()> {
        if self.uri.trim().is_empty() {
            return Err(BenchError::InvalidConfig("URI must not be empty".to_string()));
        }
        if self.database.trim().is_empty() {
            return Err(BenchError::InvalidConfig(
                "database name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Username and password, only when both are set
    pub fn credentials(&self) -> Option<(&str, &str)> {
        if self.username.is_empty() || self.password.is_empty() {
            None
        } else {
            Some((self.username.as_str(), self.password.as_str()))
        }
    }
}

/// Settings for `generate`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateConfig {
    pub store: StoreConfig,
    /// Minutes to run; 0 runs until interrupted
    pub duration_minutes: u64,
    pub concurrency: usize,
    pub interval_secs: u64,
    /// One-shot load of this many events instead of the periodic loop
    pub bulk: Option<usize>,
    pub create_indexes: bool,
}

impl GenerateConfig {
    pub fn validate(&self) -> BenchResult<()> {
        self.store.validate()?;
        if self.concurrency == 0 {
            return Err(BenchError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.bulk.is_none() && self.interval_secs == 0 {
            return Err(BenchError::InvalidConfig(
                "interval must be at least 1 second".to_string(),
            ));
        }
        if self.duration_minutes > MAX_DURATION_MINUTES {
            return Err(BenchError::InvalidConfig(format!(
                "duration must be at most {} minutes",
                MAX_DURATION_MINUTES
            )));
        }
        if self.bulk == Some(0) {
            return Err(BenchError::InvalidConfig(
                "bulk size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn schedule(&self) -> Schedule {
        Schedule {
            interval: Duration::from_secs(self.interval_secs),
            duration: (self.duration_minutes > 0)
                .then(|| self.duration_minutes.checked_mul(60))
                .flatten()
                .map(Duration::from_secs),
        }
    }

    pub fn bulk_size(&self) -> usize {
        self.bulk.unwrap_or(DEFAULT_BULK_EVENTS)
    }
}

/// Settings for `run`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub store: StoreConfig,
    /// Requested test names; empty runs everything
    pub tests: Vec<String>,
    pub repetitions: u32,
    pub skip_comparison: bool,
    /// Per-operation deadline
    pub timeout: Option<Duration>,
}

impl RunConfig {
    pub fn new(store: StoreConfig) -> Self {
        Self {
            store,
            tests: Vec::new(),
            repetitions: DEFAULT_REPETITIONS,
            skip_comparison: false,
            timeout: None,
        }
    }

    pub fn validate(&self) -> BenchResult<()> {
        self.store.validate()?;
        if self.repetitions == 0 {
            return Err(BenchError::InvalidConfig(
                "repetitions must be at least 1".to_string(),
            ));
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(BenchError::InvalidConfig(
                "timeout must be at least 1 second".to_string(),
            ));
        }
        Ok(())
    }
}
