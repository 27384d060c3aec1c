//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Relationship store tuning.
    #[serde(default)]
    pub relationship: RelationshipConfig,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Tuning knobs for the relationship store's pair-scoped transactions.
#[derive(Debug, Clone, Deserialize)]
pub struct RelationshipConfig {
    /// Maximum internal retries for a conflicted pair transaction.
    #[serde(default = "default_max_retries")]
    pub max_conflict_retries: u32,
    /// Base backoff between retries, in milliseconds.
    #[serde(default = "default_backoff_ms")]
    pub conflict_backoff_ms: u64,
}

impl Default for RelationshipConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: default_max_retries(),
            conflict_backoff_ms: default_backoff_ms(),
        }
    }
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_backoff_ms() -> u64 {
    25
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` file (if present)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `RELATION_ENV`)
    /// 4. Environment variables with `RELATION_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let env = std::env::var("RELATION_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("RELATION")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("RELATION")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
