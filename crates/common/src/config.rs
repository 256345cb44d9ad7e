// crates/common/src/config.rs
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_CONFIG_PATH: &str = "config/aggregator";
const ENV_PREFIX: &str = "AGGREGATOR";

/// Aggregator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub database: DatabaseConfig,
    pub source: SourceConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 5,
            run_migrations: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub vs_currency: String,
    pub history_days: u32,
    pub timeout_secs: u64,
    pub requests_per_minute: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.coingecko.com/api/v3".to_string(),
            api_key: None,
            vs_currency: "usd".to_string(),
            history_days: 30,
            timeout_secs: 10,
            requests_per_minute: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Where to write the Prometheus exposition after a run
    pub textfile_path: Option<String>,
}

impl AggregatorConfig {
    /// Load from `config/aggregator.toml` (or `$AGGREGATOR_CONFIG`), then `AGGREGATOR__*`
    /// environment variables. `DATABASE_URL` overrides `database.url`.
    pub fn load() -> Result<Self> {
        let path = std::env::var("AGGREGATOR_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let builder = ::config::Config::builder()
            .add_source(::config::File::with_name(&path).required(false))
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?;

        let config: AggregatorConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from a TOML string, without consulting the environment
    pub fn from_toml(toml: &str) -> Result<Self> {
        let config: AggregatorConfig = ::config::Config::builder()
            .add_source(::config::File::from_str(toml, ::config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            return Err(Error::Config(
                "database.url is required (set DATABASE_URL)".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(Error::Config("database.max_connections must be > 0".to_string()));
        }
        if self.source.history_days < 8 {
            return Err(Error::Config(format!(
                "source.history_days must be at least 8, got {}",
                self.source.history_days
            )));
        }
        if self.source.requests_per_minute == 0 {
            return Err(Error::Config("source.requests_per_minute must be > 0".to_string()));
        }
        Ok(())
    }
}
