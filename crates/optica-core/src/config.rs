//! Startup configuration.

use std::env;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use thiserror::Error;

use crate::db::MAX_BATCH_OPERATIONS;

/// Database file path.
pub const DATABASE_ENV: &str = "OPTICA_DATABASE";
/// Sales tax rate as a fraction (`0.15` = 15%).
pub const TAX_RATE_ENV: &str = "OPTICA_TAX_RATE";
/// Write batch size of migration scripts.
pub const BATCH_LIMIT_ENV: &str = "OPTICA_BATCH_LIMIT";

/// Configuration errors, reported before any work starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Database not configured: set {DATABASE_ENV} or pass --database")]
    DatabaseNotConfigured,

    #[error("Database file not found: {0}")]
    MissingDatabase(PathBuf),

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Application settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub tax_rate: Decimal,
    pub batch_limit: usize,
}

impl AppConfig {
    pub fn default_tax_rate() -> Decimal {
        Decimal::new(15, 2)
    }

    /// Settings with defaults for everything but the database path.
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            tax_rate: Self::default_tax_rate(),
            batch_limit: MAX_BATCH_OPERATIONS,
        }
    }

    /// Read settings from the process environment, honouring a `.env` file.
    pub fn from_env() -> ConfigResult<Self> {
        // .env is optional
        let _ = dotenvy::dotenv();

        let database_path = env::var(DATABASE_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::DatabaseNotConfigured)?;

        let mut config = Self::new(database_path);
        if let Ok(raw) = env::var(TAX_RATE_ENV) {
            config.tax_rate = parse_tax_rate(&raw)?;
        }
        if let Ok(raw) = env::var(BATCH_LIMIT_ENV) {
            config.batch_limit = parse_batch_limit(&raw)?;
        }
        Ok(config)
    }

    /// Settings for the admin scripts, which only ever touch an existing
    /// database.
    pub fn for_scripts(database_path: impl AsRef<Path>, batch_limit: usize) -> ConfigResult<Self> {
        let config = Self {
            batch_limit: batch_limit.clamp(1, MAX_BATCH_OPERATIONS),
            ..Self::new(database_path.as_ref())
        };
        config.require_existing_database()?;
        Ok(config)
    }

    pub fn require_existing_database(&self) -> ConfigResult<()> {
        if !self.database_path.is_file() {
            return Err(ConfigError::MissingDatabase(self.database_path.clone()));
        }
        Ok(())
    }
}

/// Parse a tax rate fraction in `[0, 1)`.
pub fn parse_tax_rate(raw: &str) -> ConfigResult<Decimal> {
    let invalid = || ConfigError::InvalidValue {
        name: TAX_RATE_ENV,
        value: raw.to_string(),
    };
    let rate: Decimal = raw.trim().parse().map_err(|_| invalid())?;
    if rate < Decimal::ZERO || rate >= Decimal::ONE {
        return Err(invalid());
    }
    Ok(rate)
}

fn parse_batch_limit(raw: &str) -> ConfigResult<usize> {
    match raw.trim().parse::<usize>() {
        Ok(limit) if (1..=MAX_BATCH_OPERATIONS).contains(&limit) => Ok(limit),
        _ => Err(ConfigError::InvalidValue {
            name: BATCH_LIMIT_ENV,
            value: raw.to_string(),
        }),
    }
}
