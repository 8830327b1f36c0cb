//! Environment-based configuration.
//!
//! # Responsibility
//! - Collect the process configuration from `ORGDIR_*` environment
//!   variables in one place.
//!
//! # Invariants
//! - The core never consumes `api_key` itself; it is surfaced for the
//!   presentation collaborator.

use crate::logging::default_log_level;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "ORGDIR_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "ORGDIR_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "ORGDIR_LOG_DIR";
pub const ENV_API_KEY: &str = "ORGDIR_API_KEY";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug)]
pub enum ConfigError {
    MissingVar(&'static str),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingVar(name) => write!(f, "missing environment variable `{name}`"),
        }
    }
}

impl Error for ConfigError {}

/// Process configuration resolved from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    /// File logging stays disabled when unset.
    pub log_dir: Option<PathBuf>,
    /// Consumed by the presentation collaborator, not by core.
    pub api_key: Option<String>,
}

impl AppConfig {
    /// Reads configuration from the environment.
    ///
    /// # Errors
    /// - [`ConfigError::MissingVar`] when `ORGDIR_DB_PATH` is unset or
    ///   blank.
    pub fn from_env() -> ConfigResult<Self> {
        let db_path = non_blank_var(ENV_DB_PATH).ok_or(ConfigError::MissingVar(ENV_DB_PATH))?;

        Ok(Self {
            db_path: PathBuf::from(db_path),
            log_level: non_blank_var(ENV_LOG_LEVEL)
                .unwrap_or_else(|| default_log_level().to_string()),
            log_dir: non_blank_var(ENV_LOG_DIR).map(PathBuf::from),
            api_key: non_blank_var(ENV_API_KEY),
        })
    }
}

fn non_blank_var(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}
