// ⚙️ Configuration - data directory, export directory and log level
//
// Read from the process environment, with a `.env` file loaded first when
// present:
//   MEAL_DATA_DIR    directory holding the CSV collections (default ./data)
//   MEAL_EXPORT_DIR  where exports are written (default <data>/exports)
//   MEAL_LOG_LEVEL   default tracing level (default info, RUST_LOG wins)

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;

pub const DATA_DIR_VAR: &str = "MEAL_DATA_DIR";
pub const EXPORT_DIR_VAR: &str = "MEAL_EXPORT_DIR";
pub const LOG_LEVEL_VAR: &str = "MEAL_LOG_LEVEL";

const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("environment variable {0} is set but empty")]
    EmptyVar(&'static str),

    #[error("invalid log level {0:?} (expected off, error, warn, info, debug or trace)")]
    InvalidLogLevel(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub export_dir: PathBuf,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = PathBuf::from(DEFAULT_DATA_DIR);
        AppConfig {
            export_dir: data_dir.join("exports"),
            data_dir,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from `.env` and the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &'static str| -> Result<Option<String>, ConfigError> {
            match lookup(key) {
                Some(value) if value.trim().is_empty() => Err(ConfigError::EmptyVar(key)),
                Some(value) => Ok(Some(value.trim().to_string())),
                None => Ok(None),
            }
        };

        let data_dir = non_empty(DATA_DIR_VAR)?
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        let export_dir = non_empty(EXPORT_DIR_VAR)?
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("exports"));

        let log_level = non_empty(LOG_LEVEL_VAR)?
            .map(|level| level.to_lowercase())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
        if LevelFilter::from_str(&log_level).is_err() {
            return Err(ConfigError::InvalidLogLevel(log_level));
        }

        Ok(AppConfig {
            data_dir,
            export_dir,
            log_level,
        })
    }

    /// Same configuration rooted at another data directory. The export
    /// directory follows unless it was set explicitly.
    pub fn with_data_dir(mut self, data_dir: PathBuf) -> Self {
        if self.export_dir == self.data_dir.join("exports") {
            self.export_dir = data_dir.join("exports");
        }
        self.data_dir = data_dir;
        self
    }
}
