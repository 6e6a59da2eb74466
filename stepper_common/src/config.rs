//! Configuration loading traits and types.
//!
//! Every stepper configuration file is TOML. Any `serde` deserializable
//! struct can be loaded through the blanket [`ConfigLoader`] impl.
//!
//! ```rust,no_run
//! use stepper_common::config::{ConfigError, ConfigLoader};
//! use stepper_common::motion::config::StepperConfig;
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = StepperConfig::load(Path::new("stepper.toml"))?;
//!     config.validate()?;
//!     println!("{} axes", config.axes.len());
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, per-movement tracing.
    Trace,
    /// Planning decisions and queue activity.
    Debug,
    /// Lifecycle messages.
    #[default]
    Info,
    /// Rejected requests, emergency stops.
    Warn,
    /// Fatal errors only.
    Error,
}

impl LogLevel {
    /// Directive string usable with `tracing_subscriber::EnvFilter`.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Common fields embedded in every application-level configuration.
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "mill-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Machine instance identifier.
    pub service_name: String,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            service_name: "stepper".to_string(),
        }
    }
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation: any deserializable struct is loadable.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
