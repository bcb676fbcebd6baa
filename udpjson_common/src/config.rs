//! Configuration loading traits and types.
//!
//! Every udpjson binary reads a single TOML document. This module holds the
//! pieces that are not specific to one binary: the error type, the log
//! level enum, the `[shared]` section and the loader traits.
//!
//! # Usage
//!
//! ```rust,no_run
//! use udpjson_common::config::{ConfigError, ConfigLoader, SharedConfig};
//! use serde::Deserialize;
//! use std::path::Path;
//!
//! #[derive(Debug, Deserialize)]
//! struct MyAppConfig {
//!     shared: SharedConfig,
//!     port: u16,
//! }
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = MyAppConfig::load(Path::new("udpjson.toml"))?;
//!     println!("Service: {}", config.shared.service_name);
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::consts::DEFAULT_SERVICE_NAME;

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
    /// Most verbose, per-datagram tracing.
    Trace,
    /// Dropped messages and decoded record summaries.
    Debug,
    /// Lifecycle events.
    #[default]
    Info,
    /// Degraded but running (e.g. interface binding failed).
    Warn,
    /// Channel setup failures.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// The `[shared]` section present in every udpjson configuration file.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "udpjson-meta-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Instance identifier shown in startup log lines.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_service_name() -> String {
    DEFAULT_SERVICE_NAME.to_string()
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: default_service_name(),
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
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML text or files.
///
/// Blanket-implemented for every `serde::de::DeserializeOwned` type.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if the file cannot be read or the TOML
///   is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Parse configuration from TOML text.
    fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(format!("{}: {}", path.display(), e))
            }
        })?;

        Self::from_toml_str(&content)
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

/// Semantic validation run after parsing.
pub trait Validate {
    /// Check cross-field constraints that serde cannot express.
    fn validate(&self) -> Result<(), ConfigError>;
}

/// Load a configuration file and run its [`Validate`] implementation.
pub fn load_validated<T>(path: &Path) -> Result<T, ConfigError>
where
    T: ConfigLoader + Validate,
{
    let config = T::load(path)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[derive(Debug, Deserialize)]
    struct TestConfig {
        shared: SharedConfig,
        port: u16,
    }

    impl Validate for TestConfig {
        fn validate(&self) -> Result<(), ConfigError> {
            if self.port == 0 {
                return Err(ConfigError::ValidationError("port is zero".into()));
            }
            self.shared.validate()
        }
    }

    #[test]
    fn log_level_round_trips_through_toml() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Wrapper {
            level: LogLevel,
        }

        for (text, level) in [
            ("trace", LogLevel::Trace),
            ("debug", LogLevel::Debug),
            ("info", LogLevel::Info),
            ("warn", LogLevel::Warn),
            ("error", LogLevel::Error),
        ] {
            let parsed: Wrapper = toml::from_str(&format!("level = \"{text}\"")).unwrap();
            assert_eq!(parsed.level, level);
            assert_eq!(level.as_directive(), text);
        }
    }

    #[test]
    fn shared_config_defaults() {
        let shared = SharedConfig::default();
        assert_eq!(shared.log_level, LogLevel::Info);
        assert_eq!(shared.service_name, DEFAULT_SERVICE_NAME);
        assert!(shared.validate().is_ok());
    }

    #[test]
    fn shared_config_rejects_blank_service_name() {
        let shared = SharedConfig {
            log_level: LogLevel::Info,
            service_name: "   ".to_string(),
        };
        assert!(matches!(
            shared.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn loader_reports_missing_file() {
        let result = TestConfig::load(Path::new("/nonexistent/udpjson.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound)));
    }

    #[test]
    fn loader_reports_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "port = [[[").unwrap();

        let result = TestConfig::load(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn load_validated_runs_validation() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"port = 0

[shared]
service_name = "test"
"#
        )
        .unwrap();
        file.flush().unwrap();

        let result = load_validated::<TestConfig>(file.path());
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn load_validated_success() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"port = 6000

[shared]
log_level = "debug"
"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = load_validated::<TestConfig>(file.path()).unwrap();
        assert_eq!(config.port, 6000);
        assert_eq!(config.shared.log_level, LogLevel::Debug);
        assert_eq!(config.shared.service_name, DEFAULT_SERVICE_NAME);
    }

    #[test]
    fn shared_section_rejects_unknown_keys() {
        let result = TestConfig::from_toml_str(
            r#"port = 1

[shared]
service_name = "x"
colour = "blue"
"#,
        );
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
