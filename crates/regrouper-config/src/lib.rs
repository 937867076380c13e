//! Configuration parsing and validation for regrouper
//!
//! Supports YAML or TOML configuration with:
//! - Versioned schema
//! - Backend connection settings
//! - An ordered list of classification categories
//! - Validation with clear error messages, plus non-fatal warnings

mod policy;
mod schema;
mod validation;

pub use policy::*;
pub use schema::*;
pub use validation::*;

use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(u32),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Config document format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// `.yaml`/`.yml` is YAML, anything else is TOML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Self::Yaml
            }
            _ => Self::Toml,
        }
    }
}

/// Load and validate configuration from a file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Policy> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    parse_config(&content, ConfigFormat::from_path(path))
}

/// Parse and validate configuration from a string
pub fn parse_config(content: &str, format: ConfigFormat) -> ConfigResult<Policy> {
    let raw: RawConfig = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(content)?,
        ConfigFormat::Toml => toml::from_str(content)?,
    };

    // Check version
    if raw.config_version != CURRENT_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion(raw.config_version));
    }

    // Validate
    let errors = validate_config(&raw);
    if !errors.is_empty() {
        return Err(ConfigError::ValidationFailed { errors });
    }

    let warnings = config_warnings(&raw);
    for warning in &warnings {
        warn!(%warning, "Configuration warning");
    }

    // Convert to policy
    Ok(Policy::from_raw(raw, warnings))
}

/// Current supported config version
pub const CURRENT_CONFIG_VERSION: u32 = 1;
