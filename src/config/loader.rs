//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading and option parsing.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML syntax or schema error.
    #[error("Parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON syntax or schema error.
    #[error("Parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// A recognized option held a value of the wrong type.
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Semantic validation failed.
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML or JSON file.
///
/// Files ending in `.json` are read as JSON, everything else as TOML.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config = parse_config(&content, is_json(path))?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    tracing::debug!(path = %path.display(), "Configuration file loaded");
    Ok(config)
}

/// Parse configuration text without validating it.
pub fn parse_config(content: &str, json: bool) -> Result<ServiceConfig, ConfigError> {
    if json {
        Ok(serde_json::from_str(content)?)
    } else {
        Ok(toml::from_str(content)?)
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_sections_parse() {
        let config = parse_config(
            r#"
            [connector]
            numThreads = 4
            listenPort = "12000-12010"
            auctionResource = "/bid"

            [connector.pingTimesByHostMs]
            "10.1.1.1" = 3.0

            [pipeline]
            fixedBidCpm = 1.5

            [requestLog]
            path = "/tmp/requests.log"
            "#,
            false,
        )
        .unwrap();

        assert_eq!(config.connector["numThreads"], 4);
        assert_eq!(config.connector["listenPort"], "12000-12010");
        assert_eq!(config.pipeline.fixed_bid_cpm, Some(1.5));
        let log = config.request_log.unwrap();
        assert_eq!(log.rotation_count, 10_000);
        assert!(validate_config(&parse_config("", false).unwrap()).is_ok());
    }

    #[test]
    fn json_config_parse() {
        let config = parse_config(
            r#"{ "connector": { "auctionVerb": "PUT" }, "admin": { "enabled": true } }"#,
            true,
        )
        .unwrap();
        assert_eq!(config.connector["auctionVerb"], "PUT");
        assert!(config.admin.enabled);
    }

    #[test]
    fn extension_selects_format() {
        assert!(is_json(Path::new("connector.JSON")));
        assert!(!is_json(Path::new("connector.toml")));
        assert!(!is_json(Path::new("connector")));
    }
}
