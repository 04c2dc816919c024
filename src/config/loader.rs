//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::EngineConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

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

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<EngineConfig, ConfigError> {
    let config: EngineConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LogFormat;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert!(config.resolver.root_namespaces.is_empty());
        assert_eq!(config.watch.debounce_ms, 250);
        assert_eq!(config.admin.bind_address, "127.0.0.1:8081");
    }

    #[test]
    fn test_full_config() {
        let config = parse_config(
            r#"
            [resolver]
            root_namespaces = ["ingress-roots"]
            snapshot_path = "snapshot.toml"

            [watch]
            enabled = false

            [admin]
            api_key = "secret"

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.resolver.root_namespaces, vec!["ingress-roots"]);
        assert!(!config.watch.enabled);
        assert_eq!(config.admin.api_key.as_deref(), Some("secret"));
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = parse_config(
            r#"
            [admin]
            bind_address = "not an address"
            request_timeout_secs = 0
            "#,
        )
        .unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {}", other),
        }
    }
}
