use std::path::{Path, PathBuf};

use crate::config::schema::ReviewConfig;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

/// Overrides `database_path`.
pub const ENV_DATABASE_PATH: &str = "BOXREVIEW_DATABASE_PATH";
/// Overrides `logging.level`.
pub const ENV_LOG: &str = "BOXREVIEW_LOG";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ReviewConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

/// Parses, schema-checks and validates a config, then applies environment
/// overrides.
pub fn load_config_from_str(content: &str) -> Result<ReviewConfig, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let mut config: ReviewConfig = serde_json::from_value(json_value)?;
    apply_env_overrides(&mut config);

    validate_config(&config)?;

    Ok(config)
}

pub fn apply_env_overrides(config: &mut ReviewConfig) {
    if let Some(path) = non_empty_env(ENV_DATABASE_PATH) {
        log::debug!("{} overrides database path", ENV_DATABASE_PATH);
        config.database_path = Some(PathBuf::from(path));
    }
    if let Some(level) = non_empty_env(ENV_LOG) {
        config.logging.level = level;
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &ReviewConfig) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }
    if config.queue.lease_seconds == 0 {
        return Err(ConfigError::Validation {
            message: "queue.lease_seconds must be at least 1".to_string(),
        });
    }
    if config.queue.scan_page_size == 0 {
        return Err(ConfigError::Validation {
            message: "queue.scan_page_size must be at least 1".to_string(),
        });
    }
    if let Err(e) = tracing_subscriber::EnvFilter::try_new(&config.logging.level) {
        return Err(ConfigError::Validation {
            message: format!("Invalid logging.level '{}': {}", config.logging.level, e),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogFormat;
    use serial_test::serial;

    fn clear_env() {
        std::env::remove_var(ENV_DATABASE_PATH);
        std::env::remove_var(ENV_LOG);
    }

    #[test]
    #[serial]
    fn test_load_minimal_config_uses_defaults() {
        clear_env();
        let config = load_config_from_str(r#"{ "version": "1.0" }"#).unwrap();
        assert_eq!(config.queue.lease_seconds, 300);
        assert_eq!(config.queue.scan_page_size, 100);
        assert!(config.queue.release_prior_locks);
        assert_eq!(config.queue.lease(), chrono::Duration::minutes(5));
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Text);
        assert!(config.database_path.is_none());
    }

    #[test]
    #[serial]
    fn test_load_full_config() {
        clear_env();
        let config_json = r#"
        {
            "version": "1.0",
            "database_path": "/var/lib/boxreview/review.db",
            "queue": {
                "lease_seconds": 120,
                "scan_page_size": 25,
                "release_prior_locks": false
            },
            "logging": { "level": "boxreview=debug", "format": "json" }
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(
            config.database_path,
            Some(PathBuf::from("/var/lib/boxreview/review.db"))
        );
        assert_eq!(config.queue.lease_seconds, 120);
        assert_eq!(config.queue.scan_page_size, 25);
        assert!(!config.queue.release_prior_locks);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    #[serial]
    fn test_schema_rejects_unknown_fields_and_bad_values() {
        clear_env();
        let unknown = load_config_from_str(r#"{ "version": "1.0", "workers": 4 }"#);
        assert!(matches!(unknown, Err(ConfigError::SchemaValidation { .. })));

        let zero_lease =
            load_config_from_str(r#"{ "version": "1.0", "queue": { "lease_seconds": 0 } }"#);
        assert!(matches!(zero_lease, Err(ConfigError::SchemaValidation { .. })));

        let bad_format =
            load_config_from_str(r#"{ "version": "1.0", "logging": { "format": "xml" } }"#);
        assert!(matches!(bad_format, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    #[serial]
    fn test_unsupported_version() {
        clear_env();
        let result = load_config_from_str(r#"{ "version": "2.0" }"#);
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_invalid_json() {
        clear_env();
        assert!(matches!(
            load_config_from_str("{ not json"),
            Err(ConfigError::ParseJson(_))
        ));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        std::env::set_var(ENV_DATABASE_PATH, "/tmp/override.db");
        std::env::set_var(ENV_LOG, "warn");

        let config = load_config_from_str(r#"{ "version": "1.0", "database_path": "/a.db" }"#);
        clear_env();

        let config = config.unwrap();
        assert_eq!(
            config.database_path,
            Some(PathBuf::from("/tmp/override.db"))
        );
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    #[serial]
    fn test_load_config_from_file() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("boxreview.json");
        let json = r#"{ "version": "1.0", "queue": { "lease_seconds": 60 } }"#;
        std::fs::write(&path, json).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.queue.lease_seconds, 60);

        let missing = load_config(dir.path().join("missing.json"));
        assert!(matches!(missing, Err(ConfigError::ReadFile { .. })));
    }
}
