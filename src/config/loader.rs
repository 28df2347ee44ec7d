//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::RelayConfig;
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

/// Load and validate configuration from a TOML file, then apply the environment overlay.
pub fn load_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate TOML text, then apply the environment overlay.
pub fn parse_config(content: &str) -> Result<RelayConfig, ConfigError> {
    let config: RelayConfig = toml::from_str(content)?;
    finalize(config)
}

/// Build configuration from defaults plus the environment overlay.
pub fn load_from_env() -> Result<RelayConfig, ConfigError> {
    finalize(RelayConfig::default())
}

fn finalize(mut config: RelayConfig) -> Result<RelayConfig, ConfigError> {
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Overlay `RELAY_*` environment values onto the configuration.
///
/// Empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut RelayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("RELAY_BIND_ADDRESS") {
        config.listener.bind_address = v;
    }
    if let Some(v) = get("RELAY_UPSTREAM") {
        config.relay.upstream = v;
    }
    if let Some(v) = get("RELAY_PREFIX") {
        config.relay.prefix = v;
    }
    if let Some(v) = get("RELAY_LOGIN_EMAIL") {
        config.login.email = v;
    }
    if let Some(v) = get("RELAY_LOGIN_PASSWORD") {
        config.login.password = v;
    }
    if let Some(v) = get("RELAY_CREDENTIAL_SOURCE_URL") {
        config.login.source_url = Some(v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("RELAY_UPSTREAM", "https://mirror.test"),
            ("RELAY_LOGIN_EMAIL", "team@mirror.test"),
            ("RELAY_LOGIN_PASSWORD", ""),
        ]
        .into_iter()
        .collect();

        let mut config = RelayConfig::default();
        config.login.password = "from-file".to_string();
        apply_env_overrides(&mut config, |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.relay.upstream, "https://mirror.test");
        assert_eq!(config.login.email, "team@mirror.test");
        // Empty values never clobber the file.
        assert_eq!(config.login.password, "from-file");
    }

    #[test]
    fn test_load_config_reports_validation() {
        let dir = std::env::temp_dir().join(format!("html-relay-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.toml");
        fs::write(&path, "[timeouts]\nrequest_secs = 0\n").unwrap();

        match load_config(&path) {
            Err(ConfigError::Validation(errors)) => {
                assert!(errors.contains(&ValidationError::Zero("timeouts.request_secs")));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_example_config_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("relay.example.toml");
        let content = fs::read_to_string(path).unwrap();
        let config: RelayConfig = toml::from_str(&content).unwrap();

        assert!(validate_config(&config).is_ok());
        assert_eq!(config.relay.hosts, RelayConfig::default().relay.hosts);
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config(Path::new("/nonexistent/html-relay.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
