//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that public paths are well-formed and do not collide
//! - Guarantee that rewritten output never re-matches a rewrite pattern
//! - Validate value ranges (timeouts > 0, known enum-like strings)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;
use url::Url;

use crate::config::schema::RelayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: `{value}` must start with '/' and must not end with '/'")]
    BadMountPath { field: String, value: String },

    #[error("{field}: `{value}` must start and end with '/'")]
    BadRoutePattern { field: String, value: String },

    #[error("{field}: `{value}` is not an http(s) origin")]
    BadOrigin { field: String, value: String },

    #[error("public path `{0}` is used more than once")]
    DuplicatePath(String),

    #[error("public path `{path}` falls under rewrite pattern `{pattern}`")]
    PathShadowsPattern { path: String, pattern: String },

    #[error("{field}: `{value}` is not one of {allowed}")]
    UnknownValue {
        field: String,
        value: String,
        allowed: &'static str,
    },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("login.password is set but login.email is empty")]
    PasswordWithoutEmail,
}

/// Validate the whole configuration, collecting every error.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let relay = &config.relay;

    let mut public_paths = vec![
        ("relay.prefix".to_string(), relay.prefix.clone()),
        ("relay.static_alias".to_string(), relay.static_alias.clone()),
    ];
    for (i, host) in relay.hosts.iter().enumerate() {
        public_paths.push((format!("relay.hosts[{}].mount", i), host.mount.clone()));
        check_origin(&format!("relay.hosts[{}].origin", i), &host.origin, &mut errors);
    }

    let mut seen = HashSet::new();
    for (field, path) in &public_paths {
        if !is_mount_path(path) {
            errors.push(ValidationError::BadMountPath {
                field: field.clone(),
                value: path.clone(),
            });
        }
        if !seen.insert(path.as_str()) {
            errors.push(ValidationError::DuplicatePath(path.clone()));
        }
    }

    check_origin("relay.upstream", &relay.upstream, &mut errors);

    for (field, patterns) in [
        ("relay.app_routes", &relay.app_routes),
        ("relay.static_roots", &relay.static_roots),
    ] {
        for pattern in patterns {
            if !(pattern.len() > 1 && pattern.starts_with('/') && pattern.ends_with('/')) {
                errors.push(ValidationError::BadRoutePattern {
                    field: field.to_string(),
                    value: pattern.clone(),
                });
                continue;
            }
            // A public path under a pattern would be rewritten a second time.
            for (_, path) in &public_paths {
                if format!("{}/", path).starts_with(pattern.as_str()) {
                    errors.push(ValidationError::PathShadowsPattern {
                        path: path.clone(),
                        pattern: pattern.clone(),
                    });
                }
            }
        }
    }

    if let Some(scheme) = &relay.public_scheme {
        if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
            errors.push(ValidationError::UnknownValue {
                field: "relay.public_scheme".to_string(),
                value: scheme.clone(),
                allowed: "http, https",
            });
        }
    }

    if !config.login.password.is_empty() && config.login.email.is_empty() {
        errors.push(ValidationError::PasswordWithoutEmail);
    }
    if let Some(source) = &config.login.source_url {
        check_origin("login.source_url", source, &mut errors);
    }
    if config.login.max_attempts == 0 {
        errors.push(ValidationError::Zero("login.max_attempts"));
    }
    if config.login.interval_ms == 0 {
        errors.push(ValidationError::Zero("login.interval_ms"));
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.connect_secs"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.request_secs"));
    }
    if config.listener.max_body_size == 0 {
        errors.push(ValidationError::Zero("listener.max_body_size"));
    }

    let format = config.observability.log_format.as_str();
    if format != "pretty" && format != "json" {
        errors.push(ValidationError::UnknownValue {
            field: "observability.log_format".to_string(),
            value: format.to_string(),
            allowed: "pretty, json",
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_mount_path(path: &str) -> bool {
    path.len() > 1 && path.starts_with('/') && !path.ends_with('/') && !path.contains("//")
}

fn check_origin(field: &str, value: &str, errors: &mut Vec<ValidationError>) {
    let valid = Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or(false);
    if !valid {
        errors.push(ValidationError::BadOrigin {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::HostMount;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&RelayConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = RelayConfig::default();
        config.relay.prefix = "relay/".to_string();
        config.relay.upstream = "ftp://upstream.test".to_string();
        config.timeouts.request_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::Zero("timeouts.request_secs")));
    }

    #[test]
    fn test_mount_under_app_route_is_rejected() {
        let mut config = RelayConfig::default();
        config.relay.hosts.push(HostMount {
            origin: "https://identity.test".to_string(),
            mount: "/app/identity".to_string(),
            forward_headers: Vec::new(),
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::PathShadowsPattern {
                path: "/app/identity".to_string(),
                pattern: "/app/".to_string(),
            }]
        );
    }

    #[test]
    fn test_duplicate_mount_is_rejected() {
        let mut config = RelayConfig::default();
        config.relay.static_alias = config.relay.prefix.clone();

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::DuplicatePath("/elevenlabs".to_string())));
    }

    #[test]
    fn test_password_requires_email() {
        let mut config = RelayConfig::default();
        config.login.password = "secret".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::PasswordWithoutEmail]);
    }
}
