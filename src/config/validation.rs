//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges and addresses
//! - Detect duplicate overlay roots
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function: `ServerConfig → Result<(), Vec<ValidationError>>`
//! - Runs before the config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use super::schema::ServerConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid bind address `{0}`")]
    InvalidBindAddress(String),
    #[error("duplicate component root `{0}`")]
    DuplicateRoot(String),
    #[error("request timeout must be greater than zero")]
    ZeroTimeout,
    #[error("body limit must be greater than zero")]
    ZeroBodyLimit,
    #[error("session cookie name must not be empty")]
    EmptyCookieName,
    #[error("session ttl must be greater than zero")]
    ZeroSessionTtl,
    #[error("socket path `{0}` must start with `/`")]
    InvalidSocketPath(String),
    #[error("invalid metrics address `{0}`")]
    InvalidMetricsAddress(String),
}

/// Validate the whole config, collecting every violation.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    let mut seen = HashSet::new();
    for root in &config.components.roots {
        if !seen.insert(root.as_str()) {
            errors.push(ValidationError::DuplicateRoot(root.clone()));
        }
    }

    if config.limits.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }
    if config.limits.body_limit_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }
    if config.session.cookie_name.is_empty() {
        errors.push(ValidationError::EmptyCookieName);
    }
    if config.session.ttl_secs == 0 {
        errors.push(ValidationError::ZeroSessionTtl);
    }
    if config.socket.enabled && !config.socket.path.starts_with('/') {
        errors.push(ValidationError::InvalidSocketPath(config.socket.path.clone()));
    }
    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn every_violation_is_reported() {
        let mut config = ServerConfig::default();
        config.listener.bind_address = "nonsense".to_string();
        config.limits.request_timeout_secs = 0;
        config.session.cookie_name = String::new();
        config.socket.path = "socket".to_string();
        config.components.roots =
            vec!["/srv/app".to_string(), "/srv/app".to_string()];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors.contains(&ValidationError::ZeroTimeout));
        assert!(errors.contains(&ValidationError::EmptyCookieName));
        assert!(errors.contains(&ValidationError::DuplicateRoot("/srv/app".to_string())));
    }
}
