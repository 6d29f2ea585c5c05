//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts within bounds, addresses parse)
//! - Check the auth header and tokens are usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use axum::http::HeaderName;
use tracing_subscriber::EnvFilter;

use crate::config::schema::{AppConfig, StoreBackend, MAX_REQUEST_SECS};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// A socket address, or a host name followed by a port. Names are resolved
/// when the listener binds.
fn is_bind_address(value: &str) -> bool {
    if value.parse::<SocketAddr>().is_ok() {
        return true;
    }
    let Some((host, port)) = value.rsplit_once(':') else {
        return false;
    };
    !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        && port.parse::<u16>().is_ok()
}

/// Check every semantic constraint, collecting all failures.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !is_bind_address(&config.listener.bind_address) {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("`{}` is not an `ip:port` or `host:port` address", config.listener.bind_address),
        ));
    }

    let request_secs = config.timeouts.request_secs;
    if request_secs == 0 || request_secs > MAX_REQUEST_SECS {
        errors.push(ValidationError::new(
            "timeouts.request_secs",
            format!("must be between 1 and {MAX_REQUEST_SECS}"),
        ));
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be greater than 0"));
    }

    let auth = &config.auth;
    if HeaderName::from_bytes(auth.header.as_bytes()).is_err() {
        errors.push(ValidationError::new(
            "auth.header",
            format!("`{}` is not a valid header name", auth.header),
        ));
    }
    if auth.scheme.chars().any(char::is_whitespace) {
        errors.push(ValidationError::new("auth.scheme", "must not contain whitespace"));
    }
    for path in &auth.public_paths {
        if !path.starts_with('/') {
            errors.push(ValidationError::new(
                "auth.public_paths",
                format!("`{path}` must start with '/'"),
            ));
        }
    }

    let mut seen = HashSet::new();
    for (i, token) in auth.tokens.iter().enumerate() {
        if token.token.is_empty() || token.token.chars().any(char::is_whitespace) {
            errors.push(ValidationError::new(
                format!("auth.tokens[{i}].token"),
                "must be non-empty and contain no whitespace",
            ));
        }
        if token.subject.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("auth.tokens[{i}].subject"),
                "must not be empty",
            ));
        }
        if !seen.insert(token.token.as_str()) {
            errors.push(ValidationError::new(
                format!("auth.tokens[{i}].token"),
                "duplicate token",
            ));
        }
    }

    if config.store.backend == StoreBackend::Sqlite && config.store.sqlite_path.as_os_str().is_empty() {
        errors.push(ValidationError::new(
            "store.sqlite_path",
            "required when backend = \"sqlite\"",
        ));
    }

    let observability = &config.observability;
    if EnvFilter::try_new(&observability.log_level).is_err() {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("`{}` is not a valid filter directive", observability.log_level),
        ));
    }
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("`{}` is not a socket address", observability.metrics_address),
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
    use crate::config::schema::TokenConfig;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn reports_every_error() {
        let mut config = AppConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.timeouts.request_secs = 0;
        config.auth.header = "bad header".into();
        config.auth.public_paths.push("health".into());

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "timeouts.request_secs",
                "auth.header",
                "auth.public_paths"
            ]
        );
    }

    #[test]
    fn bind_address_accepts_host_names() {
        for ok in ["0.0.0.0:8000", "[::1]:8000", "localhost:8000", "chat-history.internal:80"] {
            assert!(is_bind_address(ok), "{ok}");
        }
        for bad in ["localhost", ":8000", "localhost:", "localhost:99999", "bad host:80"] {
            assert!(!is_bind_address(bad), "{bad}");
        }

        let mut config = AppConfig::default();
        config.listener.bind_address = "localhost:8000".into();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn request_timeout_is_bounded() {
        let mut config = AppConfig::default();
        config.timeouts.request_secs = MAX_REQUEST_SECS;
        assert!(validate_config(&config).is_ok());

        for secs in [MAX_REQUEST_SECS + 1, u64::MAX] {
            config.timeouts.request_secs = secs;
            let errors = validate_config(&config).unwrap_err();
            assert_eq!(errors[0].field, "timeouts.request_secs");
        }
    }

    #[test]
    fn rejects_bad_tokens() {
        let mut config = AppConfig::default();
        config.auth.tokens = vec![
            TokenConfig { token: "a b".into(), subject: "x".into() },
            TokenConfig { token: "t".into(), subject: " ".into() },
            TokenConfig { token: "t".into(), subject: "y".into() },
        ];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[2].message, "duplicate token");
    }

    #[test]
    fn sqlite_requires_path() {
        let mut config = AppConfig::default();
        config.store.backend = StoreBackend::Sqlite;
        config.store.sqlite_path = Default::default();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "store.sqlite_path");
    }

    #[test]
    fn metrics_address_checked_only_when_enabled() {
        let mut config = AppConfig::default();
        config.observability.metrics_address = "nope".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
