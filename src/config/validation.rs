//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate prefixes, upstream target, value ranges
//! - Detect prefixes that shadow each other
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `proxy.prefix`.
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

impl std::error::Error for ValidationError {}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    check_prefix("proxy.prefix", &config.proxy.prefix, &mut errors);
    check_prefix("api.prefix", &config.api.prefix, &mut errors);

    if shadows(&config.proxy.prefix, &config.api.prefix)
        || shadows(&config.api.prefix, &config.proxy.prefix)
    {
        errors.push(ValidationError::new(
            "api.prefix",
            format!(
                "'{}' overlaps the proxy prefix '{}'",
                config.api.prefix, config.proxy.prefix
            ),
        ));
    }

    if !config.proxy.rewrite.starts_with('/') {
        errors.push(ValidationError::new("proxy.rewrite", "must start with '/'"));
    }

    match Url::parse(&config.proxy.target) {
        Ok(url) => {
            if !matches!(url.scheme(), "http" | "https") {
                errors.push(ValidationError::new(
                    "proxy.target",
                    format!("unsupported scheme '{}'", url.scheme()),
                ));
            }
            if url.host_str().is_none() {
                errors.push(ValidationError::new("proxy.target", "missing host"));
            }
        }
        Err(e) => errors.push(ValidationError::new("proxy.target", e.to_string())),
    }

    if config.discovery.keyword.is_empty() {
        errors.push(ValidationError::new("discovery.keyword", "must not be empty"));
    }
    if config.discovery.root.is_empty() {
        errors.push(ValidationError::new("discovery.root", "must not be empty"));
    }

    if config.cors.allowed_origins.iter().any(|o| o.trim().is_empty()) {
        errors.push(ValidationError::new(
            "cors.allowed_origins",
            "entries must not be empty",
        ));
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::new("timeouts.connect_secs", "must be > 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_prefix(field: &'static str, prefix: &str, errors: &mut Vec<ValidationError>) {
    if !prefix.starts_with('/') {
        errors.push(ValidationError::new(field, "must start with '/'"));
    } else if prefix == "/" {
        errors.push(ValidationError::new(field, "must not be the root path"));
    } else if prefix.ends_with('/') {
        errors.push(ValidationError::new(field, "must not end with '/'"));
    }
}

/// True if every path under `inner` is also under `outer` (segment-aware).
fn shadows(outer: &str, inner: &str) -> bool {
    match inner.strip_prefix(outer) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
