//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Deployment environment (controls request logging and hardening).
    pub environment: Environment,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Reverse proxy settings.
    pub proxy: ProxyConfig,

    /// Mounted handler settings.
    pub api: ApiConfig,

    /// Handler discovery settings.
    pub discovery: DiscoveryConfig,

    /// Cross-origin policy.
    pub cors: CorsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Deployment environment tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
    Test,
}

impl Environment {
    pub fn is_development(self) -> bool {
        self == Environment::Development
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }

    /// Parse an environment tag, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Environment::Development),
            "production" | "prod" => Some(Environment::Production),
            "test" => Some(Environment::Test),
            _ => None,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Test => "test",
        };
        f.write_str(tag)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Reverse proxy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Path prefix that triggers forwarding.
    pub prefix: String,

    /// Upstream origin, optionally with a base path.
    pub target: String,

    /// Replacement for the stripped prefix.
    pub rewrite: String,

    /// Proxy WebSocket upgrades on the prefix.
    pub websocket: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            prefix: "/proxy".to_string(),
            target: "https://login.swiftkanban.com/restapi".to_string(),
            rewrite: "/".to_string(),
            websocket: true,
        }
    }
}

/// Mounted handler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Prefix every discovered module is mounted under.
    pub prefix: String,

    /// Indentation of JSON error bodies (0 = compact).
    pub json_spaces: usize,

    /// Maximum request body accepted by mounted handlers.
    pub body_limit_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            prefix: "/api".to_string(),
            json_spaces: 4,
            body_limit_bytes: 100 * 1024,
        }
    }
}

/// Handler discovery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Directory scanned recursively at startup.
    pub root: String,

    /// Literal substring a file name must contain.
    pub keyword: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            root: "src/app".to_string(),
            keyword: "router".to_string(),
        }
    }
}

/// CORS policy mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CorsMode {
    /// Every origin is allowed.
    #[default]
    Open,
    /// Only listed origins are allowed; requests without `Origin` pass.
    AllowList,
}

/// Cross-origin policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    pub mode: CorsMode,

    /// Exact-match origins, checked in order.
    pub allowed_origins: Vec<String>,

    /// Request headers advertised in `Access-Control-Allow-Headers`.
    pub allowed_headers: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            mode: CorsMode::Open,
            allowed_origins: Vec::new(),
            allowed_headers: vec![
                "Origin".to_string(),
                "X-Requested-With".to_string(),
                "Content-Type".to_string(),
                "Accept".to_string(),
            ],
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed until response headers are available, in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log format; derived from the environment when unset.
    pub log_format: Option<LogFormat>,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: None,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

impl ObservabilityConfig {
    /// JSON in production, pretty everywhere else, unless set explicitly.
    pub fn effective_format(&self, environment: Environment) -> LogFormat {
        self.log_format.unwrap_or(if environment.is_production() {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = GatewayConfig::default();
        assert_eq!(config.proxy.prefix, "/proxy");
        assert_eq!(config.proxy.target, "https://login.swiftkanban.com/restapi");
        assert_eq!(config.api.prefix, "/api");
        assert_eq!(config.discovery.keyword, "router");
        assert_eq!(config.cors.mode, CorsMode::Open);
        assert_eq!(config.cors.allowed_headers.join(", "), "Origin, X-Requested-With, Content-Type, Accept");
    }

    #[test]
    fn test_partial_toml() {
        let config: GatewayConfig = toml::from_str(
            r#"
            environment = "production"

            [cors]
            mode = "allow_list"
            allowed_origins = ["https://app.example.com"]
            "#,
        )
        .unwrap();

        assert!(config.environment.is_production());
        assert_eq!(config.cors.mode, CorsMode::AllowList);
        assert_eq!(config.cors.allowed_origins, vec!["https://app.example.com"]);
        // Untouched sections keep their defaults
        assert_eq!(config.proxy.prefix, "/proxy");
        assert_eq!(config.cors.allowed_headers.len(), 4);
    }

    #[test]
    fn test_log_format_follows_environment() {
        let obs = ObservabilityConfig::default();
        assert_eq!(obs.effective_format(Environment::Production), LogFormat::Json);
        assert_eq!(obs.effective_format(Environment::Development), LogFormat::Pretty);

        let explicit = ObservabilityConfig {
            log_format: Some(LogFormat::Pretty),
            ..Default::default()
        };
        assert_eq!(explicit.effective_format(Environment::Production), LogFormat::Pretty);
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("Production"), Some(Environment::Production));
        assert_eq!(Environment::parse("dev"), Some(Environment::Development));
        assert_eq!(Environment::parse("staging"), None);
    }
}
