//! Upstream target and path rewriting.
//!
//! ```text
//! prefix  = /proxy, rewrite = /, target = https://login.swiftkanban.com/restapi
//! /proxy/v1/users?x=1  →  https://login.swiftkanban.com/restapi/v1/users?x=1
//! ```

use url::Url;

use crate::config::ProxyConfig;
use crate::proxy::ProxyError;

/// The single fixed upstream and the rule mapping client paths onto it.
#[derive(Debug, Clone)]
pub struct Upstream {
    target: Url,
    prefix: String,
    rewrite: String,
}

impl Upstream {
    pub fn new(target: &str, prefix: &str, rewrite: &str) -> Result<Self, ProxyError> {
        let target = Url::parse(target).map_err(|e| ProxyError::InvalidTarget {
            target: target.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(target.scheme(), "http" | "https") {
            return Err(ProxyError::InvalidTarget {
                target: target.to_string(),
                reason: format!("unsupported scheme '{}'", target.scheme()),
            });
        }
        if target.host_str().is_none() {
            return Err(ProxyError::InvalidTarget {
                target: target.to_string(),
                reason: "missing host".to_string(),
            });
        }

        Ok(Self {
            target,
            prefix: prefix.trim_end_matches('/').to_string(),
            rewrite: rewrite.to_string(),
        })
    }

    pub fn from_config(config: &ProxyConfig) -> Result<Self, ProxyError> {
        Self::new(&config.target, &config.prefix, &config.rewrite)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    /// Strip the prefix (on a segment boundary) and apply the rewrite.
    /// Returns `None` for paths outside the prefix.
    pub fn rewrite_path(&self, path: &str) -> Option<String> {
        let rest = path.strip_prefix(&self.prefix)?;
        if !(rest.is_empty() || rest.starts_with('/')) {
            return None;
        }

        let replacement = self.rewrite.trim_end_matches('/');
        let rewritten = format!("{}{}", replacement, rest);
        if rewritten.is_empty() {
            Some("/".to_string())
        } else if rewritten.starts_with('/') {
            Some(rewritten)
        } else {
            Some(format!("/{}", rewritten))
        }
    }

    /// Absolute upstream URL for an already rewritten path.
    pub fn http_url(&self, rewritten: &str, query: Option<&str>) -> Url {
        let mut url = self.target.clone();
        let base = self.target.path().trim_end_matches('/');
        url.set_path(&format!("{}{}", base, rewritten));
        url.set_query(query);
        url
    }

    /// WebSocket URL for an already rewritten path (`https` → `wss`).
    pub fn ws_url(&self, rewritten: &str, query: Option<&str>) -> Url {
        let mut url = self.http_url(rewritten, query);
        let scheme = if self.target.scheme() == "https" { "wss" } else { "ws" };
        // http(s) → ws(s) is always an allowed scheme change
        let _ = url.set_scheme(scheme);
        url
    }
}
