//! Route table construction and dispatch.
//!
//! # Responsibilities
//! - Resolve discovered modules against the registry
//! - Store mounted routes in mount order
//! - Turn the table into the axum router nested under the API prefix
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - First mount wins when two paths collide; the loser is recorded, not mounted
//! - Explicit errors rather than silently skipping modules

use std::collections::HashSet;

use axum::routing::MethodRouter;
use axum::Router;
use thiserror::Error;

use crate::routing::discovery::DiscoveredModule;
use crate::routing::registry::ModuleRegistry;

#[derive(Debug, Error)]
pub enum MountError {
    #[error("module {module_id} ({path}) does not expose a registered router")]
    MissingHandler { module_id: String, path: String },

    #[error("module {module_id} declares invalid path '{route}': {reason}")]
    InvalidPath {
        module_id: String,
        route: String,
        reason: &'static str,
    },

    #[error("invalid mount prefix '{0}'")]
    InvalidPrefix(String),
}

/// One entry of the route table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountedRoute {
    /// Identifier of the module that contributed the route.
    pub module: String,
    /// Sub-path relative to the mount prefix.
    pub path: String,
}

/// Ordered, immutable set of mounted routes.
pub struct RouteTable {
    prefix: String,
    mounted: Vec<(MountedRoute, MethodRouter)>,
    shadowed: Vec<MountedRoute>,
}

impl RouteTable {
    /// Mount prefix, e.g. `/api`.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Mounted routes in mount order.
    pub fn routes(&self) -> impl Iterator<Item = &MountedRoute> {
        self.mounted.iter().map(|(route, _)| route)
    }

    /// Routes that lost to an earlier mount of the same path.
    pub fn shadowed(&self) -> &[MountedRoute] {
        &self.shadowed
    }

    pub fn len(&self) -> usize {
        self.mounted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounted.is_empty()
    }

    /// Build the router of mounted handlers. Paths stay relative to the
    /// prefix; the pipeline nests the result under `prefix()`.
    pub fn into_router(self) -> Router {
        self.mounted
            .into_iter()
            .fold(Router::new(), |router, (route, handler)| router.route(&route.path, handler))
    }
}

impl std::fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteTable")
            .field("prefix", &self.prefix)
            .field("routes", &self.routes().collect::<Vec<_>>())
            .field("shadowed", &self.shadowed)
            .finish()
    }
}

/// Resolve every discovered module and mount its routes under `prefix`.
pub fn mount(
    prefix: &str,
    discovered: &[DiscoveredModule],
    registry: &ModuleRegistry,
) -> Result<RouteTable, MountError> {
    if !prefix.starts_with('/') || prefix == "/" || prefix.ends_with('/') {
        return Err(MountError::InvalidPrefix(prefix.to_string()));
    }

    let mut seen = HashSet::new();
    let mut mounted = Vec::new();
    let mut shadowed = Vec::new();

    for module in discovered {
        let handler = registry
            .resolve(&module.module_id)
            .ok_or_else(|| MountError::MissingHandler {
                module_id: module.module_id.clone(),
                path: module.path.display().to_string(),
            })?;

        let routes = handler.router();
        if routes.is_empty() {
            tracing::warn!(module = %module.module_id, "Route module exposes no routes");
        }

        for (path, method_router) in routes.into_entries() {
            if let Err(reason) = check_path(&path) {
                return Err(MountError::InvalidPath {
                    module_id: module.module_id.clone(),
                    route: path,
                    reason,
                });
            }

            let route = MountedRoute {
                module: module.module_id.clone(),
                path,
            };

            if seen.insert(route_key(&route.path)) {
                tracing::info!(
                    module = %route.module,
                    path = %format!("{}{}", prefix, route.path),
                    "Mounted route"
                );
                mounted.push((route, method_router));
            } else {
                tracing::warn!(
                    module = %route.module,
                    path = %route.path,
                    "Route already mounted by an earlier module, skipping"
                );
                shadowed.push(route);
            }
        }
    }

    Ok(RouteTable {
        prefix: prefix.to_string(),
        mounted,
        shadowed,
    })
}

/// Reject paths the axum router would panic on when the table is built.
fn check_path(path: &str) -> Result<(), &'static str> {
    if !path.starts_with('/') {
        return Err("paths must start with '/'");
    }

    let segments: Vec<&str> = path.split('/').skip(1).collect();
    for (i, segment) in segments.iter().enumerate() {
        if segment.starts_with(':') {
            return Err("parameters are written `{name}`, not `:name`");
        }
        if segment.starts_with('*') {
            return Err("wildcards are written `{*name}`, not `*name`");
        }
        if segment.matches('{').count() != segment.matches('}').count() {
            return Err("unbalanced braces");
        }
        if segment.contains("{}") || segment.contains("{*}") {
            return Err("parameters need a name");
        }
        if segment.starts_with("{*") && i + 1 != segments.len() {
            return Err("a wildcard must be the last segment");
        }
    }
    Ok(())
}

/// Collision key: parameter names do not distinguish routes, so
/// `/users/{id}` and `/users/{name}` share a key.
fn route_key(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if segment.starts_with("{*") {
                "{*}"
            } else if segment.starts_with('{') && segment.ends_with('}') {
                "{}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
