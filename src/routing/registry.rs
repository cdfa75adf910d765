//! Route module registry.
//!
//! Every discoverable module registers itself here under the identifier that
//! discovery derives from its file (`ping/ping_router` for
//! `src/app/ping/ping_router.rs`). Mounting resolves discovered files against
//! this registry, so a file without a registered handler is a startup error.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::routing::MethodRouter;

/// Ordered `(sub-path, handler)` pairs exposed by one module.
#[derive(Default)]
pub struct Routes {
    entries: Vec<(String, MethodRouter)>,
}

impl Routes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler for `path`, relative to the API prefix.
    pub fn route(mut self, path: impl Into<String>, method_router: MethodRouter) -> Self {
        self.entries.push((path.into(), method_router));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(path, _)| path.as_str())
    }

    pub(crate) fn into_entries(self) -> Vec<(String, MethodRouter)> {
        self.entries
    }
}

impl std::fmt::Debug for Routes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.paths()).finish()
    }
}

/// The capability every route module exposes: a mountable set of routes.
pub trait RouteModule: Send + Sync {
    fn router(&self) -> Routes;
}

impl<F> RouteModule for F
where
    F: Fn() -> Routes + Send + Sync,
{
    fn router(&self) -> Routes {
        self()
    }
}

/// Explicit startup-time table of known route modules.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    modules: BTreeMap<String, Arc<dyn RouteModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `module` under `module_id`. A later registration replaces an earlier one.
    pub fn register(mut self, module_id: impl Into<String>, module: impl RouteModule + 'static) -> Self {
        let module_id = module_id.into();
        if self.modules.insert(module_id.clone(), Arc::new(module)).is_some() {
            tracing::warn!(module = %module_id, "Route module registered twice, keeping the last");
        }
        self
    }

    pub fn resolve(&self, module_id: &str) -> Option<&Arc<dyn RouteModule>> {
        self.modules.get(module_id)
    }

    pub fn module_ids(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.module_ids()).finish()
    }
}
