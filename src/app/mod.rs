//! Locally implemented route modules.
//!
//! Each `*_router.rs` file under this directory is found by handler discovery
//! and resolved through [`registry`] by its path-derived id.

pub mod ping;

use crate::routing::ModuleRegistry;

/// Every route module compiled into the binary, keyed by module id.
pub fn registry() -> ModuleRegistry {
    ModuleRegistry::new().register("ping/ping_router", ping::ping_router::router)
}
