//! Routing subsystem: handler discovery and the mounted route table.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     discovery.rs (walk root, match keyword)
//!     → Vec<DiscoveredModule> (pure data, sorted)
//!     → router.rs mount() (resolve against registry.rs)
//!     → RouteTable (immutable, mount order preserved)
//!     → axum Router nested under the API prefix
//! ```
//!
//! # Design Decisions
//! - Discovery and mounting are separate steps, each testable alone
//! - Routes compiled at startup, immutable at runtime
//! - Deterministic: same tree always yields the same table
//! - First mount wins on collisions

pub mod discovery;
pub mod registry;
pub mod router;

pub use discovery::{discover, DiscoveredModule, DiscoveryError};
pub use registry::{ModuleRegistry, RouteModule, Routes};
pub use router::{mount, MountError, MountedRoute, RouteTable};
