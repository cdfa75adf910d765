//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → [hardening hook] headers.rs (production response headers)
//!     → cors.rs (origin check, pre-flight, CORS response headers)
//!     → Pass to proxy / mounted handlers
//! ```
//!
//! # Design Decisions
//! - Fail closed: a denied origin short-circuits with 403
//! - Policy is a pure function of configuration and the request origin

pub mod cors;
pub mod headers;

pub use cors::{cors_gatekeeper, CorsDecision, CorsPolicy};
