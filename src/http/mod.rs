//! HTTP serving subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum::serve, graceful shutdown)
//!     → pipeline.rs (logging → hardening → CORS → dispatch)
//!     → mounted handler (error.rs boundary) or reverse proxy
//! ```

pub mod error;
pub mod pipeline;
pub mod server;

pub use error::{ErrorEnvelope, HandlerError, HandlerResult};
pub use pipeline::Pipeline;
pub use server::GatewayServer;
