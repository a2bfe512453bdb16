//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (router, admission layers, graceful shutdown)
//!     → request.rs (request ID, caller IP, log context)
//!     → [auth → protection → role gate]
//!     → handlers.rs / users::handlers
//! ```

pub mod handlers;
pub mod request;
pub mod server;

pub use request::{RequestContext, X_REQUEST_ID};
pub use server::{build_router, AdmissionServer, AppState, Components, StartupError};
