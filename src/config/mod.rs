//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! built-in defaults
//!     → TOML file (optional, --config)
//!     → environment overrides (ADMISSION_MODE, JWT_SECRET, ...)
//!     → validation.rs (semantic checks, all errors collected)
//!     → AdmissionConfig (validated, immutable for the process lifetime)
//! ```

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_config_with, parse_config, ConfigError};
pub use schema::AdmissionConfig;
pub use schema::{ListenerConfig, ObservabilityConfig, RolePolicyConfig};
