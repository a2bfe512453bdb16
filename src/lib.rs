//! Request admission layer for HTTP APIs.
//!
//! Every request passes through identity resolution (bearer credential
//! verification) and abuse protection (bot classification, payload
//! inspection, per-identity sliding-window rate limiting) before reaching
//! a handler. An operating mode decides whether protection denials block
//! or are only logged.

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod protection;
pub mod resilience;
pub mod users;

pub use config::schema::AdmissionConfig;
pub use error::AdmissionError;
pub use http::AdmissionServer;
pub use lifecycle::Shutdown;
