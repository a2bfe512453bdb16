//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! auth, protection, http:
//!     → logging.rs (structured tracing events with caller context)
//!     → metrics.rs (counters and gauges, Prometheus scrape endpoint)
//! ```

pub mod logging;
pub mod metrics;
