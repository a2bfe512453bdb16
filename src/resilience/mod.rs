//! Resilience subsystem.
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - A timed-out rule is a fault, handled by the mode controller's
//!   fail-open / fail-closed policy

pub mod timeouts;

pub use timeouts::with_deadline;
