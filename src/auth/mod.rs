//! Identity resolution subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → extractor.rs (cookie `token`, then `Authorization: Bearer`)
//!     → verifier.rs (HS256 signature + expiry, decode id/email/role)
//!     → middleware.rs (mandatory / optional policy, IdentityContext)
//!     → middleware.rs role gate (optional, per route group)
//! ```

pub mod extractor;
pub mod identity;
pub mod middleware;
pub mod verifier;

pub use extractor::{extract_credential, Credential};
pub use identity::{Identity, IdentityContext, Role};
pub use middleware::{optional_auth, require_auth, require_role, AuthState, RoleGate};
pub use verifier::{CredentialVerifier, InvalidReason, TokenVerifier, VerificationOutcome};
