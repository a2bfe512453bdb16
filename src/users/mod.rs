//! User endpoints behind the admission pipeline.
//!
//! # Data Flow
//! ```text
//! Admitted request (IdentityContext attached):
//!     → validation.rs (path id, update payload)
//!     → handlers.rs (ownership and role checks)
//!     → directory.rs (lookup / update)
//! ```

pub mod directory;
pub mod handlers;
pub mod validation;

pub use directory::{DirectoryError, InMemoryDirectory, UserDirectory, UserRecord};
pub use validation::{parse_user_id, UpdateUserRequest, UserUpdate, ValidationErrors};
