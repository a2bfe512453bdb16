//! Resolved caller identity.
//!
//! An [`Identity`] only comes out of successful token verification. It is
//! attached to the request as an [`IdentityContext`] so that downstream
//! stages can tell a known caller from an anonymous one without probing
//! optional fields.

use std::convert::Infallible;
use std::fmt;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};

/// Role carried in a verified token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated subject of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub email: String,
    pub role: Role,
}

/// Per-request identity slot, inserted by the authentication middlewares.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IdentityContext {
    Authenticated(Identity),
    #[default]
    Anonymous,
}

impl IdentityContext {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            IdentityContext::Authenticated(identity) => Some(identity),
            IdentityContext::Anonymous => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, IdentityContext::Authenticated(_))
    }
}

impl<S> FromRequestParts<S> for IdentityContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<IdentityContext>()
            .cloned()
            .unwrap_or_default())
    }
}
