//! Authentication and role-gate middlewares.
//!
//! - [`require_auth`]: a missing or invalid credential ends the request.
//! - [`optional_auth`]: a missing or invalid credential leaves the caller
//!   anonymous and the request continues.
//! - [`require_role`]: runs after identity resolution and checks the
//!   resolved role against the route's allowed set.
//!
//! A verifier fault is an internal error where authentication is required.
//! Where it is optional the fault is logged and the caller stays anonymous.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::extractor::extract_credential;
use crate::auth::identity::{IdentityContext, Role};
use crate::auth::verifier::{CredentialVerifier, VerificationOutcome};
use crate::error::AdmissionError;
use crate::http::request::RequestContext;
use crate::observability::metrics;

/// State shared by the authentication middlewares.
#[derive(Clone)]
pub struct AuthState {
    pub verifier: Arc<dyn CredentialVerifier>,
    pub trust_forwarded: bool,
}

impl AuthState {
    pub fn new(verifier: Arc<dyn CredentialVerifier>, trust_forwarded: bool) -> Self {
        Self {
            verifier,
            trust_forwarded,
        }
    }

    fn verify(&self, req: &Request<Body>) -> VerificationOutcome {
        let credential = extract_credential(req.headers());
        self.verifier.verify(credential.as_ref())
    }
}

pub async fn require_auth(
    State(state): State<AuthState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let ctx = RequestContext::from_request(&req, state.trust_forwarded);

    let err = match state.verify(&req) {
        VerificationOutcome::Valid(identity) => {
            tracing::debug!(
                user_id = identity.id,
                email = %identity.email,
                role = %identity.role,
                "Token authenticated successfully"
            );
            req.extensions_mut()
                .insert(IdentityContext::Authenticated(identity));
            return next.run(req).await;
        }
        VerificationOutcome::Missing => {
            tracing::warn!(
                request_id = %ctx.request_id_label(),
                ip = %ctx.ip_label(),
                path = %ctx.path,
                method = %ctx.method,
                user_agent = %ctx.user_agent_label(),
                "Access attempt without token"
            );
            AdmissionError::MissingCredential
        }
        VerificationOutcome::Invalid(reason) => {
            tracing::warn!(
                request_id = %ctx.request_id_label(),
                reason = %reason,
                ip = %ctx.ip_label(),
                path = %ctx.path,
                method = %ctx.method,
                user_agent = %ctx.user_agent_label(),
                "Token authentication failed"
            );
            AdmissionError::InvalidCredential(reason)
        }
        VerificationOutcome::ServiceError(cause) => {
            tracing::error!(
                request_id = %ctx.request_id_label(),
                error = %cause,
                ip = %ctx.ip_label(),
                path = %ctx.path,
                method = %ctx.method,
                "Token verifier fault"
            );
            AdmissionError::VerifierFault(cause)
        }
    };

    metrics::record_auth_failure(err.kind());
    err.into_response()
}

pub async fn optional_auth(
    State(state): State<AuthState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let identity = match state.verify(&req) {
        VerificationOutcome::Valid(identity) => {
            tracing::debug!(
                user_id = identity.id,
                role = %identity.role,
                "Optional authentication successful"
            );
            IdentityContext::Authenticated(identity)
        }
        VerificationOutcome::Missing => IdentityContext::Anonymous,
        VerificationOutcome::Invalid(reason) => {
            let ctx = RequestContext::from_request(&req, state.trust_forwarded);
            tracing::warn!(
                reason = %reason,
                ip = %ctx.ip_label(),
                path = %ctx.path,
                "Optional authentication failed, continuing without user"
            );
            IdentityContext::Anonymous
        }
        VerificationOutcome::ServiceError(cause) => {
            let ctx = RequestContext::from_request(&req, state.trust_forwarded);
            tracing::error!(
                request_id = %ctx.request_id_label(),
                error = %cause,
                ip = %ctx.ip_label(),
                path = %ctx.path,
                method = %ctx.method,
                "Token verifier fault, continuing without user"
            );
            metrics::record_auth_failure(AdmissionError::VerifierFault(cause).kind());
            IdentityContext::Anonymous
        }
    };

    req.extensions_mut().insert(identity);
    next.run(req).await
}

/// Allowed roles for a gated route group.
#[derive(Debug, Clone)]
pub struct RoleGate {
    allowed: Arc<[Role]>,
    trust_forwarded: bool,
}

impl RoleGate {
    pub fn new(allowed: impl IntoIterator<Item = Role>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
            trust_forwarded: false,
        }
    }

    /// Resolve the caller address from `X-Forwarded-For` in log events.
    pub fn trust_forwarded(mut self, trust: bool) -> Self {
        self.trust_forwarded = trust;
        self
    }

    pub fn check(&self, identity: &IdentityContext) -> Result<(), AdmissionError> {
        let identity = identity.identity().ok_or(AdmissionError::Unauthenticated)?;
        if self.allowed.contains(&identity.role) {
            Ok(())
        } else {
            Err(AdmissionError::Unauthorized {
                role: identity.role,
                allowed: self.allowed.to_vec(),
            })
        }
    }
}

pub async fn require_role(
    State(gate): State<RoleGate>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let identity = req
        .extensions()
        .get::<IdentityContext>()
        .cloned()
        .unwrap_or_default();

    match gate.check(&identity) {
        Ok(()) => next.run(req).await,
        Err(err) => {
            let ctx = RequestContext::from_request(&req, gate.trust_forwarded);
            match &err {
                AdmissionError::Unauthorized { role, allowed } => tracing::warn!(
                    request_id = %ctx.request_id_label(),
                    user_id = identity.identity().map(|i| i.id),
                    user_role = %role,
                    required_roles = ?allowed,
                    ip = %ctx.ip_label(),
                    user_agent = %ctx.user_agent_label(),
                    path = %ctx.path,
                    method = %ctx.method,
                    "Unauthorized role access attempt"
                ),
                _ => tracing::warn!(
                    request_id = %ctx.request_id_label(),
                    ip = %ctx.ip_label(),
                    path = %ctx.path,
                    method = %ctx.method,
                    "Role check attempted without authenticated user"
                ),
            }
            metrics::record_auth_failure(err.kind());
            err.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::identity::Identity;

    fn user(role: Role) -> IdentityContext {
        IdentityContext::Authenticated(Identity {
            id: 1,
            email: "a@b.com".into(),
            role,
        })
    }

    #[test]
    fn test_gate_allows_listed_role() {
        let gate = RoleGate::new([Role::Admin]);
        assert!(gate.check(&user(Role::Admin)).is_ok());
    }

    #[test]
    fn test_gate_rejects_other_role() {
        let gate = RoleGate::new([Role::Admin]);
        let err = gate.check(&user(Role::User)).unwrap_err();
        assert_eq!(err.body().message, "Access restricted to: admin");
    }

    #[test]
    fn test_gate_rejects_anonymous_as_unauthenticated() {
        let gate = RoleGate::new([Role::Admin, Role::User]);
        let err = gate.check(&IdentityContext::Anonymous).unwrap_err();
        assert!(matches!(err, AdmissionError::Unauthenticated));
    }
}
