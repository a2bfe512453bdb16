//! Admission error taxonomy and its HTTP rendering.
//!
//! Every rejection produced by the pipeline is an [`AdmissionError`]. The
//! response body is always `{ "error": ..., "message": ... }`; internal
//! causes are kept for logging and never serialized.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::auth::identity::Role;
use crate::auth::verifier::InvalidReason;
use crate::protection::RuleKind;

#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    #[error("no credential presented")]
    MissingCredential,

    #[error("credential rejected: {0}")]
    InvalidCredential(InvalidReason),

    #[error("token verifier fault: {0}")]
    VerifierFault(String),

    #[error("role gate reached without an identity")]
    Unauthenticated,

    #[error("role not permitted, allowed: {}", join_roles(.allowed))]
    Unauthorized { role: Role, allowed: Vec<Role> },

    #[error("denied by {0} rule")]
    RuleDenial(RuleKind),

    #[error("protection engine fault: {0}")]
    EngineFault(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl AdmissionError {
    pub fn status(&self) -> StatusCode {
        match self {
            AdmissionError::MissingCredential
            | AdmissionError::InvalidCredential(_)
            | AdmissionError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AdmissionError::Unauthorized { .. } | AdmissionError::RuleDenial(_) => {
                StatusCode::FORBIDDEN
            }
            AdmissionError::VerifierFault(_) | AdmissionError::EngineFault(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn body(&self) -> ErrorBody {
        let (error, message) = match self {
            AdmissionError::MissingCredential => {
                ("Authentication required", "No token provided".to_string())
            }
            AdmissionError::InvalidCredential(_) => {
                ("Authentication failed", "Invalid or expired token".to_string())
            }
            AdmissionError::VerifierFault(_) => {
                ("Internal server error", "Authentication service error".to_string())
            }
            AdmissionError::Unauthenticated => (
                "Authentication required",
                "User must be authenticated to access this resource".to_string(),
            ),
            AdmissionError::Unauthorized { allowed, .. } => (
                "Access denied",
                format!("Access restricted to: {}", join_roles(allowed)),
            ),
            AdmissionError::RuleDenial(rule) => ("Forbidden", denial_message(*rule).to_string()),
            AdmissionError::EngineFault(_) => (
                "Internal server error",
                "Something went wrong with security middleware".to_string(),
            ),
        };
        ErrorBody { error, message }
    }

    /// Stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AdmissionError::MissingCredential => "missing_credential",
            AdmissionError::InvalidCredential(_) => "invalid_credential",
            AdmissionError::VerifierFault(_) => "verifier_fault",
            AdmissionError::Unauthenticated => "unauthenticated",
            AdmissionError::Unauthorized { .. } => "unauthorized",
            AdmissionError::RuleDenial(_) => "rule_denial",
            AdmissionError::EngineFault(_) => "engine_fault",
        }
    }
}

fn denial_message(rule: RuleKind) -> &'static str {
    match rule {
        RuleKind::Bot => "Automated requests are not allowed",
        RuleKind::Shield => "Request blocked by security policy",
        RuleKind::RateLimit => "Too many requests",
        RuleKind::None => "Request denied",
    }
}

fn join_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(Role::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl IntoResponse for AdmissionError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authentication_bodies() {
        let body = AdmissionError::MissingCredential.body();
        assert_eq!(body.error, "Authentication required");
        assert_eq!(body.message, "No token provided");

        let err = AdmissionError::InvalidCredential(InvalidReason::Expired);
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.body().message, "Invalid or expired token");

        let err = AdmissionError::VerifierFault("crypto backend unavailable".into());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body().message, "Authentication service error");
    }

    #[test]
    fn test_role_message_joins_allowed_roles() {
        let err = AdmissionError::Unauthorized {
            role: Role::User,
            allowed: vec![Role::Admin, Role::User],
        };
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.body().error, "Access denied");
        assert_eq!(err.body().message, "Access restricted to: admin, user");
    }

    #[test]
    fn test_rule_denials_are_forbidden() {
        for (rule, message) in [
            (RuleKind::Bot, "Automated requests are not allowed"),
            (RuleKind::Shield, "Request blocked by security policy"),
            (RuleKind::RateLimit, "Too many requests"),
        ] {
            let err = AdmissionError::RuleDenial(rule);
            assert_eq!(err.status(), StatusCode::FORBIDDEN);
            assert_eq!(err.body().error, "Forbidden");
            assert_eq!(err.body().message, message);
        }
    }

    #[test]
    fn test_fault_body_hides_cause() {
        let err = AdmissionError::EngineFault("remote shield timed out after 250ms".into());
        let body = serde_json::to_string(&err.body()).unwrap();
        assert!(!body.contains("timed out"));
        assert!(body.contains("Something went wrong with security middleware"));
    }
}
