//! Mode controller.
//!
//! Looks up the caller's rate-limit policy, runs the engine, and applies
//! the operating mode to the result:
//!
//! | Outcome        | Observe                 | Enforce                     |
//! |----------------|-------------------------|-----------------------------|
//! | allowed        | continue                | continue                    |
//! | rule denial    | advisory log, continue  | 403 with rule message       |
//! | engine fault   | error log, continue     | 500                         |

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::identity::IdentityContext;
use crate::error::AdmissionError;
use crate::observability::metrics;
use crate::protection::engine::ProtectionEngine;
use crate::protection::mode::OperatingMode;
use crate::protection::policy::{PolicyRole, RolePolicyTable};
use crate::protection::ProtectedRequest;

#[derive(Clone)]
pub struct ProtectionState {
    pub mode: OperatingMode,
    pub table: RolePolicyTable,
    pub engine: Arc<ProtectionEngine>,
    pub trust_forwarded: bool,
}

pub async fn protect(
    State(state): State<ProtectionState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let identity = req
        .extensions()
        .get::<IdentityContext>()
        .cloned()
        .unwrap_or_default();
    let role = PolicyRole::of(identity.identity());
    let policy = state.table.lookup(state.mode, role);
    let snapshot = ProtectedRequest::from_request(&req, state.trust_forwarded);
    let ctx = &snapshot.context;

    let evaluation = match state
        .engine
        .evaluate(&snapshot, identity.identity(), policy)
        .await
    {
        Ok(evaluation) => evaluation,
        Err(fault) => {
            metrics::record_engine_fault();
            tracing::error!(
                request_id = %ctx.request_id_label(),
                error = %fault,
                mode = %state.mode,
                ip = %ctx.ip_label(),
                path = %ctx.path,
                method = %ctx.method,
                "Protection engine fault"
            );
            return match state.mode {
                OperatingMode::Observe => {
                    tracing::warn!("Protection engine fault in observe mode, continuing anyway");
                    next.run(req).await
                }
                OperatingMode::Enforce => {
                    AdmissionError::EngineFault(fault.to_string()).into_response()
                }
            };
        }
    };

    let decision = evaluation.decision;
    let rule = decision.triggering_rule();
    metrics::record_decision(rule, state.mode, decision.is_allowed());

    for verdict in evaluation.verdicts.iter().filter(|v| !v.allowed) {
        tracing::debug!(rule = %verdict.rule, role = %role, path = %ctx.path, "Rule denied");
    }

    if decision.is_allowed() {
        return next.run(req).await;
    }

    match state.mode {
        OperatingMode::Observe => {
            tracing::info!(
                request_id = %ctx.request_id_label(),
                rule = %rule,
                role = %role,
                bot_category = %evaluation.bot_category,
                ip = %ctx.ip_label(),
                user_agent = %ctx.user_agent_label(),
                path = %ctx.path,
                method = %ctx.method,
                "Protection rule would deny request (observe mode, not blocked)"
            );
            next.run(req).await
        }
        OperatingMode::Enforce => {
            tracing::warn!(
                request_id = %ctx.request_id_label(),
                rule = %rule,
                role = %role,
                bot_category = %evaluation.bot_category,
                ip = %ctx.ip_label(),
                user_agent = %ctx.user_agent_label(),
                path = %ctx.path,
                method = %ctx.method,
                "Request blocked by protection rule"
            );
            AdmissionError::RuleDenial(rule).into_response()
        }
    }
}
