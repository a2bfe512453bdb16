//! Adaptive protection subsystem.
//!
//! # Data Flow
//! ```text
//! Request with IdentityContext:
//!     → policy.rs (mode × role → window, ceiling)
//!     → engine.rs
//!         ├─ bot.rs        (category vs. mode allow-list)
//!         ├─ shield.rs     (attack signatures, local or remote)
//!         └─ rate_limit.rs (sliding-window log per subject key)
//!     → Decision (first failing rule in Bot → Shield → RateLimit order)
//!     → middleware.rs (Observe: log and continue, Enforce: reject)
//! ```

pub mod bot;
pub mod clock;
pub mod engine;
pub mod middleware;
pub mod mode;
pub mod policy;
pub mod rate_limit;
pub mod shield;

use std::fmt;
use std::time::Duration;

use axum::http::{HeaderMap, Method, Request, Uri};
use serde::Serialize;

use crate::http::request::RequestContext;

pub use engine::{Evaluation, ProtectionEngine};
pub use middleware::{protect, ProtectionState};
pub use mode::OperatingMode;
pub use policy::{PolicyRole, RateLimitPolicy, RolePolicyTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Shield,
    Bot,
    RateLimit,
    None,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Shield => "shield",
            RuleKind::Bot => "bot",
            RuleKind::RateLimit => "rate_limit",
            RuleKind::None => "none",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleVerdict {
    pub allowed: bool,
    pub rule: RuleKind,
}

impl RuleVerdict {
    pub fn allow(rule: RuleKind) -> Self {
        Self {
            allowed: true,
            rule,
        }
    }

    pub fn deny(rule: RuleKind) -> Self {
        Self {
            allowed: false,
            rule,
        }
    }
}

/// Engine verdict for a request. `triggering_rule` is `None` iff allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    allowed: bool,
    triggering_rule: RuleKind,
}

impl Decision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            triggering_rule: RuleKind::None,
        }
    }

    /// Attribute to the first denying verdict, in slice order.
    pub fn from_verdicts(verdicts: &[RuleVerdict]) -> Self {
        verdicts
            .iter()
            .find(|v| !v.allowed && v.rule != RuleKind::None)
            .map(|v| Self {
                allowed: false,
                triggering_rule: v.rule,
            })
            .unwrap_or_else(Self::allow)
    }

    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    pub fn triggering_rule(&self) -> RuleKind {
        self.triggering_rule
    }
}

/// Failure to evaluate a rule (as opposed to a rule denying).
#[derive(Debug, Clone, thiserror::Error)]
pub enum RuleFault {
    #[error("{rule} rule timed out after {after:?}")]
    Timeout { rule: RuleKind, after: Duration },

    #[error("protection service unreachable: {0}")]
    Remote(String),

    #[error("protection service returned an unusable answer: {0}")]
    BadResponse(String),
}

/// Snapshot of the request parts the rules inspect.
#[derive(Debug, Clone)]
pub struct ProtectedRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub context: RequestContext,
}

impl ProtectedRequest {
    pub fn from_request<B>(req: &Request<B>, trust_forwarded: bool) -> Self {
        Self {
            method: req.method().clone(),
            uri: req.uri().clone(),
            headers: req.headers().clone(),
            context: RequestContext::from_request(req, trust_forwarded),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_all_allowed() {
        let decision = Decision::from_verdicts(&[
            RuleVerdict::allow(RuleKind::Bot),
            RuleVerdict::allow(RuleKind::Shield),
            RuleVerdict::allow(RuleKind::RateLimit),
        ]);
        assert!(decision.is_allowed());
        assert_eq!(decision.triggering_rule(), RuleKind::None);
    }

    #[test]
    fn test_decision_attributes_first_denial() {
        let decision = Decision::from_verdicts(&[
            RuleVerdict::allow(RuleKind::Bot),
            RuleVerdict::deny(RuleKind::Shield),
            RuleVerdict::deny(RuleKind::RateLimit),
        ]);
        assert!(!decision.is_allowed());
        assert_eq!(decision.triggering_rule(), RuleKind::Shield);
    }
}
