//! Protection engine.
//!
//! All three rules run for every request so their outcomes can be logged.
//! Bot and Shield are evaluated concurrently under the rule deadline, then
//! the rate limiter records the attempt. The reported [`Decision`] names the
//! first failing rule in Bot → Shield → RateLimit order.
//!
//! The rate rule has two stages. A per-address burst window is checked
//! first and shared by every caller behind one address; only when it admits
//! is the role policy window consulted. Either denial reports `RateLimit`.
//!
//! A fault in Bot or Shield fails the whole evaluation; the rate limiter
//! has already run by then and its admission stays committed.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::identity::Identity;
use crate::config::AdmissionConfig;
use crate::protection::bot::{BotAllowList, BotCategory, BotClassifier, UserAgentClassifier};
use crate::protection::clock::{Clock, SystemClock};
use crate::protection::mode::OperatingMode;
use crate::protection::policy::RateLimitPolicy;
use crate::protection::rate_limit::{subject_key, SlidingWindowLimiter};
use crate::protection::shield::{HeuristicShield, RemoteShield, Shield};
use crate::protection::{Decision, ProtectedRequest, RuleFault, RuleKind, RuleVerdict};
use crate::resilience::with_deadline;

/// Full result of one evaluation.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub decision: Decision,
    /// Bot, Shield, RateLimit, in that order.
    pub verdicts: [RuleVerdict; 3],
    pub bot_category: BotCategory,
}

pub struct ProtectionEngine<C: Clock = SystemClock> {
    bot: Arc<dyn BotClassifier>,
    allow_list: BotAllowList,
    shield: Arc<dyn Shield>,
    limiter: Arc<SlidingWindowLimiter<C>>,
    burst: Option<RateLimitPolicy>,
    rule_timeout: Duration,
}

impl ProtectionEngine<SystemClock> {
    /// Default rule set for `config.mode`: user-agent bot classification,
    /// a remote shield when a service endpoint is configured, and the
    /// mode's burst window.
    pub fn from_config(config: &AdmissionConfig) -> Result<Self, RuleFault> {
        let shield: Arc<dyn Shield> = match RemoteShield::from_config(&config.shield)? {
            Some(remote) => Arc::new(remote),
            None => Arc::new(HeuristicShield),
        };
        Ok(Self::new(
            Arc::new(UserAgentClassifier),
            BotAllowList::for_mode(config.mode, &config.bot),
            shield,
            Arc::new(SlidingWindowLimiter::new(&config.rate_limit)),
            Duration::from_millis(config.shield.timeout_ms),
        )
        .with_burst(config.burst.for_mode(config.mode).into()))
    }
}

impl<C: Clock> ProtectionEngine<C> {
    /// Engine over explicit rules, with no burst stage.
    pub fn new(
        bot: Arc<dyn BotClassifier>,
        allow_list: BotAllowList,
        shield: Arc<dyn Shield>,
        limiter: Arc<SlidingWindowLimiter<C>>,
        rule_timeout: Duration,
    ) -> Self {
        Self {
            bot,
            allow_list,
            shield,
            limiter,
            burst: None,
            rule_timeout,
        }
    }

    /// Apply a per-address burst window ahead of the role policy.
    pub fn with_burst(mut self, burst: RateLimitPolicy) -> Self {
        self.burst = Some(burst);
        self
    }

    /// The shared sliding-window store.
    pub fn limiter(&self) -> &SlidingWindowLimiter<C> {
        &self.limiter
    }

    /// Run every rule for one request and attribute the outcome.
    pub async fn evaluate(
        &self,
        request: &ProtectedRequest,
        identity: Option<&Identity>,
        policy: RateLimitPolicy,
    ) -> Result<Evaluation, RuleFault> {
        let (category, shield) = tokio::join!(
            with_deadline(RuleKind::Bot, self.rule_timeout, self.bot.classify(request)),
            with_deadline(RuleKind::Shield, self.rule_timeout, self.shield.inspect(request)),
        );

        let rate = self.check_rate(request, identity, policy);

        let category = category?;
        let shield = shield?;
        let bot = if self.allow_list.permits(category) {
            RuleVerdict::allow(RuleKind::Bot)
        } else {
            RuleVerdict::deny(RuleKind::Bot)
        };

        let verdicts = [bot, shield, rate];
        Ok(Evaluation {
            decision: Decision::from_verdicts(&verdicts),
            verdicts,
            bot_category: category,
        })
    }

    fn check_rate(
        &self,
        request: &ProtectedRequest,
        identity: Option<&Identity>,
        policy: RateLimitPolicy,
    ) -> RuleVerdict {
        if let Some(burst) = self.burst {
            let key = format!("burst:{}", request.context.ip_label());
            let verdict = self.limiter.check(&key, burst);
            if !verdict.allowed {
                return verdict;
            }
        }
        self.limiter.check(&subject_key(identity, &request.context), policy)
    }
}

/// Convenience for building an allow-list without a full config.
pub fn allow_list_for(mode: OperatingMode) -> BotAllowList {
    BotAllowList::for_mode(mode, &crate::config::schema::BotConfig::default())
}
