//! Role policy table.
//!
//! Maps `(OperatingMode, PolicyRole)` to the sliding-window limit applied
//! to a caller. The table is built once from validated configuration and
//! is read-only afterwards; every pair has an entry by construction.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::auth::identity::{Identity, Role};
use crate::config::schema::{LimitConfig, ModeLimits, RolePolicyConfig};
use crate::protection::mode::OperatingMode;

/// Role used for policy lookup; unauthenticated callers are `Guest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyRole {
    Admin,
    User,
    Guest,
}

impl PolicyRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyRole::Admin => "admin",
            PolicyRole::User => "user",
            PolicyRole::Guest => "guest",
        }
    }

    pub fn of(identity: Option<&Identity>) -> Self {
        match identity.map(|i| i.role) {
            Some(Role::Admin) => PolicyRole::Admin,
            Some(Role::User) => PolicyRole::User,
            None => PolicyRole::Guest,
        }
    }
}

impl fmt::Display for PolicyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sliding-window parameters for one caller class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub window: Duration,
    pub max_requests: u32,
}

impl RateLimitPolicy {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
        }
    }
}

impl From<LimitConfig> for RateLimitPolicy {
    fn from(limit: LimitConfig) -> Self {
        Self::new(Duration::from_secs(limit.window_secs), limit.max_requests)
    }
}

#[derive(Debug, Clone, Copy)]
struct ModeTable {
    admin: RateLimitPolicy,
    user: RateLimitPolicy,
    guest: RateLimitPolicy,
}

impl From<&ModeLimits> for ModeTable {
    fn from(limits: &ModeLimits) -> Self {
        Self {
            admin: limits.admin.into(),
            user: limits.user.into(),
            guest: limits.guest.into(),
        }
    }
}

/// Closed `(mode, role)` → policy lookup.
#[derive(Debug, Clone, Copy)]
pub struct RolePolicyTable {
    observe: ModeTable,
    enforce: ModeTable,
}

impl RolePolicyTable {
    /// Build from configuration that has already passed validation.
    pub fn from_config(config: &RolePolicyConfig) -> Self {
        Self {
            observe: ModeTable::from(&config.observe),
            enforce: ModeTable::from(&config.enforce),
        }
    }

    pub fn lookup(&self, mode: OperatingMode, role: PolicyRole) -> RateLimitPolicy {
        let table = match mode {
            OperatingMode::Observe => &self.observe,
            OperatingMode::Enforce => &self.enforce,
        };
        match role {
            PolicyRole::Admin => table.admin,
            PolicyRole::User => table.user,
            PolicyRole::Guest => table.guest,
        }
    }
}

impl Default for RolePolicyTable {
    fn default() -> Self {
        Self::from_config(&RolePolicyConfig::default())
    }
}
