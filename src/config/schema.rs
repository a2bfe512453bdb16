//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML. Sections
//! default when omitted, but a role policy table that is written out must
//! name every role.

use serde::{Deserialize, Serialize};

use crate::protection::bot::BotCategory;
use crate::protection::mode::OperatingMode;

/// Root configuration for the admission gate.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Listener configuration.
    pub listener: ListenerConfig,

    /// Observe (log only) or Enforce (block).
    pub mode: OperatingMode,

    /// Token verification settings.
    pub auth: AuthConfig,

    /// Role policy table.
    pub policy: RolePolicyConfig,

    /// Per-address ceiling applied before the role policy.
    pub burst: BurstConfig,

    /// Bot rule allow-lists.
    pub bot: BotConfig,

    /// Shield rule settings.
    pub shield: ShieldConfig,

    /// Sliding-window store bounds.
    pub rate_limit: RateLimitConfig,

    /// Caller address resolution.
    pub network: NetworkConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Request timeout (whole request/response) in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret for token verification. Usually supplied via `JWT_SECRET`.
    pub jwt_secret: Option<String>,
}

/// One `(mode, role)` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct LimitConfig {
    pub window_secs: u64,
    pub max_requests: u32,
}

impl LimitConfig {
    pub const fn per_minute(max_requests: u32) -> Self {
        Self {
            window_secs: 60,
            max_requests,
        }
    }
}

/// Limits for every role in one mode. No serde default: all three roles
/// must be present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ModeLimits {
    pub admin: LimitConfig,
    pub user: LimitConfig,
    pub guest: LimitConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RolePolicyConfig {
    pub observe: ModeLimits,
    pub enforce: ModeLimits,
}

impl Default for RolePolicyConfig {
    fn default() -> Self {
        Self {
            observe: ModeLimits {
                admin: LimitConfig::per_minute(200),
                user: LimitConfig::per_minute(100),
                guest: LimitConfig::per_minute(50),
            },
            enforce: ModeLimits {
                admin: LimitConfig::per_minute(20),
                user: LimitConfig::per_minute(10),
                guest: LimitConfig::per_minute(5),
            },
        }
    }
}

/// Per-address burst ceiling for each mode. Every caller from one address
/// shares this window regardless of identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BurstConfig {
    pub observe: LimitConfig,
    pub enforce: LimitConfig,
}

impl BurstConfig {
    pub fn for_mode(&self, mode: OperatingMode) -> LimitConfig {
        match mode {
            OperatingMode::Observe => self.observe,
            OperatingMode::Enforce => self.enforce,
        }
    }
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self {
            observe: LimitConfig::per_minute(100),
            enforce: LimitConfig {
                window_secs: 2,
                max_requests: 10,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BotConfig {
    /// Categories allowed in every mode.
    pub allow: Vec<BotCategory>,

    /// Extra categories allowed in observe mode only.
    pub observe_allow: Vec<BotCategory>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            allow: vec![
                BotCategory::SearchEngine,
                BotCategory::Preview,
                BotCategory::Monitor,
            ],
            observe_allow: vec![BotCategory::Api, BotCategory::Automated],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShieldConfig {
    /// Remote protection service endpoint. Local heuristics when unset.
    pub service_url: Option<String>,

    /// Bearer credential for the protection service.
    pub service_key: Option<String>,

    /// Deadline for each rule evaluation, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ShieldConfig {
    fn default() -> Self {
        Self {
            service_url: None,
            service_key: None,
            timeout_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Hard cap on tracked subject keys.
    pub max_keys: usize,

    /// Sweep idle keys every this many checks.
    pub sweep_interval: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_keys: 100_000,
            sweep_interval: 1_024,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct NetworkConfig {
    /// Use the last `X-Forwarded-For` entry (the one the fronting proxy
    /// appended) as the caller address.
    pub trust_forwarded_for: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter directive (trace, debug, info, warn, error, or EnvFilter syntax).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
