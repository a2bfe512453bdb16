//! Configuration loading: defaults → TOML file → environment.

use std::fs;
use std::path::Path;

use crate::config::schema::{AdmissionConfig, LimitConfig, LogFormat};
use crate::config::validation::{validate_config, ValidationError};
use crate::protection::mode::OperatingMode;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),

    #[error("token signing secret is not configured (set JWT_SECRET)")]
    MissingSecret,

    #[error("invalid value for {var}: {reason}")]
    InvalidEnv { var: String, reason: String },
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from a TOML string.
pub fn parse_config(content: &str) -> Result<AdmissionConfig, ConfigError> {
    let config: AdmissionConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load configuration from an optional TOML file plus the process environment.
pub fn load_config(path: Option<&Path>) -> Result<AdmissionConfig, ConfigError> {
    load_config_with(path, |var| std::env::var(var).ok())
}

/// Same as [`load_config`] with an injectable environment lookup.
pub fn load_config_with<F>(path: Option<&Path>, env: F) -> Result<AdmissionConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config: AdmissionConfig = match path {
        Some(path) => toml::from_str(&fs::read_to_string(path)?)?,
        None => AdmissionConfig::default(),
    };
    apply_env_overrides(&mut config, env)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

pub fn apply_env_overrides<F>(config: &mut AdmissionConfig, env: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(mode) = env("ADMISSION_MODE") {
        config.mode = mode.parse().map_err(|e: crate::protection::mode::ParseModeError| {
            ConfigError::InvalidEnv {
                var: "ADMISSION_MODE".into(),
                reason: e.to_string(),
            }
        })?;
    }
    if let Some(secret) = env("JWT_SECRET") {
        config.auth.jwt_secret = Some(secret);
    }
    if let Some(url) = env("PROTECTION_SERVICE_URL") {
        config.shield.service_url = Some(url);
    }
    if let Some(key) = env("PROTECTION_SERVICE_KEY") {
        config.shield.service_key = Some(key);
    }
    if let Some(bind) = env("BIND_ADDRESS") {
        config.listener.bind_address = bind;
    }
    if let Some(level) = env("LOG_LEVEL") {
        config.observability.log_level = level;
    }
    if let Some(format) = env("LOG_FORMAT") {
        config.observability.log_format = match format.to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            other => {
                return Err(ConfigError::InvalidEnv {
                    var: "LOG_FORMAT".into(),
                    reason: format!("unknown format `{other}`"),
                })
            }
        };
    }

    for mode in [OperatingMode::Observe, OperatingMode::Enforce] {
        let limits = match mode {
            OperatingMode::Observe => &mut config.policy.observe,
            OperatingMode::Enforce => &mut config.policy.enforce,
        };
        let entries: [(&str, &mut LimitConfig); 3] = [
            ("ADMIN", &mut limits.admin),
            ("USER", &mut limits.user),
            ("GUEST", &mut limits.guest),
        ];
        for (role, limit) in entries {
            let prefix = format!("ADMISSION_POLICY_{}_{}", mode.as_str().to_ascii_uppercase(), role);
            if let Some(max) = env_number(&env, &format!("{prefix}_MAX"))? {
                limit.max_requests = max;
            }
            if let Some(window) = env_number(&env, &format!("{prefix}_WINDOW_SECS"))? {
                limit.window_secs = window;
            }
        }

        let burst = match mode {
            OperatingMode::Observe => &mut config.burst.observe,
            OperatingMode::Enforce => &mut config.burst.enforce,
        };
        let prefix = format!("ADMISSION_BURST_{}", mode.as_str().to_ascii_uppercase());
        if let Some(max) = env_number(&env, &format!("{prefix}_MAX"))? {
            burst.max_requests = max;
        }
        if let Some(window) = env_number(&env, &format!("{prefix}_WINDOW_SECS"))? {
            burst.window_secs = window;
        }
    }

    Ok(())
}

fn env_number<F, T>(env: &F, var: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env(var)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidEnv {
                var: var.to_string(),
                reason: e.to_string(),
            })
        })
        .transpose()
}
