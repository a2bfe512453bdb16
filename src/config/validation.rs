//! Configuration validation.
//!
//! Pure function over a parsed config; collects every problem instead of
//! stopping at the first.

use std::fmt;

use crate::config::schema::{AdmissionConfig, LimitConfig, ModeLimits};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &AdmissionConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_mode_limits("policy.observe", &config.policy.observe, &mut errors);
    validate_mode_limits("policy.enforce", &config.policy.enforce, &mut errors);
    validate_limit("burst.observe", &config.burst.observe, &mut errors);
    validate_limit("burst.enforce", &config.burst.enforce, &mut errors);

    if config.shield.timeout_ms == 0 {
        errors.push(ValidationError::new("shield.timeout_ms", "must be greater than 0"));
    }
    if let Some(endpoint) = &config.shield.service_url {
        match url::Url::parse(endpoint) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => errors.push(ValidationError::new(
                "shield.service_url",
                format!("unsupported scheme `{}`", url.scheme()),
            )),
            Err(e) => errors.push(ValidationError::new("shield.service_url", e.to_string())),
        }
    }

    if config.rate_limit.max_keys == 0 {
        errors.push(ValidationError::new("rate_limit.max_keys", "must be greater than 0"));
    }
    if config.rate_limit.sweep_interval == 0 {
        errors.push(ValidationError::new("rate_limit.sweep_interval", "must be greater than 0"));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new("listener.request_timeout_secs", "must be greater than 0"));
    }
    if let Some(secret) = &config.auth.jwt_secret {
        if secret.trim().is_empty() {
            errors.push(ValidationError::new("auth.jwt_secret", "must not be empty"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_mode_limits(prefix: &str, limits: &ModeLimits, errors: &mut Vec<ValidationError>) {
    let entries: [(&str, &LimitConfig); 3] = [
        ("admin", &limits.admin),
        ("user", &limits.user),
        ("guest", &limits.guest),
    ];
    for (role, limit) in entries {
        validate_limit(&format!("{prefix}.{role}"), limit, errors);
    }
    if limits.admin.max_requests < limits.user.max_requests
        || limits.user.max_requests < limits.guest.max_requests
    {
        errors.push(ValidationError::new(
            prefix,
            "ceilings must not increase as privilege decreases (admin >= user >= guest)",
        ));
    }
}

fn validate_limit(prefix: &str, limit: &LimitConfig, errors: &mut Vec<ValidationError>) {
    if limit.window_secs == 0 {
        errors.push(ValidationError::new(
            format!("{prefix}.window_secs"),
            "must be greater than 0",
        ));
    }
    if limit.max_requests == 0 {
        errors.push(ValidationError::new(
            format!("{prefix}.max_requests"),
            "must be greater than 0",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AdmissionConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = AdmissionConfig::default();
        config.policy.enforce.guest.max_requests = 0;
        config.policy.observe.admin.window_secs = 0;
        config.shield.timeout_ms = 0;
        config.rate_limit.max_keys = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"policy.enforce.guest.max_requests"));
        assert!(fields.contains(&"policy.observe.admin.window_secs"));
        assert!(fields.contains(&"shield.timeout_ms"));
        assert!(fields.contains(&"rate_limit.max_keys"));
    }

    #[test]
    fn test_zero_burst_rejected() {
        let mut config = AdmissionConfig::default();
        config.burst.enforce.max_requests = 0;
        config.burst.observe.window_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, ["burst.observe.window_secs", "burst.enforce.max_requests"]);
    }

    #[test]
    fn test_inverted_ceilings_rejected() {
        let mut config = AdmissionConfig::default();
        config.policy.enforce.guest.max_requests = 50;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "policy.enforce");
    }

    #[test]
    fn test_bad_service_url_rejected() {
        let mut config = AdmissionConfig::default();
        config.shield.service_url = Some("ftp://shield.internal".into());
        assert!(validate_config(&config).is_err());

        config.shield.service_url = Some("https://shield.internal/v1/decide".into());
        assert!(validate_config(&config).is_ok());
    }
}
