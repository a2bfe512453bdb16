//! Request payload validation for user endpoints.
//!
//! Unknown fields are ignored; an update that carries none of the
//! recognized fields is rejected before it reaches identity or role logic.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::identity::Role;

const NAME_MIN: usize = 2;
const FIELD_MAX: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// One or more field errors; renders as 400 `Validation failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self(vec![FieldError::new(field, message)])
    }
}

impl IntoResponse for ValidationErrors {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "Validation failed",
                "details": self.0,
            })),
        )
            .into_response()
    }
}

/// Path ids must be positive integers.
pub fn parse_user_id(raw: &str) -> Result<i64, ValidationErrors> {
    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ValidationErrors::single("id", "User ID must be a positive integer")),
    }
}

/// Raw update body as sent by the client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

/// Validated, normalized update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
}

impl UpdateUserRequest {
    pub fn validate(self) -> Result<UserUpdate, ValidationErrors> {
        if self.name.is_none() && self.email.is_none() && self.role.is_none() {
            return Err(ValidationErrors::single(
                "body",
                "At least one field must be provided for update",
            ));
        }

        let mut errors = Vec::new();

        let name = self.name.map(|n| n.trim().to_string());
        if let Some(name) = &name {
            let len = name.chars().count();
            if len < NAME_MIN {
                errors.push(FieldError::new("name", "Name must be at least 2 characters long"));
            } else if len > FIELD_MAX {
                errors.push(FieldError::new("name", "Name must not exceed 255 characters"));
            }
        }

        let email = self.email.map(|e| e.trim().to_lowercase());
        if let Some(email) = &email {
            if !is_valid_email(email) {
                errors.push(FieldError::new("email", "Invalid email format"));
            } else if email.len() > FIELD_MAX {
                errors.push(FieldError::new("email", "Email must not exceed 255 characters"));
            }
        }

        let role = match self.role.as_deref() {
            None => None,
            Some("user") => Some(Role::User),
            Some("admin") => Some(Role::Admin),
            Some(_) => {
                errors.push(FieldError::new("role", "Role must be either \"user\" or \"admin\""));
                None
            }
        };

        if errors.is_empty() {
            Ok(UserUpdate { name, email, role })
        } else {
            Err(ValidationErrors(errors))
        }
    }
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, rest)| !host.is_empty() && !rest.is_empty())
        && !domain.ends_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(json: serde_json::Value) -> UpdateUserRequest {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_user_id() {
        assert_eq!(parse_user_id("1").unwrap(), 1);
        assert_eq!(parse_user_id("123").unwrap(), 123);
        assert!(parse_user_id("0").is_err());
        assert!(parse_user_id("-1").is_err());
        assert!(parse_user_id("abc").is_err());
    }

    #[test]
    fn test_empty_update_rejected() {
        let err = body(serde_json::json!({})).validate().unwrap_err();
        assert_eq!(err.0[0].message, "At least one field must be provided for update");

        // Unrecognized fields do not count.
        let err = body(serde_json::json!({"nickname": "x"})).validate().unwrap_err();
        assert_eq!(err.0[0].field, "body");
    }

    #[test]
    fn test_valid_updates_normalized() {
        let update = body(serde_json::json!({"email": "  John@Example.COM "}))
            .validate()
            .unwrap();
        assert_eq!(update.email.as_deref(), Some("john@example.com"));

        let update = body(serde_json::json!({"name": " John Doe ", "role": "admin"}))
            .validate()
            .unwrap();
        assert_eq!(update.name.as_deref(), Some("John Doe"));
        assert_eq!(update.role, Some(Role::Admin));
    }

    #[test]
    fn test_field_errors_collected() {
        let err = body(serde_json::json!({"name": "A", "email": "invalid-email", "role": "root"}))
            .validate()
            .unwrap_err();
        let fields: Vec<_> = err.0.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, ["name", "email", "role"]);
    }

    #[test]
    fn test_email_shapes() {
        assert!(is_valid_email("a@b.com"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("@b.com"));
        assert!(!is_valid_email("a b@c.com"));
        assert!(!is_valid_email("a@@b.com"));
    }
}
