use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::auth::identity::{Identity, IdentityContext, Role};
use crate::error::AdmissionError;
use crate::http::server::AppState;
use crate::users::directory::{DirectoryError, UserRecord};
use crate::users::validation::{parse_user_id, UpdateUserRequest, ValidationErrors};

/// Failures a user handler can return on top of admission errors.
#[derive(Debug)]
pub enum ApiError {
    Admission(AdmissionError),
    Validation(ValidationErrors),
    NotFound,
    Conflict(DirectoryError),
}

impl From<AdmissionError> for ApiError {
    fn from(e: AdmissionError) -> Self {
        ApiError::Admission(e)
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(e: ValidationErrors) -> Self {
        ApiError::Validation(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Admission(e) => e.into_response(),
            ApiError::Validation(e) => e.into_response(),
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({
                    "error": "Not found",
                    "message": "User not found",
                })),
            )
                .into_response(),
            ApiError::Conflict(e) => (
                StatusCode::CONFLICT,
                Json(serde_json::json!({
                    "error": "Conflict",
                    "message": capitalize(&e.to_string()),
                })),
            )
                .into_response(),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn caller(ctx: &IdentityContext) -> Result<&Identity, ApiError> {
    ctx.identity()
        .ok_or(ApiError::Admission(AdmissionError::Unauthenticated))
}

/// Users may act on their own record; admins on any.
fn ensure_self_or_admin(identity: &Identity, target: i64) -> Result<(), ApiError> {
    if identity.role == Role::Admin || identity.id == target {
        Ok(())
    } else {
        Err(AdmissionError::Unauthorized {
            role: identity.role,
            allowed: vec![Role::Admin],
        }
        .into())
    }
}

pub async fn list_users(State(state): State<AppState>) -> Json<Vec<UserRecord>> {
    Json(state.directory.list().await)
}

pub async fn get_user(
    State(state): State<AppState>,
    ctx: IdentityContext,
    Path(raw_id): Path<String>,
) -> Result<Json<UserRecord>, ApiError> {
    let id = parse_user_id(&raw_id)?;
    ensure_self_or_admin(caller(&ctx)?, id)?;

    state
        .directory
        .find_by_id(id)
        .await
        .map(Json)
        .ok_or(ApiError::NotFound)
}

pub async fn update_user(
    State(state): State<AppState>,
    ctx: IdentityContext,
    Path(raw_id): Path<String>,
    body: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<UserRecord>, ApiError> {
    let id = parse_user_id(&raw_id)?;
    let Json(body) =
        body.map_err(|e| ValidationErrors::single("body", e.body_text()))?;
    let update = body.validate()?;

    let identity = caller(&ctx)?;
    ensure_self_or_admin(identity, id)?;
    if update.role.is_some() && identity.role != Role::Admin {
        return Err(AdmissionError::Unauthorized {
            role: identity.role,
            allowed: vec![Role::Admin],
        }
        .into());
    }

    match state.directory.update(id, update).await {
        Ok(Some(record)) => {
            tracing::info!(user_id = id, updated_by = identity.id, "User updated");
            Ok(Json(record))
        }
        Ok(None) => Err(ApiError::NotFound),
        Err(e) => Err(ApiError::Conflict(e)),
    }
}
