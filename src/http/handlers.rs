use axum::{extract::State, Json};
use serde::Serialize;

use crate::auth::identity::{Identity, IdentityContext};
use crate::http::server::AppState;

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub mode: &'static str,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "OK",
        version: env!("CARGO_PKG_VERSION"),
        mode: state.mode.as_str(),
    })
}

#[derive(Serialize)]
pub struct SessionView {
    pub authenticated: bool,
    pub user: Option<Identity>,
}

/// Who the caller is, or that they are anonymous.
pub async fn session(ctx: IdentityContext) -> Json<SessionView> {
    Json(SessionView {
        authenticated: ctx.is_authenticated(),
        user: ctx.identity().cloned(),
    })
}
