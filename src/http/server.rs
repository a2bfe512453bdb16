//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the shared admission components from configuration
//! - Compose the route groups with their admission layers
//! - Wire request ID, tracing and timeout layers
//! - Serve with peer addresses and graceful shutdown
//!
//! Admission layers run outermost first: authentication, then protection,
//! then the role gate, then the handler. `route_layer` wraps only matched
//! routes, so unknown paths fall through to a plain 404.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware::from_fn_with_state,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::auth::identity::Role;
use crate::auth::middleware::{optional_auth, require_auth, require_role, AuthState, RoleGate};
use crate::auth::verifier::{CredentialVerifier, TokenVerifier};
use crate::config::{AdmissionConfig, ConfigError};
use crate::http::handlers::{health, session};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::protection::engine::ProtectionEngine;
use crate::protection::middleware::{protect, ProtectionState};
use crate::protection::mode::OperatingMode;
use crate::protection::policy::RolePolicyTable;
use crate::protection::RuleFault;
use crate::users::directory::UserDirectory;
use crate::users::handlers::{get_user, list_users, update_user};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<dyn UserDirectory>,
    pub mode: OperatingMode,
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("protection engine: {0}")]
    Protection(#[from] RuleFault),
}

/// Admission components shared by every route group.
#[derive(Clone)]
pub struct Components {
    pub auth: AuthState,
    pub protection: ProtectionState,
    pub state: AppState,
    pub trust_forwarded: bool,
}

impl Components {
    /// Build verifier, engine and policy table from `config`. A missing
    /// signing secret is fatal.
    pub fn from_config(
        config: &AdmissionConfig,
        directory: Arc<dyn UserDirectory>,
    ) -> Result<Self, StartupError> {
        let verifier = TokenVerifier::new(config.auth.jwt_secret.as_deref())?;
        let engine = ProtectionEngine::from_config(config)?;
        Ok(Self::new(config, Arc::new(verifier), Arc::new(engine), directory))
    }

    /// Assemble from pre-built parts; used when the verifier or the
    /// engine's rules are substituted.
    pub fn new(
        config: &AdmissionConfig,
        verifier: Arc<dyn CredentialVerifier>,
        engine: Arc<ProtectionEngine>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        let trust_forwarded = config.network.trust_forwarded_for;
        Self {
            auth: AuthState::new(verifier, trust_forwarded),
            protection: ProtectionState {
                mode: config.mode,
                table: RolePolicyTable::from_config(&config.policy),
                engine,
                trust_forwarded,
            },
            state: AppState {
                directory,
                mode: config.mode,
            },
            trust_forwarded,
        }
    }
}

/// Build the Axum router with all admission and middleware layers.
#[allow(deprecated)]
pub fn build_router(components: Components, request_timeout: Duration) -> Router {
    let Components {
        auth,
        protection,
        state,
        trust_forwarded,
    } = components;
    let admin_gate = RoleGate::new([Role::Admin]).trust_forwarded(trust_forwarded);

    let public = Router::new().route("/health", get(health));

    let session_routes = Router::new()
        .route("/api/session", get(session))
        .route_layer(from_fn_with_state(protection.clone(), protect))
        .route_layer(from_fn_with_state(auth.clone(), optional_auth));

    let user_routes = Router::new()
        .route("/api/users/{id}", get(get_user).put(update_user))
        .route_layer(from_fn_with_state(protection.clone(), protect))
        .route_layer(from_fn_with_state(auth.clone(), require_auth));

    let admin_routes = Router::new()
        .route("/api/users", get(list_users))
        .route_layer(from_fn_with_state(admin_gate, require_role))
        .route_layer(from_fn_with_state(protection, protect))
        .route_layer(from_fn_with_state(auth, require_auth));

    Router::new()
        .merge(public)
        .merge(session_routes)
        .merge(user_routes)
        .merge(admin_routes)
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(propagate_request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(set_request_id_layer())
}

/// HTTP server for the admission gateway.
pub struct AdmissionServer {
    router: Router,
    mode: OperatingMode,
}

impl AdmissionServer {
    /// Build every admission component from `config` and compose the router.
    pub fn new(
        config: &AdmissionConfig,
        directory: Arc<dyn UserDirectory>,
    ) -> Result<Self, StartupError> {
        let components = Components::from_config(config, directory)?;
        Ok(Self::from_components(config, components))
    }

    /// Compose the router around components built by the caller.
    pub fn from_components(config: &AdmissionConfig, components: Components) -> Self {
        let timeout = Duration::from_secs(config.listener.request_timeout_secs);
        Self {
            router: build_router(components, timeout),
            mode: config.mode,
        }
    }

    /// A clone of the composed router, for serving or in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, mode = %self.mode, "Admission server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Admission server stopped");
        Ok(())
    }
}
