//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, request::Builder, Method, Request, StatusCode};
use axum::Router;
use jsonwebtoken::{EncodingKey, Header};
use serde_json::Value;
use tower::ServiceExt;
use tracing_subscriber::fmt::MakeWriter;

use admission_gate::auth::identity::Role;
use admission_gate::auth::verifier::{CredentialVerifier, TokenVerifier};
use admission_gate::config::schema::RateLimitConfig;
use admission_gate::http::{AdmissionServer, Components};
use admission_gate::protection::bot::UserAgentClassifier;
use admission_gate::protection::engine::{allow_list_for, ProtectionEngine};
use admission_gate::protection::rate_limit::SlidingWindowLimiter;
use admission_gate::protection::shield::Shield;
use admission_gate::protection::OperatingMode;
use admission_gate::users::{InMemoryDirectory, UserRecord};
use admission_gate::AdmissionConfig;

pub const SECRET: &str = "integration-test-signing-key";
pub const BROWSER_UA: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36";

pub fn config(mode: OperatingMode) -> AdmissionConfig {
    let mut config = AdmissionConfig::default();
    config.mode = mode;
    config.auth.jwt_secret = Some(SECRET.to_string());
    config
}

pub struct TestApp {
    pub router: Router,
    pub alice: UserRecord,
    pub bob: UserRecord,
    pub admin: UserRecord,
}

fn seeded() -> (Arc<InMemoryDirectory>, UserRecord, UserRecord, UserRecord) {
    let directory = Arc::new(InMemoryDirectory::new());
    let alice = directory.insert("Alice", "alice@example.com", Role::User);
    let bob = directory.insert("Bob", "bob@example.com", Role::User);
    let admin = directory.insert("Root", "root@example.com", Role::Admin);
    (directory, alice, bob, admin)
}

pub fn app(config: &AdmissionConfig) -> TestApp {
    let (directory, alice, bob, admin) = seeded();
    let server = AdmissionServer::new(config, directory).unwrap();
    TestApp {
        router: server.router(),
        alice,
        bob,
        admin,
    }
}

/// App whose shield is replaced and whose rule deadline is `rule_timeout`.
pub fn app_with_shield(
    config: &AdmissionConfig,
    shield: Arc<dyn Shield>,
    rule_timeout: Duration,
) -> TestApp {
    let (directory, alice, bob, admin) = seeded();
    let engine = ProtectionEngine::new(
        Arc::new(UserAgentClassifier),
        allow_list_for(config.mode),
        shield,
        Arc::new(SlidingWindowLimiter::new(&RateLimitConfig::default())),
        rule_timeout,
    );
    let verifier = TokenVerifier::new(Some(SECRET)).unwrap();
    let components = Components::new(config, Arc::new(verifier), Arc::new(engine), directory);
    TestApp {
        router: AdmissionServer::from_components(config, components).router(),
        alice,
        bob,
        admin,
    }
}

/// App whose credential verifier is replaced.
pub fn app_with_verifier(config: &AdmissionConfig, verifier: Arc<dyn CredentialVerifier>) -> TestApp {
    let (directory, alice, bob, admin) = seeded();
    let engine = ProtectionEngine::from_config(config).unwrap();
    let components = Components::new(config, verifier, Arc::new(engine), directory);
    TestApp {
        router: AdmissionServer::from_components(config, components).router(),
        alice,
        bob,
        admin,
    }
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

pub fn mint(claims: &Value) -> String {
    jsonwebtoken::encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn token_for(user: &UserRecord) -> String {
    mint(&serde_json::json!({
        "id": user.id,
        "email": user.email,
        "role": user.role,
        "exp": now() + 600,
    }))
}

pub fn expired_token_for(user: &UserRecord) -> String {
    mint(&serde_json::json!({
        "id": user.id,
        "email": user.email,
        "role": user.role,
        "exp": now() - 60,
    }))
}

/// Request from a browser at a fixed peer address.
pub fn request(method: Method, uri: &str) -> Builder {
    from_peer(method, uri, SocketAddr::from(([203, 0, 113, 7], 40000)))
}

pub fn from_peer(method: Method, uri: &str, peer: SocketAddr) -> Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::USER_AGENT, BROWSER_UA)
        .extension(ConnectInfo(peer))
}

pub fn bearer(builder: Builder, token: &str) -> Builder {
    builder.header(header::AUTHORIZATION, format!("Bearer {token}"))
}

pub fn empty(builder: Builder) -> Request<Body> {
    builder.body(Body::empty()).unwrap()
}

pub fn json(builder: Builder, body: &Value) -> Request<Body> {
    builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = router.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

/// In-memory sink for log output.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Route log events on this thread into a buffer until the guard drops.
pub fn capture_logs() -> (LogCapture, tracing::subscriber::DefaultGuard) {
    let capture = LogCapture::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(capture.clone())
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .finish();
    (capture, tracing::subscriber::set_default(subscriber))
}
