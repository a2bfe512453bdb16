//! Request metadata used by the admission pipeline.
//!
//! # Responsibilities
//! - Generate a request ID (UUID v4) when the caller did not send one
//! - Resolve the caller's network identity (peer address, or the last
//!   `X-Forwarded-For` entry when the deployment trusts its proxy)
//! - Capture path, method and user agent for log events

use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::{header, HeaderName, Request};
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Generates UUID v4 request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeUuidRequestId;

impl MakeRequestId for MakeUuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = uuid::Uuid::new_v4().to_string();
        id.parse().ok().map(RequestId::new)
    }
}

pub fn set_request_id_layer() -> SetRequestIdLayer<MakeUuidRequestId> {
    SetRequestIdLayer::new(X_REQUEST_ID, MakeUuidRequestId)
}

pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(X_REQUEST_ID)
}

/// Caller details attached to every log event the pipeline emits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub client_ip: Option<IpAddr>,
    pub method: String,
    pub path: String,
    pub user_agent: Option<String>,
    pub request_id: Option<String>,
}

impl RequestContext {
    /// With `trust_forwarded`, the caller is the last `X-Forwarded-For`
    /// entry: the one appended by the trusted proxy. Entries to its left
    /// are client supplied and ignored.
    pub fn from_request<B>(req: &Request<B>, trust_forwarded: bool) -> Self {
        let headers = req.headers();
        let forwarded = trust_forwarded
            .then(|| {
                headers
                    .get(X_FORWARDED_FOR)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.rsplit(',').next())
                    .and_then(|ip| ip.trim().parse::<IpAddr>().ok())
            })
            .flatten();
        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        Self {
            client_ip: forwarded.or(peer),
            method: req.method().to_string(),
            path: req.uri().path().to_string(),
            user_agent: headers
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            request_id: headers
                .get(X_REQUEST_ID)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        }
    }

    /// Display form of the caller address, `unknown` when none resolved.
    pub fn ip_label(&self) -> String {
        self.client_ip
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub fn request_id_label(&self) -> &str {
        self.request_id.as_deref().unwrap_or("-")
    }

    pub fn user_agent_label(&self) -> &str {
        self.user_agent.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request() -> Request<Body> {
        let mut req = Request::builder()
            .method("POST")
            .uri("/api/users/4?x=1")
            .header(header::USER_AGENT, "curl/8.4.0")
            .header(X_FORWARDED_FOR, "203.0.113.9, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 1], 51000))));
        req
    }

    #[test]
    fn test_peer_address_when_untrusted() {
        let ctx = RequestContext::from_request(&request(), false);
        assert_eq!(ctx.client_ip, Some(IpAddr::from([10, 0, 0, 1])));
        assert_eq!(ctx.method, "POST");
        assert_eq!(ctx.path, "/api/users/4");
        assert_eq!(ctx.user_agent_label(), "curl/8.4.0");
    }

    #[test]
    fn test_forwarded_for_when_trusted() {
        let ctx = RequestContext::from_request(&request(), true);
        assert_eq!(ctx.client_ip, Some(IpAddr::from([10, 0, 0, 1])));

        let mut req = request();
        req.headers_mut()
            .insert(X_FORWARDED_FOR, "198.51.100.4".parse().unwrap());
        let ctx = RequestContext::from_request(&req, true);
        assert_eq!(ctx.client_ip, Some(IpAddr::from([198, 51, 100, 4])));
    }

    #[test]
    fn test_spoofed_forwarded_prefix_is_ignored() {
        let mut spoofed = request();
        spoofed.headers_mut().insert(
            X_FORWARDED_FOR,
            "1.2.3.4, 5.6.7.8, 198.51.100.4".parse().unwrap(),
        );
        let mut honest = request();
        honest
            .headers_mut()
            .insert(X_FORWARDED_FOR, "198.51.100.4".parse().unwrap());

        let spoofed = RequestContext::from_request(&spoofed, true);
        let honest = RequestContext::from_request(&honest, true);
        assert_eq!(spoofed.ip_label(), "198.51.100.4");
        assert_eq!(spoofed.ip_label(), honest.ip_label());
    }

    #[test]
    fn test_unknown_without_connect_info() {
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let ctx = RequestContext::from_request(&req, false);
        assert_eq!(ctx.ip_label(), "unknown");
        assert_eq!(ctx.user_agent, None);
    }

    #[test]
    fn test_make_request_id_is_uuid() {
        let req = Request::builder().uri("/").body(()).unwrap();
        let id = MakeUuidRequestId.make_request_id(&req).unwrap();
        let text = id.header_value().to_str().unwrap();
        assert!(uuid::Uuid::parse_str(text).is_ok());
    }
}
