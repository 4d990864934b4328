use axum::{
    extract::{ConnectInfo, Request},
    http::HeaderMap,
};
use std::net::SocketAddr;

use crate::menu::MenuNode;

/// RequestContext
///
/// The per-request view the pipeline works against. `current_menu` is the
/// request-scoped cache slot: once a node is resolved it is reused by every
/// later stage of the same request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Encoded path and query, exactly as received.
    pub path_and_query: String,
    /// Caller address, preferring proxy headers over the socket peer.
    pub origin: Option<String>,
    pub headers: HeaderMap,
    pub current_menu: Option<MenuNode>,
}

impl RequestContext {
    pub fn new(path_and_query: impl Into<String>) -> Self {
        Self {
            path_and_query: path_and_query.into(),
            ..Default::default()
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn from_request(request: &Request) -> Self {
        let uri = request.uri();
        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string());

        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        Self {
            path_and_query,
            origin: user_host(request.headers()).or(peer),
            headers: request.headers().clone(),
            current_menu: None,
        }
    }
}

fn user_host(headers: &HeaderMap) -> Option<String> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    // First hop of X-Forwarded-For is the original client.
    header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .or_else(|| header("x-real-ip").map(str::to_string))
}
