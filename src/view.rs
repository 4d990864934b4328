use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;
use url::form_urlencoded;

use crate::decision::Forbidden;

/// ViewRenderer
///
/// Turns a named view and the denial payload into a response. Hosts with a
/// template engine plug it in here.
pub trait ViewRenderer: Send + Sync {
    fn render(&self, view: &str, data: &Forbidden) -> Response;
}

pub type ViewState = Arc<dyn ViewRenderer>;

/// JsonViewRenderer
///
/// Renders the denial as a 403 JSON document.
#[derive(Clone, Default)]
pub struct JsonViewRenderer;

impl ViewRenderer for JsonViewRenderer {
    fn render(&self, view: &str, data: &Forbidden) -> Response {
        (
            StatusCode::FORBIDDEN,
            Json(json!({
                "view": view,
                "data": data,
            })),
        )
            .into_response()
    }
}

/// Appends `return_url` to `url` as the `r` query parameter.
pub fn append_return(url: &str, return_url: &str) -> String {
    if return_url.is_empty() {
        return url.to_string();
    }
    let sep = if url.contains('?') { '&' } else { '?' };
    let encoded: String = form_urlencoded::byte_serialize(return_url.as_bytes()).collect();
    format!("{url}{sep}r={encoded}")
}

/// 302 to the login page, carrying the rejected request as return url.
pub fn login_redirect(login_url: &str, return_url: &str) -> Response {
    let location = append_return(login_url, return_url);
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}
