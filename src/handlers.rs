use axum::{
    Extension, Json,
    extract::State,
    http::{StatusCode, Uri},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    config::AuthorizeConfig,
    identity::{UserDirectoryState, issue_token},
    menu::{MenuNode, MenuStoreState},
    middleware::CurrentMenu,
};

const TOKEN_TTL_SECS: u64 = 3600;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

/// login
///
/// [Anonymous] Issues a bearer token for a known user name. Credentials are the
/// identity provider's concern; the demo host only knows names.
pub async fn login(
    State(users): State<UserDirectoryState>,
    State(config): State<AuthorizeConfig>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, StatusCode> {
    let user = users
        .find_by_name(&payload.name)
        .await
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = issue_token(&config.jwt_secret, user.id, TOKEN_TTL_SECS).map_err(|e| {
        tracing::error!("login error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    tracing::info!(user = %user.name, "user logged in");
    Ok(Json(LoginResponse { token }))
}

/// show_action
///
/// Echoes the request path and the menu node the request was authorized against.
pub async fn show_action(
    uri: Uri,
    Extension(CurrentMenu(menu)): Extension<CurrentMenu>,
) -> Json<Value> {
    Json(json!({
        "path": uri.path(),
        "menu": menu,
    }))
}

/// list_menus
///
/// Lists the nodes sharing a parent with the current menu.
pub async fn list_menus(
    State(store): State<MenuStoreState>,
    Extension(CurrentMenu(menu)): Extension<CurrentMenu>,
) -> Result<Json<Vec<MenuNode>>, StatusCode> {
    let Some(parent_id) = menu.and_then(|m| m.parent_id) else {
        return Ok(Json(vec![]));
    };

    store.children(parent_id).await.map(Json).map_err(|e| {
        tracing::error!("list_menus error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// export_report
///
/// Guarded by the custom export right registered on the report menu.
pub async fn export_report(
    Extension(CurrentMenu(menu)): Extension<CurrentMenu>,
) -> (StatusCode, String) {
    let name = menu.map(|m| m.display_name).unwrap_or_default();
    (StatusCode::OK, format!("report,generated\n{name},true\n"))
}
