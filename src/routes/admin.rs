use axum::{
    Router,
    routing::{get, post},
};

use crate::{AppState, handlers, middleware::secured};

/// Admin Router Module
///
/// The managed area. Its menu nodes are registered by bootstrap; every action
/// except `Login` requires the caller to hold the marked right on the node.
pub fn admin_routes(state: &AppState) -> Router<AppState> {
    let auth = &state.authorize;
    let c = &state.controllers;

    Router::new()
        // POST /Admin/User/Login
        // Anonymous: issues a bearer token for a known user name.
        .route(
            "/Admin/User/Login",
            secured(auth, &c.user, "Login", post(handlers::login)),
        )
        .route(
            "/Admin/User",
            secured(auth, &c.user, "Index", get(handlers::show_action)),
        )
        .route(
            "/Admin/User/Edit",
            secured(auth, &c.user, "Edit", get(handlers::show_action)),
        )
        .route(
            "/Admin/User/Delete",
            secured(auth, &c.user, "Delete", post(handlers::show_action)),
        )
        // GET /Admin/Menu
        // Lists the catalog nodes next to the current one.
        .route(
            "/Admin/Menu",
            secured(auth, &c.menu, "Index", get(handlers::list_menus)),
        )
        .route(
            "/Admin/Data/Edit",
            secured(auth, &c.data, "Edit", get(handlers::show_action)),
        )
}
