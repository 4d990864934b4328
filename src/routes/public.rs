use axum::{Router, routing::get};

use crate::{AppState, handlers, middleware::secured};

/// Public Router Module
///
/// `HomeController` carries no markers and lives outside the managed area, so
/// the pipeline classifies it out of scope and lets every caller through.
pub fn public_routes(state: &AppState) -> Router<AppState> {
    let auth = &state.authorize;
    let home = &state.controllers.home;

    Router::new()
        // Unbound: never reaches the pipeline.
        .route("/health", get(|| async { "ok" }))
        .route("/", secured(auth, home, "Index", get(handlers::show_action)))
}
