use axum::{Router, routing::get};

use crate::{AppState, handlers, middleware::secured};

/// Reports Router Module
///
/// `ReportController` is not part of the managed area but carries an authorize
/// marker, so the first request to any of its actions registers its namespace
/// into the menu catalog.
pub fn report_routes(state: &AppState) -> Router<AppState> {
    let auth = &state.authorize;
    let report = &state.controllers.report;

    Router::new()
        .route(
            "/Reports",
            secured(auth, report, "Index", get(handlers::show_action)),
        )
        .route(
            "/Reports/Export",
            secured(auth, report, "Export", get(handlers::export_report)),
        )
        .route(
            "/Reports/Summary",
            secured(auth, report, "Summary", get(handlers::show_action)),
        )
}
