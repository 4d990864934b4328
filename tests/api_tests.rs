use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use entity_authorize::{
    AppState, AuthorizeConfig, InMemoryMenuStore, InMemoryUserDirectory, MemoryAuditSink,
    MenuStore, PermissionFlags, User, create_router,
    handlers::LoginResponse,
    routes::{ADMIN_NAMESPACE, EXPORT, REPORTS_NAMESPACE},
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    store: Arc<InMemoryMenuStore>,
    audit: MemoryAuditSink,
    admin: User,
    editor: User,
    viewer: User,
}

async fn spawn_app() -> TestApp {
    let store = Arc::new(InMemoryMenuStore::with_root("Root"));
    let users = Arc::new(InMemoryUserDirectory::new());
    let audit = MemoryAuditSink::new();

    let admin = User::new("admin").admin();
    let editor = User::new("editor")
        .grant(
            format!("{ADMIN_NAMESPACE}.UserController"),
            PermissionFlags::DETAIL | PermissionFlags::UPDATE,
        )
        .grant(
            format!("{REPORTS_NAMESPACE}.ReportController"),
            PermissionFlags::DETAIL | EXPORT,
        );
    let viewer = User::new("viewer");
    for user in [&admin, &editor, &viewer] {
        users.add(user.clone());
    }

    let state = AppState::new(
        AuthorizeConfig::default(),
        store.clone(),
        users,
        Arc::new(audit.clone()),
    )
    .unwrap();
    state.authorize.filter.bootstrap().await.unwrap();

    TestApp {
        router: create_router(state),
        store,
        audit,
        admin,
        editor,
        viewer,
    }
}

fn get(uri: &str, user: Option<&User>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(user) = user {
        // Local environment: the development bypass header stands in for a token.
        builder = builder.header("x-user-id", user.id.to_string());
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let response = app.router.oneshot(get("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_out_of_scope_home_is_public() {
    let app = spawn_app().await;
    let response = app.router.oneshot(get("/", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["menu"], Value::Null);
}

#[tokio::test]
async fn test_anonymous_caller_redirected_to_login() {
    let app = spawn_app().await;
    let response = app
        .router
        .oneshot(get("/Admin/Data/Edit?id=5", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/Admin/User/Login?r=%2FAdmin%2FData%2FEdit%3Fid%3D5"
    );
}

#[tokio::test]
async fn test_login_then_bearer_access() {
    let app = spawn_app().await;

    let login = Request::builder()
        .method(Method::POST)
        .uri("/Admin/User/Login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"name":"editor"}"#))
        .unwrap();
    let response = app.router.clone().oneshot(login).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let LoginResponse { token } = serde_json::from_slice(&bytes).unwrap();

    let request = Request::builder()
        .uri("/Admin/User/Edit")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["menu"]["full_name"], format!("{ADMIN_NAMESPACE}.UserController"));
    assert_eq!(body["menu"]["url"], "~/User");
}

#[tokio::test]
async fn test_unknown_login_rejected() {
    let app = spawn_app().await;
    let login = Request::builder()
        .method(Method::POST)
        .uri("/Admin/User/Login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"name":"mallory"}"#))
        .unwrap();
    let response = app.router.oneshot(login).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_forbidden_view_payload() {
    let app = spawn_app().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/Admin/User/Delete")
        .header("x-user-id", app.editor.id.to_string())
        .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
        .body(Body::empty())
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = json_body(response).await;
    assert_eq!(body["view"], "NoPermission");
    assert_eq!(body["data"]["Resource"], "[UserController/Delete]");
    assert_eq!(body["data"]["Permission"], 8);
    assert_eq!(body["data"]["PermissionName"], "Delete");
    assert_eq!(
        body["data"]["Menu"]["full_name"],
        format!("{ADMIN_NAMESPACE}.UserController")
    );

    let entries = app.audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].origin.as_deref(), Some("203.0.113.9"));
}

#[tokio::test]
async fn test_wrong_method_is_not_authorized() {
    let app = spawn_app().await;

    // Delete only serves POST: the 405 fallback sits outside the authorization layer.
    let response = app
        .router
        .oneshot(get("/Admin/User/Delete", Some(&app.editor)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(app.audit.entries().is_empty());
}

#[tokio::test]
async fn test_admin_reaches_every_managed_action() {
    let app = spawn_app().await;
    for uri in ["/Admin/User", "/Admin/User/Edit", "/Admin/Data/Edit?id=5", "/Admin/Menu"] {
        let response = app
            .router
            .clone()
            .oneshot(get(uri, Some(&app.admin)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
    }
}

#[tokio::test]
async fn test_menu_listing_shows_admin_controllers() {
    let app = spawn_app().await;
    let response = app
        .router
        .oneshot(get("/Admin/Menu", Some(&app.admin)))
        .await
        .unwrap();

    let body = json_body(response).await;
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Data", "Menu", "User"]);
}

#[tokio::test]
async fn test_reports_register_on_first_request() {
    let app = spawn_app().await;
    let report_menu = format!("{REPORTS_NAMESPACE}.ReportController");
    assert!(app.store.find_by_full_name(&report_menu).await.unwrap().is_none());

    let response = app
        .router
        .clone()
        .oneshot(get("/Reports/Export", Some(&app.editor)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let node = app.store.find_by_full_name(&report_menu).await.unwrap().unwrap();
    assert_eq!(node.url, "~/Report");
    assert_eq!(node.permissions.get(&1).map(String::as_str), Some("Detail"));
    assert_eq!(
        node.permissions.get(&EXPORT.bits()).map(String::as_str),
        Some("Export")
    );

    // Admin area bootstrap plus this namespace; later requests do not scan again.
    let scans = app.store.scan_count();
    let response = app
        .router
        .oneshot(get("/Reports", Some(&app.editor)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.store.scan_count(), scans);
}

#[tokio::test]
async fn test_report_rights_follow_markers() {
    let app = spawn_app().await;

    // Controller-level marker without a flag: any logged-in caller.
    let response = app
        .router
        .clone()
        .oneshot(get("/Reports/Summary", Some(&app.viewer)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router
        .clone()
        .oneshot(get("/Reports/Export", Some(&app.viewer)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["data"]["PermissionName"], "Export");

    let response = app
        .router
        .oneshot(get("/Reports/Summary", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
}
