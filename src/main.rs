use entity_authorize::{
    AppState, InMemoryMenuStore, InMemoryUserDirectory, MenuStoreState, PermissionFlags,
    TracingAuditSink, User,
    config::{AuthorizeConfig, Env},
    create_router,
    routes::{ADMIN_NAMESPACE, EXPORT, REPORTS_NAMESPACE},
};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, installs logging, seeds the demo users, registers the
/// managed area into the menu catalog and serves the demo controllers.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast in production)
    dotenv::dotenv().ok();
    let config = AuthorizeConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise verbose for this crate.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "entity_authorize=debug,audit=info,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Collaborators
    let store: MenuStoreState = Arc::new(InMemoryMenuStore::with_root("Root"));
    let users = Arc::new(InMemoryUserDirectory::new());
    users.add(User::new("admin").admin());
    users.add(
        User::new("editor")
            .grant(
                format!("{ADMIN_NAMESPACE}.UserController"),
                PermissionFlags::DETAIL | PermissionFlags::UPDATE,
            )
            .grant(
                format!("{REPORTS_NAMESPACE}.ReportController"),
                PermissionFlags::DETAIL | EXPORT,
            ),
    );

    let state = AppState::new(config.clone(), store, users, Arc::new(TracingAuditSink))
        .expect("FATAL: invalid controller registration table.");

    // 4. Managed area bootstrap
    state
        .authorize
        .filter
        .bootstrap()
        .await
        .expect("FATAL: failed to register the managed area menus.");

    // 5. Server
    let app = create_router(state);
    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .expect("FATAL: failed to bind listener. Check BIND_ADDR.");

    tracing::info!("Listening on {}", config.bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("FATAL: server terminated unexpectedly.");
}
