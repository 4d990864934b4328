use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
};
use std::sync::Arc;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Authorization core ---

pub mod audit;
pub mod config;
pub mod context;
pub mod controller;
pub mod decision;
pub mod error;
pub mod filter;
pub mod identity;
pub mod menu;
pub mod middleware;
pub mod permission;
pub mod resolver;
pub mod scope;
pub mod view;

// --- Demo host ---

pub mod handlers;
pub mod routes;

pub use audit::{AuditSink, AuditState, MemoryAuditSink, TracingAuditSink};
pub use config::AuthorizeConfig;
pub use context::RequestContext;
pub use controller::{ActionDescriptor, Authorize, ControllerDescriptor, ControllerRegistry};
pub use decision::{AuthorizationOutcome, Forbidden};
pub use error::{AuthorizeError, AuthorizeResult};
pub use filter::EntityAuthorize;
pub use identity::{BearerIdentityResolver, IdentityResolver, InMemoryUserDirectory, User};
pub use menu::{InMemoryMenuStore, MenuNode, MenuStore, MenuStoreState};
pub use middleware::{AuthorizeState, CurrentMenu, secured};
pub use permission::PermissionFlags;
pub use resolver::{MenuResolver, RegistrationGuard};
pub use scope::{AreaMembership, ManagedAreas, Scope};

use identity::{IdentityState, UserDirectoryState};
use routes::Controllers;
use scope::AreaState;
use view::JsonViewRenderer;

/// AppState
///
/// The shared state of the hosting app: the authorization pipeline plus the
/// collaborators handlers read directly.
#[derive(Clone)]
pub struct AppState {
    pub authorize: AuthorizeState,
    pub controllers: Arc<Controllers>,
    pub store: MenuStoreState,
    pub users: UserDirectoryState,
    pub config: AuthorizeConfig,
}

impl AppState {
    /// Wires the registry, resolver, identity and audit collaborators together.
    pub fn new(
        config: AuthorizeConfig,
        store: MenuStoreState,
        users: UserDirectoryState,
        audit: AuditState,
    ) -> AuthorizeResult<Self> {
        let mut registry = ControllerRegistry::new();
        let controllers = Arc::new(routes::register_controllers(&mut registry)?);

        let resolver = Arc::new(MenuResolver::new(store.clone(), Arc::new(registry)));
        let identity: IdentityState = Arc::new(BearerIdentityResolver::new(
            users.clone(),
            config.clone(),
        ));
        let areas: AreaState = Arc::new(ManagedAreas::new(config.managed_areas.clone()));

        let authorize = AuthorizeState {
            filter: Arc::new(EntityAuthorize::new(areas, resolver, identity, audit)),
            renderer: Arc::new(JsonViewRenderer),
            config: config.clone(),
        };

        Ok(Self {
            authorize,
            controllers,
            store,
            users,
            config,
        })
    }
}

impl FromRef<AppState> for MenuStoreState {
    fn from_ref(app_state: &AppState) -> MenuStoreState {
        app_state.store.clone()
    }
}

impl FromRef<AppState> for UserDirectoryState {
    fn from_ref(app_state: &AppState) -> UserDirectoryState {
        app_state.users.clone()
    }
}

impl FromRef<AppState> for AuthorizeConfig {
    fn from_ref(app_state: &AppState) -> AuthorizeConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Mounts the demo controllers behind the authorization middleware and adds the
/// request-id, tracing and CORS layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(routes::public::public_routes(&state))
        .merge(routes::admin::admin_routes(&state))
        .merge(routes::reports::report_routes(&state))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

// Correlates every log line of a request through its x-request-id.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
