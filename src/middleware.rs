use axum::{
    Extension,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::MethodRouter,
};
use std::sync::Arc;

use crate::config::AuthorizeConfig;
use crate::context::RequestContext;
use crate::controller::ControllerDescriptor;
use crate::decision::AuthorizationOutcome;
use crate::filter::EntityAuthorize;
use crate::menu::MenuNode;
use crate::view::{ViewState, login_redirect};

/// ActionBinding
///
/// The controller/action a route is bound to, carried as a request extension so
/// the middleware knows what it is authorizing.
#[derive(Debug, Clone)]
pub struct ActionBinding {
    pub controller: Arc<ControllerDescriptor>,
    pub action: String,
}

/// CurrentMenu
///
/// The node resolved for an allowed request, available to handlers as
/// `Extension<CurrentMenu>`. `None` for actions outside entity authorization.
#[derive(Debug, Clone, Default)]
pub struct CurrentMenu(pub Option<MenuNode>);

/// AuthorizeState
///
/// What the middleware needs from the host: the pipeline, the renderer for the
/// denial view, and the configuration naming the login url and view.
#[derive(Clone)]
pub struct AuthorizeState {
    pub filter: Arc<EntityAuthorize>,
    pub renderer: ViewState,
    pub config: AuthorizeConfig,
}

/// entity_authorize
///
/// Runs the decision pipeline for the bound action and maps the outcome:
/// allowed requests continue with `CurrentMenu` attached, anonymous callers are
/// redirected to login, denied callers get the forbidden view. Requests with no
/// binding pass through untouched.
pub async fn entity_authorize(
    State(state): State<AuthorizeState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(binding) = request.extensions().get::<ActionBinding>().cloned() else {
        return next.run(request).await;
    };

    let mut ctx = RequestContext::from_request(&request);
    let outcome = state
        .filter
        .authorize_named(&mut ctx, &binding.controller, &binding.action)
        .await;

    match outcome {
        Ok(AuthorizationOutcome::Allowed) => {
            request
                .extensions_mut()
                .insert(CurrentMenu(ctx.current_menu));
            next.run(request).await
        }
        Ok(AuthorizationOutcome::RedirectToLogin(return_url)) => {
            login_redirect(&state.config.login_url, &return_url)
        }
        Ok(AuthorizationOutcome::Forbidden(denied)) => state
            .renderer
            .render(&state.config.forbidden_view, &denied),
        Err(e) => {
            tracing::error!(
                controller = %binding.controller.full_name(),
                action = %binding.action,
                "authorization failed: {}",
                e
            );
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// secured
///
/// Binds `route` to `controller`/`action` and wraps it in the authorization
/// middleware.
///
/// *Mechanism*: both layers go through `route_layer`, which keeps the route's
/// `Infallible` error type and only wraps methods the route actually serves
/// (405 fallbacks are not authorized). The binding layer is added last so it
/// runs first and the middleware finds `ActionBinding` in the extensions.
pub fn secured<S>(
    state: &AuthorizeState,
    controller: &Arc<ControllerDescriptor>,
    action: &str,
    route: MethodRouter<S>,
) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    route
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            entity_authorize,
        ))
        .route_layer(Extension(ActionBinding {
            controller: Arc::clone(controller),
            action: action.to_string(),
        }))
}
