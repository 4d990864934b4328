use std::sync::Arc;

use crate::audit::AuditState;
use crate::context::RequestContext;
use crate::controller::{ActionDescriptor, ControllerDescriptor};
use crate::decision::{AuthorizationOutcome, decide, resource_label};
use crate::error::AuthorizeResult;
use crate::identity::IdentityState;
use crate::resolver::MenuResolver;
use crate::scope::{AreaState, Scope, classify};

/// EntityAuthorize
///
/// The stateless decision pipeline run once per request:
/// classify the action, resolve (or register) its menu node, then decide against
/// the current caller. Every expected result is an `AuthorizationOutcome`; only
/// store or scan failures come back as errors.
///
/// **Send + Sync**: every collaborator is an `Arc<dyn Trait>`, so one pipeline is
/// built at startup and shared by all requests through `AuthorizeState`.
pub struct EntityAuthorize {
    areas: AreaState,
    resolver: Arc<MenuResolver>,
    identity: IdentityState,
    audit: AuditState,
}

impl EntityAuthorize {
    /// Assembles the pipeline from its collaborators: the managed-area test, the
    /// resolver owning the registration guard, the identity source and the audit sink.
    pub fn new(
        areas: AreaState,
        resolver: Arc<MenuResolver>,
        identity: IdentityState,
        audit: AuditState,
    ) -> Self {
        Self {
            areas,
            resolver,
            identity,
            audit,
        }
    }

    /// The resolver, for hosts that need the catalog or the guard directly.
    pub fn resolver(&self) -> &Arc<MenuResolver> {
        &self.resolver
    }

    /// authorize
    ///
    /// Decides one request for `controller`/`action`.
    ///
    /// *Mechanism*:
    /// 1. `classify` settles anonymous and out-of-scope actions as `Allowed`
    ///    without touching the catalog or the identity source.
    /// 2. The resolver finds the node, scanning the namespace first when the
    ///    action opted in from outside the managed area.
    /// 3. The caller is read from the request and checked against the action's
    ///    required flag; denials of known callers are audited.
    pub async fn authorize(
        &self,
        ctx: &mut RequestContext,
        controller: &ControllerDescriptor,
        action: &ActionDescriptor,
    ) -> AuthorizeResult<AuthorizationOutcome> {
        let requires_creation = match classify(self.areas.as_ref(), controller, action) {
            Scope::OutOfScope => {
                tracing::debug!(
                    controller = %controller.full_name(),
                    action = %action.name,
                    "action outside entity authorization"
                );
                return Ok(AuthorizationOutcome::Allowed);
            }
            Scope::InScope { requires_creation } => requires_creation,
        };

        let menu = self
            .resolver
            .resolve(ctx, controller, &action.name, requires_creation)
            .await?;

        let user = self.identity.current_user(ctx).await?;
        let required = controller.required_permission(action);
        let resource = resource_label(controller, &action.name);

        let outcome = decide(
            user.as_ref(),
            menu.as_ref(),
            required,
            &resource,
            ctx,
            self.audit.as_ref(),
        )
        .await;

        tracing::debug!(resource = %resource, ?outcome, "authorization decided");
        Ok(outcome)
    }

    /// Like `authorize`, for an action only known by name. Unlisted actions
    /// carry no markers of their own.
    pub async fn authorize_named(
        &self,
        ctx: &mut RequestContext,
        controller: &ControllerDescriptor,
        action: &str,
    ) -> AuthorizeResult<AuthorizationOutcome> {
        match controller.find_action(action) {
            Some(descriptor) => self.authorize(ctx, controller, descriptor).await,
            None => {
                let descriptor = ActionDescriptor::new(action);
                self.authorize(ctx, controller, &descriptor).await
            }
        }
    }

    /// bootstrap
    ///
    /// Registers every managed-area namespace known to the controller registry.
    /// Returns how many namespaces were scanned by this call. Run once at startup:
    /// managed actions never trigger a scan themselves.
    pub async fn bootstrap(&self) -> AuthorizeResult<usize> {
        let registry = self.resolver.registry();
        let mut scanned = 0;
        for namespace in registry.namespaces() {
            let managed = registry
                .controllers_in(namespace)
                .iter()
                .any(|c| self.areas.contains(c));
            if managed && self.resolver.ensure_registered(namespace).await? {
                scanned += 1;
            }
        }
        tracing::info!(scanned, "managed area catalog bootstrapped");
        Ok(scanned)
    }
}
