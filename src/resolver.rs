use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::context::RequestContext;
use crate::controller::{ControllerDescriptor, ControllerRegistry};
use crate::error::{AuthorizeError, AuthorizeResult};
use crate::menu::{MenuNode, MenuStoreState};
use crate::permission::{PermissionLabels, describe};

/// RegistrationGuard
///
/// Namespaces whose catalog scan has been claimed by this process, each with the
/// outcome of that scan. A namespace is claimed by the first caller before its
/// scan starts and stays claimed for the lifetime of the guard, whether the scan
/// succeeded or not.
///
/// *Mechanism*:
/// 1. `claims` maps a namespace to a `OnceCell` holding the scan result. The
///    `DashMap` entry API hands every caller the same cell.
/// 2. `OnceCell::get_or_init` lets exactly one caller run the scan; concurrent
///    callers wait for it and then read the stored result.
/// 3. A failed scan is stored like a successful one, so it is reported to the
///    callers that waited on it and never retried.
#[derive(Debug, Default)]
pub struct RegistrationGuard {
    claims: DashMap<String, Arc<OnceCell<AuthorizeResult<()>>>>,
}

impl RegistrationGuard {
    /// An empty guard: no namespace claimed yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// run_once
    ///
    /// Runs `scan` unless `namespace` has already been claimed. Returns `true`
    /// when this call performed the scan and `false` when it reused an earlier
    /// successful one. The error of a failed scan is returned to the caller that
    /// ran it and to every caller that waited on it. Later callers get `Ok(false)`.
    pub async fn run_once<F, Fut>(&self, namespace: &str, scan: F) -> AuthorizeResult<bool>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AuthorizeResult<()>>,
    {
        let cell = Arc::clone(
            self.claims
                .entry(namespace.to_string())
                .or_default()
                .value(),
        );

        // Settled claims, failed ones included, are never rerun.
        if cell.initialized() {
            return Ok(false);
        }

        let mut ran = false;
        let outcome = cell
            .get_or_init(|| {
                ran = true;
                scan()
            })
            .await;

        // Waiters queued behind a failed scan get its error, not a retry.
        outcome.clone().map(|()| ran)
    }

    /// True once the scan for `namespace` has finished, whatever its outcome.
    /// A claimed namespace is never scanned again by this guard.
    pub fn is_claimed(&self, namespace: &str) -> bool {
        self.claims
            .get(namespace)
            .is_some_and(|cell| cell.initialized())
    }

    /// The stored outcome of the scan for `namespace`, if one has finished.
    pub fn outcome(&self, namespace: &str) -> Option<AuthorizeResult<()>> {
        self.claims
            .get(namespace)
            .and_then(|cell| cell.get().cloned())
    }
}

/// MenuResolver
///
/// Maps an action onto its catalog node. Controllers outside the managed area are
/// registered on first sight: every controller of the namespace gets a node with
/// the permission labels of its marked actions.
///
/// **Ownership**: the resolver owns its `RegistrationGuard`, so "once per
/// namespace" means once per resolver. The host builds one resolver at startup
/// and shares it behind an `Arc`.
pub struct MenuResolver {
    store: MenuStoreState,
    registry: Arc<ControllerRegistry>,
    guard: RegistrationGuard,
}

impl MenuResolver {
    /// Builds a resolver over `store` with a fresh guard. `registry` must already
    /// hold every controller a route can be bound to.
    pub fn new(store: MenuStoreState, registry: Arc<ControllerRegistry>) -> Self {
        Self {
            store,
            registry,
            guard: RegistrationGuard::new(),
        }
    }

    /// The catalog this resolver reads and populates.
    pub fn store(&self) -> &MenuStoreState {
        &self.store
    }

    /// The controller table the scan reads its descriptors from.
    pub fn registry(&self) -> &Arc<ControllerRegistry> {
        &self.registry
    }

    /// The per-namespace claims, exposed for bootstrap reporting and tests.
    pub fn guard(&self) -> &RegistrationGuard {
        &self.guard
    }

    /// resolve
    ///
    /// Reuses the node cached on the request, otherwise looks up the action-level
    /// node and falls back to the controller-level node. With `requires_creation`
    /// the controller's namespace is registered first if this process has not
    /// done so yet. `Ok(None)` is a configuration gap and has already been logged.
    ///
    /// *Mechanism*:
    /// 1. `ctx.current_menu` is the per-request slot; a node already there is
    ///    reused without touching the store.
    /// 2. On an unclaimed namespace the scan runs (or is waited on) and the node
    ///    is looked up again, action level first.
    /// 3. A failed scan surfaces here as `AuthorizeError::Scan`, once. Requests
    ///    after it find the namespace claimed and resolve whatever the catalog holds.
    pub async fn resolve(
        &self,
        ctx: &mut RequestContext,
        controller: &ControllerDescriptor,
        action: &str,
        requires_creation: bool,
    ) -> AuthorizeResult<Option<MenuNode>> {
        let mut menu = match ctx.current_menu.clone() {
            Some(menu) => Some(menu),
            None => {
                let found = self.lookup(controller, action).await?;
                ctx.current_menu = found.clone();
                found
            }
        };

        if requires_creation && !self.guard.is_claimed(&controller.namespace) {
            self.ensure_registered(&controller.namespace).await?;
            // Our scan, or the one we waited on, may have created or relabelled the node.
            menu = self.lookup(controller, action).await?;
            ctx.current_menu = menu.clone();
        }

        if menu.is_none() {
            tracing::error!(
                controller = %controller.full_name(),
                action,
                "design error: no menu found for [{}/{}] while checking permissions",
                controller.full_name(),
                action
            );
        }

        Ok(menu)
    }

    async fn lookup(
        &self,
        controller: &ControllerDescriptor,
        action: &str,
    ) -> AuthorizeResult<Option<MenuNode>> {
        if let Some(node) = self
            .store
            .find_by_full_name(&controller.action_full_name(action))
            .await?
        {
            return Ok(Some(node));
        }
        self.store.find_by_full_name(&controller.full_name()).await
    }

    /// Registers `namespace` at most once per resolver, successful or not.
    /// Returns whether this call did the work.
    pub async fn ensure_registered(&self, namespace: &str) -> AuthorizeResult<bool> {
        self.guard
            .run_once(namespace, || self.register_namespace(namespace))
            .await
    }

    /// register_namespace
    ///
    /// The catalog scan itself, without the guard. Upserts labels, so running it
    /// twice leaves the same permission mappings.
    ///
    /// *Mechanism*:
    /// 1. `MenuStore::scan_controller` ensures the namespace node and one node per
    ///    controller exist.
    /// 2. The namespace node gets url `~`; each controller node gets `~/<Route>`.
    /// 3. Every non-anonymous action marked with a specific flag adds its label,
    ///    keyed by the raw flag value, to its controller's node.
    pub async fn register_namespace(&self, namespace: &str) -> AuthorizeResult<()> {
        let controllers = self.registry.controllers_in(namespace);
        if controllers.is_empty() {
            tracing::warn!(namespace, "no controllers registered for namespace");
            return Ok(());
        }

        let root_name = controllers[0].namespace_root();
        let nodes = self
            .store
            .scan_controller(root_name, controllers, namespace)
            .await
            .map_err(|e| AuthorizeError::Scan {
                namespace: namespace.to_string(),
                reason: e.to_string(),
            })?;

        if let Some(mut root) = self.store.find_by_full_name(namespace).await? {
            root.url = "~".to_string();
            self.store.update(&root).await?;
        }

        for mut node in nodes {
            if node.full_name.is_empty() {
                continue;
            }
            let Some(controller) = controllers.iter().find(|c| c.full_name() == node.full_name)
            else {
                continue;
            };

            for action in &controller.actions {
                if action.allow_anonymous {
                    continue;
                }
                let Some(marker) = action.authorize else {
                    continue;
                };
                let flag = marker.permission();
                if flag.is_empty() {
                    continue;
                }

                let label = if flag.is_primitive() {
                    describe(flag, &PermissionLabels::new())
                } else {
                    action.label().to_string()
                };
                node.permissions.insert(flag.bits(), label);
            }

            node.url = format!("~/{}", controller.route_name());
            self.store.update(&node).await?;
        }

        tracing::info!(
            namespace,
            controllers = controllers.len(),
            "registered controller namespace into menu catalog"
        );
        Ok(())
    }
}
