use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{AuthorizeError, AuthorizeResult};
use crate::permission::PermissionFlags;

/// Authorize
///
/// The declarative permission requirement attached to a controller or an action.
/// A marker built with `any()` only demands a logged-in caller; `new()` demands a
/// specific right and refuses the empty flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authorize {
    permission: PermissionFlags,
}

impl Authorize {
    /// A marker demanding `permission`. The empty flag is refused with
    /// `AuthorizeError::InvalidPermission`; use `any()` for a login-only marker.
    pub fn new(permission: PermissionFlags) -> AuthorizeResult<Self> {
        if permission.is_empty() {
            return Err(AuthorizeError::InvalidPermission);
        }
        Ok(Self { permission })
    }

    /// The parameterless marker: the caller must be logged in, no bit is required.
    pub fn any() -> Self {
        Self {
            permission: PermissionFlags::NONE,
        }
    }

    /// The required flag, `PermissionFlags::NONE` for `any()`.
    pub fn permission(&self) -> PermissionFlags {
        self.permission
    }
}

/// ActionDescriptor
///
/// One routable action of a controller, listed explicitly at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionDescriptor {
    pub name: String,
    pub display_name: Option<String>,
    pub allow_anonymous: bool,
    pub authorize: Option<Authorize>,
}

impl ActionDescriptor {
    /// An unmarked action: not anonymous, no requirement of its own.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            allow_anonymous: false,
            authorize: None,
        }
    }

    /// Display name, used as the label of a custom permission bit.
    pub fn display(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Marks the action as reachable without logging in. Wins over any marker.
    pub fn anonymous(mut self) -> Self {
        self.allow_anonymous = true;
        self
    }

    /// Attaches the action's own requirement, which overrides the controller's.
    pub fn authorize(mut self, marker: Authorize) -> Self {
        self.authorize = Some(marker);
        self
    }

    /// Label recorded for this action's custom permission bit.
    pub fn label(&self) -> &str {
        match &self.display_name {
            Some(dn) if !dn.is_empty() => dn,
            _ => &self.name,
        }
    }
}

/// ControllerDescriptor
///
/// A controller type together with its markers and the actions it exposes. This
/// replaces runtime inspection: the catalog scan reads these descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerDescriptor {
    /// Dotted namespace, e.g. `Contoso.Reports.Controllers`.
    pub namespace: String,
    /// Type name, e.g. `ReportController`.
    pub type_name: String,
    pub display_name: Option<String>,
    pub allow_anonymous: bool,
    pub authorize: Option<Authorize>,
    pub actions: Vec<ActionDescriptor>,
}

impl ControllerDescriptor {
    /// An unmarked controller with no actions. `namespace` is dotted, e.g.
    /// `Cube.Areas.Admin.Controllers`; `type_name` keeps its `Controller` suffix.
    pub fn new(namespace: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            type_name: type_name.into(),
            display_name: None,
            allow_anonymous: false,
            authorize: None,
            actions: Vec::new(),
        }
    }

    /// Display name given to the controller's menu node on first registration.
    pub fn display(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Opens every action of the controller to anonymous callers.
    pub fn anonymous(mut self) -> Self {
        self.allow_anonymous = true;
        self
    }

    /// Controller-level marker. Outside the managed area it opts every action
    /// into entity authorization and registers the namespace on first use.
    pub fn authorize(mut self, marker: Authorize) -> Self {
        self.authorize = Some(marker);
        self
    }

    /// Appends a routable action.
    pub fn action(mut self, action: ActionDescriptor) -> Self {
        self.actions.push(action);
        self
    }

    /// `<Namespace>.<TypeName>`, the key of the controller-level menu node.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.namespace, self.type_name)
    }

    /// `<Namespace>.<TypeName>.<Action>`, the key of an action-level menu node.
    pub fn action_full_name(&self, action: &str) -> String {
        format!("{}.{}", self.full_name(), action)
    }

    /// Type name without its `Controller` suffix, as used in routes and labels.
    pub fn route_name(&self) -> &str {
        self.type_name
            .strip_suffix("Controller")
            .unwrap_or(&self.type_name)
    }

    /// The namespace with a trailing `.Controllers` segment removed.
    pub fn namespace_root(&self) -> &str {
        self.namespace
            .strip_suffix(".Controllers")
            .unwrap_or(&self.namespace)
    }

    /// The listed action named `name`, if any.
    pub fn find_action(&self, name: &str) -> Option<&ActionDescriptor> {
        self.actions.iter().find(|a| a.name == name)
    }

    /// Permission demanded by `action`: the action marker wins over the
    /// controller marker; with neither, nothing specific is required.
    pub fn required_permission(&self, action: &ActionDescriptor) -> PermissionFlags {
        action
            .authorize
            .or(self.authorize)
            .map(|a| a.permission())
            .unwrap_or(PermissionFlags::NONE)
    }
}

/// ControllerRegistry
///
/// Every controller known to the host, grouped by namespace.
#[derive(Debug, Clone, Default)]
pub struct ControllerRegistry {
    by_namespace: BTreeMap<String, Vec<Arc<ControllerDescriptor>>>,
}

impl ControllerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a controller and hands back the shared descriptor routes bind to.
    pub fn register(&mut self, controller: ControllerDescriptor) -> Arc<ControllerDescriptor> {
        let controller = Arc::new(controller);
        let list = self
            .by_namespace
            .entry(controller.namespace.clone())
            .or_default();
        list.retain(|c| c.type_name != controller.type_name);
        list.push(controller.clone());
        controller
    }

    /// Controllers of `namespace` in registration order; empty when unknown.
    pub fn controllers_in(&self, namespace: &str) -> &[Arc<ControllerDescriptor>] {
        self.by_namespace
            .get(namespace)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every namespace with at least one controller, in sorted order.
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.by_namespace.keys().map(String::as_str)
    }
}
