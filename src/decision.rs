use serde::Serialize;

use crate::audit::AuditSink;
use crate::context::RequestContext;
use crate::controller::ControllerDescriptor;
use crate::identity::User;
use crate::menu::MenuNode;
use crate::permission::{PermissionFlags, PermissionLabels, describe};

pub const AUDIT_CATEGORY: &str = "Access";
pub const AUDIT_DENIED: &str = "Denied";

/// Forbidden
///
/// Everything the rendering side needs to show the permission-denied view
/// without going back to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Forbidden {
    /// `[<Controller>/<Action>]`
    pub resource: String,
    pub permission: PermissionFlags,
    pub permission_name: String,
    pub menu: Option<MenuNode>,
}

/// AuthorizationOutcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationOutcome {
    Allowed,
    /// Carries the encoded path and query of the rejected request.
    RedirectToLogin(String),
    Forbidden(Forbidden),
}

impl AuthorizationOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AuthorizationOutcome::Allowed)
    }
}

pub fn resource_label(controller: &ControllerDescriptor, action: &str) -> String {
    format!("[{}/{}]", controller.type_name, action)
}

/// evaluate
///
/// The pure part of the decision. A missing node never grants access to a
/// logged-in caller.
pub fn evaluate(
    user: Option<&User>,
    node: Option<&MenuNode>,
    required: PermissionFlags,
    resource: &str,
    ctx: &RequestContext,
) -> AuthorizationOutcome {
    let Some(user) = user else {
        return AuthorizationOutcome::RedirectToLogin(ctx.path_and_query.clone());
    };

    if let Some(node) = node {
        if user.has(node, required) {
            return AuthorizationOutcome::Allowed;
        }
    }

    let empty = PermissionLabels::new();
    let labels = node.map(|n| &n.permissions).unwrap_or(&empty);
    AuthorizationOutcome::Forbidden(Forbidden {
        resource: resource.to_string(),
        permission: required,
        permission_name: describe(required, labels),
        menu: node.cloned(),
    })
}

/// decide
///
/// `evaluate`, plus an audit entry for every denial of an authenticated caller.
pub async fn decide(
    user: Option<&User>,
    node: Option<&MenuNode>,
    required: PermissionFlags,
    resource: &str,
    ctx: &RequestContext,
    audit: &dyn AuditSink,
) -> AuthorizationOutcome {
    let outcome = evaluate(user, node, required, resource, ctx);

    if let (AuthorizationOutcome::Forbidden(denied), Some(user)) = (&outcome, user) {
        let message = format!(
            "Access to resource {} requires {} permission (user {})",
            denied.resource, denied.permission_name, user.name
        );
        audit
            .write_log(
                AUDIT_CATEGORY,
                AUDIT_DENIED,
                false,
                &message,
                ctx.origin.as_deref(),
            )
            .await;
    }

    outcome
}
