use std::sync::Arc;

use crate::controller::{ActionDescriptor, Authorize, ControllerDescriptor, ControllerRegistry};
use crate::error::AuthorizeResult;
use crate::permission::PermissionFlags;

/// Controllers served without any authorization (health, landing page).
pub mod public;

/// Controllers of the managed area, authorized by default.
pub mod admin;

/// A controller outside the managed area that opts in through its markers and
/// registers itself into the menu catalog on first use.
pub mod reports;

pub const ADMIN_NAMESPACE: &str = "Cube.Areas.Admin.Controllers";
pub const REPORTS_NAMESPACE: &str = "Contoso.Reports.Controllers";
pub const WEB_NAMESPACE: &str = "Contoso.Web.Controllers";

/// Custom right guarding report exports.
pub const EXPORT: PermissionFlags = PermissionFlags::custom(0);

/// The descriptors routes are bound to.
#[derive(Debug, Clone)]
pub struct Controllers {
    pub user: Arc<ControllerDescriptor>,
    pub menu: Arc<ControllerDescriptor>,
    pub data: Arc<ControllerDescriptor>,
    pub report: Arc<ControllerDescriptor>,
    pub home: Arc<ControllerDescriptor>,
}

/// register_controllers
///
/// The declarative table of every controller the host serves, with the markers
/// the catalog scan and the scope classifier read.
pub fn register_controllers(registry: &mut ControllerRegistry) -> AuthorizeResult<Controllers> {
    let user = registry.register(
        ControllerDescriptor::new(ADMIN_NAMESPACE, "UserController")
            .display("Users")
            .action(
                ActionDescriptor::new("Index")
                    .authorize(Authorize::new(PermissionFlags::DETAIL)?),
            )
            .action(
                ActionDescriptor::new("Edit")
                    .authorize(Authorize::new(PermissionFlags::UPDATE)?),
            )
            .action(
                ActionDescriptor::new("Delete")
                    .authorize(Authorize::new(PermissionFlags::DELETE)?),
            )
            .action(ActionDescriptor::new("Login").anonymous()),
    );

    let menu = registry.register(
        ControllerDescriptor::new(ADMIN_NAMESPACE, "MenuController")
            .display("Menus")
            .action(
                ActionDescriptor::new("Index")
                    .authorize(Authorize::new(PermissionFlags::DETAIL)?),
            ),
    );

    let data = registry.register(
        ControllerDescriptor::new(ADMIN_NAMESPACE, "DataController")
            .display("Data")
            .action(
                ActionDescriptor::new("Edit")
                    .authorize(Authorize::new(PermissionFlags::UPDATE)?),
            ),
    );

    let report = registry.register(
        ControllerDescriptor::new(REPORTS_NAMESPACE, "ReportController")
            .display("Reports")
            .authorize(Authorize::any())
            .action(
                ActionDescriptor::new("Index")
                    .authorize(Authorize::new(PermissionFlags::DETAIL)?),
            )
            .action(
                ActionDescriptor::new("Export")
                    .display("Export")
                    .authorize(Authorize::new(EXPORT)?),
            )
            .action(ActionDescriptor::new("Summary")),
    );

    let home = registry.register(
        ControllerDescriptor::new(WEB_NAMESPACE, "HomeController")
            .action(ActionDescriptor::new("Index")),
    );

    Ok(Controllers {
        user,
        menu,
        data,
        report,
        home,
    })
}
