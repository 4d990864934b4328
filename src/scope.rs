use std::sync::Arc;

use crate::controller::{ActionDescriptor, ControllerDescriptor};

/// AreaMembership
///
/// Answers whether a controller sits inside the managed area, i.e. the part of the
/// catalog that bootstrap registers and that is authorized by default.
pub trait AreaMembership: Send + Sync {
    fn contains(&self, controller: &ControllerDescriptor) -> bool;
}

pub type AreaState = Arc<dyn AreaMembership>;

/// ManagedAreas
///
/// Area membership by namespace: a controller belongs to an area when its
/// namespace equals the area namespace or is nested below it.
#[derive(Debug, Clone, Default)]
pub struct ManagedAreas {
    namespaces: Vec<String>,
}

impl ManagedAreas {
    pub fn new<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            namespaces: namespaces.into_iter().map(Into::into).collect(),
        }
    }
}

impl AreaMembership for ManagedAreas {
    fn contains(&self, controller: &ControllerDescriptor) -> bool {
        let ns = controller.namespace.as_str();
        self.namespaces.iter().any(|area| {
            ns == area
                || ns
                    .strip_prefix(area.as_str())
                    .is_some_and(|rest| rest.starts_with('.'))
        })
    }
}

/// Scope
///
/// Whether an action takes part in entity authorization at all, and if so whether
/// its controller still has to be registered into the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    OutOfScope,
    InScope { requires_creation: bool },
}

/// classify
///
/// 1. Anonymous on the action or the controller: out of scope.
/// 2. Outside the managed area with no authorize marker: out of scope.
/// 3. Outside the managed area with a marker: in scope, register the controller.
/// 4. Inside the managed area: in scope, already registered by bootstrap.
pub fn classify(
    areas: &dyn AreaMembership,
    controller: &ControllerDescriptor,
    action: &ActionDescriptor,
) -> Scope {
    if action.allow_anonymous || controller.allow_anonymous {
        return Scope::OutOfScope;
    }

    let explicit = action.authorize.is_some() || controller.authorize.is_some();
    let managed = areas.contains(controller);

    match (managed, explicit) {
        (false, false) => Scope::OutOfScope,
        (false, true) => Scope::InScope {
            requires_creation: true,
        },
        (true, _) => Scope::InScope {
            requires_creation: false,
        },
    }
}
