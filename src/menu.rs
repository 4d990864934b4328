use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

use crate::controller::ControllerDescriptor;
use crate::error::{AuthorizeError, AuthorizeResult};
use crate::permission::PermissionLabels;

/// MenuNode
///
/// One addressable resource of the catalog: a namespace, a controller, or a
/// controller action. `full_name` is the unique key; `permissions` maps raw
/// flag values to the labels administrators see when granting rights.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MenuNode {
    pub id: Uuid,
    // None only for the catalog root.
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub display_name: String,
    pub full_name: String,
    pub url: String,
    pub permissions: PermissionLabels,
}

impl MenuNode {
    /// A fresh node with a new id, no url and no permission labels. The display
    /// name starts out equal to `name`.
    pub fn new(
        full_name: impl Into<String>,
        name: impl Into<String>,
        parent_id: Option<Uuid>,
    ) -> Self {
        let name = name.into();
        Self {
            id: Uuid::new_v4(),
            parent_id,
            display_name: name.clone(),
            name,
            full_name: full_name.into(),
            url: String::new(),
            permissions: PermissionLabels::new(),
        }
    }
}

/// MenuStore
///
/// The persistent catalog this crate reads and populates. Lookups must be safe to
/// run concurrently; writes are only issued from the once-per-namespace scan.
#[async_trait]
pub trait MenuStore: Send + Sync {
    /// Exact lookup by the node's unique full name.
    async fn find_by_full_name(&self, full_name: &str) -> AuthorizeResult<Option<MenuNode>>;

    /// Direct children of `parent_id`, ordered by full name.
    async fn children(&self, parent_id: Uuid) -> AuthorizeResult<Vec<MenuNode>>;

    /// Ensures a namespace node named `root_name` (keyed by `namespace`) and one
    /// child node per controller exist, returning the controller nodes in order.
    async fn scan_controller(
        &self,
        root_name: &str,
        controllers: &[Arc<ControllerDescriptor>],
        namespace: &str,
    ) -> AuthorizeResult<Vec<MenuNode>>;

    /// Adds a new node. Fails with `AuthorizeError::Store` if the full name is taken.
    async fn insert(&self, node: MenuNode) -> AuthorizeResult<MenuNode>;

    /// Replaces the stored node with the same full name. Fails if there is none.
    async fn update(&self, node: &MenuNode) -> AuthorizeResult<()>;
}

/// MenuStoreState
///
/// The shared handle to the catalog held by the resolver and the host.
pub type MenuStoreState = Arc<dyn MenuStore>;

/// InMemoryMenuStore
///
/// A process-local catalog backed by a concurrent map. Used by the demo host and
/// by tests; `scan_count` exposes how many scans actually ran.
#[derive(Default)]
pub struct InMemoryMenuStore {
    nodes: DashMap<String, MenuNode>,
    root_id: Option<Uuid>,
    scans: AtomicUsize,
}

impl InMemoryMenuStore {
    /// An empty store; namespace nodes become top-level nodes.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose namespace nodes hang below a single root node.
    pub fn with_root(root_name: &str) -> Self {
        let root = MenuNode::new(root_name, root_name, None);
        let nodes = DashMap::new();
        let root_id = Some(root.id);
        nodes.insert(root.full_name.clone(), root);
        Self {
            nodes,
            root_id,
            scans: AtomicUsize::new(0),
        }
    }

    /// How many times `scan_controller` has run against this store.
    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    /// Number of nodes, the root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // Returns the existing node untouched when the full name is already present.
    fn upsert(
        &self,
        full_name: &str,
        name: &str,
        display_name: &str,
        parent_id: Option<Uuid>,
    ) -> MenuNode {
        self.nodes
            .entry(full_name.to_string())
            .or_insert_with(|| {
                let mut node = MenuNode::new(full_name, name, parent_id);
                node.display_name = display_name.to_string();
                node
            })
            .clone()
    }
}

#[async_trait]
impl MenuStore for InMemoryMenuStore {
    async fn find_by_full_name(&self, full_name: &str) -> AuthorizeResult<Option<MenuNode>> {
        Ok(self.nodes.get(full_name).map(|n| n.value().clone()))
    }

    async fn children(&self, parent_id: Uuid) -> AuthorizeResult<Vec<MenuNode>> {
        let mut list: Vec<MenuNode> = self
            .nodes
            .iter()
            .filter(|n| n.parent_id == Some(parent_id))
            .map(|n| n.value().clone())
            .collect();
        list.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(list)
    }

    async fn scan_controller(
        &self,
        root_name: &str,
        controllers: &[Arc<ControllerDescriptor>],
        namespace: &str,
    ) -> AuthorizeResult<Vec<MenuNode>> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(namespace, controllers = controllers.len(), "scanning controllers");

        let ns_node = self.upsert(namespace, root_name, root_name, self.root_id);

        Ok(controllers
            .iter()
            .map(|c| {
                let display = c.display_name.as_deref().unwrap_or(c.route_name());
                self.upsert(&c.full_name(), c.route_name(), display, Some(ns_node.id))
            })
            .collect())
    }

    async fn insert(&self, node: MenuNode) -> AuthorizeResult<MenuNode> {
        match self.nodes.entry(node.full_name.clone()) {
            Entry::Occupied(_) => Err(AuthorizeError::Store(format!(
                "menu `{}` already exists",
                node.full_name
            ))),
            Entry::Vacant(slot) => {
                slot.insert(node.clone());
                Ok(node)
            }
        }
    }

    async fn update(&self, node: &MenuNode) -> AuthorizeResult<()> {
        match self.nodes.get_mut(&node.full_name) {
            Some(mut existing) => {
                *existing = node.clone();
                Ok(())
            }
            None => Err(AuthorizeError::Store(format!(
                "menu `{}` does not exist",
                node.full_name
            ))),
        }
    }
}
