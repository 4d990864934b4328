use async_trait::async_trait;
use entity_authorize::{
    ActionDescriptor, Authorize, AuthorizeError, AuthorizeResult, ControllerDescriptor,
    ControllerRegistry, InMemoryMenuStore, MenuNode, MenuResolver, MenuStore, PermissionFlags,
    RequestContext,
};
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use uuid::Uuid;

const REPORTS: &str = "Contoso.Reports.Controllers";

// --- Mock Stores ---

/// Delegates to the in-memory store but makes every scan slow, so concurrent
/// first requests really overlap.
#[derive(Default)]
struct SlowScanStore {
    inner: InMemoryMenuStore,
    scans: AtomicUsize,
}

#[async_trait]
impl MenuStore for SlowScanStore {
    async fn find_by_full_name(&self, full_name: &str) -> AuthorizeResult<Option<MenuNode>> {
        self.inner.find_by_full_name(full_name).await
    }
    async fn children(&self, parent_id: Uuid) -> AuthorizeResult<Vec<MenuNode>> {
        self.inner.children(parent_id).await
    }
    async fn scan_controller(
        &self,
        root_name: &str,
        controllers: &[Arc<ControllerDescriptor>],
        namespace: &str,
    ) -> AuthorizeResult<Vec<MenuNode>> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.inner
            .scan_controller(root_name, controllers, namespace)
            .await
    }
    async fn insert(&self, node: MenuNode) -> AuthorizeResult<MenuNode> {
        self.inner.insert(node).await
    }
    async fn update(&self, node: &MenuNode) -> AuthorizeResult<()> {
        self.inner.update(node).await
    }
}

/// A store whose scan always fails after a short delay, counting attempts.
#[derive(Default)]
struct BrokenStore {
    scans: AtomicUsize,
}

#[async_trait]
impl MenuStore for BrokenStore {
    async fn find_by_full_name(&self, _full_name: &str) -> AuthorizeResult<Option<MenuNode>> {
        Ok(None)
    }
    async fn children(&self, _parent_id: Uuid) -> AuthorizeResult<Vec<MenuNode>> {
        Ok(vec![])
    }
    async fn scan_controller(
        &self,
        _root_name: &str,
        _controllers: &[Arc<ControllerDescriptor>],
        _namespace: &str,
    ) -> AuthorizeResult<Vec<MenuNode>> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        Err(AuthorizeError::Store("connection refused".to_string()))
    }
    async fn insert(&self, node: MenuNode) -> AuthorizeResult<MenuNode> {
        Ok(node)
    }
    async fn update(&self, _node: &MenuNode) -> AuthorizeResult<()> {
        Ok(())
    }
}

// --- Helper Functions ---

fn reports_registry() -> (Arc<ControllerRegistry>, Arc<ControllerDescriptor>) {
    let mut registry = ControllerRegistry::new();
    let report = registry.register(
        ControllerDescriptor::new(REPORTS, "ReportController")
            .display("Reports")
            .authorize(Authorize::any())
            .action(
                ActionDescriptor::new("Index")
                    .authorize(Authorize::new(PermissionFlags::DETAIL).unwrap()),
            )
            .action(
                ActionDescriptor::new("Export")
                    .display("Export")
                    .authorize(Authorize::new(PermissionFlags::custom(0)).unwrap()),
            )
            .action(
                ActionDescriptor::new("Archive")
                    .authorize(Authorize::new(PermissionFlags::custom(1)).unwrap()),
            )
            // Anonymous actions never contribute labels.
            .action(
                ActionDescriptor::new("Feed")
                    .anonymous()
                    .authorize(Authorize::new(PermissionFlags::custom(2)).unwrap()),
            )
            .action(ActionDescriptor::new("Summary")),
    );
    registry.register(
        ControllerDescriptor::new(REPORTS, "ChartController")
            .action(
                ActionDescriptor::new("Delete")
                    .authorize(Authorize::new(PermissionFlags::DELETE).unwrap()),
            ),
    );
    (Arc::new(registry), report)
}

// --- Tests ---

#[tokio::test]
async fn test_first_resolve_registers_namespace() {
    let store = Arc::new(InMemoryMenuStore::new());
    let (registry, report) = reports_registry();
    let resolver = MenuResolver::new(store.clone(), registry);

    let mut ctx = RequestContext::new("/Reports");
    let node = resolver
        .resolve(&mut ctx, &report, "Index", true)
        .await
        .unwrap()
        .expect("report menu registered");

    assert_eq!(node.full_name, "Contoso.Reports.Controllers.ReportController");
    assert_eq!(node.url, "~/Report");
    assert_eq!(node.display_name, "Reports");
    assert_eq!(ctx.current_menu.as_ref(), Some(&node));
    assert!(resolver.guard().is_claimed(REPORTS));

    let namespace = store.find_by_full_name(REPORTS).await.unwrap().unwrap();
    assert_eq!(namespace.name, "Contoso.Reports");
    assert_eq!(namespace.url, "~");
    assert_eq!(node.parent_id, Some(namespace.id));

    let chart = store
        .find_by_full_name("Contoso.Reports.Controllers.ChartController")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(chart.url, "~/Chart");
    assert_eq!(chart.permissions.get(&8).map(String::as_str), Some("Delete"));
}

#[tokio::test]
async fn test_registered_permissions_cover_marked_actions() {
    let store = Arc::new(InMemoryMenuStore::new());
    let (registry, report) = reports_registry();
    let resolver = MenuResolver::new(store.clone(), registry);
    resolver.register_namespace(REPORTS).await.unwrap();

    let node = store.find_by_full_name(&report.full_name()).await.unwrap().unwrap();
    let labels: Vec<(u32, &str)> = node
        .permissions
        .iter()
        .map(|(k, v)| (*k, v.as_str()))
        .collect();

    // Detail uses its built-in label; custom bits use the display name, then the action name.
    assert_eq!(labels, vec![(1, "Detail"), (16, "Export"), (32, "Archive")]);
}

#[tokio::test]
async fn test_register_twice_is_idempotent() {
    let store = Arc::new(InMemoryMenuStore::new());
    let (registry, report) = reports_registry();
    let resolver = MenuResolver::new(store.clone(), registry);

    resolver.register_namespace(REPORTS).await.unwrap();
    let first = store.find_by_full_name(&report.full_name()).await.unwrap().unwrap();
    let count = store.len();

    resolver.register_namespace(REPORTS).await.unwrap();
    let second = store.find_by_full_name(&report.full_name()).await.unwrap().unwrap();

    assert_eq!(first.permissions, second.permissions);
    assert_eq!(first.id, second.id);
    assert_eq!(store.len(), count);
    assert_eq!(store.scan_count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_requests_scan_once() {
    let store = Arc::new(SlowScanStore::default());
    let (registry, report) = reports_registry();
    let resolver = Arc::new(MenuResolver::new(store.clone(), registry));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let resolver = resolver.clone();
            let report = report.clone();
            tokio::spawn(async move {
                let action = if i % 2 == 0 { "Index" } else { "Export" };
                let mut ctx = RequestContext::new("/Reports");
                resolver.resolve(&mut ctx, &report, action, true).await
            })
        })
        .collect();

    for handle in handles {
        let node = handle.await.unwrap().unwrap();
        assert!(node.is_some(), "every waiter sees the registered node");
    }

    assert_eq!(store.scans.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_guard_runs_scan_once_per_namespace() {
    let store = Arc::new(InMemoryMenuStore::new());
    let (registry, _) = reports_registry();
    let resolver = MenuResolver::new(store.clone(), registry);

    assert!(resolver.ensure_registered(REPORTS).await.unwrap());
    assert!(!resolver.ensure_registered(REPORTS).await.unwrap());
    assert_eq!(store.scan_count(), 1);
}

#[tokio::test]
async fn test_action_level_node_wins_over_controller_node() {
    let store = Arc::new(InMemoryMenuStore::new());
    let (registry, report) = reports_registry();
    let resolver = MenuResolver::new(store.clone(), registry);

    let export = store
        .insert(MenuNode::new(report.action_full_name("Export"), "Export", None))
        .await
        .unwrap();
    store
        .insert(MenuNode::new(report.full_name(), "Report", None))
        .await
        .unwrap();

    let mut ctx = RequestContext::new("/Reports/Export");
    let node = resolver.resolve(&mut ctx, &report, "Export", false).await.unwrap();
    assert_eq!(node.map(|n| n.id), Some(export.id));

    let mut ctx = RequestContext::new("/Reports");
    let node = resolver.resolve(&mut ctx, &report, "Index", false).await.unwrap();
    assert_eq!(node.map(|n| n.name), Some("Report".to_string()));
}

#[tokio::test]
async fn test_request_slot_is_reused() {
    let store = Arc::new(InMemoryMenuStore::new());
    let (registry, report) = reports_registry();
    let resolver = MenuResolver::new(store, registry);

    let cached = MenuNode::new("Cached", "Cached", None);
    let mut ctx = RequestContext::new("/Reports");
    ctx.current_menu = Some(cached.clone());

    let node = resolver.resolve(&mut ctx, &report, "Index", false).await.unwrap();
    assert_eq!(node, Some(cached));
}

#[tokio::test]
async fn test_missing_node_is_none_without_creation() {
    let store = Arc::new(InMemoryMenuStore::new());
    let (registry, report) = reports_registry();
    let resolver = MenuResolver::new(store.clone(), registry);

    let mut ctx = RequestContext::new("/Reports");
    let node = resolver.resolve(&mut ctx, &report, "Index", false).await.unwrap();
    assert!(node.is_none());
    assert_eq!(store.scan_count(), 0);
}

#[tokio::test]
async fn test_unregistered_controller_is_a_configuration_gap() {
    let store = Arc::new(InMemoryMenuStore::new());
    let (registry, _) = reports_registry();
    let resolver = MenuResolver::new(store, registry);

    // Bound to a route but never put in the registry.
    let stray = ControllerDescriptor::new("Contoso.Stray.Controllers", "StrayController")
        .authorize(Authorize::any());
    let mut ctx = RequestContext::new("/Stray");
    let node = resolver.resolve(&mut ctx, &stray, "Index", true).await.unwrap();
    assert!(node.is_none());
}

#[tokio::test]
async fn test_failed_scan_propagates_once_and_is_not_retried() {
    let store = Arc::new(BrokenStore::default());
    let (registry, report) = reports_registry();
    let resolver = MenuResolver::new(store.clone(), registry);

    let mut ctx = RequestContext::new("/Reports");
    let err = resolver
        .resolve(&mut ctx, &report, "Index", true)
        .await
        .unwrap_err();

    assert!(matches!(err, AuthorizeError::Scan { ref namespace, .. } if namespace == REPORTS));
    assert!(resolver.guard().is_claimed(REPORTS));
    assert!(matches!(
        resolver.guard().outcome(REPORTS),
        Some(Err(AuthorizeError::Scan { .. }))
    ));

    // The namespace stays claimed: later requests see a configuration gap, not a rescan.
    let mut ctx = RequestContext::new("/Reports");
    let node = resolver.resolve(&mut ctx, &report, "Index", true).await.unwrap();
    assert!(node.is_none());
    assert!(!resolver.ensure_registered(REPORTS).await.unwrap());
    assert_eq!(store.scans.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_requests_share_one_failed_scan() {
    let store = Arc::new(BrokenStore::default());
    let (registry, report) = reports_registry();
    let resolver = Arc::new(MenuResolver::new(store.clone(), registry));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let resolver = resolver.clone();
            let report = report.clone();
            tokio::spawn(async move {
                let mut ctx = RequestContext::new("/Reports");
                resolver.resolve(&mut ctx, &report, "Index", true).await
            })
        })
        .collect();

    for handle in handles {
        let result = handle.await.unwrap();
        assert!(
            matches!(result, Err(AuthorizeError::Scan { .. }) | Ok(None)),
            "unexpected result: {result:?}"
        );
    }

    assert_eq!(store.scans.load(Ordering::SeqCst), 1);
}
