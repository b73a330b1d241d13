//! End-to-end bootstrap: catalog → plan → standard chain → router, hub and
//! guarded fetching over the development mock transport.

use async_trait::async_trait;
use axum::routing::get;
use http::StatusCode;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

use hostkit::bootstrap::{BootstrapChain, BootstrapContext, BootstrapError, StageKind};
use hostkit::http_errors::HttpErrorNotifier;
use hostkit::manifest::{ActivationPlan, AppManifest, ModuleManifestEntry};
use hostkit::remote::{RemoteModuleDescriptor, RemoteModuleLoader, RemoteRoute};
use hostkit::{
    ActivationError, ApiRequest, CatalogBuilder, ClientHub, FetchSlot, GuardOutcome,
    GuardedFetcher, HostRouter, MockHandler, MockResponse, MockedModule, Module, ModuleCtx,
    ModuleRoute, RoutedModule, TranslatedModule, TranslationBundle, Transport,
};
use hostkit_bootstrap::{Environment, MockConfig, PlatformConfig, StaticConfigProvider};

struct Shell;

#[async_trait]
impl Module for Shell {
    async fn init(&self, _ctx: &ModuleCtx) -> anyhow::Result<()> {
        Ok(())
    }
}

impl RoutedModule for Shell {
    fn routes(&self, _ctx: &ModuleCtx) -> anyhow::Result<Vec<ModuleRoute>> {
        Ok(vec![ModuleRoute::new("/", get(|| async { "home" })).with_title("Home")])
    }
}

struct OrdersClient {
    region: String,
}

#[derive(serde::Deserialize)]
struct OrdersConfig {
    #[serde(default = "default_region")]
    region: String,
}

fn default_region() -> String {
    "eu".into()
}

struct Orders {
    fail: bool,
}

#[async_trait]
impl Module for Orders {
    async fn init(&self, ctx: &ModuleCtx) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("orders backend unreachable");
        }
        let cfg: OrdersConfig = ctx.config()?;
        ctx.client_hub()
            .bind(Arc::new(OrdersClient { region: cfg.region }));
        Ok(())
    }
}

impl RoutedModule for Orders {
    fn routes(&self, _ctx: &ModuleCtx) -> anyhow::Result<Vec<ModuleRoute>> {
        Ok(vec![
            ModuleRoute::new("/orders", get(|| async { "orders" })).with_title("Orders"),
            ModuleRoute::new("/orders/{id}", get(|| async { "order" })),
        ])
    }
}

impl TranslatedModule for Orders {
    fn translations(&self) -> Vec<TranslationBundle> {
        vec![
            TranslationBundle::new("en", "orders", json!({ "title": "Orders" })),
            TranslationBundle::new("de", "orders", json!({ "title": "Bestellungen" })),
        ]
    }
}

impl MockedModule for Orders {
    fn mock_handlers(&self) -> Vec<MockHandler> {
        vec![MockHandler::get("/api/orders/1", |req| {
            MockResponse::json(json!({ "route": req.route }))
        })]
    }
}

fn catalog(fail_orders: bool) -> Arc<hostkit::ModuleCatalog> {
    let mut b = CatalogBuilder::default();
    b.register_core("shell", Arc::new(Shell));
    b.register_routes("shell", Arc::new(Shell));
    let orders = Arc::new(Orders { fail: fail_orders });
    b.register_core("orders", orders.clone());
    b.register_routes("orders", orders.clone());
    b.register_translations("orders", orders.clone());
    b.register_mocks("orders", orders);
    Arc::new(b.build().unwrap())
}

fn manifest() -> AppManifest {
    AppManifest::new(vec![
        ModuleManifestEntry::local("orders"),
        ModuleManifestEntry::init("shell", 0),
    ])
}

fn development() -> PlatformConfig {
    PlatformConfig {
        environment: Environment::Development,
        mock: MockConfig { enabled: true },
        ..PlatformConfig::default()
    }
}

fn context(platform: PlatformConfig, fail_orders: bool, manifest: &AppManifest) -> BootstrapContext {
    BootstrapContext::new(
        platform,
        Arc::new(StaticConfigProvider::new().with_module("orders", json!({ "region": "us" }))),
        ActivationPlan::build(manifest).unwrap(),
        catalog(fail_orders),
    )
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn development_bootstrap_wires_everything() {
    let customizer = |router: &mut HostRouter| -> anyhow::Result<()> {
        router.add("host", vec![ModuleRoute::new("/version", get(|| async { "1" }))])?;
        Ok(())
    };
    let mut ctx = context(development(), false, &manifest()).with_customizer(Box::new(customizer));

    BootstrapChain::standard().run(&mut ctx).await.unwrap();

    assert_eq!(ctx.completed_stages(), &StageKind::ALL);
    assert_eq!(ctx.activated_modules(), &["shell".to_string(), "orders".to_string()]);

    // Translations and module-bound clients.
    let translations = ctx.translations.clone().unwrap();
    assert_eq!(translations.t("de", "orders:title"), "Bestellungen");
    let client = ctx.hub.get::<OrdersClient>().unwrap();
    assert_eq!(client.region, "us");

    // Transport came from the mock service and carries the client hash.
    let transport = ctx.hub.get::<dyn Transport>().unwrap();
    assert_eq!(
        transport.client_hash().as_deref().map(String::as_str),
        ctx.client_hash.as_deref()
    );
    assert!(ctx.hub.is_bound::<HttpErrorNotifier>());
    let mut errors = ctx.http_errors.subscribe();

    // Guarded fetch through the started mock service.
    let fetcher = GuardedFetcher::new(Arc::clone(&transport));
    let slot: FetchSlot<Value> = FetchSlot::new();
    let outcome = fetcher.fetch(ApiRequest::get("/api/orders/42"), &slot).await;
    assert_eq!(outcome, GuardOutcome::Committed);
    assert_eq!(slot.data(), Some(json!({ "route": "/api/orders/42" })));
    assert!(!slot.is_loading());

    // Unmocked call fails locally and is published for notification.
    let outcome = fetcher.fetch(ApiRequest::get("/api/invoices"), &slot).await;
    assert_eq!(outcome, GuardOutcome::Failed);
    assert!(slot.last_error().is_some());
    let event = errors.recv().await.unwrap();
    assert_eq!(event.route, "/api/invoices");
    assert_eq!(event.status, Some(404));

    // Router: module routes, customizer route, and the attached menu.
    let router = ctx.into_router().unwrap();
    assert_eq!(router.navigate("/orders/7").await.unwrap().status(), StatusCode::OK);
    assert_eq!(router.navigate("/version").await.unwrap().status(), StatusCode::OK);
    let titles: Vec<_> = router
        .dependencies()
        .menu
        .iter()
        .map(|m| m.title.as_str())
        .collect();
    assert_eq!(titles, vec!["Home", "Orders"]);
    assert!(router.dependencies().hub.is_some());
}

#[tokio::test]
async fn production_bootstrap_has_no_mocks_and_no_transport() {
    let mut ctx = context(
        PlatformConfig {
            mock: MockConfig { enabled: true },
            ..PlatformConfig::default()
        },
        false,
        &manifest(),
    );

    BootstrapChain::standard().run(&mut ctx).await.unwrap();

    assert!(ctx.mock.is_none());
    assert!(ctx.transport.is_none());
    assert!(!ctx.hub.is_bound::<dyn Transport>());
    assert_eq!(ctx.completed_stages().len(), StageKind::ALL.len());
}

#[tokio::test]
async fn failing_module_aborts_bootstrap_at_the_modules_stage() {
    let mut ctx = context(development(), true, &manifest());

    let err = BootstrapChain::standard().run(&mut ctx).await.unwrap_err();

    let BootstrapError::Stage { stage, source } = err else {
        panic!("expected a stage failure");
    };
    assert_eq!(stage, StageKind::Modules);
    match source.downcast_ref::<ActivationError>() {
        Some(ActivationError::Module { module, source }) => {
            assert_eq!(module, "orders");
            assert_eq!(source.to_string(), "orders backend unreachable");
        }
        other => panic!("unexpected source: {other:?}"),
    }
    assert_eq!(
        ctx.completed_stages(),
        &[StageKind::ApiClient, StageKind::ClientHash, StageKind::Router, StageKind::I18n]
    );
    assert!(ctx.mock.as_ref().is_some_and(|m| !m.is_started()));
}

struct StaticRemote {
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl RemoteModuleLoader for StaticRemote {
    async fn load(&self, entry: &ModuleManifestEntry) -> anyhow::Result<RemoteModuleDescriptor> {
        self.seen.lock().push(entry.remote_entry.clone());
        Ok(RemoteModuleDescriptor {
            name: entry.name.clone(),
            version: "2.0.0".into(),
            translations: vec![TranslationBundle::new(
                "en",
                "reports",
                json!({ "title": "Reports" }),
            )],
            routes: vec![RemoteRoute {
                path: "/reports".into(),
                title: Some("Reports".into()),
            }],
        })
    }
}

#[tokio::test]
async fn remote_modules_mount_through_the_loader() {
    let manifest = AppManifest::new(vec![
        ModuleManifestEntry::init("shell", 0),
        ModuleManifestEntry::remote("reports", "https://cdn.example.com/reports/remoteEntry.js"),
    ]);
    let loader = Arc::new(StaticRemote {
        seen: Mutex::new(Vec::new()),
    });
    let mut ctx = context(PlatformConfig::default(), false, &manifest).with_remote_loader(loader.clone());

    BootstrapChain::standard().run(&mut ctx).await.unwrap();

    assert_eq!(
        *loader.seen.lock(),
        vec!["https://cdn.example.com/reports/remoteEntry.js".to_string()]
    );
    assert_eq!(ctx.translations.as_ref().unwrap().t("en", "reports:title"), "Reports");

    let router = ctx.into_router().unwrap();
    let body = body_json(router.navigate("/reports").await.unwrap()).await;
    assert_eq!(
        body,
        json!({
            "module": "reports",
            "remoteEntry": "https://cdn.example.com/reports/remoteEntry.js",
            "path": "/reports",
        })
    );
    assert_eq!(router.menu().len(), 2);
}

#[tokio::test]
async fn remote_module_without_loader_is_fatal() {
    let manifest = AppManifest::new(vec![ModuleManifestEntry::remote(
        "reports",
        "https://cdn.example.com/reports/remoteEntry.js",
    )]);
    let mut ctx = context(PlatformConfig::default(), false, &manifest);

    let err = BootstrapChain::standard().run(&mut ctx).await.unwrap_err();

    let BootstrapError::Stage { source, .. } = err else {
        panic!("expected a stage failure");
    };
    assert!(matches!(
        source.downcast_ref::<ActivationError>(),
        Some(ActivationError::NoRemoteLoader(name)) if name == "reports"
    ));
}

#[test]
fn hub_is_shared_with_module_contexts() {
    let hub = Arc::new(ClientHub::new());
    let ctx = ModuleCtx::new(
        "orders",
        Environment::Production,
        Arc::new(StaticConfigProvider::new()),
        Arc::clone(&hub),
        tokio_util::sync::CancellationToken::new(),
    );
    ctx.client_hub().bind(Arc::new(OrdersClient {
        region: "ap".into(),
    }));
    assert_eq!(hub.get::<OrdersClient>().unwrap().region, "ap");
}
