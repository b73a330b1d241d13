use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use axum::extract::Extension;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Json;
use chrono::{DateTime, Utc};
use hostkit::{
    CatalogBuilder, Environment, Module, ModuleCtx, ModuleRoute, RoutedModule, TranslatedModule,
    TranslationBundle,
};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::config::HostCoreConfig;

pub const MODULE_NAME: &str = "host_core";

/// Application identity, bound into the client hub for other modules.
#[derive(Debug, Clone, Serialize)]
pub struct AppInfo {
    pub app_name: String,
    pub environment: Environment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub support_email: Option<String>,
    pub started_at: DateTime<Utc>,
}

type InfoSlot = Arc<ArcSwapOption<AppInfo>>;

/// Routes are registered before `init`, so handlers read the info lazily.
#[derive(Default)]
pub struct HostCoreModule {
    info: InfoSlot,
}

#[async_trait]
impl Module for HostCoreModule {
    async fn init(&self, ctx: &ModuleCtx) -> anyhow::Result<()> {
        let cfg: HostCoreConfig = ctx.config()?;
        let info = Arc::new(AppInfo {
            app_name: cfg.app_name,
            environment: ctx.environment(),
            support_email: cfg.support_email,
            started_at: Utc::now(),
        });

        ctx.client_hub().bind(Arc::clone(&info));
        self.info.store(Some(info));

        info!("host_core initialized");
        Ok(())
    }
}

impl RoutedModule for HostCoreModule {
    fn routes(&self, _ctx: &ModuleCtx) -> anyhow::Result<Vec<ModuleRoute>> {
        let slot = Extension(Arc::clone(&self.info));
        Ok(vec![
            ModuleRoute::new("/", get(landing).layer(slot)).with_title("Home"),
            ModuleRoute::new("/health", get(health)),
        ])
    }
}

impl TranslatedModule for HostCoreModule {
    fn translations(&self) -> Vec<TranslationBundle> {
        vec![
            TranslationBundle::new(
                "en",
                "common",
                json!({ "status": { "loading": "Loading", "failed": "Something went wrong" } }),
            ),
            TranslationBundle::new(
                "ru",
                "common",
                json!({ "status": { "loading": "Загрузка", "failed": "Что-то пошло не так" } }),
            ),
        ]
    }
}

async fn landing(Extension(slot): Extension<InfoSlot>) -> Result<Json<AppInfo>, StatusCode> {
    match slot.load_full() {
        Some(info) => Ok(Json(info.as_ref().clone())),
        None => Err(StatusCode::SERVICE_UNAVAILABLE),
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub fn register(b: &mut CatalogBuilder) {
    let module = Arc::new(HostCoreModule::default());
    b.register_core(MODULE_NAME, module.clone());
    b.register_routes(MODULE_NAME, module.clone());
    b.register_translations(MODULE_NAME, module);
}

hostkit::inventory::submit! { hostkit::Registrator(register) }

#[cfg(test)]
mod tests {
    use super::*;
    use hostkit::manifest::{ActivationPlan, AppManifest};
    use hostkit::{BootstrapChain, BootstrapContext, ModuleManifestEntry};
    use hostkit_bootstrap::{PlatformConfig, StaticConfigProvider};

    async fn bootstrapped() -> BootstrapContext {
        let mut b = CatalogBuilder::default();
        register(&mut b);
        let manifest = AppManifest::new(vec![ModuleManifestEntry::init(MODULE_NAME, 0)]);
        let mut ctx = BootstrapContext::new(
            PlatformConfig::default(),
            Arc::new(
                StaticConfigProvider::new()
                    .with_module(MODULE_NAME, json!({ "app_name": "Back Office" })),
            ),
            ActivationPlan::build(&manifest).unwrap(),
            Arc::new(b.build().unwrap()),
        );
        BootstrapChain::standard().run(&mut ctx).await.unwrap();
        ctx
    }

    #[tokio::test]
    async fn binds_app_info_and_serves_landing() {
        let ctx = bootstrapped().await;

        let info = ctx.hub.get::<AppInfo>().unwrap();
        assert_eq!(info.app_name, "Back Office");
        assert_eq!(info.environment, Environment::Production);
        assert_eq!(
            ctx.translations.as_ref().unwrap().t("ru", "status.loading"),
            "Загрузка"
        );

        let router = ctx.into_router().unwrap();
        let resp = router.navigate("/").await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["app_name"], "Back Office");
        assert_eq!(body["environment"], "production");

        let resp = router.navigate("/health").await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(router.menu()[0].title, "Home");
    }

    #[tokio::test]
    async fn landing_is_unavailable_before_init() {
        let resp = landing(Extension(InfoSlot::default())).await;
        assert_eq!(resp.unwrap_err(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
