use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use axum::extract::{Extension, Query};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Json;
use hostkit::{
    CatalogBuilder, Module, ModuleCtx, ModuleRoute, RouterDependencies, RoutedModule,
    TranslatedModule, TranslationBundle, Translations,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const MODULE_NAME: &str = "host_layout";

/// Branding for the shell, from `modules.host_layout`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayoutSettings {
    #[serde(default = "default_brand")]
    pub brand: String,
    #[serde(default = "default_theme")]
    pub theme: String,
}

fn default_brand() -> String {
    "HostKit".to_string()
}

fn default_theme() -> String {
    "light".to_string()
}

type SettingsSlot = Arc<ArcSwapOption<LayoutSettings>>;

#[derive(Default)]
pub struct HostLayoutModule {
    settings: SettingsSlot,
}

#[async_trait]
impl Module for HostLayoutModule {
    async fn init(&self, ctx: &ModuleCtx) -> anyhow::Result<()> {
        let settings: LayoutSettings = ctx.config()?;
        tracing::info!(brand = %settings.brand, theme = %settings.theme, "host_layout initialized");
        self.settings.store(Some(Arc::new(settings)));
        Ok(())
    }
}

impl RoutedModule for HostLayoutModule {
    fn routes(&self, _ctx: &ModuleCtx) -> anyhow::Result<Vec<ModuleRoute>> {
        Ok(vec![
            ModuleRoute::new("/menu", get(menu)),
            ModuleRoute::new(
                "/layout",
                get(layout).layer(Extension(Arc::clone(&self.settings))),
            ),
        ])
    }
}

impl TranslatedModule for HostLayoutModule {
    fn translations(&self) -> Vec<TranslationBundle> {
        vec![
            TranslationBundle::new("en", "layout", json!({ "menu": { "heading": "Navigation" } })),
            TranslationBundle::new("ru", "layout", json!({ "menu": { "heading": "Навигация" } })),
        ]
    }
}

#[derive(Debug, Deserialize)]
pub struct MenuQuery {
    pub locale: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct MenuEntry {
    pub module: String,
    pub path: String,
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MenuDto {
    pub heading: String,
    pub items: Vec<MenuEntry>,
}

/// The navigation menu. A module may localize its item through
/// `<module>:menu.title`; otherwise the route title is used.
async fn menu(
    Extension(deps): Extension<Arc<RouterDependencies>>,
    Query(query): Query<MenuQuery>,
) -> Json<MenuDto> {
    let translations = deps
        .hub
        .as_ref()
        .and_then(|hub| hub.get::<Translations>().ok());

    let Some(tr) = translations else {
        return Json(MenuDto {
            heading: "Navigation".to_string(),
            items: deps
                .menu
                .iter()
                .map(|m| MenuEntry {
                    module: m.module.clone(),
                    path: m.path.clone(),
                    title: m.title.clone(),
                })
                .collect(),
        });
    };

    let locale = query
        .locale
        .unwrap_or_else(|| tr.default_locale().to_string());
    let items = deps
        .menu
        .iter()
        .map(|m| {
            let key = format!("{}:menu.title", m.module);
            let localized = tr.t(&locale, &key);
            MenuEntry {
                module: m.module.clone(),
                path: m.path.clone(),
                title: if localized == key { m.title.clone() } else { localized },
            }
        })
        .collect();

    Json(MenuDto {
        heading: tr.t(&locale, "layout:menu.heading"),
        items,
    })
}

async fn layout(
    Extension(slot): Extension<SettingsSlot>,
) -> Result<Json<LayoutSettings>, StatusCode> {
    slot.load_full()
        .map(|s| Json(s.as_ref().clone()))
        .ok_or(StatusCode::SERVICE_UNAVAILABLE)
}

pub fn register(b: &mut CatalogBuilder) {
    let module = Arc::new(HostLayoutModule::default());
    b.register_core(MODULE_NAME, module.clone());
    b.register_routes(MODULE_NAME, module.clone());
    b.register_translations(MODULE_NAME, module);
}

hostkit::inventory::submit! { hostkit::Registrator(register) }

#[cfg(test)]
mod tests {
    use super::*;
    use hostkit::manifest::{ActivationPlan, AppManifest};
    use hostkit::{BootstrapChain, BootstrapContext, HostRouter, ModuleManifestEntry};
    use hostkit_bootstrap::{PlatformConfig, StaticConfigProvider};

    struct Reports;

    #[async_trait]
    impl Module for Reports {
        async fn init(&self, _ctx: &ModuleCtx) -> anyhow::Result<()> {
            Ok(())
        }
    }

    impl RoutedModule for Reports {
        fn routes(&self, _ctx: &ModuleCtx) -> anyhow::Result<Vec<ModuleRoute>> {
            Ok(vec![
                ModuleRoute::new("/reports", get(|| async { "reports" })).with_title("Reports"),
            ])
        }
    }

    impl TranslatedModule for Reports {
        fn translations(&self) -> Vec<TranslationBundle> {
            vec![TranslationBundle::new("ru", "reports", json!({ "menu": { "title": "Отчёты" } }))]
        }
    }

    async fn router() -> HostRouter {
        let mut b = CatalogBuilder::default();
        register(&mut b);
        let reports = Arc::new(Reports);
        b.register_core("reports", reports.clone());
        b.register_routes("reports", reports.clone());
        b.register_translations("reports", reports);

        let manifest = AppManifest::new(vec![
            ModuleManifestEntry::local("reports"),
            ModuleManifestEntry::init(MODULE_NAME, 2),
        ]);
        let mut ctx = BootstrapContext::new(
            PlatformConfig::default(),
            Arc::new(StaticConfigProvider::new().with_module(MODULE_NAME, json!({ "theme": "dark" }))),
            ActivationPlan::build(&manifest).unwrap(),
            Arc::new(b.build().unwrap()),
        );
        BootstrapChain::standard().run(&mut ctx).await.unwrap();
        ctx.into_router().unwrap()
    }

    async fn json_body<T: serde::de::DeserializeOwned>(resp: axum::response::Response) -> T {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn menu_is_localized_with_title_fallback() {
        let router = router().await;

        let en: MenuDto = json_body(router.navigate("/menu").await.unwrap()).await;
        assert_eq!(en.heading, "Navigation");
        assert_eq!(en.items[0].title, "Reports");

        let ru: MenuDto = json_body(router.navigate("/menu?locale=ru").await.unwrap()).await;
        assert_eq!(ru.heading, "Навигация");
        assert_eq!(
            ru.items,
            vec![MenuEntry {
                module: "reports".into(),
                path: "/reports".into(),
                title: "Отчёты".into(),
            }]
        );
    }

    #[tokio::test]
    async fn layout_settings_come_from_config() {
        let router = router().await;
        let settings: LayoutSettings = json_body(router.navigate("/layout").await.unwrap()).await;
        assert_eq!(settings.brand, "HostKit");
        assert_eq!(settings.theme, "dark");
    }
}
