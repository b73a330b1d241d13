use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use axum::extract::Extension;
use axum::routing::get;
use hostkit::{
    CatalogBuilder, ClientHub, MockHandler, MockedModule, Module, ModuleCtx, ModuleRoute,
    RoutedModule, TranslatedModule, TranslationBundle, Transport,
};
use serde_json::json;
use tracing::{debug, info};

use crate::api::handlers;
use crate::config::ProfileConfig;
use crate::domain::error::ProfileError;
use crate::domain::service::ProfileService;

pub const MODULE_NAME: &str = "profile";

/// Shared by the route handlers.
///
/// The transport is bound into the hub only after all modules are
/// activated, so the service is built on first use.
#[derive(Default)]
pub struct ProfileState {
    hub: ArcSwapOption<ClientHub>,
    config: ArcSwapOption<ProfileConfig>,
    service: ArcSwapOption<ProfileService>,
}

impl ProfileState {
    pub fn config(&self) -> Result<Arc<ProfileConfig>, ProfileError> {
        self.config.load_full().ok_or(ProfileError::NotInitialized)
    }

    pub fn service(&self) -> Result<Arc<ProfileService>, ProfileError> {
        if let Some(svc) = self.service.load_full() {
            return Ok(svc);
        }
        let hub = self.hub.load_full().ok_or(ProfileError::NotInitialized)?;
        let transport = hub
            .get::<dyn Transport>()
            .map_err(|_| ProfileError::NoTransport)?;
        let svc = Arc::new(ProfileService::new(transport, self.config()?.api_prefix.clone()));

        // First writer wins; a concurrent loser adopts the stored service.
        self.service.rcu(|current| {
            let current: &Option<Arc<ProfileService>> = current;
            current.clone().or_else(|| Some(Arc::clone(&svc)))
        });
        debug!("Profile service ready");
        self.service.load_full().ok_or(ProfileError::NotInitialized)
    }
}

#[derive(Default)]
pub struct ProfileModule {
    state: Arc<ProfileState>,
}

#[async_trait]
impl Module for ProfileModule {
    async fn init(&self, ctx: &ModuleCtx) -> anyhow::Result<()> {
        info!("Initializing profile module");

        let cfg: ProfileConfig = ctx.config()?;
        debug!(
            "Loaded profile config: api_prefix={}, current_user_id={}",
            cfg.api_prefix, cfg.current_user_id
        );

        self.state.config.store(Some(Arc::new(cfg)));
        self.state.hub.store(Some(Arc::clone(ctx.client_hub())));

        // In-flight loads are abandoned on host shutdown.
        let state = Arc::clone(&self.state);
        let cancel = ctx.cancellation_token().clone();
        tokio::spawn(async move {
            cancel.cancelled().await;
            if let Some(svc) = state.service.load_full() {
                svc.cancel_all();
                debug!("Profile loads cancelled on shutdown");
            }
        });
        Ok(())
    }
}

impl RoutedModule for ProfileModule {
    fn routes(&self, _ctx: &ModuleCtx) -> anyhow::Result<Vec<ModuleRoute>> {
        let state = Extension(Arc::clone(&self.state));
        Ok(vec![
            ModuleRoute::new("/profile", get(handlers::current_profile).layer(state.clone()))
                .with_title("Profile"),
            ModuleRoute::new("/profile/{id}", get(handlers::profile_by_id).layer(state)),
        ])
    }
}

impl TranslatedModule for ProfileModule {
    fn translations(&self) -> Vec<TranslationBundle> {
        vec![
            TranslationBundle::new(
                "en",
                MODULE_NAME,
                json!({
                    "menu": { "title": "Profile" },
                    "fields": { "name": "Name", "email": "Email" }
                }),
            ),
            TranslationBundle::new(
                "ru",
                MODULE_NAME,
                json!({
                    "menu": { "title": "Профиль" },
                    "fields": { "name": "Имя", "email": "Почта" }
                }),
            ),
        ]
    }
}

impl MockedModule for ProfileModule {
    fn mock_handlers(&self) -> Vec<MockHandler> {
        crate::mocks::handlers()
    }
}

pub fn register(b: &mut CatalogBuilder) {
    let module = Arc::new(ProfileModule::default());
    b.register_core(MODULE_NAME, module.clone());
    b.register_routes(MODULE_NAME, module.clone());
    b.register_translations(MODULE_NAME, module.clone());
    b.register_mocks(MODULE_NAME, module);
}

hostkit::inventory::submit! { hostkit::Registrator(register) }
