use axum::routing::get;
use axum::Json;
use std::sync::Arc;
use thiserror::Error;
use tracing::Instrument;

use super::{BootstrapContext, StageKind};
use crate::context::ModuleCtx;
use crate::i18n::Translations;
use crate::manifest::ModuleManifestEntry;
use crate::mock::MockService;
use crate::registry::CatalogEntry;
use crate::remote::RemoteModuleLoader;
use crate::router::{HostRouter, ModuleRoute};

#[derive(Debug, Error)]
pub enum ActivationError {
    #[error("stage {0} must run before module activation")]
    MissingStage(StageKind),
    #[error("module '{0}' is not in the local module catalog")]
    NotInCatalog(String),
    #[error("module '{0}' has a remote entry but no remote loader is configured")]
    NoRemoteLoader(String),
    #[error("module '{module}' failed to activate")]
    Module {
        module: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Activate every planned module, strictly in plan order.
///
/// Per local module: routes, then the init hook, then translations, then
/// (development only) mock handlers. The first failure stops the loop and
/// is returned as is; later modules are not touched.
pub async fn activate_modules(ctx: &mut BootstrapContext) -> Result<(), ActivationError> {
    let router = ctx
        .router
        .as_mut()
        .ok_or(ActivationError::MissingStage(StageKind::Router))?;
    let translations = ctx
        .translations
        .clone()
        .ok_or(ActivationError::MissingStage(StageKind::I18n))?;
    let mocks = ctx
        .mock
        .clone()
        .filter(|_| ctx.platform.environment.is_development());

    for entry in ctx.plan.modules() {
        let result = if entry.is_remote() {
            let loader = ctx
                .remote_loader
                .as_deref()
                .ok_or_else(|| ActivationError::NoRemoteLoader(entry.name.clone()))?;
            activate_remote(entry, loader, router, &translations).await
        } else {
            let local = ctx
                .catalog
                .get(&entry.name)
                .ok_or_else(|| ActivationError::NotInCatalog(entry.name.clone()))?;
            let module_ctx = ModuleCtx::new(
                &entry.name,
                ctx.platform.environment,
                Arc::clone(&ctx.config),
                Arc::clone(&ctx.hub),
                ctx.cancel.clone(),
            );
            activate_local(local, &module_ctx, router, &translations, mocks.as_deref()).await
        };

        result.map_err(|source| {
            tracing::error!(module = %entry.name, error = %source, "Module activation failed");
            ActivationError::Module {
                module: entry.name.clone(),
                source,
            }
        })?;

        tracing::info!(
            module = %entry.name,
            version = %entry.version,
            remote = entry.is_remote(),
            "Module activated"
        );
        ctx.activated.push(entry.name.clone());
    }
    Ok(())
}

async fn activate_local(
    local: &CatalogEntry,
    ctx: &ModuleCtx,
    router: &mut HostRouter,
    translations: &Translations,
    mocks: Option<&MockService>,
) -> anyhow::Result<()> {
    if let Some(routed) = &local.routes {
        router.add(local.name, routed.routes(ctx)?)?;
    }

    local.core.init(ctx).instrument(ctx.span().clone()).await?;

    if let Some(translated) = &local.translations {
        for bundle in translated.translations() {
            translations.add(bundle)?;
        }
    }

    if let (Some(mocks), Some(mocked)) = (mocks, &local.mocks) {
        mocks.use_handlers(mocked.mock_handlers());
    }
    Ok(())
}

async fn activate_remote(
    entry: &ModuleManifestEntry,
    loader: &dyn RemoteModuleLoader,
    router: &mut HostRouter,
    translations: &Translations,
) -> anyhow::Result<()> {
    let descriptor = loader.load(entry).await?;

    let routes = descriptor
        .routes
        .iter()
        .map(|r| {
            let body = descriptor.mount_payload(&entry.remote_entry, &r.path);
            let route = ModuleRoute::new(
                r.path.clone(),
                get(move || {
                    let body = body.clone();
                    async move { Json(body) }
                }),
            );
            match &r.title {
                Some(title) => route.with_title(title.clone()),
                None => route,
            }
        })
        .collect();
    router.add(&entry.name, routes)?;

    for bundle in descriptor.translations {
        translations.add(bundle)?;
    }
    Ok(())
}
