use anyhow::Context;
use futures::future::{BoxFuture, FutureExt};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use super::{activate_modules, BootstrapContext};
use crate::i18n::Translations;
use crate::manifest::ActivationPlan;
use crate::router::{HostRouter, RouterDependencies};
use crate::transport::{HttpTransport, MockTransport, Transport};

type StageFuture<'a> = BoxFuture<'a, anyhow::Result<()>>;

/// Stable stamp of what this host activates: SHA-256 over `name@version`
/// lines in activation order.
pub fn compute_client_hash(plan: &ActivationPlan) -> String {
    let mut hasher = Sha256::new();
    for m in plan.modules() {
        hasher.update(m.name.as_bytes());
        hasher.update(b"@");
        hasher.update(m.version.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

pub(super) fn api_client(ctx: &mut BootstrapContext) -> StageFuture<'_> {
    build_api_client(ctx).boxed()
}

async fn build_api_client(ctx: &mut BootstrapContext) -> anyhow::Result<()> {
    if ctx.transport.is_some() {
        tracing::debug!("Reusing pre-built transport");
        return Ok(());
    }
    if let Some(mock) = &ctx.mock {
        tracing::info!("Transport answered by the mock service");
        ctx.transport = Some(Arc::new(MockTransport::new(Arc::clone(mock))));
        return Ok(());
    }
    match HttpTransport::from_config(&ctx.platform.api)? {
        Some(http) => ctx.transport = Some(Arc::new(http)),
        None => tracing::info!("No API base URL configured; transport disabled"),
    }
    Ok(())
}

pub(super) fn client_hash(ctx: &mut BootstrapContext) -> StageFuture<'_> {
    async move {
        let hash = match &ctx.platform.client_hash {
            Some(fixed) => fixed.clone(),
            None => compute_client_hash(&ctx.plan),
        };
        if let Some(transport) = &ctx.transport {
            transport.set_client_hash(&hash);
        }
        tracing::info!(client_hash = %hash, "Client hash stamped");
        ctx.client_hash = Some(hash);
        Ok::<_, anyhow::Error>(())
    }
    .boxed()
}

pub(super) fn router(ctx: &mut BootstrapContext) -> StageFuture<'_> {
    async move {
        ctx.router = Some(HostRouter::new());
        Ok::<_, anyhow::Error>(())
    }
    .boxed()
}

pub(super) fn i18n(ctx: &mut BootstrapContext) -> StageFuture<'_> {
    async move {
        let cfg = &ctx.platform.i18n;
        ctx.translations = Some(Arc::new(Translations::new(
            cfg.default_locale.clone(),
            cfg.fallback_locale.clone(),
        )));
        Ok::<_, anyhow::Error>(())
    }
    .boxed()
}

pub(super) fn modules(ctx: &mut BootstrapContext) -> StageFuture<'_> {
    async move {
        activate_modules(ctx).await?;
        Ok::<_, anyhow::Error>(())
    }
    .boxed()
}

pub(super) fn mock_service(ctx: &mut BootstrapContext) -> StageFuture<'_> {
    async move {
        match &ctx.mock {
            Some(mock) if ctx.platform.environment.is_development() => {
                mock.start();
                tracing::info!(handlers = ?mock.keys(), "Mock handlers registered");
            }
            _ => tracing::debug!("Mock service disabled"),
        }
        Ok::<_, anyhow::Error>(())
    }
    .boxed()
}

pub(super) fn di(ctx: &mut BootstrapContext) -> StageFuture<'_> {
    async move {
        let hub = &ctx.hub;
        if let Some(transport) = &ctx.transport {
            hub.bind::<dyn Transport>(Arc::clone(transport));
        }
        if let Some(translations) = &ctx.translations {
            hub.bind(Arc::clone(translations));
        }
        if let Some(mock) = &ctx.mock {
            hub.bind(Arc::clone(mock));
        }
        hub.bind(Arc::clone(&ctx.http_errors));
        tracing::debug!(bound = ?hub.bound_types(), "Client hub wired");
        Ok::<_, anyhow::Error>(())
    }
    .boxed()
}

pub(super) fn router_post(ctx: &mut BootstrapContext) -> StageFuture<'_> {
    async move {
        let router = ctx
            .router
            .as_mut()
            .context("router must be constructed before post-router wiring")?;
        if let Some(customize) = ctx.customizer.take() {
            customize(router).context("router customizer failed")?;
        }
        router.set_dependencies(RouterDependencies {
            menu: router.menu().to_vec(),
            hub: Some(Arc::clone(&ctx.hub)),
        });
        tracing::info!(menu_items = router.menu().len(), "Router dependencies attached");
        Ok::<_, anyhow::Error>(())
    }
    .boxed()
}

pub(super) fn http_error(ctx: &mut BootstrapContext) -> StageFuture<'_> {
    async move {
        match &ctx.transport {
            Some(transport) => transport.set_error_hook(ctx.http_errors.hook()),
            None => tracing::debug!("No transport; HTTP error hook not installed"),
        }
        Ok::<_, anyhow::Error>(())
    }
    .boxed()
}
