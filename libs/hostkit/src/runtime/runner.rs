//! Host runner.
//!
//! Phase order: **manifest → start payload → plan → bootstrap chain → serve → wait**.
//! Shutdown can be driven by OS signals, an external `CancellationToken`,
//! or an arbitrary future.

use anyhow::Context;
use std::{future::Future, pin::Pin, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use url::Url;

use hostkit_bootstrap::{wait_for_shutdown, AppConfig};

use crate::bootstrap::{BootstrapChain, BootstrapContext};
use crate::manifest::{
    enrich_manifest_response, ActivationPlan, AppManifest, ManifestLoader, StartData,
    StartResponse,
};
use crate::registry::ModuleCatalog;
use crate::remote::HttpRemoteLoader;
use crate::router::RouterCustomizer;
use crate::transport::{ApiRequest, HttpTransport, Transport};

/// How the runner should decide when to stop.
pub enum ShutdownOptions {
    /// Listen for OS signals (Ctrl+C / SIGTERM).
    Signals,
    /// An external `CancellationToken` controls the lifecycle.
    Token(CancellationToken),
    /// An arbitrary future; when it completes, we initiate shutdown.
    Future(Pin<Box<dyn Future<Output = ()> + Send>>),
}

pub struct RunOptions {
    pub config: AppConfig,
    pub shutdown: ShutdownOptions,
    /// Applied to the router during post-router wiring.
    pub customizer: Option<RouterCustomizer>,
}

/// The resolved manifest, or an error when none exists and fallback is off.
pub fn resolve_manifest(config: &AppConfig) -> anyhow::Result<AppManifest> {
    let platform = &config.platform;
    ManifestLoader::new(&platform.manifest_dir, &platform.modules_dir)
        .allow_fallback(platform.allow_fallback)
        .load()?
        .with_context(|| {
            format!(
                "no manifest in '{}' and fallback synthesis is disabled",
                platform.manifest_dir
            )
        })
}

/// Activation plan plus the transport built while fetching the start
/// payload, if one was fetched.
pub struct ResolvedPlan {
    pub plan: ActivationPlan,
    pub transport: Option<Arc<dyn Transport>>,
}

/// Merge the manifest into the backend start payload (or into an empty one
/// when no start endpoint is configured) and plan activation from the result.
pub async fn resolve_plan(
    config: &AppConfig,
    manifest: &AppManifest,
) -> anyhow::Result<ResolvedPlan> {
    let platform = &config.platform;
    let remote_base = platform
        .remote_base
        .as_deref()
        .map(Url::parse)
        .transpose()
        .context("invalid platform.remote_base")?;

    let (start, transport) = match &platform.api.start_endpoint {
        Some(_) if platform.mocks_active() => {
            tracing::info!("Mocks active; skipping the start payload fetch");
            (empty_start(), None)
        }
        Some(endpoint) => {
            let transport = HttpTransport::from_config(&platform.api)?
                .context("platform.api.start_endpoint requires platform.api.base_url")?;
            let start = fetch_start(&transport, endpoint).await?;
            (start, Some(Arc::new(transport) as Arc<dyn Transport>))
        }
        None => (empty_start(), None),
    };

    let enriched = enrich_manifest_response(start, manifest, remote_base.as_ref());
    let effective = match &enriched.data {
        Some(data) => data.to_manifest(manifest.user.clone()),
        None => manifest.clone(),
    };
    effective.validate_unique_names()?;

    let plan = ActivationPlan::build(&effective)?;
    tracing::info!(
        modules = ?plan.names(),
        skipped = plan.skipped().len(),
        "Activation plan resolved"
    );
    Ok(ResolvedPlan { plan, transport })
}

fn empty_start() -> StartResponse {
    StartResponse {
        data: Some(StartData::default()),
        ..StartResponse::default()
    }
}

async fn fetch_start(transport: &HttpTransport, endpoint: &str) -> anyhow::Result<StartResponse> {
    let body = transport
        .request(ApiRequest::get(endpoint))
        .await
        .with_context(|| format!("failed to fetch start payload from '{endpoint}'"))?;
    serde_json::from_value(body).context("start payload is malformed")
}

/// Resolve everything and run the standard bootstrap chain.
///
/// Returns the fully bootstrapped context; on error nothing is served.
pub async fn bootstrap(
    config: &AppConfig,
    customizer: Option<RouterCustomizer>,
    cancel: CancellationToken,
) -> anyhow::Result<BootstrapContext> {
    config.platform.validate()?;

    let manifest = resolve_manifest(config)?;
    let resolved = resolve_plan(config, &manifest).await?;
    let catalog = Arc::new(ModuleCatalog::discover()?);
    tracing::info!(modules = ?catalog.names(), "Module catalog discovered");

    let loader = HttpRemoteLoader::new(Duration::from_millis(config.platform.api.timeout_ms))?;
    let mut ctx = BootstrapContext::new(
        config.platform.clone(),
        Arc::new(config.clone()),
        resolved.plan,
        catalog,
    )
    .with_remote_loader(Arc::new(loader))
    .with_cancel(cancel);
    if let Some(transport) = resolved.transport {
        ctx = ctx.with_transport(transport);
    }
    if let Some(customizer) = customizer {
        ctx = ctx.with_customizer(customizer);
    }

    BootstrapChain::standard().run(&mut ctx).await?;
    Ok(ctx)
}

/// Full cycle: bootstrap → serve → wait for shutdown.
pub async fn run(opts: RunOptions) -> anyhow::Result<()> {
    let cancel = match &opts.shutdown {
        ShutdownOptions::Token(t) => t.clone(),
        _ => CancellationToken::new(),
    };

    match opts.shutdown {
        ShutdownOptions::Signals => {
            let c = cancel.clone();
            tokio::spawn(async move {
                match wait_for_shutdown().await {
                    Ok(()) => {
                        tracing::info!("shutdown: signal received");
                    }
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            "shutdown: primary waiter failed; falling back to ctrl_c()"
                        );
                        let _ = tokio::signal::ctrl_c().await;
                    }
                }
                c.cancel();
            });
        }
        ShutdownOptions::Future(waiter) => {
            let c = cancel.clone();
            tokio::spawn(async move {
                waiter.await;
                tracing::info!("shutdown: external future completed");
                c.cancel();
            });
        }
        ShutdownOptions::Token(_) => {
            tracing::info!("shutdown: external token will control lifecycle");
        }
    }

    let ctx = bootstrap(&opts.config, opts.customizer, cancel.clone()).await?;
    let app = ctx.into_router()?.to_axum();

    let addr = format!("{}:{}", opts.config.server.host, opts.config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(addr = %addr, "Host server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .context("host server failed")?;

    tracing::info!("Host server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{ModuleManifestEntry, MANIFEST_FILE_NAME};
    use httpmock::prelude::*;
    use serde_json::json;

    fn config_in(dir: &std::path::Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.platform.manifest_dir = dir.join("dist").to_string_lossy().to_string();
        config.platform.modules_dir = dir.join("modules").to_string_lossy().to_string();
        config
    }

    #[test]
    fn missing_manifest_without_fallback_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.platform.allow_fallback = false;

        let err = resolve_manifest(&config).unwrap_err();
        assert!(err.to_string().contains("fallback synthesis is disabled"));
    }

    #[test]
    fn deployed_manifest_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        std::fs::create_dir_all(dir.path().join("dist")).unwrap();
        std::fs::write(
            dir.path().join("dist").join(MANIFEST_FILE_NAME),
            json!({ "modules": [{ "name": "profile", "loadType": "NORMAL" }] }).to_string(),
        )
        .unwrap();

        let manifest = resolve_manifest(&config).unwrap();
        assert_eq!(manifest.modules.len(), 1);
        assert_eq!(manifest.modules[0].name, "profile");
    }

    #[tokio::test]
    async fn plan_without_start_endpoint_absolutizes_remote_entries() {
        let mut config = AppConfig::default();
        config.platform.remote_base = Some("https://cdn.example.com/mf/".into());
        let manifest = AppManifest::new(vec![
            ModuleManifestEntry::init("host_core", 0),
            ModuleManifestEntry::remote("reports", "reports/remoteEntry.js"),
        ]);

        let resolved = resolve_plan(&config, &manifest).await.unwrap();

        assert!(resolved.transport.is_none());
        assert_eq!(resolved.plan.names(), vec!["host_core", "reports"]);
        assert_eq!(
            resolved.plan.modules()[1].remote_entry,
            "https://cdn.example.com/mf/reports/remoteEntry.js"
        );
    }

    #[tokio::test]
    async fn start_payload_gates_modules() {
        let server = MockServer::start_async().await;
        let start = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/start");
                then.status(200).json_body(json!({
                    "data": {
                        "features": { "beta": false },
                        "modules": [{ "name": "audit", "loadType": "NORMAL" }]
                    }
                }));
            })
            .await;

        let mut config = AppConfig::default();
        config.platform.api.base_url = Some(server.base_url());
        config.platform.api.start_endpoint = Some("/api/start".into());
        let manifest = AppManifest::new(vec![
            ModuleManifestEntry::init("host_core", 0),
            ModuleManifestEntry::local("labs").with_feature_flags(["beta"]),
        ]);

        let resolved = resolve_plan(&config, &manifest).await.unwrap();

        start.assert_async().await;
        assert!(resolved.transport.is_some());
        assert_eq!(resolved.plan.names(), vec!["host_core", "audit"]);
        assert_eq!(resolved.plan.skipped()[0].0, "labs");
    }

    #[tokio::test]
    async fn unreachable_start_endpoint_aborts() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/start");
                then.status(503);
            })
            .await;

        let mut config = AppConfig::default();
        config.platform.api.base_url = Some(server.base_url());
        config.platform.api.start_endpoint = Some("/api/start".into());

        let err = resolve_plan(&config, &AppManifest::default())
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("start payload"));
    }
}
