//! Bootstrap chain: an ordered list of stages, each enriching one shared
//! [`BootstrapContext`], run strictly one after another.
//!
//! Any stage error aborts the chain. A partially bootstrapped host is never
//! served.

use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use hostkit_bootstrap::{ConfigProvider, PlatformConfig};

use crate::client_hub::ClientHub;
use crate::http_errors::HttpErrorNotifier;
use crate::i18n::Translations;
use crate::manifest::ActivationPlan;
use crate::mock::MockService;
use crate::registry::ModuleCatalog;
use crate::remote::RemoteModuleLoader;
use crate::router::{HostRouter, RouterCustomizer};
use crate::transport::Transport;

mod activation;
mod stages;

pub use activation::{activate_modules, ActivationError};
pub use stages::compute_client_hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    ApiClient,
    ClientHash,
    Router,
    I18n,
    Modules,
    MockService,
    Di,
    RouterPost,
    HttpError,
}

impl StageKind {
    pub const ALL: [StageKind; 9] = [
        StageKind::ApiClient,
        StageKind::ClientHash,
        StageKind::Router,
        StageKind::I18n,
        StageKind::Modules,
        StageKind::MockService,
        StageKind::Di,
        StageKind::RouterPost,
        StageKind::HttpError,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StageKind::ApiClient => "APIClient",
            StageKind::ClientHash => "ClientHash",
            StageKind::Router => "Router",
            StageKind::I18n => "I18n",
            StageKind::Modules => "Modules",
            StageKind::MockService => "MockService",
            StageKind::Di => "DI",
            StageKind::RouterPost => "RouterPost",
            StageKind::HttpError => "HTTPError",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("bootstrap stage {stage} failed")]
    Stage {
        stage: StageKind,
        #[source]
        source: anyhow::Error,
    },
    #[error("bootstrap finished without a {0} stage")]
    Incomplete(StageKind),
}

/// Kernel state for one application lifetime. Stages enrich it in place.
pub struct BootstrapContext {
    pub platform: Arc<PlatformConfig>,
    pub config: Arc<dyn ConfigProvider>,
    pub plan: ActivationPlan,
    pub catalog: Arc<ModuleCatalog>,
    pub remote_loader: Option<Arc<dyn RemoteModuleLoader>>,
    pub hub: Arc<ClientHub>,
    pub http_errors: Arc<HttpErrorNotifier>,
    pub cancel: CancellationToken,

    // Filled in by the stages.
    pub transport: Option<Arc<dyn Transport>>,
    pub client_hash: Option<String>,
    pub router: Option<HostRouter>,
    pub translations: Option<Arc<Translations>>,
    /// Exists from the start in development with mocks enabled; started by
    /// the mock stage.
    pub mock: Option<Arc<MockService>>,
    pub customizer: Option<RouterCustomizer>,

    activated: Vec<String>,
    completed: Vec<StageKind>,
}

impl BootstrapContext {
    pub fn new(
        platform: PlatformConfig,
        config: Arc<dyn ConfigProvider>,
        plan: ActivationPlan,
        catalog: Arc<ModuleCatalog>,
    ) -> Self {
        let mock = platform.mocks_active().then(|| Arc::new(MockService::new()));
        Self {
            platform: Arc::new(platform),
            config,
            plan,
            catalog,
            remote_loader: None,
            hub: Arc::new(ClientHub::new()),
            http_errors: Arc::new(HttpErrorNotifier::new()),
            cancel: CancellationToken::new(),
            transport: None,
            client_hash: None,
            router: None,
            translations: None,
            mock,
            customizer: None,
            activated: Vec::new(),
            completed: Vec::new(),
        }
    }

    /// Reuse an already built transport instead of building one in the API client stage.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_remote_loader(mut self, loader: Arc<dyn RemoteModuleLoader>) -> Self {
        self.remote_loader = Some(loader);
        self
    }

    pub fn with_customizer(mut self, customizer: RouterCustomizer) -> Self {
        self.customizer = Some(customizer);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Modules activated so far, in activation order.
    pub fn activated_modules(&self) -> &[String] {
        &self.activated
    }

    /// Stages completed so far, in order.
    pub fn completed_stages(&self) -> &[StageKind] {
        &self.completed
    }

    /// The finished router. Fails if the router stage never ran.
    pub fn into_router(self) -> Result<HostRouter, BootstrapError> {
        self.router.ok_or(BootstrapError::Incomplete(StageKind::Router))
    }
}

pub type StageFn = for<'a> fn(&'a mut BootstrapContext) -> BoxFuture<'a, anyhow::Result<()>>;

#[derive(Clone, Copy)]
pub struct Stage {
    pub kind: StageKind,
    pub run: StageFn,
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Stage").field(&self.kind).finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct BootstrapChain {
    stages: Vec<Stage>,
}

impl BootstrapChain {
    /// The fixed production order.
    pub fn standard() -> Self {
        Self::default()
            .then(StageKind::ApiClient, stages::api_client)
            .then(StageKind::ClientHash, stages::client_hash)
            .then(StageKind::Router, stages::router)
            .then(StageKind::I18n, stages::i18n)
            .then(StageKind::Modules, stages::modules)
            .then(StageKind::MockService, stages::mock_service)
            .then(StageKind::Di, stages::di)
            .then(StageKind::RouterPost, stages::router_post)
            .then(StageKind::HttpError, stages::http_error)
    }

    pub fn then(mut self, kind: StageKind, run: StageFn) -> Self {
        self.stages.push(Stage { kind, run });
        self
    }

    pub fn kinds(&self) -> Vec<StageKind> {
        self.stages.iter().map(|s| s.kind).collect()
    }

    pub async fn run(&self, ctx: &mut BootstrapContext) -> Result<(), BootstrapError> {
        for stage in &self.stages {
            tracing::info!("Phase: {}", stage.kind);
            (stage.run)(ctx)
                .await
                .map_err(|source| BootstrapError::Stage {
                    stage: stage.kind,
                    source,
                })?;
            ctx.completed.push(stage.kind);
        }
        tracing::info!(
            modules = ctx.activated.len(),
            "Bootstrap complete"
        );
        Ok(())
    }
}
