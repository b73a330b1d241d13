use serde::de::DeserializeOwned;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use hostkit_bootstrap::{ConfigProvider, Environment};

use crate::client_hub::ClientHub;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration for module '{module}'")]
    Invalid {
        module: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Everything a module sees while it is activated.
///
/// Cheap to clone. `span` is the module's logging handle: the init hook
/// runs inside it, and anything the module spawns should enter it too.
#[derive(Clone)]
pub struct ModuleCtx {
    name: Arc<str>,
    environment: Environment,
    config: Arc<dyn ConfigProvider>,
    hub: Arc<ClientHub>,
    cancel: CancellationToken,
    span: tracing::Span,
}

impl std::fmt::Debug for ModuleCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleCtx")
            .field("name", &self.name)
            .field("environment", &self.environment)
            .finish()
    }
}

impl ModuleCtx {
    pub fn new(
        name: &str,
        environment: Environment,
        config: Arc<dyn ConfigProvider>,
        hub: Arc<ClientHub>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            name: Arc::from(name),
            environment,
            config,
            hub,
            cancel,
            span: tracing::info_span!("module", module = %name),
        }
    }

    pub fn module_name(&self) -> &str {
        &self.name
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn is_development(&self) -> bool {
        self.environment.is_development()
    }

    pub fn client_hub(&self) -> &Arc<ClientHub> {
        &self.hub
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    /// Typed view of the `modules.<name>` config section. An absent section
    /// deserializes from an empty object, so serde defaults apply.
    pub fn config<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        let raw = self
            .config
            .get_module_config(&self.name)
            .cloned()
            .unwrap_or_else(|| serde_json::Value::Object(Default::default()));
        serde_json::from_value(raw).map_err(|source| ConfigError::Invalid {
            module: self.name.to_string(),
            source,
        })
    }
}
