use async_trait::async_trait;

use crate::context::ModuleCtx;
use crate::i18n::TranslationBundle;
use crate::mock::MockHandler;
use crate::router::ModuleRoute;

/// Core module contract: the init hook, where a module binds its own
/// clients into the hub.
///
/// Runs after the module's routes are registered and before its
/// translations and mocks.
#[async_trait]
pub trait Module: Send + Sync + 'static {
    async fn init(&self, ctx: &ModuleCtx) -> anyhow::Result<()>;
}

/// Routes contributed to the host router. Pure wiring; must be sync.
pub trait RoutedModule: Send + Sync {
    fn routes(&self, ctx: &ModuleCtx) -> anyhow::Result<Vec<ModuleRoute>>;
}

pub trait TranslatedModule: Send + Sync {
    fn translations(&self) -> Vec<TranslationBundle>;
}

/// Development-only mock handlers. Never consulted in production.
pub trait MockedModule: Send + Sync {
    fn mock_handlers(&self) -> Vec<MockHandler>;
}
