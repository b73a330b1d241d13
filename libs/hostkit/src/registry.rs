//! Statically declared catalog of locally available modules.
//!
//! Each module crate submits a [`Registrator`] through `inventory`; the
//! catalog is assembled once at startup and looked up by manifest name.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::contracts;

pub struct CatalogEntry {
    pub name: &'static str,
    pub core: Arc<dyn contracts::Module>,
    pub routes: Option<Arc<dyn contracts::RoutedModule>>,
    pub translations: Option<Arc<dyn contracts::TranslatedModule>>,
    pub mocks: Option<Arc<dyn contracts::MockedModule>>,
}

impl std::fmt::Debug for CatalogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogEntry")
            .field("name", &self.name)
            .field("has_routes", &self.routes.is_some())
            .field("has_translations", &self.translations.is_some())
            .field("has_mocks", &self.mocks.is_some())
            .finish()
    }
}

/// The function a module crate submits via `inventory::submit!`.
pub struct Registrator(pub fn(&mut CatalogBuilder));

inventory::collect!(Registrator);

pub struct ModuleCatalog {
    entries: HashMap<&'static str, CatalogEntry>,
}

impl std::fmt::Debug for ModuleCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleCatalog")
            .field("modules", &self.names())
            .finish()
    }
}

impl ModuleCatalog {
    /// Run every submitted registrator and build the catalog.
    pub fn discover() -> Result<Self, CatalogError> {
        let mut b = CatalogBuilder::default();
        for r in ::inventory::iter::<Registrator> {
            r.0(&mut b);
        }
        b.build()
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Module names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.entries.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Registrators fill this; names must be unique and every capability
/// needs a core registration under the same name.
#[derive(Default)]
pub struct CatalogBuilder {
    core: HashMap<&'static str, Arc<dyn contracts::Module>>,
    routes: HashMap<&'static str, Arc<dyn contracts::RoutedModule>>,
    translations: HashMap<&'static str, Arc<dyn contracts::TranslatedModule>>,
    mocks: HashMap<&'static str, Arc<dyn contracts::MockedModule>>,
    errors: Vec<String>,
}

impl CatalogBuilder {
    pub fn register_core(&mut self, name: &'static str, m: Arc<dyn contracts::Module>) {
        if self.core.contains_key(name) {
            self.errors.push(format!("Module '{name}' is already registered"));
            return;
        }
        self.core.insert(name, m);
    }

    pub fn register_routes(&mut self, name: &'static str, m: Arc<dyn contracts::RoutedModule>) {
        self.routes.insert(name, m);
    }

    pub fn register_translations(
        &mut self,
        name: &'static str,
        m: Arc<dyn contracts::TranslatedModule>,
    ) {
        self.translations.insert(name, m);
    }

    pub fn register_mocks(&mut self, name: &'static str, m: Arc<dyn contracts::MockedModule>) {
        self.mocks.insert(name, m);
    }

    pub fn build(mut self) -> Result<ModuleCatalog, CatalogError> {
        if !self.errors.is_empty() {
            return Err(CatalogError::InvalidRegistration {
                errors: self.errors,
            });
        }

        let orphans = self
            .routes
            .keys()
            .map(|n| (*n, "routes"))
            .chain(self.translations.keys().map(|n| (*n, "translations")))
            .chain(self.mocks.keys().map(|n| (*n, "mocks")))
            .find(|(n, _)| !self.core.contains_key(n));
        if let Some((module, capability)) = orphans {
            return Err(CatalogError::UnknownModule { module, capability });
        }

        let entries = self
            .core
            .into_iter()
            .map(|(name, core)| {
                let entry = CatalogEntry {
                    name,
                    core,
                    routes: self.routes.remove(name),
                    translations: self.translations.remove(name),
                    mocks: self.mocks.remove(name),
                };
                (name, entry)
            })
            .collect::<HashMap<_, _>>();

        tracing::debug!(modules = entries.len(), "Module catalog built");
        Ok(ModuleCatalog { entries })
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{capability} registered for unknown module '{module}'")]
    UnknownModule {
        module: &'static str,
        capability: &'static str,
    },
    #[error("invalid module registration: {errors:?}")]
    InvalidRegistration { errors: Vec<String> },
}
