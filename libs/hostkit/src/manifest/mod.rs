//! Declarative module manifest: which modules exist, how they load, and the
//! entitlement payload that gates them.
//!
//! JSON shape is camelCase to match the deployment artifact and the backend
//! start payload.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

mod enrich;
mod loader;
mod plan;

pub use enrich::{enrich_manifest_response, StartData, StartResponse};
pub use loader::{ManifestLoader, INIT_MODULES, MANIFEST_FILE_NAME};
pub use plan::{ActivationPlan, SkipReason};

pub const DEFAULT_MODULE_VERSION: &str = "1.0.0";
pub const INIT_LOAD_PRIORITY: i32 = 0;
pub const NORMAL_LOAD_PRIORITY: i32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LoadType {
    /// Host shell: always local, always loaded, never remote.
    Init,
    #[default]
    Normal,
}

/// One declared module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleManifestEntry {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub load_type: LoadType,
    /// Absent means the default for `load_type`; see [`Self::priority`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_priority: Option<i32>,
    /// Empty: resolve from the local module catalog. Otherwise the federated entry URL.
    #[serde(default)]
    pub remote_entry: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub feature_flags: Vec<String>,
    #[serde(default)]
    pub access_permissions: Vec<String>,
}

fn default_version() -> String {
    DEFAULT_MODULE_VERSION.to_string()
}

impl ModuleManifestEntry {
    /// An INIT module with an explicit priority.
    pub fn init(name: impl Into<String>, load_priority: i32) -> Self {
        Self {
            load_type: LoadType::Init,
            load_priority: Some(load_priority),
            ..Self::local(name)
        }
    }

    /// A NORMAL module resolved from the local catalog.
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: default_version(),
            load_type: LoadType::Normal,
            load_priority: None,
            remote_entry: String::new(),
            dependencies: Vec::new(),
            feature_flags: Vec::new(),
            access_permissions: Vec::new(),
        }
    }

    /// A NORMAL module fetched from a federated entry point.
    pub fn remote(name: impl Into<String>, remote_entry: impl Into<String>) -> Self {
        Self {
            remote_entry: remote_entry.into(),
            ..Self::local(name)
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.load_priority = Some(priority);
        self
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_feature_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.feature_flags = flags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_access_permissions<I, S>(mut self, perms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.access_permissions = perms.into_iter().map(Into::into).collect();
        self
    }

    /// Effective priority: explicit value, else 0 for INIT and 1 for NORMAL.
    pub fn priority(&self) -> i32 {
        self.load_priority.unwrap_or(match self.load_type {
            LoadType::Init => INIT_LOAD_PRIORITY,
            LoadType::Normal => NORMAL_LOAD_PRIORITY,
        })
    }

    /// INIT modules are never remote, whatever `remote_entry` says.
    pub fn is_remote(&self) -> bool {
        self.load_type == LoadType::Normal && !self.remote_entry.is_empty()
    }

    /// Drop repeated keys from the list fields, keeping first occurrences.
    pub fn dedup_lists(&mut self) {
        dedup_in_place(&mut self.dependencies);
        dedup_in_place(&mut self.feature_flags);
        dedup_in_place(&mut self.access_permissions);
    }
}

fn dedup_in_place(list: &mut Vec<String>) {
    let mut seen = HashSet::with_capacity(list.len());
    list.retain(|k| seen.insert(k.clone()));
}

/// Entitlements granted to the current user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntitlements {
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub feature_flags: Vec<String>,
}

/// Keyed entitlement/parameter payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestData {
    #[serde(default)]
    pub features: BTreeMap<String, bool>,
    #[serde(default)]
    pub permissions: BTreeMap<String, bool>,
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppManifest {
    #[serde(default)]
    pub modules: Vec<ModuleManifestEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserEntitlements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ManifestData>,
}

impl AppManifest {
    pub fn new(modules: Vec<ModuleManifestEntry>) -> Self {
        Self {
            modules,
            user: None,
            data: None,
        }
    }

    pub fn module(&self, name: &str) -> Option<&ModuleManifestEntry> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Whether `flag` is on, either in `data.features` or in the user's flags.
    pub fn feature_enabled(&self, flag: &str) -> bool {
        self.data
            .as_ref()
            .and_then(|d| d.features.get(flag).copied())
            .unwrap_or(false)
            || self
                .user
                .as_ref()
                .is_some_and(|u| u.feature_flags.iter().any(|f| f == flag))
    }

    /// Whether `permission` is granted, either in `data.permissions` or to the user.
    pub fn permission_granted(&self, permission: &str) -> bool {
        self.data
            .as_ref()
            .and_then(|d| d.permissions.get(permission).copied())
            .unwrap_or(false)
            || self
                .user
                .as_ref()
                .is_some_and(|u| u.permissions.iter().any(|p| p == permission))
    }

    /// Names must be unique across the manifest.
    pub fn validate_unique_names(&self) -> Result<(), ManifestError> {
        let mut seen = HashSet::new();
        for m in &self.modules {
            if !seen.insert(m.name.as_str()) {
                return Err(ManifestError::DuplicateModule(m.name.clone()));
            }
        }
        Ok(())
    }
}

/// Configuration errors raised while resolving a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("module '{0}' is declared more than once")]
    DuplicateModule(String),
    #[error("module '{module}' depends on unknown '{depends_on}'")]
    UnknownDependency { module: String, depends_on: String },
    #[error("INIT module '{module}' cannot depend on NORMAL module '{depends_on}'")]
    InitDependsOnNormal { module: String, depends_on: String },
    #[error("cyclic dependency detected: {}", path.join(" -> "))]
    CycleDetected { path: Vec<String> },
    #[error("failed to scan module source tree '{path}'")]
    Scan {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
