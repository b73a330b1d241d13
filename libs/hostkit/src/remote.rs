//! Remotely federated modules: a JSON descriptor fetched from `remoteEntry`.

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::i18n::TranslationBundle;
use crate::manifest::{ModuleManifestEntry, DEFAULT_MODULE_VERSION};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRoute {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteModuleDescriptor {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub translations: Vec<TranslationBundle>,
    #[serde(default)]
    pub routes: Vec<RemoteRoute>,
}

fn default_version() -> String {
    DEFAULT_MODULE_VERSION.to_string()
}

impl RemoteModuleDescriptor {
    /// Body served by the host at each of the module's mount points.
    pub fn mount_payload(&self, remote_entry: &str, path: &str) -> Value {
        serde_json::json!({
            "module": self.name,
            "remoteEntry": remote_entry,
            "path": path,
        })
    }
}

#[async_trait]
pub trait RemoteModuleLoader: Send + Sync {
    async fn load(&self, entry: &ModuleManifestEntry) -> anyhow::Result<RemoteModuleDescriptor>;
}

pub struct HttpRemoteLoader {
    client: reqwest::Client,
}

impl HttpRemoteLoader {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build remote module client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RemoteModuleLoader for HttpRemoteLoader {
    async fn load(&self, entry: &ModuleManifestEntry) -> anyhow::Result<RemoteModuleDescriptor> {
        tracing::debug!(module = %entry.name, remote_entry = %entry.remote_entry, "Fetching remote entry");
        let descriptor: RemoteModuleDescriptor = self
            .client
            .get(&entry.remote_entry)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .with_context(|| format!("failed to fetch remote entry {}", entry.remote_entry))?
            .json()
            .await
            .with_context(|| format!("remote entry {} is not a module descriptor", entry.remote_entry))?;

        if descriptor.name != entry.name {
            bail!(
                "remote entry {} describes module '{}', expected '{}'",
                entry.remote_entry,
                descriptor.name,
                entry.name
            );
        }
        Ok(descriptor)
    }
}
