use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use url::Url;

use super::{AppManifest, ManifestData, ModuleManifestEntry, UserEntitlements};

/// Backend start payload. Unknown envelope fields are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<StartData>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartData {
    #[serde(default)]
    pub features: BTreeMap<String, bool>,
    #[serde(default)]
    pub permissions: BTreeMap<String, bool>,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default)]
    pub modules: Vec<ModuleManifestEntry>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl StartData {
    /// View the enriched payload as a manifest for activation planning.
    pub fn to_manifest(&self, user: Option<UserEntitlements>) -> AppManifest {
        AppManifest {
            modules: self.modules.clone(),
            user,
            data: Some(ManifestData {
                features: self.features.clone(),
                permissions: self.permissions.clone(),
                params: self.params.clone(),
            }),
        }
    }
}

/// Merge the locally declared manifest into the backend start payload.
///
/// Manifest values overwrite same-key server values for features,
/// permissions and params; server-only keys survive. Modules merge by
/// `name`: server entries first, manifest entries second and winning on
/// collision. Relative `remoteEntry` values are made absolute against
/// `remote_base` when one is given.
pub fn enrich_manifest_response(
    mut response: StartResponse,
    manifest: &AppManifest,
    remote_base: Option<&Url>,
) -> StartResponse {
    let Some(data) = response.data.as_mut() else {
        return response;
    };

    if let Some(local) = &manifest.data {
        data.features
            .extend(local.features.iter().map(|(k, v)| (k.clone(), *v)));
        data.permissions
            .extend(local.permissions.iter().map(|(k, v)| (k.clone(), *v)));
        for (k, v) in &local.params {
            data.params.insert(k.clone(), v.clone());
        }
    }

    let server_modules = std::mem::take(&mut data.modules);
    let mut merged = merge_modules(server_modules, manifest.modules.iter().cloned());

    if let Some(base) = remote_base {
        for module in &mut merged {
            absolutize_remote_entry(module, base);
        }
    }

    tracing::debug!(
        modules = merged.len(),
        features = data.features.len(),
        permissions = data.permissions.len(),
        "Enriched start payload with local manifest"
    );
    data.modules = merged;
    response
}

/// Insertion-ordered merge keyed by name; later inserts replace in place.
fn merge_modules(
    server: Vec<ModuleManifestEntry>,
    local: impl Iterator<Item = ModuleManifestEntry>,
) -> Vec<ModuleManifestEntry> {
    let mut out: Vec<ModuleManifestEntry> = Vec::with_capacity(server.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    for mut module in server.into_iter().chain(local) {
        module.dedup_lists();
        match index.get(&module.name) {
            Some(&pos) => out[pos] = module,
            None => {
                index.insert(module.name.clone(), out.len());
                out.push(module);
            }
        }
    }
    out
}

fn absolutize_remote_entry(module: &mut ModuleManifestEntry, base: &Url) {
    if module.remote_entry.is_empty() || Url::parse(&module.remote_entry).is_ok() {
        return;
    }
    match base.join(&module.remote_entry) {
        Ok(url) => module.remote_entry = url.to_string(),
        Err(e) => tracing::warn!(
            module = %module.name,
            remote_entry = %module.remote_entry,
            error = %e,
            "Leaving malformed remoteEntry untouched"
        ),
    }
}
