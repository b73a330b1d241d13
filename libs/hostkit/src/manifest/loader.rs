use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{AppManifest, ManifestError, ModuleManifestEntry};

pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Host shell modules emitted into every synthesized manifest, with their priorities.
pub const INIT_MODULES: &[(&str, i32)] = &[("host_core", 0), ("host_layout", 2)];

/// A directory under the module source tree counts as a module when it holds this file.
const MODULE_MARKER: &str = "Cargo.toml";

/// Resolves the manifest from the deployment directory, or synthesizes one
/// from the module source tree.
#[derive(Debug, Clone)]
pub struct ManifestLoader {
    manifest_dir: PathBuf,
    modules_dir: PathBuf,
    allow_fallback: bool,
}

impl ManifestLoader {
    pub fn new(manifest_dir: impl Into<PathBuf>, modules_dir: impl Into<PathBuf>) -> Self {
        Self {
            manifest_dir: manifest_dir.into(),
            modules_dir: modules_dir.into(),
            allow_fallback: true,
        }
    }

    pub fn allow_fallback(mut self, allow: bool) -> Self {
        self.allow_fallback = allow;
        self
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.manifest_dir.join(MANIFEST_FILE_NAME)
    }

    /// Deployed manifest if readable; otherwise a synthesized one when
    /// fallback is allowed; otherwise `None`.
    ///
    /// A missing or malformed artifact is never an error here. Only a module
    /// tree that exists but cannot be listed is.
    pub fn load(&self) -> Result<Option<AppManifest>, ManifestError> {
        let path = self.manifest_path();
        if let Some(manifest) = read_manifest(&path) {
            tracing::info!(
                path = %path.display(),
                modules = manifest.modules.len(),
                "Loaded deployment manifest"
            );
            return Ok(Some(manifest));
        }

        if !self.allow_fallback {
            tracing::info!(path = %path.display(), "No manifest found and fallback is disabled");
            return Ok(None);
        }

        let manifest = self.synthesize()?;
        tracing::info!(
            modules_dir = %self.modules_dir.display(),
            modules = manifest.modules.len(),
            "Synthesized fallback manifest"
        );
        Ok(Some(manifest))
    }

    /// INIT modules first, then one local NORMAL entry per discovered module.
    pub fn synthesize(&self) -> Result<AppManifest, ManifestError> {
        let mut modules: Vec<ModuleManifestEntry> = INIT_MODULES
            .iter()
            .map(|(name, priority)| ModuleManifestEntry::init(*name, *priority))
            .collect();

        for name in scan_module_tree(&self.modules_dir)? {
            modules.push(ModuleManifestEntry::local(name));
        }

        Ok(AppManifest::new(modules))
    }
}

fn read_manifest(path: &Path) -> Option<AppManifest> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "Manifest artifact not present");
            return None;
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Manifest artifact unreadable");
            return None;
        }
    };

    match serde_json::from_str::<AppManifest>(&raw) {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Manifest artifact is malformed; treating as not found"
            );
            None
        }
    }
}

/// Sorted names of module directories, INIT identities excluded.
fn scan_module_tree(dir: &Path) -> Result<Vec<String>, ManifestError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %dir.display(), "Module source tree does not exist");
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(ManifestError::Scan {
                path: dir.display().to_string(),
                source,
            })
        }
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ManifestError::Scan {
            path: dir.display().to_string(),
            source,
        })?;
        let path = entry.path();
        if !path.is_dir() || !path.join(MODULE_MARKER).is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        if name.starts_with('.') || INIT_MODULES.iter().any(|(init, _)| *init == name) {
            continue;
        }
        names.push(name.to_string());
    }
    names.sort();
    Ok(names)
}
