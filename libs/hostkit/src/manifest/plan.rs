use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;

use super::{AppManifest, LoadType, ManifestError, ModuleManifestEntry};

/// Why a declared module is left out of activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    FeatureDisabled(String),
    PermissionMissing(String),
    DependencySkipped(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::FeatureDisabled(k) => write!(f, "feature flag '{k}' is disabled"),
            SkipReason::PermissionMissing(k) => write!(f, "permission '{k}' is not granted"),
            SkipReason::DependencySkipped(d) => write!(f, "dependency '{d}' is not activated"),
        }
    }
}

/// The gated, ordered list of modules the activation loop walks.
#[derive(Debug, Clone, Default)]
pub struct ActivationPlan {
    modules: Vec<ModuleManifestEntry>,
    skipped: Vec<(String, SkipReason)>,
}

impl ActivationPlan {
    /// Gate modules by entitlements, then order them.
    ///
    /// INIT modules always load and come first. Within each load type the
    /// lowest `loadPriority` goes first, ties broken by manifest order, and
    /// no module precedes one of its dependencies.
    pub fn build(manifest: &AppManifest) -> Result<Self, ManifestError> {
        manifest.validate_unique_names()?;

        let modules = &manifest.modules;
        let idx: HashMap<&str, usize> = modules
            .iter()
            .enumerate()
            .map(|(i, m)| (m.name.as_str(), i))
            .collect();

        // edge d -> n (dependency before module)
        let mut adj = vec![Vec::<usize>::new(); modules.len()];
        for (n, m) in modules.iter().enumerate() {
            for dep in &m.dependencies {
                let d = *idx
                    .get(dep.as_str())
                    .ok_or_else(|| ManifestError::UnknownDependency {
                        module: m.name.clone(),
                        depends_on: dep.clone(),
                    })?;
                // INIT modules are never gated, so neither may their dependencies be.
                if m.load_type == LoadType::Init && modules[d].load_type != LoadType::Init {
                    return Err(ManifestError::InitDependsOnNormal {
                        module: m.name.clone(),
                        depends_on: dep.clone(),
                    });
                }
                adj[d].push(n);
            }
        }

        if let Some(path) = detect_cycle(modules, &adj) {
            return Err(ManifestError::CycleDetected { path });
        }

        let mut skipped: Vec<Option<SkipReason>> =
            modules.iter().map(|m| gate(manifest, m)).collect();

        // A skipped dependency takes its dependents down with it.
        let mut changed = true;
        while changed {
            changed = false;
            for (n, m) in modules.iter().enumerate() {
                if skipped[n].is_some() {
                    continue;
                }
                if let Some(dep) = m
                    .dependencies
                    .iter()
                    .find(|d| skipped[idx[d.as_str()]].is_some())
                {
                    skipped[n] = Some(SkipReason::DependencySkipped(dep.clone()));
                    changed = true;
                }
            }
        }

        // Kahn over the activated subgraph, smallest (class, priority, index) first.
        let mut indeg = vec![0usize; modules.len()];
        for (u, targets) in adj.iter().enumerate() {
            if skipped[u].is_some() {
                continue;
            }
            for &w in targets {
                indeg[w] += 1;
            }
        }

        let key = |i: usize| {
            let m = &modules[i];
            Reverse((m.load_type == LoadType::Normal, m.priority(), i))
        };
        let mut ready: BinaryHeap<_> = (0..modules.len())
            .filter(|&i| skipped[i].is_none() && indeg[i] == 0)
            .map(key)
            .collect();

        let mut ordered = Vec::new();
        while let Some(Reverse((_, _, u))) = ready.pop() {
            ordered.push(modules[u].clone());
            for &w in &adj[u] {
                if skipped[w].is_some() {
                    continue;
                }
                indeg[w] -= 1;
                if indeg[w] == 0 {
                    ready.push(key(w));
                }
            }
        }

        let skipped: Vec<(String, SkipReason)> = modules
            .iter()
            .zip(skipped)
            .filter_map(|(m, reason)| reason.map(|r| (m.name.clone(), r)))
            .collect();
        for (name, reason) in &skipped {
            tracing::warn!(module = %name, reason = %reason, "Module gated out of activation");
        }
        tracing::info!(
            modules = ?ordered.iter().map(|m| m.name.as_str()).collect::<Vec<_>>(),
            "Module activation order resolved"
        );

        Ok(Self {
            modules: ordered,
            skipped,
        })
    }

    pub fn modules(&self) -> &[ModuleManifestEntry] {
        &self.modules
    }

    pub fn names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn skipped(&self) -> &[(String, SkipReason)] {
        &self.skipped
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

fn gate(manifest: &AppManifest, m: &ModuleManifestEntry) -> Option<SkipReason> {
    if m.load_type == LoadType::Init {
        return None;
    }
    if let Some(flag) = m.feature_flags.iter().find(|f| !manifest.feature_enabled(f)) {
        return Some(SkipReason::FeatureDisabled(flag.clone()));
    }
    m.access_permissions
        .iter()
        .find(|p| !manifest.permission_granted(p))
        .map(|p| SkipReason::PermissionMissing(p.clone()))
}

/// DFS with path tracking; returns the closed cycle path if one exists.
fn detect_cycle(modules: &[ModuleManifestEntry], adj: &[Vec<usize>]) -> Option<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Gray,
        Black,
    }

    fn dfs(
        node: usize,
        adj: &[Vec<usize>],
        colors: &mut [Color],
        path: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        colors[node] = Color::Gray;
        path.push(node);
        for &next in &adj[node] {
            match colors[next] {
                Color::Gray => {
                    let start = path.iter().position(|&n| n == next)?;
                    let mut cycle = path[start..].to_vec();
                    cycle.push(next);
                    return Some(cycle);
                }
                Color::White => {
                    if let Some(cycle) = dfs(next, adj, colors, path) {
                        return Some(cycle);
                    }
                }
                Color::Black => {}
            }
        }
        path.pop();
        colors[node] = Color::Black;
        None
    }

    let mut colors = vec![Color::White; modules.len()];
    let mut path = Vec::new();
    for i in 0..modules.len() {
        if colors[i] == Color::White {
            if let Some(cycle) = dfs(i, adj, &mut colors, &mut path) {
                return Some(cycle.into_iter().map(|i| modules[i].name.clone()).collect());
            }
        }
    }
    None
}
