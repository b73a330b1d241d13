//! Host router: module routes, the navigation menu and the dependencies
//! exposed to route handlers.

use axum::body::Body;
use axum::extract::Extension;
use axum::response::Response;
use axum::routing::MethodRouter;
use axum::Router;
use http::Request;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tower::ServiceExt;

use crate::client_hub::ClientHub;

/// One route a module contributes. Routes with a title also become menu items.
#[derive(Clone)]
pub struct ModuleRoute {
    pub path: String,
    pub title: Option<String>,
    handler: MethodRouter,
}

impl ModuleRoute {
    pub fn new(path: impl Into<String>, handler: MethodRouter) -> Self {
        Self {
            path: path.into(),
            title: None,
            handler,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuItem {
    pub module: String,
    pub path: String,
    pub title: String,
}

/// What route handlers can reach through `Extension<Arc<RouterDependencies>>`.
#[derive(Debug, Clone, Default)]
pub struct RouterDependencies {
    pub menu: Vec<MenuItem>,
    pub hub: Option<Arc<ClientHub>>,
}

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("route '{path}' from module '{module}' is already registered")]
    DuplicatePath { module: String, path: String },
    #[error("route '{path}' from module '{module}' must start with '/'")]
    InvalidPath { module: String, path: String },
    #[error("cannot navigate to '{path}'")]
    Navigate {
        path: String,
        #[source]
        source: http::Error,
    },
}

/// Invoked once during post-router wiring, before dependencies are attached.
pub type RouterCustomizer = Box<dyn FnOnce(&mut HostRouter) -> anyhow::Result<()> + Send + Sync>;

#[derive(Default)]
pub struct HostRouter {
    router: Router,
    paths: HashSet<String>,
    menu: Vec<MenuItem>,
    dependencies: Arc<RouterDependencies>,
}

impl std::fmt::Debug for HostRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut paths: Vec<_> = self.paths.iter().collect();
        paths.sort();
        f.debug_struct("HostRouter")
            .field("paths", &paths)
            .field("menu", &self.menu)
            .finish()
    }
}

impl HostRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `routes` on behalf of `module`.
    ///
    /// All routes are checked before any is added, so a rejected batch
    /// leaves the router untouched.
    pub fn add(&mut self, module: &str, routes: Vec<ModuleRoute>) -> Result<(), RouterError> {
        let mut batch = HashSet::new();
        for route in &routes {
            if !route.path.starts_with('/') {
                return Err(RouterError::InvalidPath {
                    module: module.to_string(),
                    path: route.path.clone(),
                });
            }
            if self.paths.contains(&route.path) || !batch.insert(route.path.as_str()) {
                return Err(RouterError::DuplicatePath {
                    module: module.to_string(),
                    path: route.path.clone(),
                });
            }
        }

        for route in routes {
            tracing::debug!(module, path = %route.path, "Route registered");
            if let Some(title) = &route.title {
                self.menu.push(MenuItem {
                    module: module.to_string(),
                    path: route.path.clone(),
                    title: title.clone(),
                });
            }
            self.paths.insert(route.path.clone());
            self.router = std::mem::take(&mut self.router).route(&route.path, route.handler);
        }
        Ok(())
    }

    /// Apply an arbitrary transformation to the underlying axum router,
    /// e.g. a fallback or middleware layer.
    pub fn map(&mut self, f: impl FnOnce(Router) -> Router) {
        self.router = f(std::mem::take(&mut self.router));
    }

    pub fn has_path(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn menu(&self) -> &[MenuItem] {
        &self.menu
    }

    pub fn set_dependencies(&mut self, dependencies: RouterDependencies) {
        self.dependencies = Arc::new(dependencies);
    }

    pub fn dependencies(&self) -> &RouterDependencies {
        &self.dependencies
    }

    /// Serveable router with the dependencies attached as an extension.
    pub fn to_axum(&self) -> Router {
        self.router
            .clone()
            .layer(Extension(Arc::clone(&self.dependencies)))
    }

    /// Dispatch a GET for `path` through the router without a network hop.
    pub async fn navigate(&self, path: &str) -> Result<Response, RouterError> {
        let request = Request::get(path)
            .body(Body::empty())
            .map_err(|source| RouterError::Navigate {
                path: path.to_string(),
                source,
            })?;
        let response = match self.to_axum().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };
        tracing::trace!(path, status = %response.status(), "Navigated");
        Ok(response)
    }
}
