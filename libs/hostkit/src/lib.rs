//! # HostKit - micro-frontend module host kernel
//!
//! Resolves which modules an application activates, wires them up through
//! a fixed bootstrap chain, and keeps post-bootstrap data fetching safe
//! against out-of-order and superseded responses.
//!
//! ## Declaring a module
//!
//! ```rust,ignore
//! use hostkit::{async_trait, CatalogBuilder, Module, ModuleCtx, Registrator};
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! pub struct Billing;
//!
//! #[async_trait]
//! impl Module for Billing {
//!     async fn init(&self, ctx: &ModuleCtx) -> anyhow::Result<()> {
//!         tracing::info!(module = ctx.module_name(), "billing ready");
//!         Ok(())
//!     }
//! }
//!
//! fn register(b: &mut CatalogBuilder) {
//!     b.register_core("billing", Arc::new(Billing));
//! }
//!
//! hostkit::inventory::submit! { Registrator(register) }
//! ```
//!
//! ## Lifecycle
//!
//! manifest → start payload enrichment → activation plan →
//! `APIClient → ClientHash → Router → I18n → Modules → MockService → DI →
//! RouterPost → HTTPError` → serve.

pub use anyhow::Result;
pub use async_trait::async_trait;

// Re-export inventory for module crates
pub use inventory;

pub mod bootstrap;
pub mod client_hub;
pub mod context;
pub mod contracts;
pub mod http_errors;
pub mod i18n;
pub mod manifest;
pub mod mock;
pub mod registry;
pub mod remote;
pub mod request;
pub mod router;
pub mod runtime;
pub mod transport;

pub use bootstrap::{
    activate_modules, ActivationError, BootstrapChain, BootstrapContext, BootstrapError, StageKind,
};
pub use client_hub::{ClientHub, ClientHubError};
pub use context::{ConfigError, ModuleCtx};
pub use contracts::*;
pub use hostkit_bootstrap::{ConfigProvider, Environment};
pub use i18n::{TranslationBundle, Translations};
pub use manifest::{ActivationPlan, AppManifest, LoadType, ModuleManifestEntry};
pub use mock::{MockHandler, MockResponse, MockService};
pub use registry::{CatalogBuilder, CatalogEntry, ModuleCatalog, Registrator};
pub use request::{FetchSink, FetchSlot, GuardOutcome, GuardedFetcher};
pub use router::{HostRouter, ModuleRoute, RouterDependencies};
pub use runtime::{run, RunOptions, ShutdownOptions};
pub use transport::{ApiRequest, Transport, TransportError};
