//! Host shell module: application identity, the landing route and the
//! health probe. Loaded as an INIT module before anything else.

// === MODULE DEFINITION ===
pub mod module;
pub use module::{AppInfo, HostCoreModule, MODULE_NAME};

#[doc(hidden)]
pub mod config;
