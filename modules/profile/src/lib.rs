// === MODULE DEFINITION ===
pub mod module;
pub use module::{ProfileModule, MODULE_NAME};

// === INTERNAL MODULES ===
// Exposed for tests; not a stable surface for other modules.
#[doc(hidden)]
pub mod api;
#[doc(hidden)]
pub mod config;
#[doc(hidden)]
pub mod domain;
#[doc(hidden)]
pub mod mocks;
