//! Layout shell: navigation menu and branding, served from the router
//! dependencies attached after activation.

pub mod module;
pub use module::{HostLayoutModule, LayoutSettings, MODULE_NAME};
