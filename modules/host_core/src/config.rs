use serde::{Deserialize, Serialize};

/// Configuration for the host_core module
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostCoreConfig {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default)]
    pub support_email: Option<String>,
}

impl Default for HostCoreConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            support_email: None,
        }
    }
}

fn default_app_name() -> String {
    "HostKit".to_string()
}
