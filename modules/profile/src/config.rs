use serde::{Deserialize, Serialize};

/// Configuration for the profile module
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    /// Backend collection the profile view reads from.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    /// Profile shown at `/profile`.
    #[serde(default = "default_current_user_id")]
    pub current_user_id: u64,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            api_prefix: default_api_prefix(),
            current_user_id: default_current_user_id(),
        }
    }
}

fn default_api_prefix() -> String {
    "/api/profile".to_string()
}

fn default_current_user_id() -> u64 {
    1
}
