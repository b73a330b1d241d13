use crate::config::AppConfig;
use std::collections::HashMap;

/// Source of per-module configuration sections.
pub trait ConfigProvider: Send + Sync {
    /// Raw section for `module_name`, if one is configured.
    fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value>;

    /// Global section by key (`server`, `platform`, `logging`).
    fn get_config_raw(&self, _key: &str) -> Option<serde_json::Value> {
        None
    }
}

impl ConfigProvider for AppConfig {
    fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value> {
        self.modules.get(module_name)
    }

    fn get_config_raw(&self, key: &str) -> Option<serde_json::Value> {
        match key {
            "server" => serde_json::to_value(&self.server).ok(),
            "platform" => serde_json::to_value(&self.platform).ok(),
            "logging" => self
                .logging
                .as_ref()
                .and_then(|v| serde_json::to_value(v).ok()),
            _ => None,
        }
    }
}

/// Fixed module sections, used where no config file is involved.
#[derive(Debug, Default, Clone)]
pub struct StaticConfigProvider {
    sections: HashMap<String, serde_json::Value>,
}

impl StaticConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, name: impl Into<String>, section: serde_json::Value) -> Self {
        self.sections.insert(name.into(), section);
        self
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value> {
        self.sections.get(module_name)
    }
}
