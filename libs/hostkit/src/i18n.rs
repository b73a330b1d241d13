//! Translation bundles keyed by locale and namespace.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Namespace used when a key carries no `ns:` prefix.
pub const DEFAULT_NAMESPACE: &str = "common";

/// One module-provided bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationBundle {
    pub locale: String,
    pub namespace: String,
    pub bundle: Value,
}

impl TranslationBundle {
    pub fn new(locale: impl Into<String>, namespace: impl Into<String>, bundle: Value) -> Self {
        Self {
            locale: locale.into(),
            namespace: namespace.into(),
            bundle,
        }
    }
}

#[derive(Debug, Error)]
pub enum I18nError {
    #[error("bundle for {locale}/{namespace} must be a JSON object")]
    NotAnObject { locale: String, namespace: String },
}

type Namespaces = BTreeMap<String, Map<String, Value>>;

#[derive(Debug)]
pub struct Translations {
    default_locale: String,
    fallback_locale: String,
    resources: RwLock<BTreeMap<String, Namespaces>>,
}

impl Translations {
    pub fn new(default_locale: impl Into<String>, fallback_locale: impl Into<String>) -> Self {
        Self {
            default_locale: default_locale.into(),
            fallback_locale: fallback_locale.into(),
            resources: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    /// Shallow-merge `bundle` into `locale`/`namespace`; incoming keys win.
    pub fn add_resource_bundle(
        &self,
        locale: &str,
        namespace: &str,
        bundle: Value,
    ) -> Result<(), I18nError> {
        let Value::Object(entries) = bundle else {
            return Err(I18nError::NotAnObject {
                locale: locale.to_string(),
                namespace: namespace.to_string(),
            });
        };
        let count = entries.len();
        let mut resources = self.resources.write();
        resources
            .entry(locale.to_string())
            .or_default()
            .entry(namespace.to_string())
            .or_default()
            .extend(entries);
        tracing::debug!(locale, namespace, keys = count, "Translation bundle added");
        Ok(())
    }

    pub fn add(&self, bundle: TranslationBundle) -> Result<(), I18nError> {
        self.add_resource_bundle(&bundle.locale, &bundle.namespace, bundle.bundle)
    }

    pub fn has_bundle(&self, locale: &str, namespace: &str) -> bool {
        self.resources
            .read()
            .get(locale)
            .is_some_and(|ns| ns.contains_key(namespace))
    }

    pub fn locales(&self) -> Vec<String> {
        self.resources.read().keys().cloned().collect()
    }

    /// Resolve `key` (`ns:dotted.path`, namespace defaulting to `common`)
    /// in `locale`, then the fallback locale. Unresolved keys come back as-is.
    pub fn t(&self, locale: &str, key: &str) -> String {
        let (namespace, path) = key.split_once(':').unwrap_or((DEFAULT_NAMESPACE, key));
        let resources = self.resources.read();

        [locale, self.fallback_locale.as_str()]
            .into_iter()
            .find_map(|loc| {
                let root = resources.get(loc)?.get(namespace)?;
                lookup(root, path)
            })
            .unwrap_or_else(|| key.to_string())
    }
}

fn lookup(root: &Map<String, Value>, path: &str) -> Option<String> {
    // Flat keys containing dots take precedence over nesting.
    if let Some(Value::String(s)) = root.get(path) {
        return Some(s.clone());
    }
    let mut parts = path.split('.');
    let mut node = root.get(parts.next()?)?;
    for part in parts {
        node = node.as_object()?.get(part)?;
    }
    node.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_nested_keys_with_fallback() {
        let i18n = Translations::new("ru", "en");
        i18n.add_resource_bundle("en", "profile", json!({ "title": "Profile", "form": { "save": "Save" } }))
            .unwrap();
        i18n.add_resource_bundle("ru", "profile", json!({ "title": "Профиль" }))
            .unwrap();

        assert_eq!(i18n.t("ru", "profile:title"), "Профиль");
        assert_eq!(i18n.t("ru", "profile:form.save"), "Save");
        assert_eq!(i18n.t("de", "profile:title"), "Profile");
        assert_eq!(i18n.t("ru", "profile:missing"), "profile:missing");
    }

    #[test]
    fn default_namespace_and_flat_dotted_keys() {
        let i18n = Translations::new("en", "en");
        i18n.add_resource_bundle("en", "common", json!({ "app.title": "Host" }))
            .unwrap();
        assert_eq!(i18n.t("en", "app.title"), "Host");
    }

    #[test]
    fn later_bundle_merges_over_earlier() {
        let i18n = Translations::new("en", "en");
        i18n.add_resource_bundle("en", "common", json!({ "a": "1", "b": "1" })).unwrap();
        i18n.add_resource_bundle("en", "common", json!({ "b": "2" })).unwrap();

        assert_eq!(i18n.t("en", "a"), "1");
        assert_eq!(i18n.t("en", "b"), "2");
        assert!(i18n.has_bundle("en", "common"));
        assert_eq!(i18n.locales(), vec!["en"]);
    }

    #[test]
    fn non_object_bundle_is_rejected() {
        let i18n = Translations::new("en", "en");
        assert!(i18n.add_resource_bundle("en", "common", json!(["nope"])).is_err());
    }
}
