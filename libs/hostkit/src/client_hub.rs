//! Type-keyed dependency container shared by the host and its modules.
//!
//! Bind trait objects as `hub.bind::<dyn Transport>(arc)` and resolve them
//! with `hub.get::<dyn Transport>()`.

use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientHubError {
    #[error("no client bound for {type_name}")]
    NotBound { type_name: &'static str },
    #[error("client bound for {type_name} has an unexpected type")]
    TypeMismatch { type_name: &'static str },
}

struct Binding {
    type_name: &'static str,
    // Always an `Arc<T>` for the `T` this binding is keyed by.
    value: Box<dyn Any + Send + Sync>,
}

#[derive(Default)]
pub struct ClientHub {
    bindings: RwLock<HashMap<TypeId, Binding>>,
}

impl std::fmt::Debug for ClientHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHub")
            .field("bound", &self.bound_types())
            .finish()
    }
}

impl ClientHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `client` as the singleton for `T`, replacing any previous binding.
    pub fn bind<T>(&self, client: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let type_name = std::any::type_name::<T>();
        let previous = self.bindings.write().insert(
            TypeId::of::<T>(),
            Binding {
                type_name,
                value: Box::new(client),
            },
        );
        if previous.is_some() {
            tracing::debug!(client = type_name, "Client rebound");
        } else {
            tracing::debug!(client = type_name, "Client bound");
        }
    }

    pub fn get<T>(&self) -> Result<Arc<T>, ClientHubError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let type_name = std::any::type_name::<T>();
        let bindings = self.bindings.read();
        let binding = bindings
            .get(&TypeId::of::<T>())
            .ok_or(ClientHubError::NotBound { type_name })?;
        binding
            .value
            .downcast_ref::<Arc<T>>()
            .cloned()
            .ok_or(ClientHubError::TypeMismatch { type_name })
    }

    pub fn is_bound<T>(&self) -> bool
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.bindings.read().contains_key(&TypeId::of::<T>())
    }

    /// Names of bound types, sorted.
    pub fn bound_types(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.bindings.read().values().map(|b| b.type_name).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;
    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".into()
        }
    }

    #[test]
    fn binds_and_resolves_trait_objects() {
        let hub = ClientHub::new();
        assert!(!hub.is_bound::<dyn Greeter>());

        hub.bind::<dyn Greeter>(Arc::new(English));

        assert!(hub.is_bound::<dyn Greeter>());
        assert_eq!(hub.get::<dyn Greeter>().unwrap().greet(), "hello");
    }

    #[test]
    fn concrete_and_trait_bindings_are_distinct() {
        let hub = ClientHub::new();
        hub.bind(Arc::new(42u32));

        assert_eq!(*hub.get::<u32>().unwrap(), 42);
        assert!(matches!(
            hub.get::<dyn Greeter>(),
            Err(ClientHubError::NotBound { .. })
        ));
    }

    #[test]
    fn rebinding_replaces_the_singleton() {
        let hub = ClientHub::new();
        hub.bind(Arc::new(String::from("a")));
        hub.bind(Arc::new(String::from("b")));

        assert_eq!(hub.get::<String>().unwrap().as_str(), "b");
        assert_eq!(hub.bound_types().len(), 1);
    }
}
