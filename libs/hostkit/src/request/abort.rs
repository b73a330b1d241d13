use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

/// Cancellation handle for one in-flight request.
///
/// Clones share the same token. Two handles compare equal only when they
/// came from the same `set` call.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    token: CancellationToken,
    generation: u64,
}

impl AbortHandle {
    fn new(generation: u64) -> Self {
        Self {
            token: CancellationToken::new(),
            generation,
        }
    }

    pub fn abort(&self) {
        self.token.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token to hand to a transport call.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub async fn aborted(&self) {
        self.token.cancelled().await;
    }
}

impl PartialEq for AbortHandle {
    fn eq(&self, other: &Self) -> bool {
        self.generation == other.generation
    }
}

impl Eq for AbortHandle {}

/// In-flight cancellation handles keyed by normalized request identity.
///
/// Holds at most one live handle per identity: `set` aborts whatever was
/// stored before installing the new handle.
#[derive(Debug, Default)]
pub struct AbortRegistry {
    entries: DashMap<String, AbortHandle>,
    generation: AtomicU64,
}

impl AbortRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort the previous handle for `id` (if any) and return a fresh one.
    pub fn set(&self, id: impl Into<String>) -> AbortHandle {
        let handle = AbortHandle::new(self.generation.fetch_add(1, Ordering::Relaxed));

        match self.entries.entry(id.into()) {
            Entry::Occupied(mut slot) => {
                let previous = slot.get();
                if !previous.is_aborted() {
                    tracing::debug!(request = %slot.key(), "Superseding in-flight request");
                    previous.abort();
                }
                slot.insert(handle.clone());
            }
            Entry::Vacant(slot) => {
                slot.insert(handle.clone());
            }
        }
        handle
    }

    pub fn get(&self, id: &str) -> Option<AbortHandle> {
        self.entries.get(id).map(|h| h.value().clone())
    }

    pub fn has(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Drop the entry without aborting it.
    pub fn remove(&self, id: &str) -> Option<AbortHandle> {
        self.entries.remove(id).map(|(_, h)| h)
    }

    /// Drop the entry only if it still holds `handle`, i.e. no newer request
    /// with the same identity has started since.
    pub fn remove_if_current(&self, id: &str, handle: &AbortHandle) -> bool {
        self.entries.remove_if(id, |_, h| h == handle).is_some()
    }

    /// Abort and remove. Returns whether an entry existed.
    pub fn abort(&self, id: &str) -> bool {
        match self.entries.remove(id) {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Abort and clear every entry.
    pub fn abort_all(&self) {
        let mut aborted = 0usize;
        self.entries.retain(|_, handle| {
            handle.abort();
            aborted += 1;
            false
        });
        if aborted > 0 {
            tracing::debug!(count = aborted, "Aborted all in-flight requests");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_set_aborts_the_first_handle() {
        let registry = AbortRegistry::new();

        let first = registry.set("A");
        let second = registry.set("A");

        assert!(first.is_aborted());
        assert!(!second.is_aborted());
        assert_eq!(registry.get("A"), Some(second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn identities_do_not_interfere() {
        let registry = AbortRegistry::new();
        let a = registry.set("GET:/items/number");
        let b = registry.set("GET:/users/uuid");

        assert!(!a.is_aborted());
        assert!(!b.is_aborted());
        assert!(registry.has("GET:/items/number"));
        assert!(registry.has("GET:/users/uuid"));
    }

    #[test]
    fn remove_does_not_abort_but_abort_does() {
        let registry = AbortRegistry::new();
        let kept = registry.set("A");
        let killed = registry.set("B");

        assert_eq!(registry.remove("A"), Some(kept.clone()));
        assert!(!kept.is_aborted());

        assert!(registry.abort("B"));
        assert!(killed.is_aborted());
        assert!(!registry.has("B"));
        assert!(!registry.abort("B"));
    }

    #[test]
    fn remove_if_current_ignores_superseded_handles() {
        let registry = AbortRegistry::new();
        let stale = registry.set("A");
        let live = registry.set("A");

        assert!(!registry.remove_if_current("A", &stale));
        assert!(registry.has("A"));
        assert!(registry.remove_if_current("A", &live));
        assert!(registry.is_empty());
    }

    #[test]
    fn abort_all_clears_everything() {
        let registry = AbortRegistry::new();
        let handles: Vec<_> = ["A", "B", "C"].iter().map(|id| registry.set(*id)).collect();

        registry.abort_all();

        assert!(registry.is_empty());
        assert!(handles.iter().all(AbortHandle::is_aborted));
    }

    #[tokio::test]
    async fn aborted_future_resolves_on_supersede() {
        let registry = AbortRegistry::new();
        let first = registry.set("A");
        let waiter = tokio::spawn({
            let first = first.clone();
            async move { first.aborted().await }
        });

        registry.set("A");
        waiter.await.unwrap();
        assert!(first.is_aborted());
    }
}
