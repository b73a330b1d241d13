use serde::de::DeserializeOwned;
use std::sync::Arc;

use super::{execute_with_abort_handling, normalize, AbortRegistry, FetchSink, GuardOutcome, RequestIdTracker};
use crate::transport::{ApiRequest, Transport, TransportError};

/// One data-fetching call site: identity-scoped cancellation plus
/// stale-response rejection in front of a transport.
///
/// The abort registry may be shared between fetchers of one page or
/// component; the request-id tracker never is.
pub struct GuardedFetcher {
    transport: Arc<dyn Transport>,
    aborts: Arc<AbortRegistry>,
    tracker: RequestIdTracker,
}

impl GuardedFetcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_registry(transport, Arc::new(AbortRegistry::new()))
    }

    pub fn with_registry(transport: Arc<dyn Transport>, aborts: Arc<AbortRegistry>) -> Self {
        Self {
            transport,
            aborts,
            tracker: RequestIdTracker::new(),
        }
    }

    pub fn aborts(&self) -> &Arc<AbortRegistry> {
        &self.aborts
    }

    /// Issue `request`, cancelling any in-flight request with the same
    /// normalized identity, and publish the decoded result into `sink`.
    pub async fn fetch<T, S>(&self, request: ApiRequest, sink: &S) -> GuardOutcome
    where
        T: DeserializeOwned,
        S: FetchSink<T, TransportError> + ?Sized,
    {
        let identity = normalize(&request.route, Some(request.method.as_str()));
        let handle = self.aborts.set(identity.clone());
        let cancel = handle.token();
        let transport = Arc::clone(&self.transport);

        let outcome = execute_with_abort_handling(&self.tracker, sink, move |_| async move {
            let value = transport.request_with_cancel(request, cancel).await?;
            serde_json::from_value::<T>(value).map_err(TransportError::Decode)
        })
        .await;

        self.aborts.remove_if_current(&identity, &handle);
        outcome
    }

    /// Teardown: cancel every request started through this fetcher's registry.
    pub fn cancel_all(&self) {
        self.aborts.abort_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockHandler, MockResponse, MockService};
    use crate::request::FetchSlot;
    use crate::transport::MockTransport;
    use serde::Deserialize;
    use serde_json::json;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct Item {
        id: u32,
    }

    fn mock_transport(delay: Option<Duration>) -> Arc<dyn Transport> {
        let mocks = Arc::new(MockService::new());
        mocks.use_handlers([MockHandler::get("/items/1", |req| {
            let id: u32 = req
                .route
                .rsplit('/')
                .next()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default();
            MockResponse::json(json!({ "id": id }))
        })]);
        mocks.start();
        let transport = MockTransport::new(mocks);
        Arc::new(match delay {
            Some(d) => transport.with_latency(d),
            None => transport,
        })
    }

    #[tokio::test]
    async fn successful_fetch_commits_and_clears_registry() {
        let fetcher = GuardedFetcher::new(mock_transport(None));
        let slot: FetchSlot<Item> = FetchSlot::new();

        let outcome = fetcher.fetch(ApiRequest::get("/items/42"), &slot).await;

        assert_eq!(outcome, GuardOutcome::Committed);
        assert_eq!(slot.data(), Some(Item { id: 42 }));
        assert!(fetcher.aborts().is_empty());
    }

    #[tokio::test]
    async fn newer_same_identity_request_cancels_the_older_one() {
        let fetcher = GuardedFetcher::new(mock_transport(Some(Duration::from_millis(50))));
        let slot: FetchSlot<Item> = FetchSlot::new();

        let (older, newer) = tokio::join!(
            fetcher.fetch(ApiRequest::get("/items/1"), &slot),
            fetcher.fetch(ApiRequest::get("/items/2"), &slot),
        );

        assert_eq!(older, GuardOutcome::Stale);
        assert_eq!(newer, GuardOutcome::Committed);
        assert_eq!(slot.data(), Some(Item { id: 2 }));
        assert!(slot.last_error().is_none());
        assert!(fetcher.aborts().is_empty());
    }

    #[tokio::test]
    async fn unknown_route_surfaces_as_error() {
        let fetcher = GuardedFetcher::new(mock_transport(None));
        let slot: FetchSlot<Item> = FetchSlot::new();

        let outcome = fetcher.fetch(ApiRequest::get("/nothing/here"), &slot).await;

        assert_eq!(outcome, GuardOutcome::Failed);
        assert!(slot.data().is_none());
        assert!(slot.last_error().is_some());
    }
}
