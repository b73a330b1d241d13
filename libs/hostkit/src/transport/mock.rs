use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{ApiRequest, ErrorHook, Transport, TransportError, TransportHooks};
use crate::mock::{MockRequest, MockService};
use crate::request::normalize;

/// `Transport` answered by the development mock service instead of the network.
pub struct MockTransport {
    service: Arc<MockService>,
    latency: Option<Duration>,
    hooks: TransportHooks,
}

impl MockTransport {
    pub fn new(service: Arc<MockService>) -> Self {
        Self {
            service,
            latency: None,
            hooks: TransportHooks::default(),
        }
    }

    /// Delay every answer, to exercise in-flight cancellation.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn answer(&self, req: &ApiRequest) -> Result<Value, TransportError> {
        if !self.service.is_started() {
            return Err(TransportError::MockNotStarted);
        }
        let mock_req = MockRequest {
            method: req.method.clone(),
            route: req.route.clone(),
            payload: req.payload.clone(),
        };
        let Some(resp) = self.service.respond(&mock_req) else {
            return Err(TransportError::NoMock {
                key: normalize(&req.route, Some(req.method.as_str())),
            });
        };
        if !resp.status.is_success() {
            return Err(TransportError::Status {
                method: req.method.clone(),
                route: req.route.clone(),
                status: resp.status.as_u16(),
                body: resp.body.to_string(),
            });
        }
        req.validate(&resp.body)?;
        Ok(resp.body)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request_with_cancel(
        &self,
        req: ApiRequest,
        cancel: CancellationToken,
    ) -> Result<Value, TransportError> {
        let result = match self.latency {
            Some(latency) => tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(TransportError::cancelled(&req)),
                _ = tokio::time::sleep(latency) => self.answer(&req),
            },
            None if cancel.is_cancelled() => Err(TransportError::cancelled(&req)),
            None => self.answer(&req),
        };
        self.hooks.observe(&req, result)
    }

    fn set_client_hash(&self, hash: &str) {
        self.hooks.set_client_hash(hash);
    }

    fn client_hash(&self) -> Option<Arc<String>> {
        self.hooks.client_hash()
    }

    fn set_error_hook(&self, hook: ErrorHook) {
        self.hooks.set_error_hook(hook);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockHandler, MockResponse};
    use http::StatusCode;
    use serde_json::json;

    fn started(handlers: Vec<MockHandler>) -> Arc<MockService> {
        let service = Arc::new(MockService::new());
        service.use_handlers(handlers);
        service.start();
        service
    }

    #[tokio::test]
    async fn requests_before_start_are_refused() {
        let service = Arc::new(MockService::new());
        service.use_handlers([MockHandler::get("/ping", |_| MockResponse::json(json!("pong")))]);
        let transport = MockTransport::new(service.clone());

        let err = transport.request(ApiRequest::get("/ping")).await.unwrap_err();
        assert!(matches!(err, TransportError::MockNotStarted));

        service.start();
        assert_eq!(transport.request(ApiRequest::get("/ping")).await.unwrap(), json!("pong"));
    }

    #[tokio::test]
    async fn mocked_error_status_becomes_status_error() {
        let transport = MockTransport::new(started(vec![MockHandler::get("/secret", |_| {
            MockResponse::with_status(StatusCode::FORBIDDEN, json!({ "error": "forbidden" }))
        })]));

        let err = transport.request(ApiRequest::get("/secret")).await.unwrap_err();
        assert_eq!(err.status(), Some(403));
    }

    #[tokio::test]
    async fn unknown_identity_reports_its_key() {
        let transport = MockTransport::new(started(vec![]));
        match transport.request(ApiRequest::get("/users/7")).await.unwrap_err() {
            TransportError::NoMock { key } => assert_eq!(key, "GET:/users/number"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancellation_wins_over_latency() {
        let transport = MockTransport::new(started(vec![MockHandler::get("/slow", |_| {
            MockResponse::json(json!({}))
        })]))
        .with_latency(Duration::from_secs(5));

        let cancel = CancellationToken::new();
        let pending = transport.request_with_cancel(ApiRequest::get("/slow"), cancel.clone());
        cancel.cancel();

        assert!(pending.await.unwrap_err().is_cancelled());
    }
}
