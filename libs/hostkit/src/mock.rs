//! Development-only mock API, keyed by normalized request identity.

use dashmap::DashMap;
use http::{Method, StatusCode};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::request::normalize;

#[derive(Debug, Clone)]
pub struct MockRequest {
    pub method: Method,
    pub route: String,
    pub payload: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl MockResponse {
    pub fn json(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    pub fn with_status(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }
}

type Responder = Arc<dyn Fn(&MockRequest) -> MockResponse + Send + Sync>;

/// A canned response for every request that normalizes to `key`.
///
/// Declare it with any concrete sample route: `/api/profile/1` also
/// answers `/api/profile/42`.
#[derive(Clone)]
pub struct MockHandler {
    key: String,
    respond: Responder,
}

impl fmt::Debug for MockHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockHandler").field("key", &self.key).finish()
    }
}

impl MockHandler {
    pub fn new<F>(method: Method, route: &str, respond: F) -> Self
    where
        F: Fn(&MockRequest) -> MockResponse + Send + Sync + 'static,
    {
        Self {
            key: normalize(route, Some(method.as_str())),
            respond: Arc::new(respond),
        }
    }

    pub fn get<F>(route: &str, respond: F) -> Self
    where
        F: Fn(&MockRequest) -> MockResponse + Send + Sync + 'static,
    {
        Self::new(Method::GET, route, respond)
    }

    pub fn post<F>(route: &str, respond: F) -> Self
    where
        F: Fn(&MockRequest) -> MockResponse + Send + Sync + 'static,
    {
        Self::new(Method::POST, route, respond)
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Mock-serving collaborator. Handlers may be added before `start`; requests
/// are only answered after it.
#[derive(Debug, Default)]
pub struct MockService {
    handlers: DashMap<String, MockHandler>,
    started: AtomicBool,
}

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register handlers; a later handler for the same key replaces the earlier one.
    pub fn use_handlers<I>(&self, handlers: I)
    where
        I: IntoIterator<Item = MockHandler>,
    {
        for handler in handlers {
            if self.handlers.insert(handler.key.clone(), handler).is_some() {
                tracing::debug!("Mock handler overridden");
            }
        }
    }

    pub fn start(&self) {
        if !self.started.swap(true, Ordering::SeqCst) {
            tracing::info!(handlers = self.handlers.len(), "Mock service started");
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Registered identities, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.handlers.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Answer `req` with the handler for its normalized identity.
    pub fn respond(&self, req: &MockRequest) -> Option<MockResponse> {
        let key = normalize(&req.route, Some(req.method.as_str()));
        let respond = self.handlers.get(&key).map(|h| Arc::clone(&h.respond))?;
        Some(respond(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(method: Method, route: &str) -> MockRequest {
        MockRequest {
            method,
            route: route.to_string(),
            payload: None,
        }
    }

    #[test]
    fn sample_route_answers_every_concrete_id() {
        let service = MockService::new();
        service.use_handlers([MockHandler::get("/api/orders/1", |req| {
            MockResponse::json(json!({ "route": req.route }))
        })]);

        let resp = service.respond(&request(Method::GET, "/api/orders/99?expand=1")).unwrap();
        assert_eq!(resp.body, json!({ "route": "/api/orders/99?expand=1" }));
        assert!(service.respond(&request(Method::POST, "/api/orders/99")).is_none());
    }

    #[test]
    fn later_registration_wins() {
        let service = MockService::new();
        service.use_handlers([MockHandler::get("/ping", |_| MockResponse::json(json!(1)))]);
        service.use_handlers([MockHandler::get("/ping", |_| MockResponse::json(json!(2)))]);

        assert_eq!(service.keys(), vec!["GET:/ping"]);
        assert_eq!(service.respond(&request(Method::GET, "/ping")).unwrap().body, json!(2));
    }

    #[test]
    fn start_is_idempotent() {
        let service = MockService::new();
        assert!(!service.is_started());
        service.start();
        service.start();
        assert!(service.is_started());
    }
}
