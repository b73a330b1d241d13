//! Narrow transport capability the kernel issues API calls through.

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use http::Method;
use parking_lot::RwLock;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

mod http_client;
mod mock;

pub use http_client::HttpTransport;
pub use mock::MockTransport;

/// Header carrying the client build stamp on every outbound call.
pub const CLIENT_HASH_HEADER: &str = "x-client-hash";

/// Response check run after a successful call.
pub type Validator = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// Called for every failed request except cancellations.
pub type ErrorHook = Arc<dyn Fn(&ApiRequest, &TransportError) + Send + Sync>;

#[derive(Clone)]
pub struct ApiRequest {
    /// Path relative to the transport's base, e.g. `/api/profile/7`.
    pub route: String,
    pub method: Method,
    pub payload: Option<Value>,
    pub validator: Option<Validator>,
}

impl fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiRequest")
            .field("route", &self.route)
            .field("method", &self.method)
            .field("has_payload", &self.payload.is_some())
            .field("has_validator", &self.validator.is_some())
            .finish()
    }
}

impl ApiRequest {
    pub fn new(method: Method, route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            method,
            payload: None,
            validator: None,
        }
    }

    pub fn get(route: impl Into<String>) -> Self {
        Self::new(Method::GET, route)
    }

    pub fn post(route: impl Into<String>, payload: Value) -> Self {
        Self::new(Method::POST, route).with_payload(payload)
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Apply the validator, if any, to a response body.
    pub fn validate(&self, body: &Value) -> Result<(), TransportError> {
        match &self.validator {
            Some(check) => check(body).map_err(|message| TransportError::Validation {
                route: self.route.clone(),
                message,
            }),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{method} {route} was cancelled")]
    Cancelled { method: Method, route: String },
    #[error("{method} {route} returned {status}")]
    Status {
        method: Method,
        route: String,
        status: u16,
        body: String,
    },
    #[error("{method} {route} failed")]
    Network {
        method: Method,
        route: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("invalid route '{route}'")]
    InvalidRoute {
        route: String,
        #[source]
        source: url::ParseError,
    },
    #[error("response for {route} failed validation: {message}")]
    Validation { route: String, message: String },
    #[error("failed to decode response body")]
    Decode(#[source] serde_json::Error),
    #[error("no mock handler for {key}")]
    NoMock { key: String },
    #[error("mock service has not been started")]
    MockNotStarted,
    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),
}

impl TransportError {
    pub(crate) fn cancelled(req: &ApiRequest) -> Self {
        Self::Cancelled {
            method: req.method.clone(),
            route: req.route.clone(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::NoMock { .. } => Some(404),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, req: ApiRequest) -> Result<Value, TransportError> {
        self.request_with_cancel(req, CancellationToken::new()).await
    }

    /// Same as `request`, abandoned with `TransportError::Cancelled` once
    /// `cancel` fires.
    async fn request_with_cancel(
        &self,
        req: ApiRequest,
        cancel: CancellationToken,
    ) -> Result<Value, TransportError>;

    fn set_client_hash(&self, hash: &str);

    fn client_hash(&self) -> Option<Arc<String>>;

    fn set_error_hook(&self, hook: ErrorHook);
}

/// Client hash and error hook state shared by the transport implementations.
#[derive(Default)]
pub(crate) struct TransportHooks {
    client_hash: ArcSwapOption<String>,
    error_hook: RwLock<Option<ErrorHook>>,
}

impl TransportHooks {
    pub(crate) fn set_client_hash(&self, hash: &str) {
        self.client_hash.store(Some(Arc::new(hash.to_string())));
    }

    pub(crate) fn client_hash(&self) -> Option<Arc<String>> {
        self.client_hash.load_full()
    }

    pub(crate) fn set_error_hook(&self, hook: ErrorHook) {
        *self.error_hook.write() = Some(hook);
    }

    /// Pass a failed result through the error hook.
    pub(crate) fn observe(
        &self,
        req: &ApiRequest,
        result: Result<Value, TransportError>,
    ) -> Result<Value, TransportError> {
        if let Err(err) = &result {
            if !err.is_cancelled() {
                tracing::debug!(method = %req.method, route = %req.route, error = %err, "API request failed");
                let hook = self.error_hook.read().clone();
                if let Some(hook) = hook {
                    hook(req, err);
                }
            }
        }
        result
    }
}
