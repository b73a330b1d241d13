use async_trait::async_trait;
use hostkit_bootstrap::ApiConfig;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{ApiRequest, ErrorHook, Transport, TransportError, TransportHooks, CLIENT_HASH_HEADER};

/// `Transport` over reqwest against one API base URL.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
    hooks: TransportHooks,
}

impl HttpTransport {
    pub fn new(mut base_url: Url, timeout: Duration) -> Result<Self, TransportError> {
        // Url::join replaces the last segment unless the base ends with '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(TransportError::Client)?;

        Ok(Self {
            client,
            base_url,
            hooks: TransportHooks::default(),
        })
    }

    /// `None` when no API base URL is configured.
    pub fn from_config(api: &ApiConfig) -> anyhow::Result<Option<Self>> {
        let Some(raw) = api.base_url.as_deref() else {
            return Ok(None);
        };
        let base = Url::parse(raw)
            .map_err(|e| anyhow::anyhow!("invalid platform.api.base_url '{raw}': {e}"))?;
        let transport = Self::new(base, Duration::from_millis(api.timeout_ms))?;
        tracing::info!(base_url = %transport.base_url, timeout_ms = api.timeout_ms, "HTTP transport ready");
        Ok(Some(transport))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url_for(&self, route: &str) -> Result<Url, TransportError> {
        self.base_url
            .join(route.trim_start_matches('/'))
            .map_err(|source| TransportError::InvalidRoute {
                route: route.to_string(),
                source,
            })
    }

    async fn send(&self, req: &ApiRequest) -> Result<Value, TransportError> {
        let url = self.url_for(&req.route)?;
        let network = |source: reqwest::Error| TransportError::Network {
            method: req.method.clone(),
            route: req.route.clone(),
            source,
        };

        let mut builder = self.client.request(req.method.clone(), url);
        if let Some(hash) = self.hooks.client_hash() {
            builder = builder.header(CLIENT_HASH_HEADER, hash.as_str());
        }
        if let Some(payload) = &req.payload {
            builder = builder.json(payload);
        }

        let response = builder.send().await.map_err(network)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                method: req.method.clone(),
                route: req.route.clone(),
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await.map_err(network)?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).map_err(TransportError::Decode)?
        };
        req.validate(&body)?;
        Ok(body)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request_with_cancel(
        &self,
        req: ApiRequest,
        cancel: CancellationToken,
    ) -> Result<Value, TransportError> {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::cancelled(&req)),
            res = self.send(&req) => res,
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
