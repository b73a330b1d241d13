//! Post-bootstrap HTTP failures, published for local recoverable notification.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::transport::{ApiRequest, ErrorHook, TransportError};

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpErrorEvent {
    pub method: String,
    pub route: String,
    pub status: Option<u16>,
    pub message: String,
}

impl HttpErrorEvent {
    pub fn from_failure(req: &ApiRequest, err: &TransportError) -> Self {
        Self {
            method: req.method.to_string(),
            route: req.route.clone(),
            status: err.status(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug)]
pub struct HttpErrorNotifier {
    tx: broadcast::Sender<HttpErrorEvent>,
    session_expired: AtomicBool,
}

impl Default for HttpErrorNotifier {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            session_expired: AtomicBool::new(false),
        }
    }
}

impl HttpErrorNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HttpErrorEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: HttpErrorEvent) {
        if event.status == Some(401) && !self.session_expired.swap(true, Ordering::SeqCst) {
            tracing::warn!(route = %event.route, "Session expired");
        }
        tracing::warn!(
            method = %event.method,
            route = %event.route,
            status = ?event.status,
            "{}",
            event.message
        );
        // No subscribers is fine: nobody is listening for notifications yet.
        let _ = self.tx.send(event);
    }

    pub fn session_expired(&self) -> bool {
        self.session_expired.load(Ordering::SeqCst)
    }

    /// Transport error hook publishing into this notifier.
    pub fn hook(self: &Arc<Self>) -> ErrorHook {
        let notifier = Arc::clone(self);
        Arc::new(move |req: &ApiRequest, err: &TransportError| {
            notifier.publish(HttpErrorEvent::from_failure(req, err));
        })
    }
}
