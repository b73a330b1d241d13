use parking_lot::Mutex;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic request ordinal for one data-fetching call site.
///
/// Never share a tracker between unrelated call sites: each `next` makes
/// every earlier in-flight call on the same tracker stale.
#[derive(Debug, Default)]
pub struct RequestIdTracker {
    current: AtomicU64,
}

impl RequestIdTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request and return its ordinal.
    pub fn next(&self) -> u64 {
        self.current.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, id: u64) -> bool {
        self.current() == id
    }
}

/// Where a guarded fetch publishes its state.
pub trait FetchSink<T, E>: Send + Sync {
    /// Last committed value, handed to the operation.
    fn previous(&self) -> Option<T>;
    fn set_data(&self, data: T);
    fn set_loading(&self, loading: bool);
    fn on_error(&self, error: E);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Result delivered to the sink.
    Committed,
    /// Error delivered to the sink's error handler.
    Failed,
    /// A newer call started meanwhile; nothing was delivered.
    Stale,
}

/// Run `op` and deliver its result to `sink` unless a newer call on the same
/// tracker started before it finished.
///
/// Stale results and stale errors are dropped without touching the sink,
/// including the loading flag, which now belongs to the newer call.
pub async fn execute_with_abort_handling<T, E, S, F, Fut>(
    tracker: &RequestIdTracker,
    sink: &S,
    op: F,
) -> GuardOutcome
where
    S: FetchSink<T, E> + ?Sized,
    F: FnOnce(Option<T>) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let my_id = tracker.next();
    sink.set_loading(true);

    let result = op(sink.previous()).await;

    if !tracker.is_current(my_id) {
        tracing::trace!(
            request_id = my_id,
            current = tracker.current(),
            "Dropping stale response"
        );
        return GuardOutcome::Stale;
    }

    match result {
        Ok(data) => {
            sink.set_data(data);
            sink.set_loading(false);
            GuardOutcome::Committed
        }
        Err(err) => {
            sink.on_error(err);
            sink.set_loading(false);
            GuardOutcome::Failed
        }
    }
}

#[derive(Debug)]
struct SlotState<T> {
    data: Option<T>,
    loading: bool,
    last_error: Option<String>,
}

/// Ready-made sink keeping the last good value, the loading flag and the
/// last error message. A failed fetch keeps the previous data.
#[derive(Debug)]
pub struct FetchSlot<T> {
    state: Mutex<SlotState<T>>,
}

impl<T> Default for FetchSlot<T> {
    fn default() -> Self {
        Self {
            state: Mutex::new(SlotState {
                data: None,
                loading: false,
                last_error: None,
            }),
        }
    }
}

impl<T: Clone> FetchSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(&self) -> Option<T> {
        self.state.lock().data.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().loading
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.lock().last_error.clone()
    }
}

impl<T, E> FetchSink<T, E> for FetchSlot<T>
where
    T: Clone + Send,
    E: Display,
{
    fn previous(&self) -> Option<T> {
        self.state.lock().data.clone()
    }

    fn set_data(&self, data: T) {
        let mut state = self.state.lock();
        state.data = Some(data);
        state.last_error = None;
    }

    fn set_loading(&self, loading: bool) {
        self.state.lock().loading = loading;
    }

    fn on_error(&self, error: E) {
        self.state.lock().last_error = Some(error.to_string());
    }
}
