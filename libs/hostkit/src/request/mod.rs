//! Request concurrency guard: identity normalization, identity-scoped
//! cancellation and per-call-site stale-response rejection.

mod abort;
mod fetcher;
mod guard;
mod normalize;

pub use abort::{AbortHandle, AbortRegistry};
pub use fetcher::GuardedFetcher;
pub use guard::{execute_with_abort_handling, FetchSink, FetchSlot, GuardOutcome, RequestIdTracker};
pub use normalize::{normalize, NUMBER_PLACEHOLDER, STRING_PLACEHOLDER, UUID_PLACEHOLDER};
