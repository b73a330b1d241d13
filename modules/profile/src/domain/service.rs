use std::sync::Arc;

use hostkit::{ApiRequest, FetchSlot, GuardOutcome, GuardedFetcher, Transport};
use tracing::debug;

use super::error::ProfileError;
use super::Profile;

/// The profile view: one guarded call site over the backend profile API.
///
/// Loads for any id share one identity (`GET:/api/profile/number`), so a
/// newer load cancels an in-flight older one.
pub struct ProfileService {
    fetcher: GuardedFetcher,
    view: FetchSlot<Profile>,
    api_prefix: String,
}

impl ProfileService {
    pub fn new(transport: Arc<dyn Transport>, api_prefix: impl Into<String>) -> Self {
        Self {
            fetcher: GuardedFetcher::new(transport),
            view: FetchSlot::new(),
            api_prefix: api_prefix.into(),
        }
    }

    /// Fetch profile `id` into the view.
    ///
    /// The view is shared with concurrent loads, so the answer is taken
    /// from it only when it holds profile `id`. A superseded load whose
    /// profile is not in the view fails with `Superseded`.
    pub async fn load(&self, id: u64) -> Result<Profile, ProfileError> {
        let route = format!("{}/{id}", self.api_prefix.trim_end_matches('/'));
        match self.fetcher.fetch(ApiRequest::get(route), &self.view).await {
            GuardOutcome::Failed => Err(ProfileError::Fetch(
                self.view.last_error().unwrap_or_default(),
            )),
            GuardOutcome::Committed => self.committed(id),
            GuardOutcome::Stale => {
                debug!(id, "Profile load superseded");
                self.committed(id)
            }
        }
    }

    fn committed(&self, id: u64) -> Result<Profile, ProfileError> {
        self.view
            .data()
            .filter(|p| p.id == id)
            .ok_or(ProfileError::Superseded)
    }

    /// Last committed profile.
    pub fn current(&self) -> Option<Profile> {
        self.view.data()
    }

    pub fn is_loading(&self) -> bool {
        self.view.is_loading()
    }

    pub fn cancel_all(&self) {
        self.fetcher.cancel_all();
    }
}
