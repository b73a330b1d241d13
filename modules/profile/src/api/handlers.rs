use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::Json;

use crate::domain::error::ProfileError;
use crate::domain::Profile;
use crate::module::ProfileState;

/// The configured current user's profile.
pub async fn current_profile(
    Extension(state): Extension<Arc<ProfileState>>,
) -> Result<Json<Profile>, ProfileError> {
    let id = state.config()?.current_user_id;
    tracing::debug!(id, "Loading current profile");
    let svc = state.service()?;
    Ok(Json(svc.load(id).await?))
}

pub async fn profile_by_id(
    Extension(state): Extension<Arc<ProfileState>>,
    Path(id): Path<u64>,
) -> Result<Json<Profile>, ProfileError> {
    tracing::debug!(id, "Loading profile");
    let svc = state.service()?;
    Ok(Json(svc.load(id).await?))
}
