use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::domain::error::ProfileError;

impl ProfileError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProfileError::NotInitialized | ProfileError::NoTransport => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ProfileError::Fetch(_) => StatusCode::BAD_GATEWAY,
            ProfileError::Superseded => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for ProfileError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self, "Profile request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
