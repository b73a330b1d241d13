//! Development fixtures for the profile API.

use axum::http::StatusCode;
use hostkit::{MockHandler, MockResponse};
use serde_json::json;

/// `GET /api/profile/{id}`; id `0` answers 404.
pub fn handlers() -> Vec<MockHandler> {
    vec![MockHandler::get("/api/profile/1", |req| {
        let id = req
            .route
            .rsplit('/')
            .next()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or_default();
        if id == 0 {
            return MockResponse::with_status(
                StatusCode::NOT_FOUND,
                json!({ "error": "profile not found" }),
            );
        }
        MockResponse::json(json!({
            "id": id,
            "name": format!("User {id}"),
            "email": format!("user{id}@example.com"),
            "locale": "en",
        }))
    })]
}
