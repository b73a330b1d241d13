use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile module is not initialized")]
    NotInitialized,
    #[error("no API transport is configured")]
    NoTransport,
    #[error("profile request failed: {0}")]
    Fetch(String),
    #[error("profile request was superseded by a newer one")]
    Superseded,
}
