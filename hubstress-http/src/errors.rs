//! HTTP error types

/// Error type for hub API operations
///
/// HTTP status outcomes are not errors; they come back as
/// [`crate::ApiResponse`] values. This type only covers failures where no
/// response was obtained at all.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Client configuration error: {0}")]
    Config(String),
}
