use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tts_core::TtsError;

/// API Error types
///
/// Bodies are plain text; the browser shows them verbatim in a toast.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid audio")]
    InvalidAudio,

    #[error("Text completion failed: {0}")]
    CompletionError(#[from] anyhow::Error),

    #[error("Voice synthesis failed: {0}")]
    SynthesisError(#[from] TtsError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::InvalidRequest(detail) => {
                tracing::debug!("Rejected form: {}", detail);
                (StatusCode::BAD_REQUEST, "Invalid request")
            }
            ApiError::InvalidAudio => (StatusCode::BAD_REQUEST, "Invalid audio"),
            ApiError::CompletionError(e) => {
                tracing::error!("Text completion error: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Text completion failed")
            }
            ApiError::SynthesisError(e) => {
                tracing::error!("{}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Voice synthesis failed")
            }
        };

        (status, message).into_response()
    }
}
