use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::messages::CaptionResponse;

/// Errors surfaced by the captioning pipeline.
///
/// Only [`CaptionError::MissingImage`] is a client error; everything else is
/// reported to the caller as an internal failure carrying its message.
#[derive(Debug, thiserror::Error)]
pub enum CaptionError {
    /// The request did not carry an `image` field.
    #[error("No image file provided")]
    MissingImage,

    /// The uploaded bytes could not be decoded as an image.
    #[error("{0}")]
    Decode(String),

    /// The multipart stream could not be read.
    #[error("{0}")]
    Upload(String),

    /// The captioning model failed or panicked.
    #[error("{0}")]
    Caption(String),

    /// The inference thread is no longer running.
    #[error("Caption engine is not running")]
    EngineUnavailable,
}

impl CaptionError {
    /// Returns the HTTP status code used to report this error.
    pub fn status(&self) -> StatusCode {
        match self {
            CaptionError::MissingImage => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CaptionError {
    fn into_response(self) -> Response {
        (self.status(), Json(CaptionResponse::err(self.to_string()))).into_response()
    }
}

/// Errors raised while building the service configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown device: {0} (expected \"cpu\", \"cuda\" or \"cuda:N\")")]
    UnknownDevice(String),
}
