//! HTTP service turning uploaded images into text captions.
//!
//! The captioning model itself lives behind the [`CaptionModel`] trait. The
//! [`CaptionEngine`] owns a model on its own thread and the [`server`] module
//! exposes it over HTTP.

pub mod config;
pub mod engine;
pub mod error;
pub mod messages;
pub mod model;
pub mod preprocess;
pub mod server;

pub use config::{CaptionConfig, Device};
pub use engine::{CaptionEngine, CaptionEngineState};
pub use error::{CaptionError, ConfigError};
pub use image::RgbImage;
pub use messages::{CaptionResponse, HealthResponse};
pub use model::{DominantColorModel, FixedCaptionModel};

/// Trait for implementing captioning models that can be used with the [`CaptionEngine`].
///
/// Implementors receive an image that is always 8-bit RGB, whatever the color
/// mode of the original upload.
pub trait CaptionModel {
    /// The error type that can be returned while captioning.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Describes the image with a short piece of text.
    fn generate_caption(&mut self, image: &RgbImage) -> Result<String, Self::Error>;
}
