#![warn(missing_docs)]
//! Figurine - turn a photo into a photorealistic collectible figure.
//!
//! The crate wraps one lifecycle: pick an image, encode it, send it with a
//! fixed prompt to an image model, and show the result or the error.
//!
//! # Quick Start
//!
//! ```no_run
//! use figurine::{ControllerConfig, GeminiProvider, GenerationController, SourceImage};
//!
//! #[tokio::main]
//! async fn main() -> figurine::Result<()> {
//!     let provider = GeminiProvider::builder().build()?;
//!     let controller = GenerationController::new(provider, ControllerConfig::default());
//!
//!     controller.select_image(SourceImage::from_path("cat.jpg")?)?;
//!     let image = controller.generate().await?;
//!     image.save("cat-figure.png")?;
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `gemini-image`: Gemini (Google) provider
//! - `cli`: Command-line interface

mod config;
mod controller;
mod error;
pub mod image;
pub mod preview;
pub mod view;

pub use config::{ControllerConfig, ControllerConfigBuilder, Prompt, FIGURINE_PROMPT};
pub use controller::{
    GenerationController, GenerationResult, RequestState, Snapshot, INTERRUPTED_MESSAGE,
};
pub use error::{
    FigurineError, Result, ENCODE_FAILED_MESSAGE, FALLBACK_MESSAGE, NO_IMAGE_MESSAGE,
};
pub use image::{
    ContentCheck, EncodedImage, GeneratedImage, GenerationMetadata, GenerationRequest,
    ImageFormat, ImageProvider, ImageProviderKind, SourceImage,
};

#[cfg(feature = "gemini-image")]
pub use image::providers::{GeminiModel, GeminiProvider, GeminiProviderBuilder};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::{ControllerConfig, Prompt};
    pub use crate::controller::{GenerationController, RequestState, Snapshot};
    pub use crate::error::{FigurineError, Result};
    pub use crate::image::{GeneratedImage, ImageProvider, SourceImage};

    #[cfg(feature = "gemini-image")]
    pub use crate::image::providers::GeminiProvider;
}
