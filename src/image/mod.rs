//! Source images, their encoding, and the providers that transform them.

pub mod encoder;
mod provider;
pub mod providers;
mod types;

pub use encoder::{ContentCheck, EncodedImage};
pub use provider::ImageProvider;
pub use types::{
    GeneratedImage, GenerationMetadata, GenerationRequest, ImageFormat, ImageProviderKind,
    SourceImage,
};
