//! Core types for figurine generation.

use crate::error::{FigurineError, Result};
use crate::image::encoder::EncodedImage;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format (modern, efficient).
    WebP,
}

impl ImageFormat {
    /// Every format the file picker accepts.
    pub const ACCEPTED: [ImageFormat; 3] = [Self::Png, Self::Jpeg, Self::WebP];

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
        }
    }

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Attempts to detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Parses a MIME type such as `image/jpeg`.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime.trim().to_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        None
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// Image provider kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageProviderKind {
    /// Google Gemini image models.
    Gemini,
}

impl std::fmt::Display for ImageProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gemini => write!(f, "gemini"),
        }
    }
}

#[derive(Debug, Clone)]
enum SourceContent {
    Memory(Arc<[u8]>),
    File(PathBuf),
}

/// The photo the user picked.
///
/// A file-backed source is not read until it is encoded, the same way a
/// browser `File` handle stays lazy until a reader consumes it.
#[derive(Debug, Clone)]
pub struct SourceImage {
    name: String,
    format: ImageFormat,
    content: SourceContent,
}

impl SourceImage {
    /// Wraps in-memory bytes with an explicit format.
    pub fn new(name: impl Into<String>, format: ImageFormat, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            format,
            content: SourceContent::Memory(data.into()),
        }
    }

    /// Wraps in-memory bytes, detecting the format from magic bytes.
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Result<Self> {
        let data: Arc<[u8]> = data.into();
        let name: String = name.into();
        let format = ImageFormat::from_magic_bytes(&data)
            .ok_or_else(|| FigurineError::UnsupportedFormat(name.clone()))?;
        Ok(Self::new(name, format, data))
    }

    /// Selects a file on disk. The format comes from the extension, which
    /// plays the role of the picker's `accept` filter. Files without a
    /// recognised extension are sniffed from their first bytes.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(ImageFormat::from_extension)
            .or_else(|| sniff_file(path))
            .ok_or_else(|| FigurineError::UnsupportedFormat(path.display().to_string()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            name,
            format,
            content: SourceContent::File(path.to_path_buf()),
        })
    }

    /// Display name (file name for file-backed sources).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared format.
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Backing path, if the source was selected from disk.
    pub fn path(&self) -> Option<&Path> {
        match &self.content {
            SourceContent::File(path) => Some(path),
            SourceContent::Memory(_) => None,
        }
    }

    /// Reads the image bytes.
    pub async fn read(&self) -> Result<Arc<[u8]>> {
        match &self.content {
            SourceContent::Memory(data) => Ok(Arc::clone(data)),
            SourceContent::File(path) => Ok(tokio::fs::read(path).await?.into()),
        }
    }
}

fn sniff_file(path: &Path) -> Option<ImageFormat> {
    let file = std::fs::File::open(path).ok()?;
    let mut header = Vec::with_capacity(12);
    file.take(12).read_to_end(&mut header).ok()?;
    ImageFormat::from_magic_bytes(&header)
}

/// A request to transform a source image.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// The text prompt describing the desired transformation.
    pub prompt: String,
    /// The encoded source image.
    pub image: EncodedImage,
}

impl GenerationRequest {
    /// Creates a new request.
    pub fn new(prompt: impl Into<String>, image: EncodedImage) -> Self {
        Self {
            prompt: prompt.into(),
            image,
        }
    }
}

/// Metadata about the generation process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationMetadata {
    /// Model used for generation.
    pub model: Option<String>,
    /// Generation duration in milliseconds.
    pub duration_ms: Option<u64>,
    /// Text the model returned alongside the image, if any.
    pub text: Option<String>,
}

/// A generated image with its data and metadata.
#[derive(Debug, Clone)]
#[must_use = "generated image should be saved or displayed"]
pub struct GeneratedImage {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// Image format.
    pub format: ImageFormat,
    /// Provider that generated this image.
    pub provider: ImageProviderKind,
    /// Generation metadata.
    pub metadata: GenerationMetadata,
}

impl GeneratedImage {
    /// Creates a new generated image.
    pub fn new(
        data: Vec<u8>,
        format: ImageFormat,
        provider: ImageProviderKind,
        metadata: GenerationMetadata,
    ) -> Self {
        Self {
            data,
            format,
            provider,
            metadata,
        }
    }

    /// Returns the size of the image data in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Saves the image to the specified path.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, &self.data)?;
        Ok(())
    }

    /// Returns the image as a data URL, the reference a view displays.
    pub fn to_data_url(&self) -> String {
        crate::image::encoder::to_data_url(self.format, &self.data)
    }
}
