//! Converts source images into the base64 payload the generation API expects.
//!
//! The payload is produced the way a browser `readAsDataURL` call would
//! produce it, then everything up to and including the comma is dropped, so
//! callers only ever see bare base64 without a `data:` prefix.

use crate::error::{FigurineError, Result};
use crate::image::types::{ImageFormat, SourceImage};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How strictly the declared format is checked against the file's bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentCheck {
    /// Keep the declared format and log a warning on mismatch.
    #[default]
    Permissive,
    /// Reject files whose bytes identify as a different format.
    Strict,
}

/// A source image ready for transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Format sent as the MIME type.
    pub format: ImageFormat,
    /// Base64 payload, no `data:` prefix.
    pub data: String,
}

impl EncodedImage {
    /// Returns the MIME type sent alongside the payload.
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }
}

/// Encodes raw bytes as standard base64.
pub fn encode_bytes(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}

/// Decodes a base64 payload.
///
/// Tolerates a leading data-URL prefix, embedded whitespace and missing `=`
/// padding.
pub fn decode(payload: &str) -> Result<Vec<u8>> {
    let payload = if payload.starts_with("data:") {
        payload_from_data_url(payload)?
    } else {
        payload
    };
    let cleaned: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    if let Ok(data) = base64::engine::general_purpose::STANDARD.decode(&cleaned) {
        return Ok(data);
    }
    base64::engine::general_purpose::STANDARD_NO_PAD
        .decode(&cleaned)
        .map_err(|e| FigurineError::Decode(e.to_string()))
}

/// Builds a `data:<mime>;base64,<payload>` URL.
pub fn to_data_url(format: ImageFormat, data: &[u8]) -> String {
    format!("data:{};base64,{}", format.mime_type(), encode_bytes(data))
}

/// Returns the base64 segment after the comma of a data URL.
pub fn payload_from_data_url(url: &str) -> Result<&str> {
    match url.split_once(',') {
        Some((_, payload)) if !payload.is_empty() => Ok(payload),
        _ => Err(FigurineError::Encode(
            "failed to extract base64 from file".into(),
        )),
    }
}

/// Encodes a selected source image.
pub async fn encode_source(source: &SourceImage, check: ContentCheck) -> Result<EncodedImage> {
    let data = source.read().await.map_err(|e| match e {
        FigurineError::Io(io) => {
            FigurineError::Encode(format!("failed to read {}: {io}", source.name()))
        }
        other => other,
    })?;

    let format = verify_content(source.name(), source.format(), &data, check)?;
    let url = to_data_url(format, &data);
    let payload = payload_from_data_url(&url)?;

    tracing::debug!(
        name = source.name(),
        mime = format.mime_type(),
        bytes = data.len(),
        "encoded source image"
    );

    Ok(EncodedImage {
        format,
        data: payload.to_string(),
    })
}

/// Selects and encodes a file in one step.
pub async fn encode_file(path: impl AsRef<Path>, check: ContentCheck) -> Result<EncodedImage> {
    let source = SourceImage::from_path(path)?;
    encode_source(&source, check).await
}

fn verify_content(
    name: &str,
    declared: ImageFormat,
    data: &[u8],
    check: ContentCheck,
) -> Result<ImageFormat> {
    let Some(detected) = ImageFormat::from_magic_bytes(data) else {
        return Ok(declared);
    };
    if detected == declared {
        return Ok(declared);
    }

    match check {
        ContentCheck::Permissive => {
            tracing::warn!(
                name,
                declared = declared.mime_type(),
                detected = detected.mime_type(),
                "image content does not match its declared type"
            );
            Ok(declared)
        }
        ContentCheck::Strict => Err(FigurineError::Encode(format!(
            "{name} is declared as {declared} but contains {detected}"
        ))),
    }
}
