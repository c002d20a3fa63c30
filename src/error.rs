//! Error types for figurine generation.

use std::time::Duration;

/// Message shown when a generation is requested without a source image.
pub const NO_IMAGE_MESSAGE: &str = "Please upload an image.";

/// Message shown when the source image could not be read or encoded.
pub const ENCODE_FAILED_MESSAGE: &str = "Failed to read the selected image.";

/// Fallback message when a failure carries no usable description.
pub const FALLBACK_MESSAGE: &str = "An unexpected error occurred.";

const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Errors that can occur while preparing or running a generation.
#[derive(Debug, thiserror::Error)]
pub enum FigurineError {
    /// Generation was requested with no source image selected.
    #[error("no image supplied")]
    NoImage,

    /// A generation is already in flight.
    #[error("a generation is already in progress")]
    Busy,

    /// The source image could not be read or converted to base64.
    #[error("failed to encode image: {0}")]
    Encode(String),

    /// The selected file is not a supported image type.
    #[error("unsupported image type: {0}")]
    UnsupportedFormat(String),

    /// API key missing or invalid.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message reported by the service.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("rate limited: {message}")]
    RateLimited {
        /// Delay suggested by the service, if any.
        retry_after: Option<Duration>,
        /// Message reported by the service.
        message: String,
    },

    /// Content was blocked by safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// The service answered, but not with an image.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to decode base64 data.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// I/O error (e.g., saving the result).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FigurineError {
    /// Returns the text shown to the user for this failure.
    ///
    /// Validation and encoding failures get fixed wording. Remote failures
    /// surface the underlying message, or [`FALLBACK_MESSAGE`] when empty.
    pub fn user_message(&self) -> String {
        let message = match self {
            Self::NoImage => return NO_IMAGE_MESSAGE.to_string(),
            Self::Encode(_) | Self::UnsupportedFormat(_) => {
                return ENCODE_FAILED_MESSAGE.to_string()
            }
            Self::Api { message, .. } => message.clone(),
            Self::RateLimited {
                retry_after,
                message,
            } => match retry_after {
                Some(delay) if !message.trim().is_empty() => {
                    format!("{message} (retry after {}s)", delay.as_secs())
                }
                Some(delay) => format!("Rate limited, retry after {}s.", delay.as_secs()),
                None => message.clone(),
            },
            Self::Auth(m)
            | Self::ContentBlocked(m)
            | Self::UnexpectedResponse(m)
            | Self::InvalidRequest(m)
            | Self::Decode(m) => m.clone(),
            other => other.to_string(),
        };

        if message.trim().is_empty() {
            FALLBACK_MESSAGE.to_string()
        } else {
            message
        }
    }

    /// Returns true for failures caught before any remote call was made.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::NoImage | Self::Busy | Self::Encode(_) | Self::UnsupportedFormat(_)
        )
    }
}

/// Result type alias for figurine operations.
pub type Result<T> = std::result::Result<T, FigurineError>;

/// Reads a `Retry-After` header given in whole seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Redacts key-looking query parameters and caps the length of an error body.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let mut out = String::with_capacity(text.len().min(MAX_ERROR_MESSAGE_LEN));
    let mut rest = text;

    while let Some(pos) = rest.find("key=") {
        let (head, tail) = rest.split_at(pos + "key=".len());
        out.push_str(head);
        out.push_str("[REDACTED]");
        let end = tail
            .find(|c: char| c == '&' || c == '"' || c.is_whitespace())
            .unwrap_or(tail.len());
        rest = &tail[end..];
    }
    out.push_str(rest);

    if out.chars().count() > MAX_ERROR_MESSAGE_LEN {
        let truncated: String = out.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
        return format!("{truncated}...");
    }
    out
}
