//! Controller configuration.
//!
//! The prompt is carried as an immutable value inside [`ControllerConfig`]
//! rather than as process-wide state, so a future build can let users edit
//! it without touching the controller.

use crate::error::{FigurineError, Result};
use crate::image::ContentCheck;
use std::fmt;
use std::sync::Arc;

/// The figurine prompt sent with every upload.
///
/// Roughly: a realistic 1/7 scale commercial figure of the characters in the
/// photo, standing on a computer desk on a round clear acrylic base with no
/// text, the monitor showing its ZBrush sculpt, next to a BANDAI-style box
/// printed with the original 2D artwork.
pub const FIGURINE_PROMPT: &str = "사진 속 캐릭터들의 1/7 스케일 상업용 피규어를 현실적인 스타일로, 실제 환경에 배치해 줘. 피규어는 컴퓨터 책상 위에 놓여 있고, 피규어 받침대는 둥근 투명 아크릴로, 받침대에는 아무런 글씨도 없어. 컴퓨터 화면에는 이 피규어의 Zbrush 모델링 과정이 보여. 컴퓨터 화면 옆에는 오리지널 아트워크가 인쇄된 BANDAI 스타일의 장난감 포장 상자가 있어. 포장에는 2D 평면 일러스트레이션이 들어가 있어.";

/// An immutable generation prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt(Arc<str>);

impl Prompt {
    /// Creates a prompt, rejecting blank text.
    pub fn new(text: impl AsRef<str>) -> Result<Self> {
        let text = text.as_ref().trim();
        if text.is_empty() {
            return Err(FigurineError::InvalidRequest("prompt must not be empty".into()));
        }
        Ok(Self(Arc::from(text)))
    }

    /// The built-in figurine prompt.
    pub fn figurine() -> Self {
        Self(Arc::from(FIGURINE_PROMPT))
    }

    /// Returns the prompt text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Prompt {
    fn default() -> Self {
        Self::figurine()
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Settings for a [`GenerationController`](crate::GenerationController).
#[derive(Debug, Clone, Default)]
pub struct ControllerConfig {
    prompt: Prompt,
    content_check: ContentCheck,
}

impl ControllerConfig {
    /// Creates a new `ControllerConfigBuilder`.
    pub fn builder() -> ControllerConfigBuilder {
        ControllerConfigBuilder::default()
    }

    /// Prompt sent with every generation.
    pub fn prompt(&self) -> &Prompt {
        &self.prompt
    }

    /// How the source image's bytes are checked before upload.
    pub fn content_check(&self) -> ContentCheck {
        self.content_check
    }
}

/// Builder for ControllerConfig.
#[derive(Debug, Clone, Default)]
pub struct ControllerConfigBuilder {
    prompt: Option<Prompt>,
    content_check: ContentCheck,
}

impl ControllerConfigBuilder {
    /// Sets the prompt. Defaults to [`FIGURINE_PROMPT`].
    pub fn prompt(mut self, prompt: Prompt) -> Self {
        self.prompt = Some(prompt);
        self
    }

    /// Sets the content check policy. Defaults to permissive.
    pub fn content_check(mut self, check: ContentCheck) -> Self {
        self.content_check = check;
        self
    }

    /// Builds the config.
    pub fn build(self) -> ControllerConfig {
        ControllerConfig {
            prompt: self.prompt.unwrap_or_default(),
            content_check: self.content_check,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompt_is_figurine() {
        let config = ControllerConfig::default();
        assert_eq!(config.prompt().as_str(), FIGURINE_PROMPT);
        assert_eq!(config.content_check(), ContentCheck::Permissive);
    }

    #[test]
    fn test_prompt_rejects_blank() {
        assert!(Prompt::new("   ").is_err());
        assert_eq!(Prompt::new("  P ").unwrap().as_str(), "P");
    }

    #[test]
    fn test_builder_overrides() {
        let config = ControllerConfig::builder()
            .prompt(Prompt::new("P").unwrap())
            .content_check(ContentCheck::Strict)
            .build();
        assert_eq!(config.prompt().to_string(), "P");
        assert_eq!(config.content_check(), ContentCheck::Strict);
    }
}
