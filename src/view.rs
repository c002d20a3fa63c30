//! Maps controller snapshots onto what the interface shows.

use crate::controller::{RequestState, Snapshot};
use crate::image::{GeneratedImage, ImageFormat};
use std::sync::Arc;

/// Label of the action control while idle.
pub const GENERATE_LABEL: &str = "Generate Figure";
/// Label of the action control while a request is in flight.
pub const GENERATING_LABEL: &str = "Generating...";

const LOADING_TEXT: &str = "Generating your figure...";
const FAILED_HEADING: &str = "Generation Failed";
const PLACEHOLDER_TEXT: &str = "Your generated figure will appear here.";
const UPLOAD_TEXT: &str = "Click to upload";

/// The upload pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewPane {
    /// No file selected yet.
    Empty,
    /// A selected file, shown through its preview URL.
    Image {
        /// Preview URL from the registry.
        url: String,
        /// File name.
        name: String,
    },
}

/// The result region. Exactly one of these is shown.
#[derive(Debug, Clone)]
pub enum DisplayRegion {
    /// Nothing generated yet.
    Placeholder,
    /// A request is in flight.
    Loading,
    /// The last request failed.
    Error(String),
    /// The last request produced an image.
    Image(Arc<GeneratedImage>),
}

impl DisplayRegion {
    /// Picks the region for a snapshot: loading, then error, then image.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        if snapshot.state == RequestState::InFlight {
            return Self::Loading;
        }
        if let Some(message) = snapshot.error() {
            return Self::Error(message.to_string());
        }
        match snapshot.image() {
            Some(image) => Self::Image(Arc::clone(image)),
            None => Self::Placeholder,
        }
    }

    /// Image URL to display, when showing a result.
    pub fn image_url(&self) -> Option<String> {
        match self {
            Self::Image(image) => Some(image.to_data_url()),
            _ => None,
        }
    }
}

/// The generate button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionControl {
    /// False while in flight or with no file selected.
    pub enabled: bool,
    /// Button text.
    pub label: &'static str,
}

impl ActionControl {
    /// Derives the button from a snapshot.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let label = if snapshot.state.is_in_flight() {
            GENERATING_LABEL
        } else {
            GENERATE_LABEL
        };
        Self {
            enabled: snapshot.can_generate(),
            label,
        }
    }
}

/// Everything the page renders for one snapshot.
#[derive(Debug, Clone)]
pub struct View {
    /// Upload pane.
    pub preview: PreviewPane,
    /// Result region.
    pub display: DisplayRegion,
    /// Generate button.
    pub action: ActionControl,
}

impl View {
    /// Builds the view for a snapshot.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let preview = match (&snapshot.preview_url, &snapshot.source_name) {
            (Some(url), Some(name)) => PreviewPane::Image {
                url: url.clone(),
                name: name.clone(),
            },
            _ => PreviewPane::Empty,
        };
        Self {
            preview,
            display: DisplayRegion::from_snapshot(snapshot),
            action: ActionControl::from_snapshot(snapshot),
        }
    }
}

/// Renders a view as terminal text.
pub fn render_text(view: &View) -> String {
    let mut out = String::new();

    match &view.preview {
        PreviewPane::Empty => {
            let accepted: Vec<_> = ImageFormat::ACCEPTED
                .iter()
                .map(|f| f.extension().to_uppercase())
                .collect();
            out.push_str(&format!(
                "[upload] {UPLOAD_TEXT} ({})\n",
                accepted.join(", ")
            ));
        }
        PreviewPane::Image { name, url } => {
            out.push_str(&format!("[upload] {name} ({url})\n"));
        }
    }

    match &view.display {
        DisplayRegion::Placeholder => {
            out.push_str(&format!("[result] {PLACEHOLDER_TEXT}\n"));
        }
        DisplayRegion::Loading => {
            out.push_str(&format!("[result] {LOADING_TEXT}\n"));
        }
        DisplayRegion::Error(message) => {
            out.push_str(&format!("[result] {FAILED_HEADING}: {message}\n"));
        }
        DisplayRegion::Image(image) => {
            out.push_str(&format!(
                "[result] Generated figure: {} bytes ({})\n",
                image.size(),
                image.format.mime_type()
            ));
        }
    }

    let state = if view.action.enabled { "" } else { " (disabled)" };
    out.push_str(&format!("[action] {}{state}", view.action.label));
    out
}
