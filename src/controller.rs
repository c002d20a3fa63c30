//! The upload → encode → request → display lifecycle.
//!
//! A [`GenerationController`] owns the selected image, its preview handle and
//! the last result. Views never mutate it; they read [`Snapshot`]s, either on
//! demand or through a [`watch`] subscription.
//!
//! ```text
//! Idle ──generate──▶ InFlight ──▶ Succeeded
//!   ▲                    │
//!   └──select_image──    └──────▶ Failed
//! ```
//!
//! Succeeded and Failed are not terminal: the next `generate` goes back
//! through InFlight.

use crate::config::{ControllerConfig, Prompt};
use crate::error::{FigurineError, Result, NO_IMAGE_MESSAGE};
use crate::image::{encoder, GeneratedImage, GenerationRequest, ImageProvider, SourceImage};
use crate::preview::{PreviewHandle, PreviewRegistry};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// Shown when a running generation is dropped or panics.
pub const INTERRUPTED_MESSAGE: &str = "Generation was interrupted.";

/// Where the controller is in its request cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    /// Nothing requested since the last selection.
    #[default]
    Idle,
    /// One request is outstanding.
    InFlight,
    /// The last request returned an image.
    Succeeded,
    /// The last request failed.
    Failed,
}

impl RequestState {
    /// Returns true while a request is outstanding.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::InFlight)
    }
}

impl std::fmt::Display for RequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::InFlight => "in-flight",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        })
    }
}

/// Outcome of a completed request.
#[derive(Debug, Clone)]
pub enum GenerationResult {
    /// The generated image.
    Image(Arc<GeneratedImage>),
    /// A user-facing failure message.
    Error(String),
}

/// What a view sees at one instant.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Current request state.
    pub state: RequestState,
    /// Name of the selected image, if any.
    pub source_name: Option<String>,
    /// Preview URL of the selected image, if any.
    pub preview_url: Option<String>,
    /// Result of the last completed request. Cleared when a new one starts.
    pub result: Option<GenerationResult>,
}

impl Snapshot {
    /// The generated image, when the last request succeeded.
    pub fn image(&self) -> Option<&Arc<GeneratedImage>> {
        match &self.result {
            Some(GenerationResult::Image(image)) => Some(image),
            _ => None,
        }
    }

    /// The failure message, when the last request failed.
    pub fn error(&self) -> Option<&str> {
        match &self.result {
            Some(GenerationResult::Error(message)) => Some(message),
            _ => None,
        }
    }

    /// Whether the generate action should be enabled.
    pub fn can_generate(&self) -> bool {
        self.source_name.is_some() && !self.state.is_in_flight()
    }
}

struct Selection {
    source: SourceImage,
    preview: PreviewHandle,
}

#[derive(Default)]
struct Inner {
    state: RequestState,
    selection: Option<Selection>,
    result: Option<GenerationResult>,
}

impl Inner {
    fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state,
            source_name: self
                .selection
                .as_ref()
                .map(|s| s.source.name().to_string()),
            preview_url: self.selection.as_ref().map(|s| s.preview.url().to_string()),
            result: self.result.clone(),
        }
    }
}

/// State plus the channel that publishes it. The lock is never held across
/// an await point.
struct Shared {
    inner: Mutex<Inner>,
    tx: watch::Sender<Snapshot>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> T {
        let mut inner = self.lock();
        let before = inner.state;
        let out = f(&mut *inner);
        if before != inner.state {
            tracing::debug!(from = %before, to = %inner.state, "request state changed");
        }
        self.tx.send_replace(inner.snapshot());
        out
    }

    /// Moves to InFlight and hands back the source to encode.
    fn begin(&self) -> Result<SourceImage> {
        self.update(|inner| {
            if inner.state.is_in_flight() {
                return Err(FigurineError::Busy);
            }
            let Some(selection) = inner.selection.as_ref() else {
                inner.state = RequestState::Failed;
                inner.result = Some(GenerationResult::Error(NO_IMAGE_MESSAGE.to_string()));
                return Err(FigurineError::NoImage);
            };
            let source = selection.source.clone();
            inner.state = RequestState::InFlight;
            inner.result = None;
            Ok(source)
        })
    }

    fn finish(&self, result: GenerationResult) {
        self.update(|inner| {
            inner.state = match result {
                GenerationResult::Image(_) => RequestState::Succeeded,
                GenerationResult::Error(_) => RequestState::Failed,
            };
            inner.result = Some(result);
        });
    }
}

/// Fails the request if it is dropped before completing.
struct InFlightGuard<'a> {
    shared: &'a Shared,
    done: bool,
}

impl<'a> InFlightGuard<'a> {
    fn new(shared: &'a Shared) -> Self {
        Self {
            shared,
            done: false,
        }
    }

    fn complete(mut self, result: GenerationResult) {
        self.done = true;
        self.shared.finish(result);
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            tracing::warn!("generation dropped while in flight");
            self.shared
                .finish(GenerationResult::Error(INTERRUPTED_MESSAGE.to_string()));
        }
    }
}

/// Coordinates one generation cycle at a time against an [`ImageProvider`].
pub struct GenerationController<P> {
    provider: P,
    config: ControllerConfig,
    previews: PreviewRegistry,
    shared: Shared,
}

impl<P: ImageProvider> GenerationController<P> {
    /// Creates a controller in the Idle state with nothing selected.
    pub fn new(provider: P, config: ControllerConfig) -> Self {
        let (tx, _) = watch::channel(Snapshot::default());
        Self {
            provider,
            config,
            previews: PreviewRegistry::new(),
            shared: Shared {
                inner: Mutex::new(Inner::default()),
                tx,
            },
        }
    }

    /// The provider requests are sent to.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The controller's configuration.
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Registry backing the preview URLs this controller hands out.
    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    /// Selects a new source image, replacing and releasing the previous one.
    ///
    /// Returns the preview URL. Rejected while a request is in flight.
    pub fn select_image(&self, source: SourceImage) -> Result<String> {
        self.shared.update(|inner| {
            if inner.state.is_in_flight() {
                return Err(FigurineError::Busy);
            }
            let preview = self.previews.create(&source);
            let url = preview.url().to_string();
            tracing::debug!(name = source.name(), %url, "selected image");

            // Replacing the selection drops the old preview handle.
            inner.selection = Some(Selection { source, preview });
            inner.result = None;
            inner.state = RequestState::Idle;
            Ok(url)
        })
    }

    /// Drops the selection, its preview, and any result.
    pub fn clear(&self) -> Result<()> {
        self.shared.update(|inner| {
            if inner.state.is_in_flight() {
                return Err(FigurineError::Busy);
            }
            *inner = Inner::default();
            Ok(())
        })
    }

    /// Current request state.
    pub fn state(&self) -> RequestState {
        self.shared.lock().state
    }

    /// Current view of the controller.
    pub fn snapshot(&self) -> Snapshot {
        self.shared.lock().snapshot()
    }

    /// Subscribes to snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.shared.tx.subscribe()
    }

    /// Whether a new generation may start now.
    pub fn can_generate(&self) -> bool {
        self.snapshot().can_generate()
    }

    /// The selected image, if any.
    pub fn source(&self) -> Option<SourceImage> {
        self.shared
            .lock()
            .selection
            .as_ref()
            .map(|s| s.source.clone())
    }

    /// Runs one generation with the configured prompt.
    pub async fn generate(&self) -> Result<Arc<GeneratedImage>> {
        let prompt = self.config.prompt().clone();
        self.generate_with(&prompt).await
    }

    /// Runs one generation with an explicit prompt.
    ///
    /// Makes exactly one provider call, or none when no image is selected,
    /// encoding fails, or another generation is already in flight.
    pub async fn generate_with(&self, prompt: &Prompt) -> Result<Arc<GeneratedImage>> {
        let source = self.shared.begin()?;
        let guard = InFlightGuard::new(&self.shared);

        match self.run(&source, prompt).await {
            Ok(image) => {
                let image = Arc::new(image);
                tracing::info!(
                    bytes = image.size(),
                    mime = image.format.mime_type(),
                    "generation succeeded"
                );
                guard.complete(GenerationResult::Image(Arc::clone(&image)));
                Ok(image)
            }
            Err(e) => {
                tracing::warn!(error = %e, "generation failed");
                guard.complete(GenerationResult::Error(e.user_message()));
                Err(e)
            }
        }
    }

    async fn run(&self, source: &SourceImage, prompt: &Prompt) -> Result<GeneratedImage> {
        let encoded = encoder::encode_source(source, self.config.content_check()).await?;
        let request = GenerationRequest::new(prompt.as_str(), encoded);
        self.provider.generate(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ENCODE_FAILED_MESSAGE, FALLBACK_MESSAGE};
    use crate::image::{ContentCheck, GenerationMetadata, ImageFormat, ImageProviderKind};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    enum Reply {
        Image(Vec<u8>),
        Fail(String),
        Error(FigurineError),
        Panic,
    }

    #[derive(Default)]
    struct MockProvider {
        replies: StdMutex<VecDeque<Reply>>,
        requests: StdMutex<Vec<GenerationRequest>>,
        gate: Option<Arc<Notify>>,
    }

    impl MockProvider {
        fn replying(replies: impl IntoIterator<Item = Reply>) -> Self {
            Self {
                replies: StdMutex::new(replies.into_iter().collect()),
                ..Default::default()
            }
        }

        fn gated(mut self, gate: Arc<Notify>) -> Self {
            self.gate = Some(gate);
            self
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ImageProvider for MockProvider {
        async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(Reply::Image(data)) => Ok(GeneratedImage::new(
                    data,
                    ImageFormat::Png,
                    ImageProviderKind::Gemini,
                    GenerationMetadata::default(),
                )),
                Some(Reply::Fail(message)) => Err(FigurineError::Api {
                    status: 503,
                    message,
                }),
                Some(Reply::Error(err)) => Err(err),
                Some(Reply::Panic) => panic!("provider blew up"),
                None => Err(FigurineError::UnexpectedResponse("no reply queued".into())),
            }
        }

        fn kind(&self) -> ImageProviderKind {
            ImageProviderKind::Gemini
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }
    }

    fn jpeg_10kb() -> SourceImage {
        let mut data: Vec<u8> = vec![0xFF, 0xD8, 0xFF, 0xE0];
        data.resize(10 * 1024, 0x42);
        SourceImage::new("photo.jpg", ImageFormat::Jpeg, data)
    }

    fn controller(provider: MockProvider, prompt: &str) -> GenerationController<Arc<MockProvider>> {
        let config = ControllerConfig::builder()
            .prompt(Prompt::new(prompt).unwrap())
            .build();
        GenerationController::new(Arc::new(provider), config)
    }

    #[tokio::test]
    async fn test_generate_success_scenario() {
        let c = controller(MockProvider::replying([Reply::Image(b"X".to_vec())]), "P");
        assert_eq!(c.state(), RequestState::Idle);
        assert!(!c.can_generate());

        c.select_image(jpeg_10kb()).unwrap();
        assert!(c.can_generate());

        let image = c.generate().await.unwrap();
        assert_eq!(image.data, b"X");

        let requests = c.provider().requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].prompt, "P");
        assert!(!requests[0].image.data.is_empty());
        assert!(!requests[0].image.data.starts_with("data:"));
        assert_eq!(requests[0].image.mime_type(), "image/jpeg");
        drop(requests);

        let snap = c.snapshot();
        assert_eq!(snap.state, RequestState::Succeeded);
        assert_eq!(snap.image().unwrap().data, b"X");
        assert!(snap.error().is_none());
    }

    async fn connection_refused() -> FigurineError {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = reqwest::get(format!("http://{addr}/")).await.unwrap_err();
        FigurineError::Network(err)
    }

    #[tokio::test]
    async fn test_network_failure_is_displayed() {
        let network = connection_refused().await;
        let expected = network.user_message();
        assert!(expected.starts_with("network error"));
        assert!(!network.is_local());

        let c = controller(
            MockProvider::replying([Reply::Image(b"first".to_vec()), Reply::Error(network)]),
            "P",
        );
        c.select_image(jpeg_10kb()).unwrap();
        c.generate().await.unwrap();

        let err = c.generate().await.unwrap_err();
        assert!(matches!(err, FigurineError::Network(_)));

        let snap = c.snapshot();
        assert_eq!(snap.state, RequestState::Failed);
        assert_eq!(snap.error(), Some(expected.as_str()));
        assert!(snap.image().is_none());
        assert!(snap.can_generate());
    }

    #[tokio::test]
    async fn test_generate_without_image() {
        let c = controller(MockProvider::default(), "P");

        let err = c.generate().await.unwrap_err();
        assert!(matches!(err, FigurineError::NoImage));

        let snap = c.snapshot();
        assert_eq!(snap.state, RequestState::Failed);
        assert_eq!(snap.error(), Some(NO_IMAGE_MESSAGE));
        assert_eq!(c.provider().calls(), 0);
    }

    #[tokio::test]
    async fn test_failure_clears_previous_result() {
        let c = controller(
            MockProvider::replying([
                Reply::Image(b"first".to_vec()),
                Reply::Fail("model overloaded".into()),
            ]),
            "P",
        );
        c.select_image(jpeg_10kb()).unwrap();
        c.generate().await.unwrap();

        let err = c.generate().await.unwrap_err();
        assert!(matches!(err, FigurineError::Api { status: 503, .. }));

        let snap = c.snapshot();
        assert_eq!(snap.state, RequestState::Failed);
        assert_eq!(snap.error(), Some("model overloaded"));
        assert!(snap.image().is_none());
        assert_eq!(c.provider().calls(), 2);
    }

    #[tokio::test]
    async fn test_failure_with_empty_message_uses_fallback() {
        let c = controller(MockProvider::replying([Reply::Fail(String::new())]), "P");
        c.select_image(jpeg_10kb()).unwrap();
        c.generate().await.unwrap_err();
        assert_eq!(c.snapshot().error(), Some(FALLBACK_MESSAGE));
    }

    #[tokio::test]
    async fn test_encoding_failure_skips_remote_call() {
        let c = controller(MockProvider::replying([Reply::Image(vec![1])]), "P");
        let dir = tempfile::tempdir().unwrap();
        let source = SourceImage::from_path(dir.path().join("deleted.png")).unwrap();
        c.select_image(source).unwrap();

        let err = c.generate().await.unwrap_err();
        assert!(matches!(err, FigurineError::Encode(_)));
        assert_eq!(c.snapshot().error(), Some(ENCODE_FAILED_MESSAGE));
        assert_eq!(c.state(), RequestState::Failed);
        assert_eq!(c.provider().calls(), 0);
    }

    #[tokio::test]
    async fn test_strict_content_check() {
        let provider = Arc::new(MockProvider::default());
        let config = ControllerConfig::builder()
            .content_check(ContentCheck::Strict)
            .build();
        let c = GenerationController::new(Arc::clone(&provider), config);

        let png_as_jpeg = SourceImage::new(
            "liar.jpg",
            ImageFormat::Jpeg,
            vec![0x89u8, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A],
        );
        c.select_image(png_as_jpeg).unwrap();
        assert!(matches!(c.generate().await, Err(FigurineError::Encode(_))));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_cycle_is_repeatable() {
        let c = controller(
            MockProvider::replying([
                Reply::Fail("nope".into()),
                Reply::Image(vec![7]),
                Reply::Image(vec![8]),
            ]),
            "P",
        );
        c.select_image(jpeg_10kb()).unwrap();

        assert!(c.generate().await.is_err());
        assert_eq!(c.generate().await.unwrap().data, vec![7]);

        c.select_image(jpeg_10kb()).unwrap();
        assert_eq!(c.state(), RequestState::Idle);
        assert!(c.snapshot().result.is_none());
        assert_eq!(c.generate().await.unwrap().data, vec![8]);
        assert_eq!(c.state(), RequestState::Succeeded);
    }

    #[tokio::test]
    async fn test_second_generate_rejected_while_in_flight() {
        let gate = Arc::new(Notify::new());
        let c = Arc::new(controller(
            MockProvider::replying([Reply::Image(vec![1])]).gated(Arc::clone(&gate)),
            "P",
        ));
        c.select_image(jpeg_10kb()).unwrap();

        let mut rx = c.subscribe();
        let running = tokio::spawn({
            let c = Arc::clone(&c);
            async move { c.generate().await }
        });
        rx.wait_for(|s| s.state.is_in_flight()).await.unwrap();

        assert!(!c.can_generate());
        assert!(matches!(c.generate().await, Err(FigurineError::Busy)));
        assert!(matches!(
            c.select_image(jpeg_10kb()),
            Err(FigurineError::Busy)
        ));
        assert!(matches!(c.clear(), Err(FigurineError::Busy)));
        assert_eq!(c.state(), RequestState::InFlight);

        gate.notify_one();
        assert!(running.await.unwrap().is_ok());
        assert_eq!(c.state(), RequestState::Succeeded);
        assert_eq!(c.provider().calls(), 1);
    }

    #[tokio::test]
    async fn test_dropped_generation_is_not_left_in_flight() {
        let gate = Arc::new(Notify::new());
        let c = controller(
            MockProvider::replying([Reply::Image(vec![1])]).gated(gate),
            "P",
        );
        c.select_image(jpeg_10kb()).unwrap();

        let timed_out = tokio::time::timeout(Duration::from_millis(20), c.generate()).await;
        assert!(timed_out.is_err());

        let snap = c.snapshot();
        assert_eq!(snap.state, RequestState::Failed);
        assert_eq!(snap.error(), Some(INTERRUPTED_MESSAGE));
        assert!(c.can_generate());
    }

    #[tokio::test]
    async fn test_panicking_provider_is_not_left_in_flight() {
        let c = Arc::new(controller(MockProvider::replying([Reply::Panic]), "P"));
        c.select_image(jpeg_10kb()).unwrap();

        let joined = tokio::spawn({
            let c = Arc::clone(&c);
            async move { c.generate().await }
        })
        .await;
        assert!(joined.unwrap_err().is_panic());
        assert_eq!(c.state(), RequestState::Failed);
    }

    #[tokio::test]
    async fn test_previews_released_on_replace_and_clear() {
        let c = controller(MockProvider::default(), "P");
        let first = c.select_image(jpeg_10kb()).unwrap();
        for _ in 0..10 {
            c.select_image(jpeg_10kb()).unwrap();
        }
        assert_eq!(c.previews().live(), 1);
        assert!(c.previews().resolve(&first).is_none());

        let url = c.snapshot().preview_url.unwrap();
        assert_eq!(c.previews().resolve(&url).unwrap().name(), "photo.jpg");

        c.clear().unwrap();
        assert_eq!(c.previews().live(), 0);
        assert!(c.source().is_none());
        assert_eq!(c.state(), RequestState::Idle);
    }

    #[tokio::test]
    async fn test_subscribers_observe_transitions() {
        let gate = Arc::new(Notify::new());
        let c = Arc::new(controller(
            MockProvider::replying([Reply::Image(vec![1])]).gated(Arc::clone(&gate)),
            "P",
        ));
        let mut rx = c.subscribe();
        c.select_image(jpeg_10kb()).unwrap();
        assert_eq!(rx.borrow_and_update().source_name.as_deref(), Some("photo.jpg"));

        let running = tokio::spawn({
            let c = Arc::clone(&c);
            async move { c.generate().await }
        });
        rx.wait_for(|s| s.state == RequestState::InFlight).await.unwrap();
        gate.notify_one();
        let done = rx
            .wait_for(|s| s.state == RequestState::Succeeded)
            .await
            .unwrap()
            .clone();
        assert!(done.image().is_some());
        running.await.unwrap().unwrap();
    }
}
