//! Transient preview references for selected images.
//!
//! A [`PreviewHandle`] plays the part of a browser object URL: it keeps the
//! selected image resolvable for display while it lives, and releases the
//! entry when dropped.

use crate::image::SourceImage;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

const URL_SCHEME: &str = "preview:";

#[derive(Debug, Default)]
struct Entries {
    next_id: u64,
    live: HashMap<u64, SourceImage>,
}

/// Issues and resolves preview handles.
#[derive(Debug, Clone, Default)]
pub struct PreviewRegistry {
    entries: Arc<Mutex<Entries>>,
}

impl PreviewRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a source image and returns the handle that owns the entry.
    pub fn create(&self, source: &SourceImage) -> PreviewHandle {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let id = entries.next_id;
        entries.next_id += 1;
        entries.live.insert(id, source.clone());

        PreviewHandle {
            id,
            url: format!("{URL_SCHEME}{id}"),
            entries: Arc::downgrade(&self.entries),
        }
    }

    /// Looks up the image behind a preview URL, if it is still live.
    pub fn resolve(&self, url: &str) -> Option<SourceImage> {
        let id: u64 = url.strip_prefix(URL_SCHEME)?.parse().ok()?;
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.live.get(&id).cloned()
    }

    /// Number of handles not yet released.
    pub fn live(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .live
            .len()
    }
}

/// Owns one registry entry; the entry is released on drop.
#[derive(Debug)]
pub struct PreviewHandle {
    id: u64,
    url: String,
    entries: Weak<Mutex<Entries>>,
}

impl PreviewHandle {
    /// URL a view uses to display the preview.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        if let Some(entries) = self.entries.upgrade() {
            let mut entries = entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.live.remove(&self.id);
            tracing::trace!(url = %self.url, "released preview");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageFormat;

    fn source(name: &str) -> SourceImage {
        SourceImage::new(name, ImageFormat::Png, vec![0u8; 4])
    }

    #[test]
    fn test_create_and_resolve() {
        let registry = PreviewRegistry::new();
        let handle = registry.create(&source("a.png"));

        assert!(handle.url().starts_with("preview:"));
        let resolved = registry.resolve(handle.url()).unwrap();
        assert_eq!(resolved.name(), "a.png");
        assert_eq!(registry.live(), 1);
    }

    #[test]
    fn test_drop_releases_entry() {
        let registry = PreviewRegistry::new();
        let handle = registry.create(&source("a.png"));
        let url = handle.url().to_string();

        drop(handle);
        assert_eq!(registry.live(), 0);
        assert!(registry.resolve(&url).is_none());
    }

    #[test]
    fn test_repeated_replacement_does_not_accumulate() {
        let registry = PreviewRegistry::new();
        let mut current = registry.create(&source("0.png"));
        for i in 1..50 {
            current = registry.create(&source(&format!("{i}.png")));
        }
        assert_eq!(registry.live(), 1);
        assert_eq!(registry.resolve(current.url()).unwrap().name(), "49.png");
    }

    #[test]
    fn test_handle_outliving_registry() {
        let registry = PreviewRegistry::new();
        let handle = registry.create(&source("a.png"));
        drop(registry);
        drop(handle);
    }

    #[test]
    fn test_resolve_rejects_foreign_urls() {
        let registry = PreviewRegistry::new();
        let _handle = registry.create(&source("a.png"));
        assert!(registry.resolve("blob:0").is_none());
        assert!(registry.resolve("preview:abc").is_none());
    }
}
