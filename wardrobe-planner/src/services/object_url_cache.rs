//! Session-scoped cache of renderable image handles
//!
//! `resolve` memoizes one handle per item id for the life of the cache.
//! Every handle the cache created is released exactly once: on `release`,
//! on `dispose`, or when the cache is dropped.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use wardrobe_common::models::WardrobeItem;
use wardrobe_common::Result;

use super::item_store::{ItemStore, StoredBlob};

/// Opaque, directly renderable reference to an image payload
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectUrl(String);

impl ObjectUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where image payloads come from
#[async_trait]
pub trait BlobSource: Send + Sync {
    async fn fetch_blob(&self, item_id: &str) -> Result<Option<StoredBlob>>;
}

#[async_trait]
impl BlobSource for ItemStore {
    async fn fetch_blob(&self, item_id: &str) -> Result<Option<StoredBlob>> {
        self.get_blob(item_id).await
    }
}

/// Creates and releases handles
///
/// Release stays synchronous so dropping the cache can free every handle.
#[async_trait]
pub trait UrlProvider: Send + Sync {
    async fn create(&self, item_id: &str, blob: &StoredBlob) -> Result<ObjectUrl>;

    fn release(&self, url: &ObjectUrl);
}

pub struct ObjectUrlCache {
    source: Arc<dyn BlobSource>,
    provider: Arc<dyn UrlProvider>,
    entries: Mutex<HashMap<String, ObjectUrl>>,
    disposed: AtomicBool,
}

impl ObjectUrlCache {
    pub fn new(source: Arc<dyn BlobSource>, provider: Arc<dyn UrlProvider>) -> Self {
        Self {
            source,
            provider,
            entries: Mutex::new(HashMap::new()),
            disposed: AtomicBool::new(false),
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, ObjectUrl>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Handle for an item's image
    ///
    /// Returns `None` when the blob is missing or cannot be read; never
    /// errors. Concurrent first calls for the same id may both fetch, but
    /// only one handle is kept and the other is released.
    pub async fn resolve(&self, item: &WardrobeItem) -> Option<ObjectUrl> {
        if self.disposed.load(Ordering::Acquire) {
            debug!("resolve after dispose for {}", item.id);
            return None;
        }
        let cached = self.entries().get(&item.id).cloned();
        if cached.is_some() {
            return cached;
        }

        let blob = match self.source.fetch_blob(&item.id).await {
            Ok(Some(blob)) => blob,
            Ok(None) => {
                debug!("No blob for item {}", item.id);
                return None;
            }
            Err(e) => {
                warn!("Failed to read blob for item {}: {}", item.id, e);
                return None;
            }
        };

        let created = match self.provider.create(&item.id, &blob).await {
            Ok(url) => url,
            Err(e) => {
                warn!("Failed to create handle for item {}: {}", item.id, e);
                return None;
            }
        };

        let mut entries = self.entries();
        if self.disposed.load(Ordering::Acquire) {
            drop(entries);
            self.provider.release(&created);
            return None;
        }
        if let Some(existing) = entries.get(&item.id) {
            let existing = existing.clone();
            drop(entries);
            self.provider.release(&created);
            return Some(existing);
        }
        entries.insert(item.id.clone(), created.clone());
        Some(created)
    }

    /// Release the handle of one item; true if there was one
    pub fn release(&self, item_id: &str) -> bool {
        let removed = self.entries().remove(item_id);
        match removed {
            Some(url) => {
                self.provider.release(&url);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Release every outstanding handle; later `resolve` calls return `None`
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        let drained: Vec<ObjectUrl> = self.entries().drain().map(|(_, url)| url).collect();
        if !drained.is_empty() {
            debug!("Releasing {} image handle(s)", drained.len());
        }
        for url in &drained {
            self.provider.release(url);
        }
    }
}

impl Drop for ObjectUrlCache {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::url_providers::MemoryUrlProvider;
    use std::sync::atomic::AtomicUsize;
    use wardrobe_common::models::{Category, ColorTag};
    use wardrobe_common::Error;

    struct MapSource {
        blobs: HashMap<String, StoredBlob>,
        fetches: AtomicUsize,
    }

    impl MapSource {
        fn with(ids: &[&str]) -> Self {
            let blobs = ids
                .iter()
                .map(|id| {
                    (
                        id.to_string(),
                        StoredBlob {
                            bytes: id.as_bytes().to_vec(),
                            mime_type: "image/png".to_string(),
                        },
                    )
                })
                .collect();
            Self {
                blobs,
                fetches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl BlobSource for MapSource {
        async fn fetch_blob(&self, item_id: &str) -> Result<Option<StoredBlob>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if item_id == "broken" {
                return Err(Error::Internal("disk on fire".to_string()));
            }
            Ok(self.blobs.get(item_id).cloned())
        }
    }

    fn item(id: &str) -> WardrobeItem {
        WardrobeItem {
            id: id.to_string(),
            name: None,
            category: Category::Tops,
            colors: vec![ColorTag::Multi],
            seasons: vec![],
            occasions: vec![],
            notes: None,
            created_at: 0,
            updated_at: 0,
            blob_key: WardrobeItem::blob_key_for(id),
            width: None,
            height: None,
            mime_type: None,
            usage_count: None,
        }
    }

    fn new_cache(ids: &[&str]) -> (ObjectUrlCache, Arc<MapSource>, Arc<MemoryUrlProvider>) {
        let source = Arc::new(MapSource::with(ids));
        let provider = Arc::new(MemoryUrlProvider::new());
        let cache = ObjectUrlCache::new(source.clone(), provider.clone());
        (cache, source, provider)
    }

    #[tokio::test]
    async fn test_resolve_is_memoized() {
        let (cache, source, provider) = new_cache(&["a"]);
        let first = cache.resolve(&item("a")).await.unwrap();
        let second = cache.resolve(&item("a")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(provider.live_count(), 1);
        assert_eq!(provider.get(&first).unwrap().bytes, b"a".to_vec());
    }

    #[tokio::test]
    async fn test_missing_or_unreadable_blob_is_none() {
        let (cache, _source, provider) = new_cache(&[]);
        assert_eq!(cache.resolve(&item("gone")).await, None);
        assert_eq!(cache.resolve(&item("broken")).await, None);
        assert!(cache.is_empty());
        assert_eq!(provider.live_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_resolve_keeps_one_handle() {
        let (cache, _source, provider) = new_cache(&["a"]);
        let a = item("a");
        let (x, y) = tokio::join!(cache.resolve(&a), cache.resolve(&a));

        assert_eq!(x, y);
        assert_eq!(cache.len(), 1);
        assert_eq!(provider.live_count(), 1);
    }

    #[tokio::test]
    async fn test_release_one() {
        let (cache, _source, provider) = new_cache(&["a", "b"]);
        cache.resolve(&item("a")).await.unwrap();
        cache.resolve(&item("b")).await.unwrap();

        assert!(cache.release("a"));
        assert!(!cache.release("a"));
        assert_eq!(provider.live_count(), 1);
    }

    #[tokio::test]
    async fn test_dispose_and_drop_release_everything() {
        let (cache, _source, provider) = new_cache(&["a", "b"]);
        cache.resolve(&item("a")).await.unwrap();
        cache.resolve(&item("b")).await.unwrap();
        assert_eq!(provider.live_count(), 2);

        cache.dispose();
        assert_eq!(provider.live_count(), 0);
        assert_eq!(cache.resolve(&item("a")).await, None);

        let (cache, _source, provider) = new_cache(&["c"]);
        cache.resolve(&item("c")).await.unwrap();
        drop(cache);
        assert_eq!(provider.live_count(), 0);
    }
}
