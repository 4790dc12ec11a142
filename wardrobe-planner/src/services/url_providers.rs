//! Handle providers for the object URL cache

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};
use wardrobe_common::{uuid_utils, Result};

use super::item_store::StoredBlob;
use super::object_url_cache::{ObjectUrl, UrlProvider};

/// In-process `blob:` registry; handles stay valid until released
#[derive(Debug, Default)]
pub struct MemoryUrlProvider {
    registry: Mutex<HashMap<String, StoredBlob>>,
}

impl MemoryUrlProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payload behind a live handle
    pub fn get(&self, url: &ObjectUrl) -> Option<StoredBlob> {
        self.registry
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(url.as_str())
            .cloned()
    }

    /// Number of handles not yet released
    pub fn live_count(&self) -> usize {
        self.registry.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl UrlProvider for MemoryUrlProvider {
    async fn create(&self, _item_id: &str, blob: &StoredBlob) -> Result<ObjectUrl> {
        let url = ObjectUrl::new(format!("blob:wardrobe/{}", uuid_utils::new_id()));
        self.registry
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(url.as_str().to_string(), blob.clone());
        Ok(url)
    }

    fn release(&self, url: &ObjectUrl) {
        self.registry
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(url.as_str());
    }
}

/// Writes each payload to a session directory and hands out `file://` URLs.
/// Releasing a handle deletes its file.
#[derive(Debug, Clone)]
pub struct SessionDirUrlProvider {
    dir: PathBuf,
}

impl SessionDirUrlProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn extension_for(mime_type: &str) -> &'static str {
        match mime_type {
            "image/png" => "png",
            "image/jpeg" => "jpg",
            "image/webp" => "webp",
            "image/heic" => "heic",
            "image/heif" => "heif",
            _ => "bin",
        }
    }

    fn path_of(url: &ObjectUrl) -> Option<PathBuf> {
        url.as_str().strip_prefix("file://").map(PathBuf::from)
    }
}

#[async_trait]
impl UrlProvider for SessionDirUrlProvider {
    async fn create(&self, item_id: &str, blob: &StoredBlob) -> Result<ObjectUrl> {
        let file_name = format!(
            "{}-{}.{}",
            item_id,
            uuid_utils::new_id(),
            Self::extension_for(&blob.mime_type)
        );
        let path = self.dir.join(file_name);
        tokio::fs::write(&path, &blob.bytes).await?;
        debug!("Wrote session image {}", path.display());
        Ok(ObjectUrl::new(format!("file://{}", path.display())))
    }

    fn release(&self, url: &ObjectUrl) {
        let Some(path) = Self::path_of(url) else {
            return;
        };
        if let Err(e) = std::fs::remove_file(&path) {
            warn!("Failed to remove session image {}: {}", path.display(), e);
        }
    }
}
