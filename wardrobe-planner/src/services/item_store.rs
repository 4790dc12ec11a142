//! Durable wardrobe item storage
//!
//! Metadata lives in `wardrobe_meta` (JSON keyed by item id) and image bytes
//! in `wardrobe_blobs` (keyed by `blob_{id}`). Both rows of an item are
//! written and removed in one transaction, blob first, so metadata never
//! points at a missing blob.

use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use tracing::{debug, info, warn};
use wardrobe_common::models::{Category, ColorTag, ItemPatch, WardrobeItem};
use wardrobe_common::time::{next_stamp, now, now_millis};
use wardrobe_common::{uuid_utils, Error, EventBus, PlannerEvent, Result};

use super::image_processing::{self, ImageLimits, ProcessedImage, UploadFile};
use crate::clients::{category_for_label, ImageClassifier};

/// A file that was not stored, and why
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedUpload {
    pub name: String,
    pub reason: String,
}

/// Outcome of a batch upload
#[derive(Debug, Clone, Default)]
pub struct UploadReport {
    pub added: Vec<WardrobeItem>,
    pub rejected: Vec<RejectedUpload>,
}

/// Stored image payload
#[derive(Debug, Clone, PartialEq)]
pub struct StoredBlob {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Wardrobe item store backed by the two wardrobe tables
pub struct ItemStore {
    pool: SqlitePool,
    event_bus: EventBus,
    limits: ImageLimits,
    classifier: Option<Arc<dyn ImageClassifier>>,
}

impl ItemStore {
    pub fn new(pool: SqlitePool, event_bus: EventBus, limits: ImageLimits) -> Self {
        Self {
            pool,
            event_bus,
            limits,
            classifier: None,
        }
    }

    /// Auto-tag uploads with `classifier`
    pub fn with_classifier(mut self, classifier: Arc<dyn ImageClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn limits(&self) -> &ImageLimits {
        &self.limits
    }

    /// Validate, normalize and store one upload
    pub async fn add_item(&self, file: UploadFile) -> Result<WardrobeItem> {
        let item = self.store_upload(file).await?;
        self.event_bus.emit_lossy(PlannerEvent::ItemsAdded {
            item_ids: vec![item.id.clone()],
            timestamp: now(),
        });
        Ok(item)
    }

    /// Store a batch of uploads
    ///
    /// Files failing validation are reported and skipped; the rest of the
    /// batch continues. Storage failures abort the batch.
    pub async fn add_files(&self, files: Vec<UploadFile>) -> Result<UploadReport> {
        let mut report = UploadReport::default();

        for file in files {
            let name = file.name.clone();
            match self.store_upload(file).await {
                Ok(item) => report.added.push(item),
                Err(Error::Validation(reason)) => {
                    warn!("Rejected upload {}: {}", name, reason);
                    report.rejected.push(RejectedUpload { name, reason });
                }
                Err(e) => return Err(e),
            }
        }

        if !report.added.is_empty() {
            self.event_bus.emit_lossy(PlannerEvent::ItemsAdded {
                item_ids: report.added.iter().map(|i| i.id.clone()).collect(),
                timestamp: now(),
            });
        }
        info!(
            "Upload batch: {} added, {} rejected",
            report.added.len(),
            report.rejected.len()
        );
        Ok(report)
    }

    async fn store_upload(&self, file: UploadFile) -> Result<WardrobeItem> {
        let kind = image_processing::validate(&file, &self.limits)?;
        let processed =
            image_processing::process_upload(file.bytes, kind, self.limits).await?;

        let category = self
            .classify(&processed, &file.name)
            .await
            .unwrap_or(Category::Tops);
        let colors = processed
            .dominant_color
            .map(|c| vec![c])
            .unwrap_or_else(|| vec![ColorTag::Multi]);

        let id = uuid_utils::new_id();
        let stamp = now_millis();
        let item = WardrobeItem {
            blob_key: WardrobeItem::blob_key_for(&id),
            id,
            name: Some(file.name),
            category,
            colors,
            seasons: Vec::new(),
            occasions: Vec::new(),
            notes: None,
            created_at: stamp,
            updated_at: stamp,
            width: processed.width,
            height: processed.height,
            mime_type: Some(processed.mime_type.clone()),
            usage_count: Some(0),
        };

        let value = serde_json::to_string(&item)?;
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT OR REPLACE INTO wardrobe_blobs (key, value, mime_type) VALUES (?, ?, ?)")
            .bind(&item.blob_key)
            .bind(&processed.bytes)
            .bind(&processed.mime_type)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT OR REPLACE INTO wardrobe_meta (key, value, created_at) VALUES (?, ?, ?)")
            .bind(&item.id)
            .bind(&value)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!(
            "Stored item {} ({}, {} bytes, {})",
            item.id,
            item.category,
            processed.bytes.len(),
            processed.mime_type
        );
        Ok(item)
    }

    /// Best-effort category from the classifier
    async fn classify(&self, image: &ProcessedImage, file_name: &str) -> Option<Category> {
        let classifier = self.classifier.as_ref()?;
        match classifier
            .classify(&image.bytes, file_name, &image.mime_type)
            .await
        {
            Ok(label) => label.map(|l| category_for_label(&l)),
            Err(e) => {
                warn!("Classification of {} failed: {}", file_name, e);
                None
            }
        }
    }

    /// Merge `patch` into an item and bump `updatedAt`
    ///
    /// Unknown ids are a silent no-op. A patch that empties `colors` is
    /// rejected since every item keeps at least one color tag.
    pub async fn update_item(&self, id: &str, patch: &ItemPatch) -> Result<()> {
        if matches!(&patch.colors, Some(colors) if colors.is_empty()) {
            return Err(Error::InvalidInput("an item needs at least one color".to_string()));
        }

        let Some(mut item) = self.get_item(id).await? else {
            debug!("update_item: unknown id {}", id);
            return Ok(());
        };

        patch.apply_to(&mut item);
        item.updated_at = next_stamp(item.updated_at);

        sqlx::query("UPDATE wardrobe_meta SET value = ? WHERE key = ?")
            .bind(serde_json::to_string(&item)?)
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.event_bus.emit_lossy(PlannerEvent::ItemUpdated {
            item_id: id.to_string(),
            timestamp: now(),
        });
        Ok(())
    }

    /// Add one use to each item (items used in a saved outfit)
    pub async fn increment_usage(&self, ids: &[String]) -> Result<()> {
        for id in ids {
            if let Some(item) = self.get_item(id).await? {
                let patch = ItemPatch {
                    usage_count: Some(item.usage_count.unwrap_or(0).saturating_add(1)),
                    ..Default::default()
                };
                self.update_item(id, &patch).await?;
            }
        }
        Ok(())
    }

    /// Remove metadata and blob of each id
    ///
    /// Absent ids are skipped; a failure on one id is logged and does not
    /// stop the others. An empty slice performs no write. Returns the number
    /// of items removed.
    pub async fn delete_items(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut removed = Vec::new();
        for id in ids {
            match self.delete_one(id).await {
                Ok(true) => removed.push(id.clone()),
                Ok(false) => debug!("delete_items: {} already absent", id),
                Err(e) => warn!("Failed to delete item {}: {}", id, e),
            }
        }

        if !removed.is_empty() {
            info!("Deleted {} item(s)", removed.len());
            self.event_bus.emit_lossy(PlannerEvent::ItemsDeleted {
                item_ids: removed.clone(),
                timestamp: now(),
            });
        }
        Ok(removed.len())
    }

    async fn delete_one(&self, id: &str) -> Result<bool> {
        // An unreadable row still names its blob by the derived key
        let row = sqlx::query("SELECT value FROM wardrobe_meta WHERE key = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let blob_key = row
            .and_then(|r| serde_json::from_str::<WardrobeItem>(r.get::<String, _>("value").as_str()).ok())
            .map(|item| item.blob_key)
            .unwrap_or_else(|| WardrobeItem::blob_key_for(id));

        let mut tx = self.pool.begin().await?;
        let meta = sqlx::query("DELETE FROM wardrobe_meta WHERE key = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let blob = sqlx::query("DELETE FROM wardrobe_blobs WHERE key = ?")
            .bind(&blob_key)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(meta.rows_affected() + blob.rows_affected() > 0)
    }

    /// All items, newest first
    ///
    /// Rows that no longer deserialize are skipped with a warning.
    pub async fn list_items(&self) -> Result<Vec<WardrobeItem>> {
        let rows = sqlx::query("SELECT key, value FROM wardrobe_meta ORDER BY created_at DESC, key ASC")
            .fetch_all(&self.pool)
            .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let key: String = row.get("key");
            let value: String = row.get("value");
            match serde_json::from_str::<WardrobeItem>(&value) {
                Ok(item) => items.push(item),
                Err(e) => warn!("Skipping unreadable wardrobe item {}: {}", key, e),
            }
        }
        Ok(items)
    }

    pub async fn get_item(&self, id: &str) -> Result<Option<WardrobeItem>> {
        let row = sqlx::query("SELECT value FROM wardrobe_meta WHERE key = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let value: String = row.get("value");
                Ok(Some(serde_json::from_str(&value)?))
            }
            None => Ok(None),
        }
    }

    /// Image payload of an item; `None` once the item is deleted
    pub async fn get_blob(&self, item_id: &str) -> Result<Option<StoredBlob>> {
        let row = sqlx::query("SELECT value, mime_type FROM wardrobe_blobs WHERE key = ?")
            .bind(WardrobeItem::blob_key_for(item_id))
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| StoredBlob {
            bytes: row.get("value"),
            mime_type: row.get("mime_type"),
        }))
    }

    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM wardrobe_meta")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }

    /// Empty both wardrobe tables
    pub async fn clear_all(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM wardrobe_meta")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM wardrobe_blobs")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!("Cleared wardrobe");
        self.event_bus.emit_lossy(PlannerEvent::WardrobeCleared { timestamp: now() });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ClientError;
    use async_trait::async_trait;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use wardrobe_common::db::init_memory_database;
    use wardrobe_common::models::Occasion;

    fn png_upload(name: &str, color: [u8; 3]) -> UploadFile {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 6, Rgb(color)));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
        UploadFile::new(name, Some("image/png".to_string()), bytes)
    }

    async fn store() -> ItemStore {
        let pool = init_memory_database().await.unwrap();
        ItemStore::new(pool, EventBus::default(), ImageLimits::default())
    }

    struct FixedLabel(Option<&'static str>);

    #[async_trait]
    impl ImageClassifier for FixedLabel {
        async fn classify(
            &self,
            _bytes: &[u8],
            _file_name: &str,
            _mime_type: &str,
        ) -> std::result::Result<Option<String>, ClientError> {
            Ok(self.0.map(str::to_string))
        }
    }

    struct Unreachable;

    #[async_trait]
    impl ImageClassifier for Unreachable {
        async fn classify(
            &self,
            _bytes: &[u8],
            _file_name: &str,
            _mime_type: &str,
        ) -> std::result::Result<Option<String>, ClientError> {
            Err(ClientError::Network("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_add_item_defaults() {
        let store = store().await;
        let item = store.add_item(png_upload("shirt.png", [200, 30, 30])).await.unwrap();

        assert_eq!(item.category, Category::Tops);
        assert_eq!(item.colors, vec![ColorTag::Red]);
        assert!(item.seasons.is_empty());
        assert!(item.occasions.is_empty());
        assert_eq!(item.name.as_deref(), Some("shirt.png"));
        assert_eq!(item.blob_key, format!("blob_{}", item.id));
        assert_eq!((item.width, item.height), (Some(8), Some(6)));
        assert_eq!(item.usage_count, Some(0));

        let blob = store.get_blob(&item.id).await.unwrap().unwrap();
        assert_eq!(blob.mime_type, "image/png");
        assert_eq!(store.get_item(&item.id).await.unwrap(), Some(item));
    }

    #[tokio::test]
    async fn test_classifier_label_sets_category() {
        let store = store().await.with_classifier(Arc::new(FixedLabel(Some("Leather Boots"))));
        let item = store.add_item(png_upload("b.png", [10, 10, 10])).await.unwrap();
        assert_eq!(item.category, Category::Shoes);
    }

    #[tokio::test]
    async fn test_classifier_failure_keeps_default() {
        let store = store().await.with_classifier(Arc::new(Unreachable));
        let item = store.add_item(png_upload("x.png", [10, 10, 10])).await.unwrap();
        assert_eq!(item.category, Category::Tops);
    }

    #[tokio::test]
    async fn test_batch_continues_past_rejected_file() {
        let store = store().await;
        let files = vec![
            png_upload("a.png", [0, 0, 0]),
            UploadFile::new("notes.txt", Some("text/plain".to_string()), b"hello".to_vec()),
            png_upload("b.png", [245, 245, 245]),
        ];

        let report = store.add_files(files).await.unwrap();
        assert_eq!(report.added.len(), 2);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].name, "notes.txt");
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_noop() {
        let store = store().await;
        let patch = ItemPatch {
            name: Some("x".to_string()),
            ..Default::default()
        };
        store.update_item("missing", &patch).await.unwrap();
        assert!(store.list_items().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_merges_and_bumps_timestamp() {
        let store = store().await;
        let item = store.add_item(png_upload("a.png", [0, 0, 0])).await.unwrap();

        let patch = ItemPatch {
            occasions: Some(vec![Occasion::Work]),
            ..Default::default()
        };
        store.update_item(&item.id, &patch).await.unwrap();

        let updated = store.get_item(&item.id).await.unwrap().unwrap();
        assert_eq!(updated.occasions, vec![Occasion::Work]);
        assert_eq!(updated.name, item.name);
        assert_eq!(updated.colors, item.colors);
        assert!(updated.updated_at > item.updated_at);
        assert_eq!(updated.created_at, item.created_at);
    }

    #[tokio::test]
    async fn test_update_rejects_empty_colors() {
        let store = store().await;
        let item = store.add_item(png_upload("a.png", [0, 0, 0])).await.unwrap();
        let patch = ItemPatch {
            colors: Some(Vec::new()),
            ..Default::default()
        };
        assert!(matches!(
            store.update_item(&item.id, &patch).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_increment_usage() {
        let store = store().await;
        let item = store.add_item(png_upload("a.png", [0, 0, 0])).await.unwrap();
        store.increment_usage(&[item.id.clone(), "gone".to_string()]).await.unwrap();
        store.increment_usage(&[item.id.clone()]).await.unwrap();

        let updated = store.get_item(&item.id).await.unwrap().unwrap();
        assert_eq!(updated.usage_count, Some(2));
    }

    #[tokio::test]
    async fn test_delete_removes_meta_and_blob() {
        let store = store().await;
        let keep = store.add_item(png_upload("keep.png", [0, 0, 0])).await.unwrap();
        let gone = store.add_item(png_upload("gone.png", [0, 0, 0])).await.unwrap();

        let removed = store
            .delete_items(&[gone.id.clone(), "never-existed".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let ids: Vec<String> = store.list_items().await.unwrap().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![keep.id.clone()]);
        assert_eq!(store.get_blob(&gone.id).await.unwrap(), None);
        assert!(store.get_blob(&keep.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_empty_slice_emits_nothing() {
        let store = store().await;
        store.add_item(png_upload("a.png", [0, 0, 0])).await.unwrap();
        let mut rx = store.event_bus.subscribe();

        assert_eq!(store.delete_items(&[]).await.unwrap(), 0);
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_list_skips_unreadable_rows() {
        let store = store().await;
        store.add_item(png_upload("a.png", [0, 0, 0])).await.unwrap();
        sqlx::query("INSERT INTO wardrobe_meta (key, value, created_at) VALUES ('bad', '{not json', 0)")
            .execute(&store.pool)
            .await
            .unwrap();

        assert_eq!(store.list_items().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_unreadable_row_removes_meta_and_blob() {
        let store = store().await;
        sqlx::query("INSERT INTO wardrobe_meta (key, value, created_at) VALUES ('bad', '{not json', 0)")
            .execute(&store.pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO wardrobe_blobs (key, value, mime_type) VALUES ('blob_bad', x'00', 'image/png')")
            .execute(&store.pool)
            .await
            .unwrap();

        let removed = store.delete_items(&["bad".to_string()]).await.unwrap();

        assert_eq!(removed, 1);
        assert_eq!(store.count().await.unwrap(), 0);
        assert_eq!(store.get_blob("bad").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clear_all() {
        let store = store().await;
        let item = store.add_item(png_upload("a.png", [0, 0, 0])).await.unwrap();
        store.clear_all().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        assert_eq!(store.get_blob(&item.id).await.unwrap(), None);
    }
}
