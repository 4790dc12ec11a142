//! Durable collection of saved outfits
//!
//! The whole collection is one JSON array under `saved_outfits` in the
//! `outfits` table. Every mutation writes the complete collection, the empty
//! one included, while holding the collection lock, so writes land in request
//! order. The in-memory copy is only replaced after the write succeeded.

use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;
use tracing::{debug, info};
use wardrobe_common::db::{OUTFITS, SAVED_OUTFITS_KEY};
use wardrobe_common::models::{Outfit, OutfitPatch};
use wardrobe_common::time::{next_stamp, now, now_millis};
use wardrobe_common::{uuid_utils, Error, EventBus, PlannerEvent, Result};

/// Valid outfit ratings
pub const RATING_RANGE: std::ops::RangeInclusive<u8> = 1..=5;

pub struct OutfitStore {
    pool: SqlitePool,
    event_bus: EventBus,
    outfits: Mutex<Vec<Outfit>>,
}

impl OutfitStore {
    /// Load the saved collection (empty when never written)
    pub async fn load(pool: SqlitePool, event_bus: EventBus) -> Result<Self> {
        let sql = format!("SELECT value FROM {} WHERE key = ?", OUTFITS);
        let row = sqlx::query(&sql)
            .bind(SAVED_OUTFITS_KEY)
            .fetch_optional(&pool)
            .await?;

        let outfits: Vec<Outfit> = match row {
            Some(row) => {
                let value: String = row.get("value");
                serde_json::from_str(&value)?
            }
            None => Vec::new(),
        };
        info!("Loaded {} saved outfit(s)", outfits.len());

        Ok(Self {
            pool,
            event_bus,
            outfits: Mutex::new(outfits),
        })
    }

    async fn persist(&self, outfits: &[Outfit]) -> Result<()> {
        let sql = format!(
            "INSERT OR REPLACE INTO {} (key, value) VALUES (?, ?)",
            OUTFITS
        );
        sqlx::query(&sql)
            .bind(SAVED_OUTFITS_KEY)
            .bind(serde_json::to_string(outfits)?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Apply `change` to a copy of the collection, persist it, then swap it in
    ///
    /// `change` returns false when it found nothing to do; nothing is written
    /// in that case.
    async fn mutate<F>(&self, change: F) -> Result<bool>
    where
        F: FnOnce(&mut Vec<Outfit>) -> bool,
    {
        let mut guard = self.outfits.lock().await;
        let mut next = guard.clone();
        if !change(&mut next) {
            return Ok(false);
        }

        self.persist(&next).await?;
        let total = next.len();
        *guard = next;
        drop(guard);

        self.event_bus.emit_lossy(PlannerEvent::OutfitsChanged {
            total,
            timestamp: now(),
        });
        Ok(true)
    }

    async fn modify<F>(&self, id: &str, edit: F) -> Result<bool>
    where
        F: FnOnce(&mut Outfit),
    {
        let changed = self
            .mutate(|outfits| match outfits.iter_mut().find(|o| o.id == id) {
                Some(outfit) => {
                    edit(outfit);
                    outfit.updated_at = next_stamp(outfit.updated_at);
                    true
                }
                None => false,
            })
            .await?;
        if !changed {
            debug!("No saved outfit {}", id);
        }
        Ok(changed)
    }

    /// Promote a candidate into the saved collection
    ///
    /// Assigns a fresh id when the candidate has none or its id is already
    /// saved, keeps a non-zero `createdAt` and stamps `updatedAt`.
    pub async fn save(&self, candidate: Outfit) -> Result<Outfit> {
        let mut saved = candidate;
        let mut result = None;

        self.mutate(|outfits| {
            if saved.id.is_empty() || outfits.iter().any(|o| o.id == saved.id) {
                saved.id = uuid_utils::new_id();
            }
            if saved.created_at == 0 {
                saved.created_at = now_millis();
            }
            saved.updated_at = next_stamp(saved.updated_at.max(saved.created_at));
            outfits.push(saved.clone());
            result = Some(saved);
            true
        })
        .await?;

        result.ok_or_else(|| Error::Internal("saved outfit was not recorded".to_string()))
    }

    /// Remove an outfit; unknown ids are a no-op
    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.mutate(|outfits| {
            let before = outfits.len();
            outfits.retain(|o| o.id != id);
            outfits.len() != before
        })
        .await
    }

    /// Merge a patch; unknown ids are a no-op
    pub async fn update(&self, id: &str, patch: &OutfitPatch) -> Result<bool> {
        if let Some(rating) = patch.rating {
            validate_rating(rating)?;
        }
        self.modify(id, |outfit| patch.apply_to(outfit)).await
    }

    /// Set a 1..=5 rating
    pub async fn rate(&self, id: &str, rating: u8) -> Result<bool> {
        validate_rating(rating)?;
        self.modify(id, |outfit| outfit.rating = Some(rating)).await
    }

    pub async fn toggle_favorite(&self, id: &str) -> Result<bool> {
        self.modify(id, |outfit| outfit.is_favorite = Some(!outfit.is_favorite()))
            .await
    }

    /// Saved outfits in save order
    pub async fn list(&self) -> Vec<Outfit> {
        self.outfits.lock().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<Outfit> {
        self.outfits
            .lock()
            .await
            .iter()
            .find(|o| o.id == id)
            .cloned()
    }

    pub async fn favorites(&self) -> Vec<Outfit> {
        self.outfits
            .lock()
            .await
            .iter()
            .filter(|o| o.is_favorite())
            .cloned()
            .collect()
    }

    /// Outfits saved for `occasion` (case-insensitive)
    pub async fn by_occasion(&self, occasion: &str) -> Vec<Outfit> {
        let wanted = occasion.trim();
        self.outfits
            .lock()
            .await
            .iter()
            .filter(|o| o.occasion.eq_ignore_ascii_case(wanted))
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.outfits.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn validate_rating(rating: u8) -> Result<()> {
    if RATING_RANGE.contains(&rating) {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "rating {} outside {}..={}",
            rating,
            RATING_RANGE.start(),
            RATING_RANGE.end()
        )))
    }
}
