//! Runtime settings loaded from the database
//!
//! Every setting has a built-in default. Missing or NULL values are
//! initialized with that default and written back, so the `settings` table
//! always documents the values in effect.

use sqlx::SqlitePool;
use std::time::Duration;
use tracing::{info, warn};
use wardrobe_common::db::{get_setting, set_setting};
use wardrobe_common::{Error, Result};

/// Runtime settings with built-in defaults
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeSettings {
    // === Uploads ===
    /// Largest accepted upload, in megabytes
    pub upload_max_mb: u64,
    /// Longest side of a stored image, in pixels
    pub image_max_dimension: u32,
    /// Lossy re-encoding quality in (0, 1]
    pub image_quality: f32,

    // === Generation ===
    pub generation_batch_min: usize,
    pub generation_batch_max: usize,
    pub enrichment_timeout_ms: u64,
    pub llm_temperature: f32,

    // === Events ===
    pub event_bus_capacity: usize,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            upload_max_mb: 15,
            image_max_dimension: 2048,
            image_quality: 0.8,
            generation_batch_min: 3,
            generation_batch_max: 5,
            enrichment_timeout_ms: 10_000,
            llm_temperature: 0.2,
            event_bus_capacity: 100,
        }
    }
}

impl RuntimeSettings {
    /// Load runtime settings from database
    ///
    /// For each setting:
    /// 1. Try to read from database
    /// 2. If NULL or missing, use built-in default and write it back
    /// 3. If unparseable, warn and use the default (the stored value is kept)
    pub async fn load(pool: &SqlitePool) -> Result<Self> {
        async fn get_or_init<T>(pool: &SqlitePool, key: &str, default: T) -> Result<T>
        where
            T: std::str::FromStr + ToString,
        {
            match get_setting(pool, key).await? {
                Some(value) => match value.trim().parse::<T>() {
                    Ok(parsed) => Ok(parsed),
                    Err(_) => {
                        warn!(
                            "Invalid value '{}' for setting '{}', using default {}",
                            value,
                            key,
                            default.to_string()
                        );
                        Ok(default)
                    }
                },
                None => {
                    info!(
                        "Setting '{}' not found in database, using default: {}",
                        key,
                        default.to_string()
                    );
                    set_setting(pool, key, &default.to_string()).await?;
                    Ok(default)
                }
            }
        }

        let defaults = Self::default();
        let settings = Self {
            upload_max_mb: get_or_init(pool, "upload_max_mb", defaults.upload_max_mb).await?,
            image_max_dimension: get_or_init(pool, "image_max_dimension", defaults.image_max_dimension)
                .await?,
            image_quality: get_or_init(pool, "image_quality", defaults.image_quality).await?,
            generation_batch_min: get_or_init(pool, "generation_batch_min", defaults.generation_batch_min)
                .await?,
            generation_batch_max: get_or_init(pool, "generation_batch_max", defaults.generation_batch_max)
                .await?,
            enrichment_timeout_ms: get_or_init(pool, "enrichment_timeout_ms", defaults.enrichment_timeout_ms)
                .await?,
            llm_temperature: get_or_init(pool, "llm_temperature", defaults.llm_temperature).await?,
            event_bus_capacity: get_or_init(pool, "event_bus_capacity", defaults.event_bus_capacity)
                .await?,
        };

        settings.validate()?;
        info!("Loaded runtime settings from database");
        Ok(settings)
    }

    /// Reject combinations no service can work with
    pub fn validate(&self) -> Result<()> {
        if self.generation_batch_min == 0 || self.generation_batch_min > self.generation_batch_max {
            return Err(Error::Config(format!(
                "generation batch range {}..={} is empty",
                self.generation_batch_min, self.generation_batch_max
            )));
        }
        if !(self.image_quality > 0.0 && self.image_quality <= 1.0) {
            return Err(Error::Config(format!(
                "image_quality {} outside (0, 1]",
                self.image_quality
            )));
        }
        if self.image_max_dimension == 0 {
            return Err(Error::Config("image_max_dimension must be positive".to_string()));
        }
        Ok(())
    }

    pub fn upload_max_bytes(&self) -> u64 {
        self.upload_max_mb.saturating_mul(1024 * 1024)
    }

    pub fn enrichment_timeout(&self) -> Duration {
        Duration::from_millis(self.enrichment_timeout_ms)
    }
}
