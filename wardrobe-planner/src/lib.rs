//! wardrobe-planner library interface
//!
//! Wires the wardrobe services onto one database and event bus. The
//! `Wardrobe` facade is what the CLI drives; integration tests use it too.

pub mod clients;
pub mod services;
pub mod settings;

use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use wardrobe_common::config::{RootFolderInitializer, ServicesConfig};
use wardrobe_common::db::init_database;
use wardrobe_common::models::{Outfit, WardrobeItem};
use wardrobe_common::time::now_millis;
use wardrobe_common::{Error, EventBus, Result};

use crate::clients::{
    DetectorClient, FallbackTextGenerator, GeminiClient, LlmProxyClient, OpenWeatherClient,
    RestProfileClient, StaticWeatherProvider, TextGenerator, WeatherLocation, WeatherProvider,
    WeatherReport,
};
use crate::services::{
    CategoryComposer, GenerationOrchestrator, GenerationSettings, ImageLimits, ItemStore,
    ObjectUrlCache, OutfitStore, ProfileStore, UrlProvider, UsageStatistics, WardrobeFilter,
};
use crate::settings::RuntimeSettings;

/// Version, git hash, build timestamp and profile of this binary
pub fn build_info() -> String {
    format!(
        "{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    )
}

/// One planner instance: the stores, the generator and the optional clients
pub struct Wardrobe {
    pool: SqlitePool,
    event_bus: EventBus,
    settings: RuntimeSettings,
    items: Arc<ItemStore>,
    outfits: OutfitStore,
    generator: GenerationOrchestrator,
    profile: ProfileStore,
    weather: Arc<dyn WeatherProvider>,
    session_dir: PathBuf,
}

impl Wardrobe {
    /// Open (or create) the wardrobe under `root`
    pub async fn open(root: &Path, services: &ServicesConfig) -> Result<Self> {
        let initializer = RootFolderInitializer::new(root.to_path_buf());
        initializer.ensure_directory_exists()?;

        let db_path = initializer.database_path();
        info!("Database: {}", db_path.display());
        let pool = init_database(&db_path).await?;

        Self::with_pool(pool, services, initializer.session_path()).await
    }

    /// Build the services on an already initialized pool
    pub async fn with_pool(
        pool: SqlitePool,
        services: &ServicesConfig,
        session_dir: PathBuf,
    ) -> Result<Self> {
        let settings = RuntimeSettings::load(&pool).await?;
        settings.validate()?;

        let event_bus = EventBus::new(settings.event_bus_capacity);

        let mut item_store = ItemStore::new(
            pool.clone(),
            event_bus.clone(),
            ImageLimits::from_settings(&settings),
        );
        if let Some(url) = &services.detector_url {
            match DetectorClient::new(url.as_str()) {
                Ok(client) => item_store = item_store.with_classifier(Arc::new(client)),
                Err(e) => warn!("Detector disabled: {}", e),
            }
        }
        let items = Arc::new(item_store);

        let outfits = OutfitStore::load(pool.clone(), event_bus.clone()).await?;

        let mut generator = GenerationOrchestrator::new(
            items.clone(),
            Arc::new(CategoryComposer::default()),
            GenerationSettings::from_runtime(&settings),
            event_bus.clone(),
        );
        let text = text_generators(services, settings.llm_temperature);
        if !text.is_empty() {
            generator = generator.with_enricher(Arc::new(text));
        }

        let mut profile = ProfileStore::new(pool.clone());
        if let (Some(url), Some(key)) = (
            &services.profile_backend_url,
            &services.profile_backend_key,
        ) {
            match RestProfileClient::new(url.as_str(), key.as_str()) {
                Ok(client) => {
                    profile = profile.with_backend(Arc::new(client), services.profile_user_id.clone())
                }
                Err(e) => warn!("Profile sync disabled: {}", e),
            }
        }

        let weather: Arc<dyn WeatherProvider> = match &services.openweather_api_key {
            Some(key) => match OpenWeatherClient::new(key.as_str()) {
                Ok(client) => Arc::new(client),
                Err(e) => {
                    warn!("OpenWeather disabled: {}", e);
                    Arc::new(StaticWeatherProvider)
                }
            },
            None => Arc::new(StaticWeatherProvider),
        };

        info!(
            "Wardrobe ready (enrichment: {}, profile sync: {})",
            if text_configured(services) { "on" } else { "off" },
            if profile.is_syncing() { "on" } else { "off" }
        );

        Ok(Self {
            pool,
            event_bus,
            settings,
            items,
            outfits,
            generator,
            profile,
            weather,
            session_dir,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    pub fn items(&self) -> &ItemStore {
        &self.items
    }

    pub fn outfits(&self) -> &OutfitStore {
        &self.outfits
    }

    pub fn generator(&self) -> &GenerationOrchestrator {
        &self.generator
    }

    pub fn profile(&self) -> &ProfileStore {
        &self.profile
    }

    /// Directory for session-scoped image handles
    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    /// Replace the generator, e.g. with a seeded one
    pub fn set_generator(&mut self, generator: GenerationOrchestrator) {
        self.generator = generator;
    }

    /// Orchestrator over this wardrobe's items with the default composer
    pub fn new_generator(&self) -> GenerationOrchestrator {
        GenerationOrchestrator::new(
            self.items.clone(),
            Arc::new(CategoryComposer::default()),
            GenerationSettings::from_runtime(&self.settings),
            self.event_bus.clone(),
        )
    }

    /// Save an outfit and count one more use of each of its items
    ///
    /// The outfit stays saved when the usage update fails.
    pub async fn save_outfit(&self, candidate: Outfit) -> Result<Outfit> {
        let saved = self.outfits.save(candidate).await?;
        if let Err(e) = self.items.increment_usage(&saved.item_ids()).await {
            warn!("Usage count not updated for outfit {}: {}", saved.id, e);
        }
        Ok(saved)
    }

    /// Save the candidate at `index` of the current generated batch
    pub async fn save_generated(&self, index: usize) -> Result<Outfit> {
        let candidate = self
            .generator
            .generated()
            .into_iter()
            .nth(index)
            .ok_or_else(|| Error::NotFound(format!("generated outfit #{}", index + 1)))?;
        self.save_outfit(candidate).await
    }

    /// Current items passed through `filter`
    pub async fn view(&self, filter: &WardrobeFilter) -> Result<Vec<WardrobeItem>> {
        let items = self.items.list_items().await?;
        Ok(filter.apply(&items))
    }

    pub async fn statistics(&self) -> Result<UsageStatistics> {
        let items = self.items.list_items().await?;
        let outfits = self.outfits.list().await;
        Ok(UsageStatistics::compute(&items, &outfits, now_millis()))
    }

    /// Weather for `location`; the built-in table stands in when the
    /// configured provider has no answer
    pub async fn weather(&self, location: &WeatherLocation) -> WeatherReport {
        match self.weather.fetch_weather(location).await {
            Some(report) => report,
            None => StaticWeatherProvider.lookup(location),
        }
    }

    /// Image handle cache over this wardrobe's blobs
    pub fn url_cache(&self, provider: Arc<dyn UrlProvider>) -> ObjectUrlCache {
        ObjectUrlCache::new(self.items.clone(), provider)
    }
}

fn text_configured(services: &ServicesConfig) -> bool {
    services.llm_proxy_url.is_some() || services.gemini_api_key.is_some()
}

/// Proxy first, then Gemini
fn text_generators(services: &ServicesConfig, temperature: f32) -> FallbackTextGenerator {
    let mut generators: Vec<Arc<dyn TextGenerator>> = Vec::new();

    if let Some(url) = &services.llm_proxy_url {
        match LlmProxyClient::new(url.as_str(), temperature) {
            Ok(client) => generators.push(Arc::new(client)),
            Err(e) => warn!("LLM proxy disabled: {}", e),
        }
    }
    if let Some(key) = &services.gemini_api_key {
        match GeminiClient::new(
            key.as_str(),
            services.gemini_model.clone(),
            services.gemini_api_url.clone(),
            temperature,
        ) {
            Ok(client) => generators.push(Arc::new(client)),
            Err(e) => warn!("Gemini disabled: {}", e),
        }
    }

    FallbackTextGenerator::new(generators)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_generators_follow_configuration() {
        assert!(text_generators(&ServicesConfig::default(), 0.2).is_empty());

        let services = ServicesConfig {
            llm_proxy_url: Some("http://127.0.0.1:9/generate".to_string()),
            gemini_api_key: Some("key".to_string()),
            ..Default::default()
        };
        assert!(!text_generators(&services, 0.2).is_empty());
        assert!(text_configured(&services));
    }

    #[test]
    fn test_build_info_names_version() {
        assert!(build_info().starts_with(env!("CARGO_PKG_VERSION")));
    }
}
