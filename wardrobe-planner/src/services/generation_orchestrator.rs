//! Outfit generation
//!
//! Drives the composer for a batch of candidates per request and keeps the
//! latest batch in memory. Generation runs `idle -> generating -> idle`; a
//! request arriving while another is in flight is rejected with
//! `Error::Busy`. The optional rationale call is bounded by a timeout and
//! never fails generation.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};
use wardrobe_common::models::{GenerationParams, Outfit, WardrobeItem};
use wardrobe_common::time::{now, now_millis};
use wardrobe_common::{uuid_utils, Error, EventBus, PlannerEvent, Result};

use super::item_store::ItemStore;
use super::outfit_composer::OutfitComposer;
use crate::clients::TextGenerator;
use crate::settings::RuntimeSettings;

/// Categories named in the rationale prompt
const PROMPT_CATEGORY_LIMIT: usize = 10;

/// Point-in-time view of the wardrobe
#[async_trait]
pub trait ItemSource: Send + Sync {
    async fn snapshot_items(&self) -> Result<Vec<WardrobeItem>>;
}

#[async_trait]
impl ItemSource for ItemStore {
    async fn snapshot_items(&self) -> Result<Vec<WardrobeItem>> {
        self.list_items().await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationSettings {
    pub batch_min: usize,
    pub batch_max: usize,
    pub enrichment_timeout: Duration,
}

impl GenerationSettings {
    pub fn from_runtime(settings: &RuntimeSettings) -> Self {
        Self {
            batch_min: settings.generation_batch_min,
            batch_max: settings.generation_batch_max,
            enrichment_timeout: settings.enrichment_timeout(),
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self::from_runtime(&RuntimeSettings::default())
    }
}

/// Clears the generating flag when dropped
struct GeneratingGuard<'a>(&'a AtomicBool);

impl<'a> GeneratingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GeneratingGuard(flag))
    }
}

impl Drop for GeneratingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct GenerationOrchestrator {
    items: Arc<dyn ItemSource>,
    composer: Arc<dyn OutfitComposer>,
    enricher: Option<Arc<dyn TextGenerator>>,
    settings: GenerationSettings,
    event_bus: EventBus,
    rng: Mutex<StdRng>,
    generated: Mutex<Vec<Outfit>>,
    generating: AtomicBool,
}

impl GenerationOrchestrator {
    pub fn new(
        items: Arc<dyn ItemSource>,
        composer: Arc<dyn OutfitComposer>,
        settings: GenerationSettings,
        event_bus: EventBus,
    ) -> Self {
        Self {
            items,
            composer,
            enricher: None,
            settings,
            event_bus,
            rng: Mutex::new(StdRng::from_entropy()),
            generated: Mutex::new(Vec::new()),
            generating: AtomicBool::new(false),
        }
    }

    /// Attach rationale text from `enricher` to each batch
    pub fn with_enricher(mut self, enricher: Arc<dyn TextGenerator>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    /// Use a deterministic random source
    pub fn with_seed(self, seed: u64) -> Self {
        self.with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    pub fn is_generating(&self) -> bool {
        self.generating.load(Ordering::Acquire)
    }

    /// Latest batch of candidates
    pub fn generated(&self) -> Vec<Outfit> {
        self.generated.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Discard the latest batch; saved outfits are unaffected
    pub fn clear_generated(&self) {
        self.generated.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.event_bus
            .emit_lossy(PlannerEvent::GeneratedCleared { timestamp: now() });
    }

    /// Generate a new batch, replacing the previous one
    ///
    /// Compositions that come back empty are skipped, so the batch may hold
    /// fewer candidates than drawn, or none.
    pub async fn generate(&self, params: &GenerationParams) -> Result<Vec<Outfit>> {
        let Some(_guard) = GeneratingGuard::acquire(&self.generating) else {
            return Err(Error::Busy("outfit generation already in progress".to_string()));
        };

        self.event_bus.emit_lossy(PlannerEvent::GenerationStarted {
            occasion: params.occasion.clone(),
            timestamp: now(),
        });

        let pool = match self.items.snapshot_items().await {
            Ok(pool) => pool,
            Err(e) => {
                warn!("Generation aborted, cannot read wardrobe: {}", e);
                self.event_bus.emit_lossy(PlannerEvent::GenerationFailed {
                    reason: e.to_string(),
                    timestamp: now(),
                });
                return Err(e);
            }
        };

        let mut candidates = self.compose_batch(&pool, params);

        let mut enriched = false;
        if !candidates.is_empty() {
            if let Some(notes) = self.enrich(params, &candidates).await {
                for candidate in &mut candidates {
                    candidate.notes = Some(notes.clone());
                }
                enriched = true;
            }
        }

        *self.generated.lock().unwrap_or_else(|e| e.into_inner()) = candidates.clone();

        info!(
            "Generated {} outfit candidate(s) for '{}'{}",
            candidates.len(),
            params.occasion,
            if enriched { " with rationale" } else { "" }
        );
        self.event_bus.emit_lossy(PlannerEvent::GenerationCompleted {
            candidates: candidates.len(),
            enriched,
            timestamp: now(),
        });
        Ok(candidates)
    }

    fn compose_batch(&self, pool: &[WardrobeItem], params: &GenerationParams) -> Vec<Outfit> {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let (low, high) = (self.settings.batch_min, self.settings.batch_max.max(self.settings.batch_min));
        let count = rng.gen_range(low..=high);
        debug!("Composing {} outfit(s) from {} item(s)", count, pool.len());

        let mut candidates = Vec::with_capacity(count);
        for i in 0..count {
            let items = self.composer.compose(pool, params, &mut *rng);
            if items.is_empty() {
                debug!("Composition {} produced no items, skipping", i + 1);
                continue;
            }
            let stamp = now_millis();
            candidates.push(Outfit {
                id: uuid_utils::new_id(),
                name: format!("{} Outfit {}", params.occasion, i + 1),
                items,
                occasion: params.occasion.clone(),
                mood: params.mood,
                rating: None,
                created_at: stamp,
                updated_at: stamp,
                notes: None,
                is_favorite: None,
            });
        }
        candidates
    }

    /// One consolidated rationale for the whole batch
    async fn enrich(&self, params: &GenerationParams, candidates: &[Outfit]) -> Option<String> {
        let enricher = self.enricher.as_ref()?;
        let prompt = rationale_prompt(params, candidates);

        match tokio::time::timeout(self.settings.enrichment_timeout, enricher.generate_text(&prompt)).await {
            Ok(Ok(text)) => {
                let text = text.trim();
                (!text.is_empty()).then(|| text.to_string())
            }
            Ok(Err(e)) => {
                warn!("Outfit rationale from '{}' failed: {}", enricher.name(), e);
                None
            }
            Err(_) => {
                warn!(
                    "Outfit rationale from '{}' timed out after {:?}",
                    enricher.name(),
                    self.settings.enrichment_timeout
                );
                None
            }
        }
    }
}

/// Prompt asking for short outfit descriptions
pub fn rationale_prompt(params: &GenerationParams, candidates: &[Outfit]) -> String {
    let categories: Vec<&str> = candidates
        .iter()
        .flat_map(|o| o.items.iter().map(|i| i.category.as_str()))
        .take(PROMPT_CATEGORY_LIMIT)
        .collect();
    let categories = if categories.is_empty() {
        "tops, bottoms, shoes, accessories, outerwear".to_string()
    } else {
        categories.join(", ")
    };

    let mut lines = vec![
        "You are a helpful fashion assistant. Given detected wardrobe categories and an occasion, \
         propose 3 short outfit descriptions (title + 1-2 sentence rationale)."
            .to_string(),
        format!("Occasion: {}", params.occasion),
    ];
    if let Some(mood) = params.mood {
        lines.push(format!("Mood: {}", mood));
    }
    if let Some(weather) = &params.weather {
        lines.push(format!("Weather: {}C {}", weather.temp, weather.condition));
    }
    lines.push(format!("Available categories/examples: {}", categories));
    lines.push("Return concise suggestions separated by blank lines.".to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ClientError;
    use crate::services::outfit_composer::CategoryComposer;
    use rand::RngCore;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;
    use wardrobe_common::models::{Category, ColorTag, Mood};

    fn item(id: &str, category: Category) -> WardrobeItem {
        WardrobeItem {
            id: id.to_string(),
            name: None,
            category,
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

    struct FixedItems(Vec<WardrobeItem>);

    #[async_trait]
    impl ItemSource for FixedItems {
        async fn snapshot_items(&self) -> Result<Vec<WardrobeItem>> {
            Ok(self.0.clone())
        }
    }

    struct BrokenItems;

    #[async_trait]
    impl ItemSource for BrokenItems {
        async fn snapshot_items(&self) -> Result<Vec<WardrobeItem>> {
            Err(Error::Internal("database unavailable".to_string()))
        }
    }

    struct EmptyComposer;

    impl OutfitComposer for EmptyComposer {
        fn compose(
            &self,
            _pool: &[WardrobeItem],
            _params: &GenerationParams,
            _rng: &mut dyn RngCore,
        ) -> Vec<WardrobeItem> {
            Vec::new()
        }
    }

    struct CountingEnricher {
        calls: AtomicUsize,
        answer: std::result::Result<&'static str, ()>,
    }

    #[async_trait]
    impl TextGenerator for CountingEnricher {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn generate_text(&self, _prompt: &str) -> std::result::Result<String, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer
                .map(str::to_string)
                .map_err(|_| ClientError::Api(500, "boom".to_string()))
        }
    }

    struct SlowEnricher(Arc<Notify>);

    #[async_trait]
    impl TextGenerator for SlowEnricher {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn generate_text(&self, _prompt: &str) -> std::result::Result<String, ClientError> {
            self.0.notified().await;
            Ok("finally".to_string())
        }
    }

    fn pool() -> Vec<WardrobeItem> {
        vec![
            item("t", Category::Tops),
            item("b", Category::Bottoms),
            item("s", Category::Shoes),
        ]
    }

    fn settings(min: usize, max: usize) -> GenerationSettings {
        GenerationSettings {
            batch_min: min,
            batch_max: max,
            enrichment_timeout: Duration::from_secs(5),
        }
    }

    fn orchestrator(items: Vec<WardrobeItem>, settings: GenerationSettings) -> GenerationOrchestrator {
        GenerationOrchestrator::new(
            Arc::new(FixedItems(items)),
            Arc::new(CategoryComposer::default()),
            settings,
            EventBus::default(),
        )
        .with_seed(11)
    }

    #[tokio::test]
    async fn test_batch_size_within_bounds_and_named() {
        let orchestrator = orchestrator(pool(), GenerationSettings::default());
        for _ in 0..10 {
            let batch = orchestrator
                .generate(&GenerationParams::for_occasion("work").with_mood(Mood::Professional))
                .await
                .unwrap();
            assert!((3..=5).contains(&batch.len()));
            for (i, outfit) in batch.iter().enumerate() {
                assert_eq!(outfit.name, format!("work Outfit {}", i + 1));
                assert_eq!(outfit.mood, Some(Mood::Professional));
                assert!(!outfit.items.is_empty());
                assert_eq!(outfit.notes, None);
            }
            assert_eq!(orchestrator.generated(), batch);
        }
        assert!(!orchestrator.is_generating());
    }

    #[tokio::test]
    async fn test_empty_compositions_leave_no_candidates() {
        let enricher = Arc::new(CountingEnricher {
            calls: AtomicUsize::new(0),
            answer: Ok("never used"),
        });
        let orchestrator = GenerationOrchestrator::new(
            Arc::new(FixedItems(pool())),
            Arc::new(EmptyComposer),
            settings(3, 3),
            EventBus::default(),
        )
        .with_enricher(enricher.clone());

        let batch = orchestrator
            .generate(&GenerationParams::for_occasion("party"))
            .await
            .unwrap();
        assert!(batch.is_empty());
        assert!(orchestrator.generated().is_empty());
        assert!(!orchestrator.is_generating());
        assert_eq!(enricher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rationale_attached_to_every_candidate() {
        let enricher = Arc::new(CountingEnricher {
            calls: AtomicUsize::new(0),
            answer: Ok("  Layer the navy blazer.  "),
        });
        let orchestrator = orchestrator(pool(), settings(4, 4)).with_enricher(enricher.clone());

        let batch = orchestrator.generate(&GenerationParams::for_occasion("work")).await.unwrap();
        assert_eq!(batch.len(), 4);
        assert!(batch
            .iter()
            .all(|o| o.notes.as_deref() == Some("Layer the navy blazer.")));
        assert_eq!(enricher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_enrichment_failure_degrades_to_no_notes() {
        let enricher = Arc::new(CountingEnricher {
            calls: AtomicUsize::new(0),
            answer: Err(()),
        });
        let orchestrator = orchestrator(pool(), settings(3, 3)).with_enricher(enricher);

        let batch = orchestrator.generate(&GenerationParams::for_occasion("work")).await.unwrap();
        assert_eq!(batch.len(), 3);
        assert!(batch.iter().all(|o| o.notes.is_none()));
    }

    #[tokio::test]
    async fn test_enrichment_timeout() {
        let mut settings = settings(3, 3);
        settings.enrichment_timeout = Duration::from_millis(20);
        let orchestrator = orchestrator(pool(), settings)
            .with_enricher(Arc::new(SlowEnricher(Arc::new(Notify::new()))));

        let batch = orchestrator.generate(&GenerationParams::for_occasion("work")).await.unwrap();
        assert_eq!(batch.len(), 3);
        assert!(batch.iter().all(|o| o.notes.is_none()));
        assert!(!orchestrator.is_generating());
    }

    #[tokio::test]
    async fn test_second_request_while_generating_is_busy() {
        let release = Arc::new(Notify::new());
        let orchestrator = Arc::new(
            orchestrator(pool(), settings(3, 3)).with_enricher(Arc::new(SlowEnricher(release.clone()))),
        );

        let first = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move {
                orchestrator
                    .generate(&GenerationParams::for_occasion("work"))
                    .await
            })
        };
        while !orchestrator.is_generating() {
            tokio::task::yield_now().await;
        }

        let second = orchestrator.generate(&GenerationParams::for_occasion("party")).await;
        assert!(matches!(second, Err(Error::Busy(_))));

        release.notify_one();
        let batch = first.await.unwrap().unwrap();
        assert_eq!(batch[0].notes.as_deref(), Some("finally"));
        assert!(!orchestrator.is_generating());
    }

    #[tokio::test]
    async fn test_unreadable_pool_fails_and_resets_flag() {
        let orchestrator = GenerationOrchestrator::new(
            Arc::new(BrokenItems),
            Arc::new(CategoryComposer::default()),
            GenerationSettings::default(),
            EventBus::default(),
        );
        let result = orchestrator.generate(&GenerationParams::for_occasion("work")).await;
        assert!(matches!(result, Err(Error::Internal(_))));
        assert!(!orchestrator.is_generating());
    }

    #[tokio::test]
    async fn test_new_batch_replaces_and_clear_discards() {
        let orchestrator = orchestrator(pool(), settings(3, 3));
        let first = orchestrator.generate(&GenerationParams::for_occasion("work")).await.unwrap();
        let second = orchestrator.generate(&GenerationParams::for_occasion("work")).await.unwrap();
        assert_ne!(first[0].id, second[0].id);
        assert_eq!(orchestrator.generated(), second);

        orchestrator.clear_generated();
        assert!(orchestrator.generated().is_empty());
    }

    #[tokio::test]
    async fn test_candidates_are_snapshots() {
        let orchestrator = orchestrator(pool(), settings(3, 3));
        let batch = orchestrator.generate(&GenerationParams::for_occasion("work")).await.unwrap();
        let top = batch[0].items.iter().find(|i| i.id == "t").unwrap();
        assert_eq!(top, &item("t", Category::Tops));
    }

    #[test]
    fn test_prompt_lines() {
        let params = GenerationParams::for_occasion("date")
            .with_mood(Mood::Romantic)
            .with_weather(14.0, "rainy");
        let prompt = rationale_prompt(&params, &[]);
        assert!(prompt.contains("Occasion: date"));
        assert!(prompt.contains("Mood: romantic"));
        assert!(prompt.contains("Weather: 14C rainy"));
        assert!(prompt.contains("Available categories/examples: tops, bottoms, shoes, accessories, outerwear"));
    }
}
