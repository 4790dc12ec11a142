//! Outfit composition
//!
//! Picks one item per complementary category from a pool of tagged items.
//! Composition is a pure function of the pool, the parameters and the
//! supplied random source, so a seeded source reproduces the same outfit.

use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use wardrobe_common::models::{Category, GenerationParams, WardrobeItem};

/// Tunables of the composition algorithm
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionRules {
    /// Occasions that accept every item without filtering
    pub unfiltered_occasions: Vec<String>,
    /// Chance of a dress-based outfit when dresses are available
    pub dress_probability: f64,
    /// Chance of adding an accessory to a dress-based outfit
    pub dress_accessory_probability: f64,
    /// Chance of adding an accessory to a separates-based outfit
    pub separates_accessory_probability: f64,
    /// Outerwear is added below this temperature (°C)
    pub outerwear_below_celsius: f64,
}

impl Default for CompositionRules {
    fn default() -> Self {
        Self {
            unfiltered_occasions: vec!["casual".to_string(), "brunch".to_string()],
            dress_probability: 0.5,
            dress_accessory_probability: 0.6,
            separates_accessory_probability: 0.5,
            outerwear_below_celsius: 18.0,
        }
    }
}

impl CompositionRules {
    /// Items eligible for `occasion`
    ///
    /// Falls back to the whole pool when nothing is tagged for the occasion,
    /// so an over-strict filter never empties the outfit on its own.
    pub fn eligible<'a>(&self, pool: &'a [WardrobeItem], occasion: &str) -> Vec<&'a WardrobeItem> {
        let wanted = occasion.trim().to_ascii_lowercase();
        if self.unfiltered_occasions.iter().any(|o| *o == wanted) {
            return pool.iter().collect();
        }

        let filtered: Vec<&WardrobeItem> = pool.iter().filter(|i| i.is_tagged_for(&wanted)).collect();
        if filtered.is_empty() {
            pool.iter().collect()
        } else {
            filtered
        }
    }

    /// Compose one outfit
    ///
    /// Result order: dress or top and bottom, then outerwear, shoes and
    /// accessories. May be empty when no category can be filled.
    pub fn compose<R: Rng + ?Sized>(
        &self,
        pool: &[WardrobeItem],
        params: &GenerationParams,
        rng: &mut R,
    ) -> Vec<WardrobeItem> {
        let available = self.eligible(pool, &params.occasion);
        let of = |category: Category| -> Vec<&WardrobeItem> {
            available
                .iter()
                .copied()
                .filter(|i| i.category == category)
                .collect()
        };

        let mut outfit = Vec::new();
        let pick = |category: Category, rng: &mut R, outfit: &mut Vec<WardrobeItem>| {
            if let Some(item) = of(category).choose(rng) {
                outfit.push((*item).clone());
            }
        };

        let dresses = of(Category::Dresses);
        if !dresses.is_empty() && rng.gen_bool(self.dress_probability) {
            if let Some(dress) = dresses.choose(rng) {
                outfit.push((*dress).clone());
            }
            pick(Category::Shoes, rng, &mut outfit);
            if !of(Category::Accessories).is_empty() && rng.gen_bool(self.dress_accessory_probability) {
                pick(Category::Accessories, rng, &mut outfit);
            }
        } else {
            pick(Category::Tops, rng, &mut outfit);
            pick(Category::Bottoms, rng, &mut outfit);
            if params
                .weather
                .as_ref()
                .is_some_and(|w| w.temp < self.outerwear_below_celsius)
            {
                pick(Category::Outerwear, rng, &mut outfit);
            }
            pick(Category::Shoes, rng, &mut outfit);
            if !of(Category::Accessories).is_empty()
                && rng.gen_bool(self.separates_accessory_probability)
            {
                pick(Category::Accessories, rng, &mut outfit);
            }
        }

        outfit
    }
}

/// Compose one outfit with the default rules
pub fn compose<R: Rng + ?Sized>(
    pool: &[WardrobeItem],
    params: &GenerationParams,
    rng: &mut R,
) -> Vec<WardrobeItem> {
    CompositionRules::default().compose(pool, params, rng)
}

/// Strategy used by the generation orchestrator
pub trait OutfitComposer: Send + Sync {
    fn compose(
        &self,
        pool: &[WardrobeItem],
        params: &GenerationParams,
        rng: &mut dyn RngCore,
    ) -> Vec<WardrobeItem>;
}

/// Category-based random composer
#[derive(Debug, Clone, Default)]
pub struct CategoryComposer {
    rules: CompositionRules,
}

impl CategoryComposer {
    pub fn new(rules: CompositionRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &CompositionRules {
        &self.rules
    }
}

impl OutfitComposer for CategoryComposer {
    fn compose(
        &self,
        pool: &[WardrobeItem],
        params: &GenerationParams,
        rng: &mut dyn RngCore,
    ) -> Vec<WardrobeItem> {
        self.rules.compose(pool, params, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use wardrobe_common::models::{ColorTag, Occasion};

    fn item(id: &str, category: Category, occasions: Vec<Occasion>) -> WardrobeItem {
        WardrobeItem {
            id: id.to_string(),
            name: Some(id.to_string()),
            category,
            colors: vec![ColorTag::Multi],
            seasons: vec![],
            occasions,
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

    fn full_pool() -> Vec<WardrobeItem> {
        vec![
            item("top", Category::Tops, vec![]),
            item("bottom", Category::Bottoms, vec![]),
            item("shoes", Category::Shoes, vec![]),
            item("dress", Category::Dresses, vec![]),
            item("coat", Category::Outerwear, vec![]),
            item("bag", Category::Accessories, vec![]),
        ]
    }

    fn categories(outfit: &[WardrobeItem]) -> Vec<Category> {
        outfit.iter().map(|i| i.category).collect()
    }

    #[test]
    fn test_untagged_pool_falls_back_for_work() {
        let mut top = item("t", Category::Tops, vec![]);
        top.colors = vec![ColorTag::Red];
        let mut bottom = item("b", Category::Bottoms, vec![]);
        bottom.colors = vec![ColorTag::Blue];
        let mut shoes = item("s", Category::Shoes, vec![]);
        shoes.colors = vec![ColorTag::Black];
        let pool = vec![top, bottom, shoes];

        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let outfit = compose(&pool, &GenerationParams::for_occasion("work"), &mut rng);
            assert_eq!(
                categories(&outfit),
                vec![Category::Tops, Category::Bottoms, Category::Shoes]
            );
        }
    }

    #[test]
    fn test_never_mixes_dress_with_separates() {
        let pool = full_pool();
        let params = GenerationParams::for_occasion("party").with_weather(5.0, "snowy");
        let mut saw_dress = false;
        let mut saw_separates = false;

        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let outfit = compose(&pool, &params, &mut rng);
            assert!(!outfit.is_empty());
            let cats = categories(&outfit);
            if cats.contains(&Category::Dresses) {
                saw_dress = true;
                assert!(cats
                    .iter()
                    .all(|c| matches!(c, Category::Dresses | Category::Shoes | Category::Accessories)));
            } else {
                saw_separates = true;
                assert!(!cats.contains(&Category::Dresses));
            }
        }
        assert!(saw_dress && saw_separates);
    }

    #[test]
    fn test_outerwear_follows_temperature() {
        let pool: Vec<WardrobeItem> = full_pool()
            .into_iter()
            .filter(|i| i.category != Category::Dresses)
            .chain([item("coat2", Category::Outerwear, vec![])])
            .collect();

        for seed in 0..50 {
            let cold = GenerationParams::for_occasion("casual").with_weather(10.0, "clear");
            let outfit = compose(&pool, &cold, &mut StdRng::seed_from_u64(seed));
            let outerwear = outfit.iter().filter(|i| i.category == Category::Outerwear).count();
            assert_eq!(outerwear, 1);

            let mild = GenerationParams::for_occasion("casual").with_weather(18.0, "clear");
            let outfit = compose(&pool, &mild, &mut StdRng::seed_from_u64(seed));
            assert!(outfit.iter().all(|i| i.category != Category::Outerwear));

            let unknown = GenerationParams::for_occasion("casual");
            let outfit = compose(&pool, &unknown, &mut StdRng::seed_from_u64(seed));
            assert!(outfit.iter().all(|i| i.category != Category::Outerwear));
        }
    }

    #[test]
    fn test_separates_order() {
        let pool: Vec<WardrobeItem> = full_pool()
            .into_iter()
            .filter(|i| i.category != Category::Dresses)
            .collect();
        let params = GenerationParams::for_occasion("casual").with_weather(3.0, "snowy");
        let rules = CompositionRules {
            separates_accessory_probability: 1.0,
            ..CompositionRules::default()
        };

        let outfit = rules.compose(&pool, &params, &mut StdRng::seed_from_u64(7));
        assert_eq!(
            categories(&outfit),
            vec![
                Category::Tops,
                Category::Bottoms,
                Category::Outerwear,
                Category::Shoes,
                Category::Accessories
            ]
        );
    }

    #[test]
    fn test_dress_branch_with_forced_rules() {
        let rules = CompositionRules {
            dress_probability: 1.0,
            dress_accessory_probability: 0.0,
            ..CompositionRules::default()
        };
        let outfit = rules.compose(
            &full_pool(),
            &GenerationParams::for_occasion("formal"),
            &mut StdRng::seed_from_u64(1),
        );
        assert_eq!(categories(&outfit), vec![Category::Dresses, Category::Shoes]);
    }

    #[test]
    fn test_occasion_filter_prefers_tagged_items() {
        let pool = vec![
            item("plain-top", Category::Tops, vec![]),
            item("work-top", Category::Tops, vec![Occasion::Work]),
            item("work-pants", Category::Bottoms, vec![Occasion::Work]),
        ];
        for seed in 0..30 {
            let outfit = compose(
                &pool,
                &GenerationParams::for_occasion("Work"),
                &mut StdRng::seed_from_u64(seed),
            );
            let ids: Vec<&str> = outfit.iter().map(|i| i.id.as_str()).collect();
            assert_eq!(ids, vec!["work-top", "work-pants"]);
        }
    }

    #[test]
    fn test_casual_and_brunch_skip_filter() {
        let pool = vec![
            item("plain-top", Category::Tops, vec![]),
            item("party-top", Category::Tops, vec![Occasion::Party]),
        ];
        let rules = CompositionRules::default();
        assert_eq!(rules.eligible(&pool, "casual").len(), 2);
        assert_eq!(rules.eligible(&pool, "brunch").len(), 2);
        assert_eq!(rules.eligible(&pool, "party").len(), 1);
    }

    #[test]
    fn test_empty_pool_composes_nothing() {
        let outfit = compose(&[], &GenerationParams::for_occasion("work"), &mut StdRng::seed_from_u64(0));
        assert!(outfit.is_empty());
    }

    #[test]
    fn test_same_seed_same_outfit() {
        let pool = full_pool();
        let params = GenerationParams::for_occasion("date");
        let a = compose(&pool, &params, &mut StdRng::seed_from_u64(42));
        let b = compose(&pool, &params, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_trait_object_composer() {
        let composer: Box<dyn OutfitComposer> = Box::new(CategoryComposer::default());
        let mut rng = StdRng::seed_from_u64(3);
        let outfit = composer.compose(&full_pool(), &GenerationParams::for_occasion("casual"), &mut rng);
        assert!(!outfit.is_empty());
    }
}
