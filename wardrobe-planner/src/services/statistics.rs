//! Usage statistics over the wardrobe and saved outfits

use serde::Serialize;
use std::collections::HashMap;
use wardrobe_common::models::{ColorTag, Outfit, WardrobeItem};

/// Length of the "this month" window
pub const MONTH_MILLIS: i64 = 30 * 24 * 60 * 60 * 1000;

const TOP_COLORS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStatistics {
    pub total_wardrobe_items: usize,
    pub total_outfits: usize,
    pub items_added_this_month: usize,
    pub outfits_created_this_month: usize,
    /// Up to five most frequent color tags, most frequent first
    pub most_used_colors: Vec<ColorTag>,
    pub favorite_occasion: Option<String>,
    pub favorite_count: usize,
    pub average_rating: Option<f64>,
    pub last_active: i64,
}

impl UsageStatistics {
    pub fn compute(items: &[WardrobeItem], outfits: &[Outfit], now_millis: i64) -> Self {
        let month_ago = now_millis - MONTH_MILLIS;

        let mut color_counts: HashMap<ColorTag, usize> = HashMap::new();
        for color in items.iter().flat_map(|i| i.colors.iter()) {
            *color_counts.entry(*color).or_default() += 1;
        }
        let mut colors: Vec<(ColorTag, usize)> = color_counts.into_iter().collect();
        // Ties fall back to vocabulary order
        colors.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        let most_used_colors = colors.into_iter().take(TOP_COLORS).map(|(c, _)| c).collect();

        // First-seen occasion wins a tie
        let mut occasions: Vec<(&str, usize)> = Vec::new();
        for outfit in outfits {
            match occasions.iter_mut().find(|(o, _)| *o == outfit.occasion) {
                Some((_, n)) => *n += 1,
                None => occasions.push((outfit.occasion.as_str(), 1)),
            }
        }
        let mut favorite_occasion: Option<(&str, usize)> = None;
        for (occasion, n) in occasions {
            if favorite_occasion.map_or(true, |(_, best)| n > best) {
                favorite_occasion = Some((occasion, n));
            }
        }

        let ratings: Vec<f64> = outfits
            .iter()
            .filter_map(|o| o.rating)
            .map(f64::from)
            .collect();
        let average_rating = if ratings.is_empty() {
            None
        } else {
            Some(ratings.iter().sum::<f64>() / ratings.len() as f64)
        };

        Self {
            total_wardrobe_items: items.len(),
            total_outfits: outfits.len(),
            items_added_this_month: items.iter().filter(|i| i.created_at >= month_ago).count(),
            outfits_created_this_month: outfits.iter().filter(|o| o.created_at >= month_ago).count(),
            most_used_colors,
            favorite_occasion: favorite_occasion.map(|(o, _)| o.to_string()),
            favorite_count: outfits.iter().filter(|o| o.is_favorite()).count(),
            average_rating,
            last_active: now_millis,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wardrobe_common::models::Category;

    const NOW: i64 = 100 * MONTH_MILLIS;

    fn item(id: &str, colors: Vec<ColorTag>, created_at: i64) -> WardrobeItem {
        WardrobeItem {
            id: id.to_string(),
            name: None,
            category: Category::Tops,
            colors,
            seasons: vec![],
            occasions: vec![],
            notes: None,
            created_at,
            updated_at: created_at,
            blob_key: WardrobeItem::blob_key_for(id),
            width: None,
            height: None,
            mime_type: None,
            usage_count: None,
        }
    }

    fn outfit(occasion: &str, rating: Option<u8>, favorite: bool, created_at: i64) -> Outfit {
        Outfit {
            id: String::new(),
            name: String::new(),
            items: vec![],
            occasion: occasion.to_string(),
            mood: None,
            rating,
            created_at,
            updated_at: created_at,
            notes: None,
            is_favorite: Some(favorite),
        }
    }

    #[test]
    fn test_empty_inputs() {
        let stats = UsageStatistics::compute(&[], &[], NOW);
        assert_eq!(stats.total_wardrobe_items, 0);
        assert!(stats.most_used_colors.is_empty());
        assert_eq!(stats.favorite_occasion, None);
        assert_eq!(stats.average_rating, None);
        assert_eq!(stats.last_active, NOW);
    }

    #[test]
    fn test_counts_and_window() {
        let items = vec![
            item("a", vec![ColorTag::Blue, ColorTag::White], NOW - 1000),
            item("b", vec![ColorTag::Blue], NOW - MONTH_MILLIS - 1),
            item("c", vec![ColorTag::Red], NOW - MONTH_MILLIS),
        ];
        let outfits = vec![
            outfit("work", Some(4), true, NOW),
            outfit("party", None, false, NOW - 2 * MONTH_MILLIS),
            outfit("work", Some(5), false, NOW),
        ];

        let stats = UsageStatistics::compute(&items, &outfits, NOW);
        assert_eq!(stats.total_wardrobe_items, 3);
        assert_eq!(stats.items_added_this_month, 2);
        assert_eq!(stats.outfits_created_this_month, 2);
        assert_eq!(
            stats.most_used_colors,
            vec![ColorTag::Blue, ColorTag::White, ColorTag::Red]
        );
        assert_eq!(stats.favorite_occasion.as_deref(), Some("work"));
        assert_eq!(stats.favorite_count, 1);
        assert_eq!(stats.average_rating, Some(4.5));
    }

    #[test]
    fn test_top_five_colors() {
        let items: Vec<WardrobeItem> = ColorTag::ALL
            .iter()
            .enumerate()
            .map(|(i, c)| item(&i.to_string(), vec![*c], NOW))
            .collect();
        let stats = UsageStatistics::compute(&items, &[], NOW);
        assert_eq!(stats.most_used_colors, ColorTag::ALL[..5].to_vec());
    }
}
