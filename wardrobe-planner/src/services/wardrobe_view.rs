//! Filtering and sorting of the wardrobe listing

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::fmt;
use std::str::FromStr;
use wardrobe_common::models::{Category, ColorTag, Occasion, Season, WardrobeItem};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Newest,
    Color,
    Category,
    Frequency,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::Newest => "newest",
            SortBy::Color => "color",
            SortBy::Category => "category",
            SortBy::Frequency => "frequency",
        }
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "newest" => Ok(SortBy::Newest),
            "color" => Ok(SortBy::Color),
            "category" => Ok(SortBy::Category),
            "frequency" => Ok(SortBy::Frequency),
            other => Err(format!("unknown sort order '{}'", other)),
        }
    }
}

/// Wardrobe filter; empty fields match everything
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WardrobeFilter {
    /// Case-insensitive substring of the item name
    pub q: Option<String>,
    pub categories: Vec<Category>,
    pub colors: Vec<ColorTag>,
    pub seasons: Vec<Season>,
    pub occasions: Vec<Occasion>,
    pub sort_by: SortBy,
}

fn intersects<T: PartialEq>(wanted: &[T], have: &[T]) -> bool {
    wanted.is_empty() || have.iter().any(|v| wanted.contains(v))
}

impl WardrobeFilter {
    pub fn matches(&self, item: &WardrobeItem) -> bool {
        if let Some(q) = self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let name = item.name.as_deref().unwrap_or_default().to_lowercase();
            if !name.contains(&q.to_lowercase()) {
                return false;
            }
        }
        (self.categories.is_empty() || self.categories.contains(&item.category))
            && intersects(&self.colors, &item.colors)
            && intersects(&self.seasons, &item.seasons)
            && intersects(&self.occasions, &item.occasions)
    }

    /// Matching items in the requested order (stable)
    pub fn apply(&self, items: &[WardrobeItem]) -> Vec<WardrobeItem> {
        let mut out: Vec<WardrobeItem> = items.iter().filter(|i| self.matches(i)).cloned().collect();
        match self.sort_by {
            SortBy::Newest => out.sort_by_key(|i| Reverse(i.created_at)),
            SortBy::Category => out.sort_by(|a, b| a.category.as_str().cmp(b.category.as_str())),
            SortBy::Color => out.sort_by(|a, b| first_color(a).cmp(first_color(b))),
            SortBy::Frequency => out.sort_by_key(|i| Reverse(i.usage_count.unwrap_or(0))),
        }
        out
    }
}

fn first_color(item: &WardrobeItem) -> &'static str {
    item.colors.first().map(|c| c.as_str()).unwrap_or("")
}
