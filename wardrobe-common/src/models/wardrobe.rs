//! Wardrobe item metadata

use super::tags::{Category, ColorTag, Occasion, Season};
use serde::{Deserialize, Serialize};

/// Metadata of one clothing item.
///
/// The image payload lives in the blob namespace under `blob_key` and is
/// never embedded here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WardrobeItem {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub category: Category,
    pub colors: Vec<ColorTag>,
    #[serde(default)]
    pub seasons: Vec<Season>,
    #[serde(default)]
    pub occasions: Vec<Occasion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub blob_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_count: Option<u32>,
}

impl WardrobeItem {
    /// Blob namespace key for an item id
    pub fn blob_key_for(id: &str) -> String {
        format!("blob_{}", id)
    }

    /// True when the item is explicitly tagged with `occasion`
    /// (compared case-insensitively against the tag names).
    pub fn is_tagged_for(&self, occasion: &str) -> bool {
        let wanted = occasion.trim().to_ascii_lowercase();
        self.occasions.iter().any(|o| o.as_str() == wanted)
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Untitled")
    }
}

/// Partial update of a wardrobe item; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    pub name: Option<String>,
    pub category: Option<Category>,
    pub colors: Option<Vec<ColorTag>>,
    pub seasons: Option<Vec<Season>>,
    pub occasions: Option<Vec<Occasion>>,
    pub notes: Option<String>,
    pub usage_count: Option<u32>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        *self == ItemPatch::default()
    }

    /// Merge into `item`. Does not touch `updated_at`.
    pub fn apply_to(&self, item: &mut WardrobeItem) {
        if let Some(name) = &self.name {
            item.name = Some(name.clone());
        }
        if let Some(category) = self.category {
            item.category = category;
        }
        if let Some(colors) = &self.colors {
            item.colors = colors.clone();
        }
        if let Some(seasons) = &self.seasons {
            item.seasons = seasons.clone();
        }
        if let Some(occasions) = &self.occasions {
            item.occasions = occasions.clone();
        }
        if let Some(notes) = &self.notes {
            item.notes = Some(notes.clone());
        }
        if let Some(count) = self.usage_count {
            item.usage_count = Some(count);
        }
    }
}
