//! Outfits and generation parameters

use super::tags::Mood;
use super::wardrobe::WardrobeItem;
use serde::{Deserialize, Serialize};

/// An outfit: a named, ordered selection of wardrobe items.
///
/// Generated candidates and saved outfits share this shape; they differ only
/// in lifecycle. `items` holds value snapshots taken when the outfit was
/// composed, so later edits or deletions of the source items do not change
/// a saved outfit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outfit {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub items: Vec<WardrobeItem>,
    pub occasion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<Mood>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,
}

/// An ephemeral outfit produced by a generation request
pub type OutfitCandidate = Outfit;

/// An outfit promoted into the durable outfit collection
pub type SavedOutfit = Outfit;

impl Outfit {
    pub fn is_favorite(&self) -> bool {
        self.is_favorite.unwrap_or(false)
    }

    pub fn item_ids(&self) -> Vec<String> {
        self.items.iter().map(|i| i.id.clone()).collect()
    }
}

/// Partial update of a saved outfit; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutfitPatch {
    pub name: Option<String>,
    pub occasion: Option<String>,
    pub mood: Option<Mood>,
    pub notes: Option<String>,
    pub rating: Option<u8>,
    pub is_favorite: Option<bool>,
}

impl OutfitPatch {
    /// Merge into `outfit`. Does not touch `updated_at`.
    pub fn apply_to(&self, outfit: &mut Outfit) {
        if let Some(name) = &self.name {
            outfit.name = name.clone();
        }
        if let Some(occasion) = &self.occasion {
            outfit.occasion = occasion.clone();
        }
        if let Some(mood) = self.mood {
            outfit.mood = Some(mood);
        }
        if let Some(notes) = &self.notes {
            outfit.notes = Some(notes.clone());
        }
        if let Some(rating) = self.rating {
            outfit.rating = Some(rating);
        }
        if let Some(favorite) = self.is_favorite {
            outfit.is_favorite = Some(favorite);
        }
    }
}

/// Weather conditions attached to a generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// Temperature in °C
    pub temp: f64,
    pub condition: String,
}

/// Parameters of one generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Free-form occasion, conventionally one of `OCCASION_SUGGESTIONS`
    pub occasion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<Mood>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<WeatherSnapshot>,
}

impl GenerationParams {
    pub fn for_occasion(occasion: impl Into<String>) -> Self {
        Self {
            occasion: occasion.into(),
            mood: None,
            weather: None,
        }
    }

    pub fn with_mood(mut self, mood: Mood) -> Self {
        self.mood = Some(mood);
        self
    }

    pub fn with_weather(mut self, temp: f64, condition: impl Into<String>) -> Self {
        self.weather = Some(WeatherSnapshot {
            temp,
            condition: condition.into(),
        });
        self
    }
}
