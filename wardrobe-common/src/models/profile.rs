//! User profile and preferences

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub style: Option<String>,
}

impl ProfilePatch {
    pub fn apply_to(&self, profile: &mut UserProfile) {
        if let Some(name) = &self.name {
            profile.name = name.clone();
        }
        if let Some(avatar) = &self.avatar {
            profile.avatar = Some(avatar.clone());
        }
        if let Some(bio) = &self.bio {
            profile.bio = Some(bio.clone());
        }
        if let Some(location) = &self.location {
            profile.location = Some(location.clone());
        }
        if let Some(style) = &self.style {
            profile.style = Some(style.clone());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementUnit {
    Metric,
    Imperial,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    pub theme: Theme,
    pub notifications: bool,
    pub default_occasion: String,
    #[serde(default)]
    pub preferred_colors: Vec<String>,
    pub measurement_unit: MeasurementUnit,
    /// Interface language code (en, es, fr, de)
    pub language: String,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            notifications: true,
            default_occasion: "casual".to_string(),
            preferred_colors: Vec::new(),
            measurement_unit: MeasurementUnit::Metric,
            language: "en".to_string(),
        }
    }
}

/// Partial update of the preferences; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesPatch {
    pub theme: Option<Theme>,
    pub notifications: Option<bool>,
    pub default_occasion: Option<String>,
    pub preferred_colors: Option<Vec<String>>,
    pub measurement_unit: Option<MeasurementUnit>,
    pub language: Option<String>,
}

impl PreferencesPatch {
    pub fn apply_to(&self, prefs: &mut UserPreferences) {
        if let Some(theme) = self.theme {
            prefs.theme = theme;
        }
        if let Some(notifications) = self.notifications {
            prefs.notifications = notifications;
        }
        if let Some(occasion) = &self.default_occasion {
            prefs.default_occasion = occasion.clone();
        }
        if let Some(colors) = &self.preferred_colors {
            prefs.preferred_colors = colors.clone();
        }
        if let Some(unit) = self.measurement_unit {
            prefs.measurement_unit = unit;
        }
        if let Some(language) = &self.language {
            prefs.language = language.clone();
        }
    }
}
