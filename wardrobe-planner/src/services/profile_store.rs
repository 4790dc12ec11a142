//! Local profile and preferences with optional cloud sync
//!
//! Changes are written locally first. When a backend and a signed-in user
//! id are configured, the merged document is then pushed best-effort; a
//! failed push is logged and the local write stands.

use serde_json::{Map, Value};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use tracing::{debug, info, warn};
use wardrobe_common::db::{PROFILE, USER_PREFERENCES_KEY, USER_PROFILE_KEY};
use wardrobe_common::models::{PreferencesPatch, ProfilePatch, UserPreferences, UserProfile};
use wardrobe_common::time::{next_stamp, now_millis};
use wardrobe_common::Result;

use crate::clients::{ProfileBackend, RemoteProfile};

const DEFAULT_PROFILE_NAME: &str = "User";

pub struct ProfileStore {
    pool: SqlitePool,
    backend: Option<Arc<dyn ProfileBackend>>,
    user_id: Option<String>,
}

impl ProfileStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            backend: None,
            user_id: None,
        }
    }

    /// Sync with `backend` as `user_id`; without a user id the store stays
    /// local-only
    pub fn with_backend(mut self, backend: Arc<dyn ProfileBackend>, user_id: Option<String>) -> Self {
        self.backend = Some(backend);
        self.user_id = user_id.filter(|id| !id.trim().is_empty());
        self
    }

    fn sync_target(&self) -> Option<(&Arc<dyn ProfileBackend>, &str)> {
        Some((self.backend.as_ref()?, self.user_id.as_deref()?))
    }

    pub fn is_syncing(&self) -> bool {
        self.sync_target().is_some()
    }

    async fn read_doc(&self, key: &str) -> Result<Option<String>> {
        let sql = format!("SELECT value FROM {} WHERE key = ?", PROFILE);
        let row = sqlx::query(&sql).bind(key).fetch_optional(&self.pool).await?;
        Ok(row.map(|r| r.get("value")))
    }

    async fn write_doc(&self, key: &str, value: String) -> Result<()> {
        let sql = format!("INSERT OR REPLACE INTO {} (key, value) VALUES (?, ?)", PROFILE);
        sqlx::query(&sql).bind(key).bind(value).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn profile(&self) -> Result<Option<UserProfile>> {
        match self.read_doc(USER_PROFILE_KEY).await? {
            Some(value) => Ok(Some(serde_json::from_str(&value)?)),
            None => Ok(None),
        }
    }

    /// Stored preferences, defaults when never saved
    pub async fn preferences(&self) -> Result<UserPreferences> {
        match self.read_doc(USER_PREFERENCES_KEY).await? {
            Some(value) => Ok(serde_json::from_str(&value)?),
            None => Ok(UserPreferences::default()),
        }
    }

    /// Merge a patch into the profile, creating it on first use
    pub async fn update_profile(&self, patch: &ProfilePatch) -> Result<UserProfile> {
        let mut profile = match self.profile().await? {
            Some(profile) => profile,
            None => {
                let stamp = now_millis();
                UserProfile {
                    name: DEFAULT_PROFILE_NAME.to_string(),
                    avatar: None,
                    bio: None,
                    location: None,
                    style: None,
                    created_at: stamp,
                    updated_at: stamp,
                }
            }
        };
        patch.apply_to(&mut profile);
        profile.updated_at = next_stamp(profile.updated_at);

        self.write_doc(USER_PROFILE_KEY, serde_json::to_string(&profile)?)
            .await?;
        let prefs = self.preferences().await?;
        self.push(&profile, &prefs).await;
        Ok(profile)
    }

    pub async fn update_preferences(&self, patch: &PreferencesPatch) -> Result<UserPreferences> {
        let mut prefs = self.preferences().await?;
        patch.apply_to(&mut prefs);
        self.write_doc(USER_PREFERENCES_KEY, serde_json::to_string(&prefs)?)
            .await?;

        if let Some(profile) = self.profile().await? {
            self.push(&profile, &prefs).await;
        }
        Ok(prefs)
    }

    /// Best-effort upsert of the merged row
    async fn push(&self, profile: &UserProfile, prefs: &UserPreferences) {
        let Some((backend, user_id)) = self.sync_target() else {
            return;
        };
        let row = RemoteProfile {
            id: user_id.to_string(),
            full_name: Some(profile.name.clone()),
            avatar_url: profile.avatar.clone(),
            profile: serde_json::to_value(profile).ok(),
            preferences: serde_json::to_value(prefs).ok(),
            updated_at: Some(chrono::Utc::now().to_rfc3339()),
        };
        match backend.upsert_profile(&row).await {
            Ok(()) => debug!("Synced profile for {}", user_id),
            Err(e) => warn!("Profile sync failed, kept local copy: {}", e),
        }
    }

    /// Prefer the remote profile when one exists
    ///
    /// A remote row replaces the local profile and preferences. Without a
    /// backend, or when the fetch fails, the local profile is returned.
    pub async fn hydrate(&self) -> Result<Option<UserProfile>> {
        let Some((backend, user_id)) = self.sync_target() else {
            return self.profile().await;
        };

        let remote = match backend.fetch_profile(user_id).await {
            Ok(Some(remote)) => remote,
            Ok(None) => {
                debug!("No remote profile for {}", user_id);
                return self.profile().await;
            }
            Err(e) => {
                warn!("Failed to fetch remote profile: {}", e);
                return self.profile().await;
            }
        };

        let profile = profile_from_remote(&remote, now_millis())?;
        self.write_doc(USER_PROFILE_KEY, serde_json::to_string(&profile)?)
            .await?;

        if let Some(remote_prefs) = &remote.preferences {
            let prefs = preferences_from_remote(remote_prefs);
            self.write_doc(USER_PREFERENCES_KEY, serde_json::to_string(&prefs)?)
                .await?;
        }

        info!("Hydrated profile from backend for {}", user_id);
        Ok(Some(profile))
    }

    /// Remove the local profile and preferences
    pub async fn clear(&self) -> Result<()> {
        let sql = format!("DELETE FROM {}", PROFILE);
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(())
    }

    /// Delete the remote row (best-effort) and the local documents
    pub async fn delete_account(&self) -> Result<()> {
        if let Some((backend, user_id)) = self.sync_target() {
            if let Err(e) = backend.delete_profile(user_id).await {
                warn!("Failed to delete remote profile: {}", e);
            }
        }
        self.clear().await
    }
}

fn overlay(base: &mut Map<String, Value>, extra: &Value) {
    if let Value::Object(fields) = extra {
        for (k, v) in fields {
            if !v.is_null() {
                base.insert(k.clone(), v.clone());
            }
        }
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

/// Build a full profile from a possibly partial remote row
fn profile_from_remote(remote: &RemoteProfile, stamp: i64) -> Result<UserProfile> {
    let mut doc = Map::new();
    if let Some(profile) = &remote.profile {
        overlay(&mut doc, profile);
    }

    let name = non_empty_str(doc.get("name"))
        .or_else(|| remote.full_name.clone().filter(|n| !n.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_PROFILE_NAME.to_string());
    let avatar = non_empty_str(doc.get("avatar")).or_else(|| remote.avatar_url.clone());
    let created_at = doc
        .get("createdAt")
        .and_then(Value::as_i64)
        .filter(|t| *t > 0)
        .unwrap_or(stamp);

    doc.insert("name".to_string(), Value::from(name));
    match avatar {
        Some(avatar) => doc.insert("avatar".to_string(), Value::from(avatar)),
        None => doc.remove("avatar"),
    };
    doc.insert("createdAt".to_string(), Value::from(created_at));
    doc.insert("updatedAt".to_string(), Value::from(stamp));

    Ok(serde_json::from_value(Value::Object(doc))?)
}

/// Remote preferences layered over the defaults
fn preferences_from_remote(remote: &Value) -> UserPreferences {
    let defaults = UserPreferences::default();
    let mut doc = match serde_json::to_value(&defaults) {
        Ok(Value::Object(map)) => map,
        _ => return defaults,
    };
    overlay(&mut doc, remote);
    match serde_json::from_value(Value::Object(doc)) {
        Ok(prefs) => prefs,
        Err(e) => {
            warn!("Ignoring unreadable remote preferences: {}", e);
            defaults
        }
    }
}
