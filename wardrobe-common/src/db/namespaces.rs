//! Durable namespace layout
//!
//! Each namespace is a key-value table: TEXT key, JSON or BLOB value.
//! Table names and key schemes match the stores of the browser application
//! so exported data migrates row-for-row.

/// Wardrobe metadata, keyed by item id
pub const WARDROBE_META: &str = "wardrobe_meta";

/// Wardrobe image payloads, keyed by `blob_{item id}`
pub const WARDROBE_BLOBS: &str = "wardrobe_blobs";

/// Saved outfits, one collection value under `SAVED_OUTFITS_KEY`
pub const OUTFITS: &str = "outfits";
pub const SAVED_OUTFITS_KEY: &str = "saved_outfits";

/// Profile documents
pub const PROFILE: &str = "profile";
pub const USER_PROFILE_KEY: &str = "user_profile";
pub const USER_PREFERENCES_KEY: &str = "user_preferences";
