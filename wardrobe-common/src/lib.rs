//! # Wardrobe Common Library
//!
//! Shared code for the wardrobe planner crates including:
//! - Wardrobe item, outfit and profile models
//! - Error type
//! - Configuration loading and root folder resolution
//! - Database bootstrap for the durable namespaces
//! - Event types (PlannerEvent) and the event bus
//! - Time and id helpers

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
pub use events::{EventBus, PlannerEvent};
