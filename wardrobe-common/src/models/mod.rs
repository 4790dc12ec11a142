//! Wardrobe, outfit and profile models
//!
//! Field names serialize in camelCase so stored documents keep the layout
//! of exported browser data.

mod outfit;
mod profile;
mod tags;
mod wardrobe;

pub use outfit::*;
pub use profile::*;
pub use tags::*;
pub use wardrobe::*;
