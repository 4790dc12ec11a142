//! Wardrobe planner services

pub mod generation_orchestrator;
pub mod image_processing;
pub mod item_store;
pub mod object_url_cache;
pub mod outfit_composer;
pub mod outfit_store;
pub mod profile_store;
pub mod statistics;
pub mod url_providers;
pub mod wardrobe_view;

pub use generation_orchestrator::{GenerationOrchestrator, GenerationSettings, ItemSource};
pub use image_processing::{ImageKind, ImageLimits, ProcessedImage, UploadFile};
pub use item_store::{ItemStore, RejectedUpload, StoredBlob, UploadReport};
pub use object_url_cache::{BlobSource, ObjectUrl, ObjectUrlCache, UrlProvider};
pub use outfit_composer::{compose, CategoryComposer, CompositionRules, OutfitComposer};
pub use outfit_store::OutfitStore;
pub use profile_store::ProfileStore;
pub use statistics::UsageStatistics;
pub use url_providers::{MemoryUrlProvider, SessionDirUrlProvider};
pub use wardrobe_view::{SortBy, WardrobeFilter};
