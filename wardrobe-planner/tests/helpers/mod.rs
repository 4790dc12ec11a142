//! Test helper utilities shared by the wardrobe-planner integration tests

#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use tempfile::TempDir;
use wardrobe_common::config::ServicesConfig;
use wardrobe_common::models::{Category, ItemPatch, Occasion, WardrobeItem};
use wardrobe_planner::services::UploadFile;
use wardrobe_planner::Wardrobe;

/// Solid-color PNG
pub fn png_bytes(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)));
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    out
}

pub fn png_upload(name: &str, color: [u8; 3]) -> UploadFile {
    UploadFile::new(name, Some("image/png".to_string()), png_bytes(32, 48, color))
}

/// Open a wardrobe in a fresh temp folder with no external services
///
/// Returns (TempDir, Wardrobe) - TempDir must be kept alive for duration of test
pub async fn create_test_wardrobe() -> (TempDir, Wardrobe) {
    let temp_dir = TempDir::new().unwrap();
    let wardrobe = open_wardrobe(&temp_dir).await;
    (temp_dir, wardrobe)
}

pub async fn open_wardrobe(temp_dir: &TempDir) -> Wardrobe {
    Wardrobe::open(temp_dir.path(), &ServicesConfig::default())
        .await
        .unwrap()
}

/// Upload and tag one item
pub async fn add_tagged(
    wardrobe: &Wardrobe,
    name: &str,
    color: [u8; 3],
    category: Category,
    occasions: Vec<Occasion>,
) -> WardrobeItem {
    let item = wardrobe.items().add_item(png_upload(name, color)).await.unwrap();
    let patch = ItemPatch {
        category: Some(category),
        occasions: Some(occasions),
        ..Default::default()
    };
    wardrobe.items().update_item(&item.id, &patch).await.unwrap();
    wardrobe.items().get_item(&item.id).await.unwrap().unwrap()
}

/// One top, one bottom and one pair of shoes, all tagged for work
pub async fn seed_work_basics(wardrobe: &Wardrobe) -> Vec<WardrobeItem> {
    vec![
        add_tagged(wardrobe, "white shirt.png", [250, 250, 250], Category::Tops, vec![Occasion::Work]).await,
        add_tagged(wardrobe, "navy trousers.png", [20, 30, 120], Category::Bottoms, vec![Occasion::Work]).await,
        add_tagged(wardrobe, "black loafers.png", [5, 5, 5], Category::Shoes, vec![Occasion::Work]).await,
    ]
}
