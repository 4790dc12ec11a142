//! Upload validation and image normalization
//!
//! Accepted uploads are PNG, JPEG, WEBP, HEIC and HEIF. Decodable formats are
//! downscaled to the configured maximum dimension and re-encoded; HEIC/HEIF
//! payloads are stored as uploaded.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;
use wardrobe_common::models::ColorTag;
use wardrobe_common::{Error, Result};

use crate::settings::RuntimeSettings;

/// One file offered for upload
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    /// Declared MIME type; sniffed from the bytes when absent
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, mime_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type,
            bytes,
        }
    }

    /// Read a file from disk, declaring its type from the extension
    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(ImageKind::from_extension)
            .map(|kind| kind.mime_type().to_string());
        Ok(Self::new(name, mime_type, bytes))
    }
}

/// Supported upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
    Webp,
    Heic,
    Heif,
}

impl ImageKind {
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/png" => Some(ImageKind::Png),
            "image/jpeg" | "image/jpg" => Some(ImageKind::Jpeg),
            "image/webp" => Some(ImageKind::Webp),
            "image/heic" => Some(ImageKind::Heic),
            "image/heif" => Some(ImageKind::Heif),
            _ => None,
        }
    }

    fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(ImageKind::Png),
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            "webp" => Some(ImageKind::Webp),
            "heic" => Some(ImageKind::Heic),
            "heif" => Some(ImageKind::Heif),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageKind::Png => "image/png",
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Webp => "image/webp",
            ImageKind::Heic => "image/heic",
            ImageKind::Heif => "image/heif",
        }
    }

    fn decoder_format(&self) -> Option<ImageFormat> {
        match self {
            ImageKind::Png => Some(ImageFormat::Png),
            ImageKind::Jpeg => Some(ImageFormat::Jpeg),
            ImageKind::Webp => Some(ImageFormat::WebP),
            ImageKind::Heic | ImageKind::Heif => None,
        }
    }
}

/// Upload limits taken from the runtime settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageLimits {
    pub max_bytes: u64,
    pub max_dimension: u32,
    pub quality: f32,
}

impl ImageLimits {
    pub fn from_settings(settings: &RuntimeSettings) -> Self {
        Self {
            max_bytes: settings.upload_max_bytes(),
            max_dimension: settings.image_max_dimension,
            quality: settings.image_quality,
        }
    }

    fn jpeg_quality(&self) -> u8 {
        (self.quality * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

impl Default for ImageLimits {
    fn default() -> Self {
        Self::from_settings(&RuntimeSettings::default())
    }
}

/// Normalized payload ready to be stored
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Nearest color bucket of the average pixel, when decodable
    pub dominant_color: Option<ColorTag>,
}

/// Determine the upload format from the declared type or the magic bytes
pub fn detect_kind(file: &UploadFile) -> Option<ImageKind> {
    match &file.mime_type {
        Some(declared) => ImageKind::from_mime(declared),
        None => infer::get(&file.bytes).and_then(|t| ImageKind::from_mime(t.mime_type())),
    }
}

/// Check type and size of an upload
pub fn validate(file: &UploadFile, limits: &ImageLimits) -> Result<ImageKind> {
    let kind = detect_kind(file).ok_or_else(|| {
        Error::Validation(format!(
            "{}: unsupported file type {}",
            file.name,
            file.mime_type.as_deref().unwrap_or("(unknown)")
        ))
    })?;

    if file.bytes.len() as u64 > limits.max_bytes {
        return Err(Error::Validation(format!(
            "{}: {} bytes exceeds the {} byte limit",
            file.name,
            file.bytes.len(),
            limits.max_bytes
        )));
    }

    Ok(kind)
}

/// Downscale, re-encode and sample the dominant color (CPU bound)
pub fn process(bytes: &[u8], kind: ImageKind, limits: &ImageLimits) -> Result<ProcessedImage> {
    let Some(format) = kind.decoder_format() else {
        debug!("Storing {} payload unchanged", kind.mime_type());
        return Ok(ProcessedImage {
            bytes: bytes.to_vec(),
            mime_type: kind.mime_type().to_string(),
            width: None,
            height: None,
            dominant_color: None,
        });
    };

    let decoded = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| Error::Validation(format!("cannot decode {} image: {}", kind.mime_type(), e)))?;

    let max = limits.max_dimension;
    let image = if decoded.width() > max || decoded.height() > max {
        decoded.resize(max, max, FilterType::Triangle)
    } else {
        decoded
    };

    let mut out = Vec::new();
    let mime_type = match kind {
        ImageKind::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut out, limits.jpeg_quality());
            DynamicImage::ImageRgb8(image.to_rgb8())
                .write_with_encoder(encoder)
                .map_err(|e| Error::Internal(format!("JPEG encoding failed: {}", e)))?;
            "image/jpeg"
        }
        _ => {
            image
                .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
                .map_err(|e| Error::Internal(format!("PNG encoding failed: {}", e)))?;
            "image/png"
        }
    };

    Ok(ProcessedImage {
        bytes: out,
        mime_type: mime_type.to_string(),
        width: Some(image.width()),
        height: Some(image.height()),
        dominant_color: dominant_color(&image),
    })
}

/// Run `process` on the blocking pool
pub async fn process_upload(
    bytes: Vec<u8>,
    kind: ImageKind,
    limits: ImageLimits,
) -> Result<ProcessedImage> {
    tokio::task::spawn_blocking(move || process(&bytes, kind, &limits))
        .await
        .map_err(|e| Error::Internal(format!("image task failed: {}", e)))?
}

const COLOR_BUCKETS: &[(ColorTag, [f64; 3])] = &[
    (ColorTag::Black, [10.0, 10.0, 10.0]),
    (ColorTag::White, [245.0, 245.0, 245.0]),
    (ColorTag::Gray, [128.0, 128.0, 128.0]),
    (ColorTag::Red, [200.0, 30.0, 30.0]),
    (ColorTag::Orange, [230.0, 120.0, 20.0]),
    (ColorTag::Yellow, [230.0, 200.0, 20.0]),
    (ColorTag::Green, [30.0, 140.0, 40.0]),
    (ColorTag::Blue, [40.0, 80.0, 200.0]),
    (ColorTag::Purple, [140.0, 60.0, 160.0]),
    (ColorTag::Brown, [130.0, 80.0, 40.0]),
    (ColorTag::Pink, [240.0, 120.0, 170.0]),
    (ColorTag::Beige, [220.0, 200.0, 170.0]),
];

/// Average every 4th pixel of a 200x200 thumbnail and pick the nearest bucket
pub fn dominant_color(image: &DynamicImage) -> Option<ColorTag> {
    let thumb = image.thumbnail(200, 200).to_rgb8();
    let mut sum = [0.0f64; 3];
    let mut count = 0u64;
    for pixel in thumb.pixels().step_by(4) {
        sum[0] += f64::from(pixel[0]);
        sum[1] += f64::from(pixel[1]);
        sum[2] += f64::from(pixel[2]);
        count += 1;
    }
    if count == 0 {
        return None;
    }
    let avg = sum.map(|s| (s / count as f64).round());
    nearest_bucket(avg)
}

fn nearest_bucket(rgb: [f64; 3]) -> Option<ColorTag> {
    COLOR_BUCKETS
        .iter()
        .map(|(tag, bucket)| {
            let d = (rgb[0] - bucket[0]).powi(2)
                + (rgb[1] - bucket[1]).powi(2)
                + (rgb[2] - bucket[2]).powi(2);
            (*tag, d)
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(tag, _)| tag)
}
