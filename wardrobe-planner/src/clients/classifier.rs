//! Best-effort image classification for category auto-tagging

use super::{build_http_client, check_status, ClientError};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use wardrobe_common::models::Category;

/// Label keywords per category, checked in order; the first hit wins
const LABEL_KEYWORDS: &[(Category, &[&str])] = &[
    (Category::Dresses, &["dress", "onepiece"]),
    (Category::Outerwear, &["jacket", "coat", "blazer", "hoodie"]),
    (Category::Tops, &["shirt", "tee", "t-shirt", "sweater", "top"]),
    (Category::Bottoms, &["skirt", "pant", "jean", "trouser", "shorts"]),
    (Category::Shoes, &["shoe", "sneaker", "boot"]),
    (Category::Accessories, &["hat", "cap", "scarf", "bag"]),
];

/// Map a detector label to a garment category (unknown labels are tops)
pub fn category_for_label(label: &str) -> Category {
    let label = label.to_lowercase();
    LABEL_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| label.contains(k)))
        .map(|(category, _)| *category)
        .unwrap_or(Category::Tops)
}

#[async_trait]
pub trait ImageClassifier: Send + Sync {
    /// Top label for an image, `None` when nothing was detected
    async fn classify(
        &self,
        bytes: &[u8],
        file_name: &str,
        mime_type: &str,
    ) -> Result<Option<String>, ClientError>;
}

#[derive(Debug, Deserialize)]
struct Detection {
    #[serde(default)]
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetectorResponse {
    #[serde(default)]
    detections: Vec<Detection>,
}

/// Client for a detection service taking a multipart `file` upload
pub struct DetectorClient {
    http_client: reqwest::Client,
    url: String,
}

impl DetectorClient {
    pub fn new(url: impl Into<String>) -> Result<Self, ClientError> {
        Ok(Self {
            http_client: build_http_client()?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ImageClassifier for DetectorClient {
    async fn classify(
        &self,
        bytes: &[u8],
        file_name: &str,
        mime_type: &str,
    ) -> Result<Option<String>, ClientError> {
        let part = reqwest::multipart::Part::bytes(bytes.to_vec())
            .file_name(file_name.to_string())
            .mime_str(mime_type)?;
        let form = reqwest::multipart::Form::new().part("file", part);

        debug!(url = %self.url, file = %file_name, "Calling detector");
        let response = self
            .http_client
            .post(&self.url)
            .multipart(form)
            .send()
            .await?;
        let body: DetectorResponse = check_status(response).await?.json().await?;

        Ok(body
            .detections
            .into_iter()
            .next()
            .and_then(|d| d.label)
            .filter(|l| !l.trim().is_empty()))
    }
}
