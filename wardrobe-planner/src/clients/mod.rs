//! External service clients
//!
//! Every collaborator sits behind an `async_trait` seam so services can run
//! with a real HTTP client, a built-in fallback, or nothing at all. Client
//! failures are reported as `ClientError` and converted to the documented
//! default by the calling service; they never fail a primary operation.

use std::time::Duration;
use thiserror::Error;

pub mod classifier;
pub mod profile_backend;
pub mod text_generator;
pub mod weather;

pub use classifier::{category_for_label, DetectorClient, ImageClassifier};
pub use profile_backend::{ProfileBackend, RemoteProfile, RestProfileClient};
pub use text_generator::{FallbackTextGenerator, GeminiClient, LlmProxyClient, TextGenerator};
pub use weather::{
    recommend, OpenWeatherClient, StaticWeatherProvider, WeatherLocation, WeatherProvider,
    WeatherRecommendation, WeatherReport,
};

const USER_AGENT: &str = concat!("wardrobe-planner/", env!("CARGO_PKG_VERSION"));
const HTTP_TIMEOUT_SECS: u64 = 30;

/// External client errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network communication error
    #[error("Network error: {0}")]
    Network(String),

    /// Service answered with a non-success status
    #[error("API error {0}: {1}")]
    Api(u16, String),

    /// Response body did not have the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Client is missing an endpoint or key
    #[error("Not configured: {0}")]
    NotConfigured(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::Parse(e.to_string())
        } else {
            ClientError::Network(e.to_string())
        }
    }
}

/// HTTP client shared by all service clients
pub(crate) fn build_http_client() -> Result<reqwest::Client, ClientError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()
        .map_err(|e| ClientError::Network(e.to_string()))
}

/// Turn a non-success response into `ClientError::Api`
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Api(status.as_u16(), body))
}
