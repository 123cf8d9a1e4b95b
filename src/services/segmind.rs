use async_trait::async_trait;
use base64::Engine;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::models::tryon::TryOnImages;

pub const DEFAULT_SEGMIND_URL: &str = "https://api.segmind.com/v1/segfit-v1.2";

const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// An upstream image-generation backend that composites a clothing image onto
/// a person image and returns a displayable image reference.
#[async_trait]
pub trait TryOnProvider: Send + Sync {
    async fn generate(&self, images: &TryOnImages, api_key: &str) -> Result<String, UpstreamError>;
}

/// Client for the Segmind SegFit virtual try-on model.
pub struct SegmindClient {
    http: Client,
    url: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct SegFitRequest<'a> {
    outfit_image: &'a str,
    model_image: &'a str,
    model_type: &'static str,
    cn_strength: f32,
    cn_end: f32,
    image_format: &'static str,
    image_quality: u8,
    seed: u64,
    base64: bool,
}

impl SegmindClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, UpstreamError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(UpstreamError::Transport)?;

        Ok(Self {
            http,
            url: url.into(),
            timeout,
        })
    }

    fn classify(&self, err: reqwest::Error) -> UpstreamError {
        if err.is_timeout() {
            UpstreamError::Timeout(self.timeout)
        } else {
            UpstreamError::Transport(err)
        }
    }
}

#[async_trait]
impl TryOnProvider for SegmindClient {
    async fn generate(&self, images: &TryOnImages, api_key: &str) -> Result<String, UpstreamError> {
        let engine = base64::engine::general_purpose::STANDARD;
        let outfit_image = engine.encode(&images.clothing);
        let model_image = engine.encode(&images.person);

        tracing::debug!(
            outfit_base64_len = outfit_image.len(),
            model_base64_len = model_image.len(),
            "Sending request to Segmind"
        );

        let body = SegFitRequest {
            outfit_image: &outfit_image,
            model_image: &model_image,
            model_type: "Balanced",
            cn_strength: 0.35,
            cn_end: 0.35,
            image_format: "png",
            image_quality: 90,
            seed: 42,
            base64: true,
        };

        let response = self
            .http
            .post(&self.url)
            .header("x-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status { status, body });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/json")
            .to_string();

        if content_type.starts_with("image/") {
            let bytes = response.bytes().await.map_err(|e| self.classify(e))?;
            if bytes.is_empty() {
                return Err(UpstreamError::MissingImage);
            }
            return Ok(format!(
                "data:{};base64,{}",
                content_type,
                engine.encode(&bytes)
            ));
        }

        let body: Value = response.json().await.map_err(|e| self.classify(e))?;
        let payload = extract_image_payload(&body).ok_or(UpstreamError::MissingImage)?;
        Ok(normalize_image_payload(payload))
    }
}

/// Response fields that may carry the generated image, in priority order.
/// The provider has answered with either name depending on mode.
pub const IMAGE_PAYLOAD_FIELDS: &[&str] = &["base64", "image"];

/// Pull the image payload out of a JSON response; first non-empty field wins.
pub fn extract_image_payload(body: &Value) -> Option<&str> {
    IMAGE_PAYLOAD_FIELDS
        .iter()
        .filter_map(|field| body.get(*field).and_then(Value::as_str))
        .find(|payload| !payload.is_empty())
}

/// Turn an image payload into something directly displayable: data URIs pass
/// through untouched, bare base64 gets a PNG data-URI prefix.
pub fn normalize_image_payload(payload: &str) -> String {
    if payload.starts_with("data:") {
        payload.to_string()
    } else {
        format!("{}{}", PNG_DATA_URI_PREFIX, payload)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("Segmind API Error: {status}")]
    Status { status: StatusCode, body: String },

    #[error("Segmind request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Segmind request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Segmind response did not contain an image")]
    MissingImage,
}

impl UpstreamError {
    /// Raw upstream body, kept on the failed record for diagnostics.
    pub fn diagnostic(&self) -> Option<String> {
        match self {
            UpstreamError::Status { body, .. } if !body.is_empty() => Some(body.clone()),
            _ => None,
        }
    }
}
