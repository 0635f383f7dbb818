//! Screenshot service client
//!
//! HTTP-backed [`ImageRenderer`]: posts the document and viewport to an
//! external headless-browser service and gets the raster bytes back. The
//! service endpoint comes from configuration; when it is absent the bot
//! runs without a renderer.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use super::{ImageFormat, ImageRenderer, RenderError};

/// Device scale factor for crisper output.
const SCALE_FACTOR: f32 = 1.5;

/// Rendering can be slow for long result lists.
const RENDER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct RenderRequest<'a> {
    html: &'a str,
    width: u32,
    scale: f32,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    quality: Option<u8>,
}

pub struct ScreenshotService {
    client: reqwest::Client,
    endpoint: String,
}

impl ScreenshotService {
    pub fn new(endpoint: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(RENDER_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            endpoint: endpoint.to_string(),
        }
    }
}

#[async_trait]
impl ImageRenderer for ScreenshotService {
    async fn render(
        &self,
        html: &str,
        viewport_width: u32,
        format: ImageFormat,
        quality: u8,
    ) -> Result<Vec<u8>, RenderError> {
        let request = RenderRequest {
            html,
            width: viewport_width,
            scale: SCALE_FACTOR,
            format: format.as_str(),
            quality: format.supports_quality().then_some(quality),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RenderError::Service(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        debug!(
            "Rendered {} document: {} bytes",
            format.as_str(),
            bytes.len()
        );
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_omitted_for_png() {
        let request = RenderRequest {
            html: "<html></html>",
            width: 900,
            scale: SCALE_FACTOR,
            format: ImageFormat::Png.as_str(),
            quality: ImageFormat::Png.supports_quality().then_some(80),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("quality").is_none());
        assert_eq!(json["format"], "png");
    }

    #[test]
    fn test_quality_included_for_jpeg() {
        let request = RenderRequest {
            html: "<html></html>",
            width: 700,
            scale: SCALE_FACTOR,
            format: ImageFormat::Jpeg.as_str(),
            quality: ImageFormat::Jpeg.supports_quality().then_some(80),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["quality"], 80);
        assert_eq!(json["width"], 700);
    }
}
