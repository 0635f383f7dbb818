//! Image rendering
//!
//! Queries can be answered as rendered cards instead of plain text. This
//! module builds the HTML documents and hands them to an external
//! screenshot service behind the [`ImageRenderer`] trait. The service is
//! optional; when it is not configured the image commands stay disabled
//! and answer with an explicit notice.

pub mod html;
pub mod service;

use async_trait::async_trait;
use std::str::FromStr;

pub use service::ScreenshotService;

/// Viewport width for the multi-record list document.
pub const LIST_VIEWPORT_WIDTH: u32 = 900;

/// Viewport width for the single-record detail document.
pub const DETAIL_VIEWPORT_WIDTH: u32 = 700;

/// Output encoding for rendered images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Webp,
}

impl ImageFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Webp => "webp",
        }
    }

    /// Quality is only meaningful for lossy encodings.
    pub fn supports_quality(self) -> bool {
        !matches!(self, ImageFormat::Png)
    }
}

impl FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpeg" | "jpg" => Ok(ImageFormat::Jpeg),
            "webp" => Ok(ImageFormat::Webp),
            other => Err(format!("unknown image format: {}", other)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("screenshot request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("screenshot service returned {0}")]
    Service(u16),
}

/// Turns an HTML document into a raster image.
#[async_trait]
pub trait ImageRenderer: Send + Sync {
    async fn render(
        &self,
        html: &str,
        viewport_width: u32,
        format: ImageFormat,
        quality: u8,
    ) -> Result<Vec<u8>, RenderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!("png".parse::<ImageFormat>().unwrap(), ImageFormat::Png);
        assert_eq!("JPEG".parse::<ImageFormat>().unwrap(), ImageFormat::Jpeg);
        assert_eq!("jpg".parse::<ImageFormat>().unwrap(), ImageFormat::Jpeg);
        assert_eq!("webp".parse::<ImageFormat>().unwrap(), ImageFormat::Webp);
        assert!("gif".parse::<ImageFormat>().is_err());
    }

    #[test]
    fn test_quality_support() {
        assert!(!ImageFormat::Png.supports_quality());
        assert!(ImageFormat::Jpeg.supports_quality());
        assert!(ImageFormat::Webp.supports_quality());
    }
}
