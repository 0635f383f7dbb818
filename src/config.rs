//! Configuration management

use anyhow::Result;
use std::path::PathBuf;

use crate::render::ImageFormat;

/// Default upstream search endpoint.
const DEFAULT_API_URL: &str = "http://xwl.vincentzyu233.cn:51225/search";

/// Bot configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Upstream search API base URL
    pub api_url: String,

    /// SQLite database path for subscriptions
    pub db_path: PathBuf,

    /// Whether replies quote the triggering message
    pub quote_replies: bool,

    /// Register the image query command
    pub enable_image_query: bool,

    /// Register the image batch query command
    pub enable_image_batch_query: bool,

    /// Output encoding for rendered images
    pub image_format: ImageFormat,

    /// Screenshot quality 0-100, honored for jpeg/webp only
    pub screenshot_quality: u8,

    /// Screenshot service endpoint; rendering is disabled when unset
    pub render_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let api_url =
            std::env::var("EXPOBOT_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let db_path = std::env::var("EXPOBOT_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::data_local_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("expobot")
                    .join("subscriptions.db")
            });

        let quote_replies = std::env::var("EXPOBOT_QUOTE_REPLIES")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(true);

        let enable_image_query = std::env::var("EXPOBOT_IMAGE_QUERY")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let enable_image_batch_query = std::env::var("EXPOBOT_IMAGE_BATCH_QUERY")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let image_format = std::env::var("EXPOBOT_IMAGE_FORMAT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(ImageFormat::Png);

        let screenshot_quality = std::env::var("EXPOBOT_SCREENSHOT_QUALITY")
            .ok()
            .and_then(|v| v.parse::<u8>().ok())
            .map(|q| q.min(100))
            .unwrap_or(80);

        let render_url = std::env::var("EXPOBOT_RENDER_URL").ok();

        Ok(Self {
            api_url,
            db_path,
            quote_replies,
            enable_image_query,
            enable_image_batch_query,
            image_format,
            screenshot_quality,
            render_url,
        })
    }
}

// Platform-specific dirs fallback
mod dirs {
    use std::path::PathBuf;

    pub fn data_local_dir() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .map(PathBuf::from)
                .ok()
                .or_else(|| {
                    std::env::var("HOME")
                        .map(|h| PathBuf::from(h).join(".local/share"))
                        .ok()
                })
        }

        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
                .ok()
        }

        #[cfg(target_os = "windows")]
        {
            std::env::var("LOCALAPPDATA").map(PathBuf::from).ok()
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
        {
            None
        }
    }
}
