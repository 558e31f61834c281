//! Scene illustration rendering.
//!
//! The [`Illustrator`] trait is the seam the scene worker depends on;
//! [`StableDiffusionClient`] is the production implementation, talking to a
//! Stable Diffusion WebUI `txt2img` endpoint and saving the result under
//! the public assets directory.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use base64::prelude::{Engine, BASE64_STANDARD};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::Result;

/// URL prefix under which saved illustrations are served.
const ILLUSTRATION_URL_PREFIX: &str = "/public/illustrations";

/// Per-request deadline for the image service.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Renders a scene description to an image.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Illustrator: Send + Sync {
    /// Render `description` and return the URL of the saved image.
    ///
    /// Returns `Ok(None)` when the rendering service is unavailable or
    /// produced no image; the caller keeps the prior illustration. `Err` is
    /// reserved for local failures (e.g. saving the image to disk).
    async fn render(&self, description: &str) -> Result<Option<String>>;
}

/// Stable Diffusion WebUI client.
#[derive(Debug, Clone)]
pub struct StableDiffusionClient {
    http: reqwest::Client,
    base_url: String,
    output_dir: PathBuf,
}

#[derive(Deserialize)]
struct Txt2ImgResponse {
    #[serde(default)]
    images: Vec<String>,
}

impl StableDiffusionClient {
    /// Create a client for the given WebUI base URL, saving images under
    /// `output_dir`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            output_dir: output_dir.into(),
        }
    }

    async fn request_image(&self, description: &str) -> Option<Vec<u8>> {
        let url = format!("{}/sdapi/v1/txt2img", self.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .json(&json!({
                "prompt": description,
                "negative_prompt": "",
                "sampler": "DPM++ SDE",
                "scheduler": "Automatic",
                "steps": 6,
                "cfg_scale": 2,
                "width": 900,
                "height": 300,
            }))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);
        let response = match response {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "illustration service unavailable, skipping image");
                return None;
            }
        };
        let payload: Txt2ImgResponse = match response.json().await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "malformed txt2img response, skipping image");
                return None;
            }
        };
        let b64 = payload.images.into_iter().next().filter(|s| !s.is_empty())?;
        match BASE64_STANDARD.decode(b64) {
            Ok(image) => Some(image),
            Err(e) => {
                warn!(error = %e, "txt2img image was not valid base64, skipping image");
                None
            }
        }
    }
}

#[async_trait]
impl Illustrator for StableDiffusionClient {
    async fn render(&self, description: &str) -> Result<Option<String>> {
        let Some(image) = self.request_image(description).await else {
            return Ok(None);
        };

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let name = format!("scene-{}.png", Utc::now().format("%Y%m%dT%H%M%SZ"));
        tokio::fs::write(self.output_dir.join(&name), image).await?;
        debug!(file = %name, "saved scene illustration");
        Ok(Some(format!("{ILLUSTRATION_URL_PREFIX}/{name}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_service_degrades_to_none() {
        let dir = tempfile::tempdir().unwrap();
        // Nothing listens on port 1; the connection is refused immediately.
        let client = StableDiffusionClient::new("http://127.0.0.1:1", dir.path());
        let result = client.render("a foggy pier at dusk").await.unwrap();
        assert!(result.is_none());
        // No file was written.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_base_url_trailing_slash_is_tolerated() {
        let client = StableDiffusionClient::new("http://localhost:7860/", "out");
        assert_eq!(
            format!("{}/sdapi/v1/txt2img", client.base_url.trim_end_matches('/')),
            "http://localhost:7860/sdapi/v1/txt2img"
        );
    }
}
