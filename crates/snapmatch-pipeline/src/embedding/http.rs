//! HTTP client for the face embedding service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use snapmatch_core::model::BoundingBox;

use super::{Detection, EmbeddingService};
use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};

const EXTRACT_PATH: &str = "/api/extract-embeddings";
const MAX_ERROR_BODY: usize = 200;

/// Client for a service exposing `POST /api/extract-embeddings`.
#[derive(Debug, Clone)]
pub struct HttpEmbeddingClient {
    http: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct ExtractRequest<'a> {
    image_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    embeddings: Vec<WireEmbedding>,
}

#[derive(Debug, Deserialize)]
struct WireEmbedding {
    vector: Vec<f32>,
    confidence: f32,
    #[serde(default)]
    bbox: Option<Vec<f32>>,
}

impl WireEmbedding {
    fn into_detection(self) -> Detection {
        let bbox = match self.bbox.as_deref() {
            Some(&[x1, y1, x2, y2]) => Some(BoundingBox::from_corners([x1, y1, x2, y2])),
            Some(other) => {
                log::debug!("Ignoring bbox with {} coordinates", other.len());
                None
            }
            None => None,
        };
        Detection {
            vector: self.vector,
            confidence: self.confidence,
            bbox,
        }
    }
}

impl HttpEmbeddingClient {
    /// Create a client for the service at `base_url`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> PipelineResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("snapmatch/0.1.0 (https://github.com/snapmatch/snapmatch)")
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn from_config(config: &Config) -> PipelineResult<Self> {
        Self::new(&config.embedding_service_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check that the service answers on its root path.
    ///
    /// # Errors
    /// Returns an error if the service is unreachable or answers with a
    /// non-success status.
    pub async fn health(&self) -> PipelineResult<()> {
        let url = format!("{}/", self.base_url);
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(PipelineError::Http {
                url,
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("").to_string(),
            })
        }
    }
}

#[async_trait]
impl EmbeddingService for HttpEmbeddingClient {
    async fn extract(&self, image_url: &str) -> PipelineResult<Vec<Detection>> {
        let endpoint = format!("{}{EXTRACT_PATH}", self.base_url);
        log::debug!("Extracting faces from {image_url}");

        let response = self
            .http
            .post(&endpoint)
            .json(&ExtractRequest { image_url })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(PipelineError::Http {
                url: image_url.to_string(),
                status: status.as_u16(),
                message: truncate(&body, MAX_ERROR_BODY),
            });
        }

        let parsed: ExtractResponse =
            serde_json::from_str(&body).map_err(|e| PipelineError::MalformedResponse {
                url: image_url.to_string(),
                message: e.to_string(),
            })?;

        Ok(parsed
            .embeddings
            .into_iter()
            .map(WireEmbedding::into_detection)
            .collect())
    }
}

fn truncate(body: &str, max: usize) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = HttpEmbeddingClient::new("http://localhost:8000/", Duration::from_secs(5));
        assert!(client.is_ok());
        assert_eq!(client.unwrap().base_url(), "http://localhost:8000");
    }

    #[test]
    fn test_wire_bbox_conversion() {
        let wire: WireEmbedding = serde_json::from_str(
            r#"{"vector": [0.1, 0.2], "confidence": 0.9, "bbox": [10, 20, 110, 220]}"#,
        )
        .unwrap();
        let detection = wire.into_detection();
        assert_eq!(
            detection.bbox,
            Some(BoundingBox {
                x: 10.0,
                y: 20.0,
                width: 100.0,
                height: 200.0
            })
        );
    }

    #[test]
    fn test_wire_bbox_wrong_length_dropped() {
        let wire: WireEmbedding =
            serde_json::from_str(r#"{"vector": [0.1], "confidence": 0.9, "bbox": [1, 2, 3]}"#)
                .unwrap();
        assert!(wire.into_detection().bbox.is_none());
    }

    #[test]
    fn test_missing_embeddings_field_is_error() {
        let parsed: Result<ExtractResponse, _> = serde_json::from_str(r#"{"faces": []}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("  short  ", 10), "short");
        assert_eq!(truncate("abcdefghij", 4), "abcd...");
    }
}
