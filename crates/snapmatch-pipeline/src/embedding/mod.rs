//! Face embedding extraction.
//!
//! The face model runs out of process. [`EmbeddingService`] is the seam the
//! batch processor and searcher call through; [`http::HttpEmbeddingClient`]
//! is the production implementation.

pub mod http;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use snapmatch_core::model::{BoundingBox, FaceEmbedding, PhotoId};

use crate::error::{PipelineError, PipelineResult};

/// One face found in an image by the embedding service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub vector: Vec<f32>,
    pub confidence: f32,
    pub bbox: Option<BoundingBox>,
}

impl Detection {
    #[must_use]
    pub fn new(vector: Vec<f32>, confidence: f32) -> Self {
        Self {
            vector,
            confidence,
            bbox: None,
        }
    }

    #[must_use]
    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    /// Turn the detection into a storable embedding for `photo_id`.
    #[must_use]
    pub fn into_face(self, photo_id: PhotoId) -> FaceEmbedding {
        let face = FaceEmbedding::new(photo_id, self.vector, self.confidence);
        match self.bbox {
            Some(bbox) => face.with_bbox(bbox),
            None => face,
        }
    }
}

/// Extracts face embeddings from an image reachable at a URL.
///
/// An empty `Vec` means the image was read successfully but contains no
/// face. Anything that prevents reading the image is an error.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn extract(&self, image_url: &str) -> PipelineResult<Vec<Detection>>;
}

/// Which detection of a multi-face reference image drives a search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceFace {
    /// The detection with the highest confidence; ties keep the earliest.
    #[default]
    HighestConfidence,
    /// The first detection the service returned.
    First,
}

impl ReferenceFace {
    /// Pick one detection, or `None` if there are none.
    #[must_use]
    pub fn select(self, detections: Vec<Detection>) -> Option<Detection> {
        match self {
            Self::First => detections.into_iter().next(),
            Self::HighestConfidence => detections.into_iter().fold(None, |best, d| match best {
                Some(b) if b.confidence >= d.confidence => Some(b),
                _ => Some(d),
            }),
        }
    }
}

/// Check a service response before anything is stored.
///
/// Rejects empty or non-finite vectors, confidences outside `[0, 1]`, and
/// responses whose vectors disagree on dimension.
pub fn validate_detections(url: &str, detections: &[Detection]) -> PipelineResult<()> {
    let malformed = |message: String| PipelineError::MalformedResponse {
        url: url.to_string(),
        message,
    };

    let mut dimension = None;
    for (i, d) in detections.iter().enumerate() {
        if d.vector.is_empty() {
            return Err(malformed(format!("face {i} has an empty vector")));
        }
        if d.vector.iter().any(|v| !v.is_finite()) {
            return Err(malformed(format!("face {i} has a non-finite component")));
        }
        if !(0.0..=1.0).contains(&d.confidence) {
            return Err(malformed(format!(
                "face {i} has confidence {} outside [0, 1]",
                d.confidence
            )));
        }
        match dimension {
            None => dimension = Some(d.vector.len()),
            Some(expected) if expected != d.vector.len() => {
                return Err(malformed(format!(
                    "face {i} has dimension {}, expected {expected}",
                    d.vector.len()
                )));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Call `service` with an upper time bound and validate what comes back.
pub async fn extract_checked(
    service: &dyn EmbeddingService,
    url: &str,
    timeout: Duration,
) -> PipelineResult<Vec<Detection>> {
    let detections = tokio::time::timeout(timeout, service.extract(url))
        .await
        .map_err(|_| PipelineError::Timeout {
            url: url.to_string(),
            after: timeout,
        })??;
    validate_detections(url, &detections)?;
    Ok(detections)
}
