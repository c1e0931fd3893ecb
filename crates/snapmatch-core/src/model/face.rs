use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{FaceId, PhotoId};

/// Axis-aligned face region in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    /// Build from `[x1, y1, x2, y2]` corner coordinates.
    #[must_use]
    pub fn from_corners(corners: [f32; 4]) -> Self {
        let [x1, y1, x2, y2] = corners;
        Self {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
        }
    }
}

/// One detected face within a photo.
///
/// Written once by the batch processor and never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceEmbedding {
    pub id: FaceId,
    pub photo_id: PhotoId,
    pub vector: Vec<f32>,
    /// Detector confidence, 0.0-1.0.
    pub confidence: f32,
    pub bbox: Option<BoundingBox>,
    pub created_at: DateTime<Utc>,
}

impl FaceEmbedding {
    #[must_use]
    pub fn new(photo_id: PhotoId, vector: Vec<f32>, confidence: f32) -> Self {
        Self {
            id: FaceId::new(),
            photo_id,
            vector,
            confidence,
            bbox: None,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }

    /// Encode the vector as little-endian `f32` bytes for storage.
    #[must_use]
    pub fn vector_bytes(&self) -> Vec<u8> {
        self.vector.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    /// Decode a vector previously produced by [`Self::vector_bytes`].
    ///
    /// Returns `None` when the byte length is not a multiple of four.
    #[must_use]
    pub fn vector_from_bytes(bytes: &[u8]) -> Option<Vec<f32>> {
        if bytes.len() % 4 != 0 {
            return None;
        }
        Some(
            bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_from_corners() {
        let bbox = BoundingBox::from_corners([10.0, 20.0, 60.0, 100.0]);
        assert_eq!(bbox.x, 10.0);
        assert_eq!(bbox.y, 20.0);
        assert_eq!(bbox.width, 50.0);
        assert_eq!(bbox.height, 80.0);
    }

    #[test]
    fn test_vector_bytes_decode() {
        let face = FaceEmbedding::new(PhotoId::new(), vec![0.5, -1.25, 3.0], 0.9);
        let bytes = face.vector_bytes();
        assert_eq!(bytes.len(), 12);
        assert_eq!(FaceEmbedding::vector_from_bytes(&bytes), Some(face.vector));
    }

    #[test]
    fn test_vector_from_truncated_bytes() {
        assert_eq!(FaceEmbedding::vector_from_bytes(&[0, 0, 128]), None);
    }
}
