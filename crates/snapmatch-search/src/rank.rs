use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use snapmatch_core::model::{FaceEmbedding, PhotoId};

use crate::error::{SearchError, SearchResult};
use crate::similarity::{cosine_similarity, ScoreScale};

/// Minimum score a face needs to count as a match, in (0, 1].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct Threshold(f32);

impl Threshold {
    pub const DEFAULT: f32 = 0.6;

    pub fn new(value: f32) -> SearchResult<Self> {
        if value > 0.0 && value <= 1.0 {
            Ok(Self(value))
        } else {
            Err(SearchError::InvalidThreshold(value))
        }
    }

    #[must_use]
    pub const fn value(self) -> f32 {
        self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl TryFrom<f32> for Threshold {
    type Error = SearchError;

    fn try_from(value: f32) -> SearchResult<Self> {
        Self::new(value)
    }
}

impl From<Threshold> for f32 {
    fn from(threshold: Threshold) -> Self {
        threshold.0
    }
}

/// A photo that matched, with its best face score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredPhoto {
    pub photo_id: PhotoId,
    pub score: f32,
}

/// Output of a ranking pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ranking {
    /// Matching photos, best score first, ties by ascending photo id.
    pub matches: Vec<ScoredPhoto>,
    /// Faces that were actually scored.
    pub compared: usize,
    /// Faces skipped because they could not be compared with the reference.
    pub skipped: usize,
}

/// Score every face against `reference` and rank the matching photos.
///
/// A photo with several passing faces appears once, with its highest score.
/// Faces whose dimension differs from the reference are skipped and counted
/// rather than compared.
pub fn rank_photos(
    reference: &[f32],
    faces: &[FaceEmbedding],
    threshold: Threshold,
    scale: ScoreScale,
) -> SearchResult<Ranking> {
    if reference.is_empty() {
        return Err(SearchError::EmptyVector);
    }

    let mut best: HashMap<PhotoId, f32> = HashMap::new();
    let mut compared = 0;
    let mut skipped = 0;

    for face in faces {
        let cosine = match cosine_similarity(reference, &face.vector) {
            Ok(cosine) => cosine,
            Err(e) => {
                log::warn!("Skipping face {} of photo {}: {}", face.id, face.photo_id, e);
                skipped += 1;
                continue;
            }
        };
        compared += 1;

        let score = scale.apply(cosine);
        if score >= threshold.value() {
            best.entry(face.photo_id)
                .and_modify(|current| *current = current.max(score))
                .or_insert(score);
        }
    }

    let mut matches: Vec<ScoredPhoto> = best
        .into_iter()
        .map(|(photo_id, score)| ScoredPhoto { photo_id, score })
        .collect();
    matches.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.photo_id.cmp(&b.photo_id))
    });

    Ok(Ranking {
        matches,
        compared,
        skipped,
    })
}
