//! "Find every photo with this face" queries.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use snapmatch_core::model::{EventId, Photo, PhotoId};
use snapmatch_core::{FaceStore, PhotoStore};
use snapmatch_search::{rank_photos, ScoreScale, Threshold};

use crate::config::Config;
use crate::embedding::{extract_checked, EmbeddingService, ReferenceFace};
use crate::error::{PipelineError, PipelineResult};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A matching photo, its best face score and how many faces it holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotoMatch {
    #[serde(flatten)]
    pub photo: Photo,
    pub score: f32,
    /// Stored faces of this photo, matching or not.
    pub faces: usize,
}

/// Result of a search.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// The reference image contains no face. Distinct from an empty match list.
    NoFaceDetected,
    /// Matching photos, best first.
    Matches(Vec<PhotoMatch>),
}

impl SearchOutcome {
    /// The matches, or an empty slice when no reference face was found.
    #[must_use]
    pub fn matches(&self) -> &[PhotoMatch] {
        match self {
            Self::NoFaceDetected => &[],
            Self::Matches(matches) => matches,
        }
    }
}

/// Matches a reference face against every stored embedding.
pub struct MatchSearcher {
    photos: Arc<dyn PhotoStore>,
    faces: Arc<dyn FaceStore>,
    service: Arc<dyn EmbeddingService>,
    score_scale: ScoreScale,
    reference_face: ReferenceFace,
    request_timeout: Duration,
    limit: Option<usize>,
}

impl fmt::Debug for MatchSearcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchSearcher")
            .field("score_scale", &self.score_scale)
            .field("reference_face", &self.reference_face)
            .field("request_timeout", &self.request_timeout)
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}

impl MatchSearcher {
    pub fn new(
        photos: Arc<dyn PhotoStore>,
        faces: Arc<dyn FaceStore>,
        service: Arc<dyn EmbeddingService>,
    ) -> Self {
        Self {
            photos,
            faces,
            service,
            score_scale: ScoreScale::default(),
            reference_face: ReferenceFace::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            limit: None,
        }
    }

    pub fn from_config(
        config: &Config,
        photos: Arc<dyn PhotoStore>,
        faces: Arc<dyn FaceStore>,
        service: Arc<dyn EmbeddingService>,
    ) -> Self {
        Self::new(photos, faces, service)
            .with_score_scale(config.score_scale)
            .with_reference_face(config.reference_face)
            .with_request_timeout(config.request_timeout())
            .with_limit(config.search_limit())
    }

    #[must_use]
    pub fn with_score_scale(mut self, scale: ScoreScale) -> Self {
        self.score_scale = scale;
        self
    }

    #[must_use]
    pub fn with_reference_face(mut self, policy: ReferenceFace) -> Self {
        self.reference_face = policy;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Keep at most `limit` matches per search; `None` keeps them all.
    #[must_use]
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Find photos containing the face in `reference_url`.
    ///
    /// Only photos of `event_id` are considered when it is given. Faces
    /// whose photo no longer resolves are dropped from the result.
    ///
    /// # Errors
    /// Returns an error if the reference image cannot be read or the store
    /// cannot be queried.
    pub async fn search(
        &self,
        reference_url: &str,
        threshold: Threshold,
        event_id: Option<&EventId>,
    ) -> PipelineResult<SearchOutcome> {
        self.search_with_limit(reference_url, threshold, event_id, self.limit)
            .await
    }

    /// Like [`search`](Self::search), keeping only the `limit` best photos.
    ///
    /// `None` falls back to the searcher's own limit.
    ///
    /// # Errors
    /// Same as [`search`](Self::search).
    pub async fn search_with_limit(
        &self,
        reference_url: &str,
        threshold: Threshold,
        event_id: Option<&EventId>,
        limit: Option<usize>,
    ) -> PipelineResult<SearchOutcome> {
        let detections =
            extract_checked(self.service.as_ref(), reference_url, self.request_timeout).await?;
        let detected = detections.len();

        let Some(reference) = self.reference_face.select(detections) else {
            log::info!("No face detected in reference image {reference_url}");
            return Ok(SearchOutcome::NoFaceDetected);
        };
        if detected > 1 {
            log::debug!(
                "Reference image has {detected} faces; using {:?} policy",
                self.reference_face
            );
        }

        // Scanning every stored face holds the SQLite connection; keep it
        // off the async workers.
        let scan = Scan {
            photos: Arc::clone(&self.photos),
            faces: Arc::clone(&self.faces),
            event_id: event_id.copied(),
            threshold,
            score_scale: self.score_scale,
        };
        let (mut matches, compared) =
            tokio::task::spawn_blocking(move || scan.run(&reference.vector))
                .await
                .map_err(|e| {
                    PipelineError::Store(snapmatch_core::Error::InvalidData(format!(
                        "search scan did not complete: {e}"
                    )))
                })??;

        if let Some(limit) = limit.or(self.limit) {
            matches.truncate(limit);
        }

        log::info!(
            "Search compared {compared} faces, {} photos matched at threshold {}",
            matches.len(),
            threshold.value()
        );

        Ok(SearchOutcome::Matches(matches))
    }
}

/// The blocking half of a search: load faces, rank them, resolve photos.
struct Scan {
    photos: Arc<dyn PhotoStore>,
    faces: Arc<dyn FaceStore>,
    event_id: Option<EventId>,
    threshold: Threshold,
    score_scale: ScoreScale,
}

impl Scan {
    fn run(&self, reference: &[f32]) -> PipelineResult<(Vec<PhotoMatch>, usize)> {
        let faces = self.faces.faces(self.event_id.as_ref())?;
        let ranking = rank_photos(reference, &faces, self.threshold, self.score_scale)?;
        if ranking.skipped > 0 {
            log::warn!(
                "Skipped {} stored faces with a different dimension than the reference",
                ranking.skipped
            );
        }

        let mut face_counts: HashMap<PhotoId, usize> = HashMap::new();
        for face in &faces {
            *face_counts.entry(face.photo_id).or_default() += 1;
        }

        let ids: Vec<_> = ranking.matches.iter().map(|m| m.photo_id).collect();
        let mut by_id: HashMap<_, Photo> = self
            .photos
            .photos_by_ids(&ids)?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let matches = ranking
            .matches
            .into_iter()
            .filter_map(|scored| {
                by_id.remove(&scored.photo_id).map(|photo| PhotoMatch {
                    photo,
                    score: scored.score,
                    faces: face_counts.get(&scored.photo_id).copied().unwrap_or(0),
                })
            })
            .collect();

        Ok((matches, ranking.compared))
    }
}
