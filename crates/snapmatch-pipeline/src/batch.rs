//! Batch face extraction for an event's uploaded photos.
//!
//! Each unprocessed photo is an independent unit: its faces are extracted,
//! stored and the photo flagged in one atomic commit, or nothing happens
//! and the photo stays eligible for the next run.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use snapmatch_core::model::{EventId, FaceEmbedding, Photo, PhotoId};
use snapmatch_core::{CommitOutcome, FaceStore, PhotoStore};
use tokio::task::JoinSet;

use crate::config::Config;
use crate::embedding::{extract_checked, EmbeddingService};
use crate::error::{PipelineError, PipelineResult};
use crate::resilience::RequestLimiter;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Counters for one [`BatchProcessor::process`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Photos that were unprocessed when the run started.
    pub attempted: usize,
    /// Photos now flagged processed, including ones another run resolved.
    pub succeeded: usize,
    /// Photos left unprocessed.
    pub failed: usize,
    /// Embedding rows written by this run.
    pub faces_stored: usize,
    /// Photos processed with no face in them.
    pub no_face: usize,
    /// Photos a concurrent run had already resolved.
    pub already_resolved: usize,
    pub failures: Vec<PhotoFailure>,
}

/// Why one photo was left unprocessed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhotoFailure {
    pub photo_id: PhotoId,
    pub file_url: String,
    /// Whether a later run is likely to succeed without intervention.
    pub transient: bool,
    pub error: String,
}

impl BatchReport {
    fn record(&mut self, outcome: CommitOutcome) {
        self.succeeded += 1;
        match outcome {
            CommitOutcome::Committed { faces: 0 } => self.no_face += 1,
            CommitOutcome::Committed { faces } => self.faces_stored += faces,
            CommitOutcome::ExistingFacesKept { .. } => {}
            CommitOutcome::AlreadyProcessed => self.already_resolved += 1,
        }
    }

    fn record_failure(&mut self, photo: &Photo, error: &PipelineError) {
        self.failed += 1;
        self.failures.push(PhotoFailure {
            photo_id: photo.id,
            file_url: photo.file_url.clone(),
            transient: error.is_transient(),
            error: error.to_string(),
        });
    }
}

/// Turns an event's unprocessed photos into stored face embeddings.
pub struct BatchProcessor {
    photos: Arc<dyn PhotoStore>,
    faces: Arc<dyn FaceStore>,
    service: Arc<dyn EmbeddingService>,
    limiter: RequestLimiter,
    request_timeout: Duration,
}

impl fmt::Debug for BatchProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchProcessor")
            .field("limiter", &self.limiter)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl BatchProcessor {
    pub fn new(
        photos: Arc<dyn PhotoStore>,
        faces: Arc<dyn FaceStore>,
        service: Arc<dyn EmbeddingService>,
    ) -> Self {
        Self {
            photos,
            faces,
            service,
            limiter: RequestLimiter::new(DEFAULT_MAX_CONCURRENCY),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Build a processor with the limiter and timeout from `config`.
    pub fn from_config(
        config: &Config,
        photos: Arc<dyn PhotoStore>,
        faces: Arc<dyn FaceStore>,
        service: Arc<dyn EmbeddingService>,
    ) -> Self {
        Self::new(photos, faces, service)
            .with_limiter(
                RequestLimiter::new(config.max_concurrency)
                    .with_min_interval(config.min_request_interval()),
            )
            .with_request_timeout(config.request_timeout())
    }

    #[must_use]
    pub fn with_limiter(mut self, limiter: RequestLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Extract and store faces for every unprocessed photo of `event_id`.
    ///
    /// Photo failures are counted in the report, never returned. Dropping
    /// the returned future aborts photos still in flight; committed photos
    /// stay committed.
    ///
    /// # Errors
    /// Returns an error only if the unprocessed photos cannot be listed.
    pub async fn process(&self, event_id: &EventId) -> PipelineResult<BatchReport> {
        let pending = self.photos.unprocessed_photos(event_id)?;
        let mut report = BatchReport {
            attempted: pending.len(),
            ..BatchReport::default()
        };

        if pending.is_empty() {
            log::info!("Event {event_id}: no unprocessed photos");
            return Ok(report);
        }

        log::info!(
            "Event {event_id}: processing {} photos ({} concurrent)",
            pending.len(),
            self.limiter.available()
        );

        let mut tasks = JoinSet::new();
        for photo in pending {
            let unit = PhotoUnit {
                faces: Arc::clone(&self.faces),
                service: Arc::clone(&self.service),
                limiter: self.limiter.clone(),
                request_timeout: self.request_timeout,
            };
            tasks.spawn(async move {
                let result = unit.run(&photo).await;
                (photo, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((photo, Ok(outcome))) => {
                    log::debug!("Photo {} ({}): {outcome:?}", photo.id, photo.file_name);
                    report.record(outcome);
                }
                Ok((photo, Err(e))) => {
                    log::warn!("Photo {} ({}) failed: {e}", photo.id, photo.file_url);
                    report.record_failure(&photo, &e);
                }
                Err(e) => {
                    log::error!("Photo task did not complete: {e}");
                    report.failed += 1;
                }
            }
        }

        log::info!(
            "Event {event_id}: {} succeeded, {} failed, {} faces stored",
            report.succeeded,
            report.failed,
            report.faces_stored
        );

        Ok(report)
    }
}

/// Everything one photo task needs, detached from the processor borrow.
struct PhotoUnit {
    faces: Arc<dyn FaceStore>,
    service: Arc<dyn EmbeddingService>,
    limiter: RequestLimiter,
    request_timeout: Duration,
}

impl PhotoUnit {
    async fn run(&self, photo: &Photo) -> PipelineResult<CommitOutcome> {
        let detections = {
            let _permit = self.limiter.acquire().await?;
            extract_checked(self.service.as_ref(), &photo.file_url, self.request_timeout).await?
        };

        let photo_id = photo.id;
        let faces: Vec<FaceEmbedding> = detections
            .into_iter()
            .map(|d| d.into_face(photo_id))
            .collect();

        // The commit holds a SQLite write lock; keep it off the async workers.
        let store = Arc::clone(&self.faces);
        let outcome = tokio::task::spawn_blocking(move || store.commit_faces(&photo_id, &faces))
            .await
            .map_err(|e| {
                PipelineError::Store(snapmatch_core::Error::InvalidData(format!(
                    "commit task for photo {photo_id} did not complete: {e}"
                )))
            })??;

        Ok(outcome)
    }
}
