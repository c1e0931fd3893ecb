//! JSON request/response entry points for batch processing and search.
//!
//! These never return `Err`: every failure becomes a `success: false`
//! response with a message, which is what HTTP callers expect.

use serde::{Deserialize, Serialize};
use snapmatch_core::model::EventId;
use snapmatch_search::Threshold;

use crate::batch::{BatchProcessor, BatchReport};
use crate::matcher::{MatchSearcher, PhotoMatch, SearchOutcome};

/// Message returned when the reference image has no face.
pub const NO_FACE_MESSAGE: &str = "No face detected in reference image";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    pub event_id: EventId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    pub success: bool,
    /// Photos attempted by this run.
    pub photos_processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub message: String,
    #[serde(skip)]
    pub report: Option<BatchReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub reference_image_url: String,
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    #[serde(default)]
    pub event_id: Option<EventId>,
    /// Most matches to return, best first. Absent means the searcher's default.
    #[serde(default)]
    pub limit: Option<usize>,
}

fn default_threshold() -> f32 {
    Threshold::DEFAULT
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub matches: Vec<PhotoMatch>,
}

impl SearchResponse {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            matches: Vec::new(),
        }
    }
}

/// Run a batch for the requested event.
pub async fn handle_process(processor: &BatchProcessor, request: &ProcessRequest) -> ProcessResponse {
    match processor.process(&request.event_id).await {
        Ok(report) => ProcessResponse {
            success: true,
            photos_processed: report.attempted,
            succeeded: report.succeeded,
            failed: report.failed,
            message: format!(
                "Processed {} photos: {} succeeded, {} failed",
                report.attempted, report.succeeded, report.failed
            ),
            report: Some(report),
        },
        Err(e) => {
            log::error!("Batch for event {} failed: {e}", request.event_id);
            ProcessResponse {
                success: false,
                photos_processed: 0,
                succeeded: 0,
                failed: 0,
                message: format!("Failed to process photos: {e}"),
                report: None,
            }
        }
    }
}

/// Run a search and shape the result for JSON callers.
pub async fn handle_search(searcher: &MatchSearcher, request: &SearchRequest) -> SearchResponse {
    let threshold = match Threshold::new(request.threshold) {
        Ok(threshold) => threshold,
        Err(e) => return SearchResponse::failure(e.to_string()),
    };
    if request.limit == Some(0) {
        return SearchResponse::failure("limit must be at least 1");
    }

    match searcher
        .search_with_limit(
            &request.reference_image_url,
            threshold,
            request.event_id.as_ref(),
            request.limit,
        )
        .await
    {
        Ok(SearchOutcome::NoFaceDetected) => SearchResponse::failure(NO_FACE_MESSAGE),
        Ok(SearchOutcome::Matches(matches)) => SearchResponse {
            success: true,
            message: None,
            matches,
        },
        Err(e) => {
            log::error!("Search for {} failed: {e}", request.reference_image_url);
            SearchResponse::failure(format!("Search failed: {e}"))
        }
    }
}
