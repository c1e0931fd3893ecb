//! Face-matching pipeline for snapmatch.
//!
//! The [`BatchProcessor`] turns an event's uploaded photos into stored face
//! embeddings; the [`MatchSearcher`] answers "which photos contain this
//! face" for a reference selfie. Both talk to the face model through the
//! [`EmbeddingService`] trait and to storage through the
//! `snapmatch_core` store traits.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod batch;
pub mod config;
pub mod embedding;
pub mod error;
pub mod import;
pub mod matcher;
pub mod resilience;
pub mod trigger;

pub use batch::{BatchProcessor, BatchReport, PhotoFailure};
pub use config::Config;
pub use embedding::http::HttpEmbeddingClient;
pub use embedding::{Detection, EmbeddingService, ReferenceFace};
pub use error::{PipelineError, PipelineResult};
pub use import::{add_urls, import_directory, ImportReport};
pub use matcher::{MatchSearcher, PhotoMatch, SearchOutcome};
pub use resilience::RequestLimiter;
pub use trigger::{
    handle_process, handle_search, ProcessRequest, ProcessResponse, SearchRequest,
    SearchResponse,
};
