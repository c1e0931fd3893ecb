//! Face similarity search for snapmatch.
//!
//! Scores a reference face vector against stored embeddings, applies the
//! match threshold, and ranks the surviving photos. The scan is linear;
//! it is the correctness baseline any approximate index must agree with.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod error;
pub mod rank;
pub mod similarity;

pub use error::{SearchError, SearchResult};
pub use rank::{rank_photos, Ranking, ScoredPhoto, Threshold};
pub use similarity::{cosine_similarity, ScoreScale};
