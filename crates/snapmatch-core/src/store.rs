//! Store interfaces the pipeline is written against.
//!
//! [`crate::schema::Database`] implements both traits on SQLite; other
//! backends only need to honour the same atomicity contract on
//! [`FaceStore::commit_faces`].

use crate::error::Result;
use crate::model::{EventId, FaceEmbedding, Photo, PhotoId};

/// Result of committing a photo's faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Faces were written and the photo flipped to processed.
    Committed { faces: usize },
    /// The photo already had embedding rows; only the flag was flipped.
    ExistingFacesKept { faces: usize },
    /// Another run already resolved the photo. Nothing was written.
    AlreadyProcessed,
}

/// Photo lookups and the processed flag.
pub trait PhotoStore: Send + Sync {
    /// Photos of `event_id` that have not been processed yet.
    fn unprocessed_photos(&self, event_id: &EventId) -> Result<Vec<Photo>>;

    /// Flip `processed` to `true` if it is still `false`.
    ///
    /// Returns whether this call performed the flip.
    fn mark_processed(&self, photo_id: &PhotoId) -> Result<bool>;

    /// Resolve ids to photos. Unknown ids are skipped, not errors.
    fn photos_by_ids(&self, ids: &[PhotoId]) -> Result<Vec<Photo>>;
}

/// Face embedding persistence.
pub trait FaceStore: Send + Sync {
    /// Insert a single embedding row.
    fn insert_face(&self, face: &FaceEmbedding) -> Result<()>;

    /// Write `faces` for `photo_id` and mark the photo processed as one
    /// atomic unit.
    ///
    /// Already-processed photos are left untouched. A photo that already
    /// has embedding rows only gets its flag flipped.
    fn commit_faces(&self, photo_id: &PhotoId, faces: &[FaceEmbedding]) -> Result<CommitOutcome>;

    /// All stored embeddings, optionally restricted to one event's photos.
    fn faces(&self, event_id: Option<&EventId>) -> Result<Vec<FaceEmbedding>>;

    /// Number of embedding rows for one photo.
    fn face_count(&self, photo_id: &PhotoId) -> Result<usize>;
}
