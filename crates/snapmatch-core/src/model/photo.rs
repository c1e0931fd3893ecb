use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{EventId, PhotoId};

/// An uploaded photo belonging to an event.
///
/// `processed` flips from `false` to `true` exactly once, when face
/// extraction has been attempted successfully (whether or not any face was
/// found). It never reverts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub id: PhotoId,
    pub event_id: EventId,
    /// Public storage URL handed to the embedding service.
    pub file_url: String,
    /// Original filename as uploaded.
    pub file_name: String,
    pub uploaded_by: String,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
}

impl Photo {
    #[must_use]
    pub fn new(
        event_id: EventId,
        file_url: impl Into<String>,
        file_name: impl Into<String>,
        uploaded_by: impl Into<String>,
    ) -> Self {
        Self {
            id: PhotoId::new(),
            event_id,
            file_url: file_url.into(),
            file_name: file_name.into(),
            uploaded_by: uploaded_by.into(),
            processed: false,
            created_at: Utc::now(),
        }
    }

    /// Derive a display filename from the last path segment of a URL.
    #[must_use]
    pub fn file_name_from_url(url: &str) -> String {
        let trimmed = url.split(['?', '#']).next().unwrap_or(url);
        trimmed
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or(trimmed)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_photo_new_is_unprocessed() {
        let photo = Photo::new(EventId::new(), "https://cdn/x/a.jpg", "a.jpg", "ph-1");
        assert!(!photo.processed);
        assert_eq!(photo.file_name, "a.jpg");
    }

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            Photo::file_name_from_url("https://cdn.example.com/e1/IMG_01.jpg?token=abc"),
            "IMG_01.jpg"
        );
        assert_eq!(Photo::file_name_from_url("file:///tmp/pics/b.png"), "b.png");
        assert_eq!(Photo::file_name_from_url("https://cdn/dir/"), "dir");
    }
}
