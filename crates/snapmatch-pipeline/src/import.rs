//! Registering photos with an event.
//!
//! Photos are referenced by URL only. Local directories are registered as
//! `file://` URLs, which the embedding service must be able to read.

use std::path::Path;

use serde::Serialize;
use snapmatch_core::model::{EventId, Photo};
use snapmatch_core::schema::Database;
use walkdir::WalkDir;

use crate::error::PipelineResult;

/// Counters for one registration pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub discovered: usize,
    pub added: usize,
    /// Already registered for the event.
    pub skipped: usize,
}

fn is_image_file(path: &Path) -> bool {
    if let Some(ext) = path.extension() {
        matches!(
            ext.to_string_lossy().to_lowercase().as_ref(),
            "jpg" | "jpeg" | "png" | "webp"
        )
    } else {
        false
    }
}

fn file_url(path: &Path) -> PipelineResult<String> {
    let absolute = path.canonicalize().map_err(snapmatch_core::Error::from)?;
    Ok(format!("file://{}", absolute.display()))
}

fn ensure_event(db: &Database, event_id: &EventId) -> PipelineResult<()> {
    if db.get_event(event_id)?.is_none() {
        return Err(snapmatch_core::Error::NotFound {
            entity: "event",
            id: event_id.to_string(),
        }
        .into());
    }
    Ok(())
}

/// Register each URL as an unprocessed photo of `event_id`.
///
/// # Errors
/// Returns an error if the event does not exist or a write fails.
pub fn add_urls(
    db: &Database,
    event_id: &EventId,
    urls: &[String],
    uploader: &str,
) -> PipelineResult<ImportReport> {
    ensure_event(db, event_id)?;

    let mut report = ImportReport::default();
    for url in urls {
        report.discovered += 1;
        let photo = Photo::new(*event_id, url, Photo::file_name_from_url(url), uploader);
        if db.insert_photo(&photo)? {
            report.added += 1;
        } else {
            log::debug!("Already registered: {url}");
            report.skipped += 1;
        }
    }

    log::info!(
        "Event {event_id}: registered {} of {} photos",
        report.added,
        report.discovered
    );
    Ok(report)
}

/// Walk `dir` and register every image file in it.
///
/// # Errors
/// Returns an error if the event does not exist, the directory cannot be
/// resolved, or a write fails.
pub fn import_directory(
    db: &Database,
    event_id: &EventId,
    dir: &Path,
    uploader: &str,
) -> PipelineResult<ImportReport> {
    ensure_event(db, event_id)?;

    let mut report = ImportReport::default();
    for entry in WalkDir::new(dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if !path.is_file() || !is_image_file(path) {
            continue;
        }
        report.discovered += 1;

        let url = file_url(path)?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if db.insert_photo(&Photo::new(*event_id, &url, name, uploader))? {
            log::debug!("Registered: {}", path.display());
            report.added += 1;
        } else {
            report.skipped += 1;
        }
    }

    log::info!(
        "Imported {} new photos from {} ({} already registered)",
        report.added,
        dir.display(),
        report.skipped
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use snapmatch_core::model::Event;
    use snapmatch_core::PhotoStore;
    use tempfile::TempDir;

    fn db_with_event() -> (Database, EventId) {
        let db = Database::open_in_memory().unwrap();
        let event = Event::new("Gala", NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(), "host");
        db.insert_event(&event).unwrap();
        (db, event.id)
    }

    #[test]
    fn test_is_image_file() {
        assert!(is_image_file(Path::new("a.jpg")));
        assert!(is_image_file(Path::new("b.JPEG")));
        assert!(is_image_file(Path::new("c.png")));
        assert!(is_image_file(Path::new("d.webp")));
        assert!(!is_image_file(Path::new("notes.txt")));
        assert!(!is_image_file(Path::new("no_extension")));
    }

    #[test]
    fn test_add_urls_skips_duplicates() {
        let (db, event_id) = db_with_event();
        let urls = vec![
            "https://cdn/a.jpg".to_string(),
            "https://cdn/b.jpg".to_string(),
            "https://cdn/a.jpg".to_string(),
        ];
        let report = add_urls(&db, &event_id, &urls, "photographer").unwrap();
        assert_eq!(report.discovered, 3);
        assert_eq!(report.added, 2);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_add_urls_unknown_event() {
        let db = Database::open_in_memory().unwrap();
        let result = add_urls(&db, &EventId::new(), &["https://cdn/a.jpg".to_string()], "p");
        assert!(result.is_err());
    }

    #[test]
    fn test_import_directory() {
        let (db, event_id) = db_with_event();
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("one.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("two.PNG"), b"x").unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("three.jpeg"), b"x").unwrap();

        let report = import_directory(&db, &event_id, dir.path(), "p").unwrap();
        assert_eq!(report.discovered, 3);
        assert_eq!(report.added, 3);

        let photos = db.unprocessed_photos(&event_id).unwrap();
        assert_eq!(photos.len(), 3);
        assert!(photos.iter().all(|p| p.file_url.starts_with("file://")));

        let again = import_directory(&db, &event_id, dir.path(), "p").unwrap();
        assert_eq!(again.added, 0);
        assert_eq!(again.skipped, 3);
    }
}
