use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::model::{BoundingBox, Event, EventId, FaceEmbedding, Photo, PhotoId};
use crate::store::{CommitOutcome, FaceStore, PhotoStore};

use super::migrations::MIGRATIONS;

/// How long a writer waits on a lock held by another connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite caps bound parameters per statement; id lookups are chunked.
const MAX_IDS_PER_QUERY: usize = 500;

const PHOTO_COLUMNS: &str =
    "id, event_id, file_url, file_name, uploaded_by, processed, created_at";

const FACE_COLUMNS: &str =
    "f.id, f.photo_id, f.vector, f.dimension, f.confidence, f.bbox, f.created_at";

/// Per-event processing counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventStats {
    pub photos: usize,
    pub processed: usize,
    pub faces: usize,
}

impl EventStats {
    #[must_use]
    pub const fn pending(&self) -> usize {
        self.photos.saturating_sub(self.processed)
    }
}

/// A database connection implementing the photo and face stores.
///
/// The connection sits behind a mutex so one `Database` can be shared
/// across concurrent photo tasks.
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a database at the given path and apply migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open an in-memory database (for tests).
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.apply_migrations()?;
        Ok(db)
    }

    /// Lock the underlying connection (for advanced queries).
    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::LockPoisoned)
    }

    fn apply_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )?;

        let mut stmt = conn.prepare("SELECT version FROM schema_migrations ORDER BY version")?;
        let applied: Vec<u32> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        drop(stmt);

        for migration in MIGRATIONS {
            if !applied.contains(&migration.version) {
                log::info!(
                    "Applying migration {} ({})",
                    migration.version,
                    migration.name
                );
                conn.execute_batch(migration.sql)?;
                conn.execute(
                    "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
                    rusqlite::params![migration.version, migration.name],
                )?;
            }
        }

        Ok(())
    }
}

// Event CRUD
impl Database {
    /// Insert a new event.
    pub fn insert_event(&self, event: &Event) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO events (id, name, description, event_date, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                event.id.to_string(),
                event.name,
                event.description,
                event.date.to_string(),
                event.created_by,
                event.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Look up an event by id.
    pub fn get_event(&self, id: &EventId) -> Result<Option<Event>> {
        let event = self
            .conn()?
            .query_row(
                "SELECT id, name, description, event_date, created_by, created_at
                 FROM events WHERE id = ?1",
                [id.to_string()],
                row_to_event,
            )
            .optional()?;
        Ok(event)
    }

    /// List all events, most recent date first.
    pub fn list_events(&self) -> Result<Vec<Event>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, description, event_date, created_by, created_at
             FROM events
             ORDER BY event_date DESC, name",
        )?;
        let events = stmt
            .query_map([], row_to_event)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }
}

// Photo CRUD
impl Database {
    /// Insert a photo. Returns `false` when the event already has a photo
    /// with the same URL.
    pub fn insert_photo(&self, photo: &Photo) -> Result<bool> {
        let inserted = self.conn()?.execute(
            "INSERT OR IGNORE INTO photos (
                id, event_id, file_url, file_name, uploaded_by, processed, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                photo.id.to_string(),
                photo.event_id.to_string(),
                photo.file_url,
                photo.file_name,
                photo.uploaded_by,
                photo.processed,
                photo.created_at.to_rfc3339(),
            ],
        )?;
        Ok(inserted > 0)
    }

    /// Look up a photo by id.
    pub fn get_photo(&self, id: &PhotoId) -> Result<Option<Photo>> {
        let photo = self
            .conn()?
            .query_row(
                &format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE id = ?1"),
                [id.to_string()],
                row_to_photo,
            )
            .optional()?;
        Ok(photo)
    }

    /// List every photo of an event, in upload order.
    pub fn list_photos(&self, event_id: &EventId) -> Result<Vec<Photo>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PHOTO_COLUMNS} FROM photos
             WHERE event_id = ?1
             ORDER BY created_at, file_name"
        ))?;
        let photos = stmt
            .query_map([event_id.to_string()], row_to_photo)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(photos)
    }

    /// Photo, processed and face counters for one event.
    pub fn event_stats(&self, event_id: &EventId) -> Result<EventStats> {
        let conn = self.conn()?;
        let (photos, processed): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(processed), 0) FROM photos WHERE event_id = ?1",
            [event_id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let faces: i64 = conn.query_row(
            "SELECT COUNT(*) FROM face_embeddings f
             JOIN photos p ON p.id = f.photo_id
             WHERE p.event_id = ?1",
            [event_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(EventStats {
            photos: to_count(photos)?,
            processed: to_count(processed)?,
            faces: to_count(faces)?,
        })
    }
}

impl PhotoStore for Database {
    fn unprocessed_photos(&self, event_id: &EventId) -> Result<Vec<Photo>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PHOTO_COLUMNS} FROM photos
             WHERE event_id = ?1 AND processed = 0
             ORDER BY created_at, file_name"
        ))?;
        let photos = stmt
            .query_map([event_id.to_string()], row_to_photo)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(photos)
    }

    fn mark_processed(&self, photo_id: &PhotoId) -> Result<bool> {
        let changed = self.conn()?.execute(
            "UPDATE photos SET processed = 1 WHERE id = ?1 AND processed = 0",
            [photo_id.to_string()],
        )?;
        Ok(changed > 0)
    }

    fn photos_by_ids(&self, ids: &[PhotoId]) -> Result<Vec<Photo>> {
        let conn = self.conn()?;
        let mut photos = Vec::with_capacity(ids.len());

        for chunk in ids.chunks(MAX_IDS_PER_QUERY) {
            let placeholders = (1..=chunk.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            let mut stmt = conn.prepare(&format!(
                "SELECT {PHOTO_COLUMNS} FROM photos WHERE id IN ({placeholders})"
            ))?;
            let rows = stmt
                .query_map(
                    rusqlite::params_from_iter(chunk.iter().map(ToString::to_string)),
                    row_to_photo,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            photos.extend(rows);
        }

        Ok(photos)
    }
}

impl FaceStore for Database {
    fn insert_face(&self, face: &FaceEmbedding) -> Result<()> {
        let conn = self.conn()?;
        check_dimension(&conn, face.dimension())?;
        insert_face_row(&conn, face)
    }

    fn commit_faces(&self, photo_id: &PhotoId, faces: &[FaceEmbedding]) -> Result<CommitOutcome> {
        if let Some(stray) = faces.iter().find(|f| f.photo_id != *photo_id) {
            return Err(Error::InvalidData(format!(
                "face {} belongs to photo {}, not {}",
                stray.id, stray.photo_id, photo_id
            )));
        }

        let mut conn = self.conn()?;
        // IMMEDIATE takes the write lock up front so concurrent commits for
        // the same photo serialize instead of both passing the flag check.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let processed: Option<bool> = tx
            .query_row(
                "SELECT processed FROM photos WHERE id = ?1",
                [photo_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        match processed {
            None => {
                return Err(Error::NotFound {
                    entity: "photo",
                    id: photo_id.to_string(),
                })
            }
            Some(true) => return Ok(CommitOutcome::AlreadyProcessed),
            Some(false) => {}
        }

        let existing = count_faces(&tx, photo_id)?;
        let outcome = if existing > 0 {
            log::warn!(
                "Photo {} already has {} face rows; marking processed without re-inserting",
                photo_id,
                existing
            );
            CommitOutcome::ExistingFacesKept { faces: existing }
        } else {
            for face in faces {
                check_dimension(&tx, face.dimension())?;
                insert_face_row(&tx, face)?;
            }
            CommitOutcome::Committed { faces: faces.len() }
        };

        tx.execute(
            "UPDATE photos SET processed = 1 WHERE id = ?1 AND processed = 0",
            [photo_id.to_string()],
        )?;
        tx.commit()?;

        Ok(outcome)
    }

    fn faces(&self, event_id: Option<&EventId>) -> Result<Vec<FaceEmbedding>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {FACE_COLUMNS} FROM face_embeddings f
             JOIN photos p ON p.id = f.photo_id
             WHERE ?1 IS NULL OR p.event_id = ?1
             ORDER BY f.photo_id, f.id"
        ))?;
        let faces = stmt
            .query_map([event_id.map(ToString::to_string)], row_to_face)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(faces)
    }

    fn face_count(&self, photo_id: &PhotoId) -> Result<usize> {
        let conn = self.conn()?;
        count_faces(&conn, photo_id)
    }
}

fn count_faces(conn: &Connection, photo_id: &PhotoId) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM face_embeddings WHERE photo_id = ?1",
        [photo_id.to_string()],
        |row| row.get(0),
    )?;
    to_count(count)
}

/// Reject a vector whose length differs from what the store already holds.
fn check_dimension(conn: &Connection, dimension: usize) -> Result<()> {
    if dimension == 0 {
        return Err(Error::InvalidData("empty face vector".to_string()));
    }

    let stored: Option<i64> = conn
        .query_row("SELECT dimension FROM face_embeddings LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()?;

    match stored {
        Some(expected) => {
            let expected = to_count(expected)?;
            if expected == dimension {
                Ok(())
            } else {
                Err(Error::DimensionMismatch {
                    expected,
                    actual: dimension,
                })
            }
        }
        None => Ok(()),
    }
}

fn insert_face_row(conn: &Connection, face: &FaceEmbedding) -> Result<()> {
    let bbox = face.bbox.as_ref().map(serde_json::to_string).transpose()?;
    conn.execute(
        "INSERT INTO face_embeddings (id, photo_id, vector, dimension, confidence, bbox, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            face.id.to_string(),
            face.photo_id.to_string(),
            face.vector_bytes(),
            i64::try_from(face.dimension()).unwrap_or(i64::MAX),
            f64::from(face.confidence),
            bbox,
            face.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn to_count(value: i64) -> Result<usize> {
    usize::try_from(value).map_err(|_| Error::InvalidData(format!("negative count: {value}")))
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn parse_column<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

fn parse_timestamp(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(Into::into)
        .map_err(|e| conversion_error(idx, e))
}

fn row_to_event(row: &rusqlite::Row) -> rusqlite::Result<Event> {
    Ok(Event {
        id: parse_column(row, 0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        date: parse_column::<NaiveDate>(row, 3)?,
        created_by: row.get(4)?,
        created_at: parse_timestamp(row, 5)?,
    })
}

fn row_to_photo(row: &rusqlite::Row) -> rusqlite::Result<Photo> {
    Ok(Photo {
        id: parse_column(row, 0)?,
        event_id: parse_column(row, 1)?,
        file_url: row.get(2)?,
        file_name: row.get(3)?,
        uploaded_by: row.get(4)?,
        processed: row.get(5)?,
        created_at: parse_timestamp(row, 6)?,
    })
}

fn row_to_face(row: &rusqlite::Row) -> rusqlite::Result<FaceEmbedding> {
    let bytes: Vec<u8> = row.get(2)?;
    let dimension: i64 = row.get(3)?;
    let vector = FaceEmbedding::vector_from_bytes(&bytes)
        .filter(|v| i64::try_from(v.len()).is_ok_and(|len| len == dimension))
        .ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                Type::Blob,
                format!("vector blob of {} bytes does not hold {dimension} floats", bytes.len())
                    .into(),
            )
        })?;

    let bbox: Option<String> = row.get(5)?;
    let bbox = bbox
        .map(|raw| serde_json::from_str::<BoundingBox>(&raw))
        .transpose()
        .map_err(|e| conversion_error(5, e))?;

    let confidence: f64 = row.get(4)?;
    #[allow(clippy::cast_possible_truncation)]
    let confidence = confidence as f32;

    Ok(FaceEmbedding {
        id: parse_column(row, 0)?,
        photo_id: parse_column(row, 1)?,
        vector,
        confidence,
        bbox,
        created_at: parse_timestamp(row, 6)?,
    })
}
