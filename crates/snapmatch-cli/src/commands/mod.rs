pub mod config;
pub mod event;
pub mod photos;
pub mod process;
pub mod search;
pub mod status;

pub use event::{create_event, list_events};
pub use photos::{add_photos, import_photos};
pub use process::{run_process, ProcessEnd, INTERRUPTED_EXIT_CODE};
pub use search::{run_search, SearchOptions};
pub use status::show_status;

use anyhow::{Context, Result};
use snapmatch_core::model::EventId;
use snapmatch_core::schema::Database;
use snapmatch_pipeline::Config;

/// Open the configured database, creating its directory if needed.
fn open_database(config: &Config) -> Result<Database> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    Database::open(&config.database_path).with_context(|| {
        format!(
            "Failed to open database at {}",
            config.database_path.display()
        )
    })
}

fn parse_event_id(raw: &str) -> Result<EventId> {
    raw.parse()
        .with_context(|| format!("Invalid event ID (not a UUID): {raw}"))
}
