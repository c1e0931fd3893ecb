use anyhow::{Context, Result};
use chrono::NaiveDate;
use snapmatch_core::model::Event;
use snapmatch_pipeline::Config;

use super::open_database;

pub fn create_event(
    config: &Config,
    name: &str,
    date: &str,
    description: Option<String>,
    creator: &str,
) -> Result<()> {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .with_context(|| format!("Invalid date (expected YYYY-MM-DD): {date}"))?;

    let mut event = Event::new(name, date, creator);
    if let Some(description) = description {
        event = event.with_description(description);
    }

    let db = open_database(config)?;
    db.insert_event(&event).context("Failed to create event")?;

    println!("✓ Created event: {}", event.name);
    println!("  ID: {}", event.id);
    println!("  Date: {}", event.date);

    Ok(())
}

pub fn list_events(config: &Config) -> Result<()> {
    let db = open_database(config)?;
    let events = db.list_events()?;

    if events.is_empty() {
        println!("No events yet. Create one with `snapmatch event create`.");
        return Ok(());
    }

    println!("\n📅 Events\n");
    for event in events {
        let stats = db.event_stats(&event.id)?;
        println!("  {}  {}  {}", event.id, event.date, event.name);
        println!(
            "      {} photos, {} processed, {} faces",
            stats.photos, stats.processed, stats.faces
        );
        if let Some(description) = &event.description {
            println!("      {description}");
        }
    }

    Ok(())
}
