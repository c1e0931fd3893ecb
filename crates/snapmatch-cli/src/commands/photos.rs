use anyhow::{Context, Result};
use std::path::Path;

use snapmatch_pipeline::{add_urls, import_directory, Config, ImportReport};

use super::{open_database, parse_event_id};

pub fn add_photos(config: &Config, event: &str, urls: &[String], uploader: &str) -> Result<()> {
    let event_id = parse_event_id(event)?;
    let db = open_database(config)?;

    let report = add_urls(&db, &event_id, urls, uploader).context("Failed to register photos")?;
    print_report(&report);

    Ok(())
}

pub fn import_photos(config: &Config, event: &str, dir: &Path, uploader: &str) -> Result<()> {
    let event_id = parse_event_id(event)?;
    if !dir.is_dir() {
        anyhow::bail!("Not a directory: {}", dir.display());
    }

    let db = open_database(config)?;
    tracing::info!("Importing photos from {}", dir.display());

    let report = import_directory(&db, &event_id, dir, uploader)
        .with_context(|| format!("Failed to import {}", dir.display()))?;
    print_report(&report);

    Ok(())
}

fn print_report(report: &ImportReport) {
    println!("✓ Registered {} new photos", report.added);
    if report.skipped > 0 {
        println!("  {} already registered (skipped)", report.skipped);
    }
    if report.added > 0 {
        println!("\n  Run `snapmatch process <event>` to extract faces");
    }
}
