use anyhow::Result;
use snapmatch_core::model::Event;
use snapmatch_core::schema::Database;
use snapmatch_pipeline::{Config, HttpEmbeddingClient};

use super::{open_database, parse_event_id};

pub async fn show_status(config: &Config, event: Option<&str>) -> Result<()> {
    let db = open_database(config)?;

    println!("\n📊 snapmatch Status\n");
    println!("  Database: {}", config.database_path.display());

    let service = match HttpEmbeddingClient::from_config(config) {
        Ok(client) => match client.health().await {
            Ok(()) => "reachable".to_string(),
            Err(e) => format!("unavailable ({e})"),
        },
        Err(e) => format!("misconfigured ({e})"),
    };
    println!(
        "  Embedding service: {} [{service}]",
        config.embedding_service_url
    );

    let events = match event {
        Some(raw) => {
            let id = parse_event_id(raw)?;
            match db.get_event(&id)? {
                Some(event) => vec![event],
                None => anyhow::bail!("Event not found: {id}"),
            }
        }
        None => db.list_events()?,
    };

    if events.is_empty() {
        println!("\n  No events yet.");
        return Ok(());
    }

    let mut pending_total = 0;
    for event in &events {
        pending_total += print_event(&db, event)?;
    }

    if pending_total > 0 {
        println!("\n  Run `snapmatch process <event>` to extract faces from pending photos");
    }

    Ok(())
}

fn print_event(db: &Database, event: &Event) -> Result<usize> {
    let stats = db.event_stats(&event.id)?;
    println!("\n  {} ({})", event.name, event.date);
    println!("    ID: {}", event.id);
    println!("    Photos: {}", stats.photos);
    println!("    Processed: {}", stats.processed);
    println!("    Pending: {}", stats.pending());
    println!("    Faces: {}", stats.faces);
    Ok(stats.pending())
}
