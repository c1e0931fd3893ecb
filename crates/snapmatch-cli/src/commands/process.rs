use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;

use snapmatch_pipeline::{
    handle_process, BatchProcessor, Config, HttpEmbeddingClient, ProcessRequest, ProcessResponse,
};

use super::{open_database, parse_event_id};

/// Exit status of a batch stopped with Ctrl-C (128 + SIGINT).
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// How a `process` run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessEnd {
    Finished,
    Interrupted,
}

/// Run one batch for an event.
///
/// Ctrl-C drops the batch future, which aborts photos still in flight.
/// Photos that were already committed stay processed.
pub async fn run_process(config: &Config, event: &str, json: bool) -> Result<ProcessEnd> {
    let event_id = parse_event_id(event)?;
    let db = Arc::new(open_database(config)?);
    if db.get_event(&event_id)?.is_none() {
        anyhow::bail!("Event not found: {event_id}");
    }

    let client = HttpEmbeddingClient::from_config(config)
        .context("Failed to create embedding service client")?;
    let processor = BatchProcessor::from_config(
        config,
        Arc::clone(&db) as _,
        Arc::clone(&db) as _,
        Arc::new(client),
    );

    if !json {
        println!("\n📸 Processing event {event_id}\n");
        println!("  Embedding service: {}", config.embedding_service_url);
        println!("  Concurrency: {}", config.max_concurrency);
        println!();
    }

    let request = ProcessRequest { event_id };
    let Some(response) = until_interrupted(handle_process(&processor, &request), ctrl_c()).await
    else {
        eprintln!("\n✗ Interrupted. Committed photos stay processed; run again to continue.");
        return Ok(ProcessEnd::Interrupted);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_summary(&response);
    }

    if !response.success {
        anyhow::bail!("{}", response.message);
    }

    Ok(ProcessEnd::Finished)
}

/// Drive `work` to completion unless `interrupt` resolves first.
async fn until_interrupted<T>(work: impl Future<Output = T>, interrupt: impl Future) -> Option<T> {
    tokio::select! {
        output = work => Some(output),
        _ = interrupt => None,
    }
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Ctrl-C handler unavailable: {e}");
        std::future::pending::<()>().await;
    }
}

fn print_summary(response: &ProcessResponse) {
    let Some(report) = &response.report else {
        eprintln!("  ✗ {}", response.message);
        return;
    };

    if report.attempted == 0 {
        println!("  ✓ Nothing to do: every photo is already processed");
        return;
    }

    println!("  Attempted: {}", report.attempted);
    println!("  Succeeded: {}", report.succeeded);
    println!("    Faces stored: {}", report.faces_stored);
    println!("    No face: {}", report.no_face);
    if report.already_resolved > 0 {
        println!("    Resolved by another run: {}", report.already_resolved);
    }
    println!("  Failed: {}", report.failed);

    for failure in &report.failures {
        let kind = if failure.transient { "retryable" } else { "permanent" };
        eprintln!("    ✗ {} [{kind}]: {}", failure.file_url, failure.error);
    }

    if report.failed > 0 {
        println!("\n  Run `snapmatch process` again to retry failed photos");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::pending;

    #[tokio::test]
    async fn test_interrupt_stops_unfinished_work() {
        let outcome = until_interrupted(pending::<u8>(), async {}).await;
        assert_eq!(outcome, None);
    }

    #[tokio::test]
    async fn test_finished_work_is_returned() {
        let outcome = until_interrupted(async { 7 }, pending::<()>()).await;
        assert_eq!(outcome, Some(7));
    }

    #[test]
    fn test_interrupted_exit_code_is_sigint() {
        assert_eq!(INTERRUPTED_EXIT_CODE, 128 + 2);
    }
}
