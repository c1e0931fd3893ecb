use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use snapmatch_pipeline::{
    handle_search, Config, HttpEmbeddingClient, MatchSearcher, PhotoMatch, SearchRequest,
};

use super::{open_database, parse_event_id};

/// Flags of `snapmatch search` beyond the reference URL.
#[derive(Debug, Default)]
pub struct SearchOptions {
    pub threshold: Option<f32>,
    pub event: Option<String>,
    pub limit: Option<usize>,
    pub copy_to: Option<PathBuf>,
    pub json: bool,
}

pub async fn run_search(config: &Config, reference: &str, options: &SearchOptions) -> Result<()> {
    let event_id = options.event.as_deref().map(parse_event_id).transpose()?;
    let threshold = match options.threshold {
        Some(value) => value,
        None => config.threshold()?.value(),
    };

    let db = Arc::new(open_database(config)?);
    let client = HttpEmbeddingClient::from_config(config)
        .context("Failed to create embedding service client")?;
    let searcher = MatchSearcher::from_config(
        config,
        Arc::clone(&db) as _,
        Arc::clone(&db) as _,
        Arc::new(client),
    );

    let request = SearchRequest {
        reference_image_url: reference.to_string(),
        threshold,
        event_id,
        limit: options.limit,
    };
    let response = handle_search(&searcher, &request).await;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else if response.success {
        print_matches(&response.matches, threshold);
    }

    if !response.success {
        anyhow::bail!(
            "{}",
            response.message.as_deref().unwrap_or("Search failed")
        );
    }

    if let Some(dir) = &options.copy_to {
        let copied = copy_matches(&response.matches, dir)?;
        if !options.json {
            println!(
                "\n📁 Copied {} of {} photos to {}",
                copied.len(),
                response.matches.len(),
                dir.display()
            );
        }
    }

    Ok(())
}

fn print_matches(matches: &[PhotoMatch], threshold: f32) {
    if matches.is_empty() {
        println!("No photos matched at threshold {threshold}");
        return;
    }

    println!("\n🔍 {} matching photos\n", matches.len());
    for m in matches {
        let faces = if m.faces == 1 { "face" } else { "faces" };
        println!(
            "  {:.3}  {}  ({} {faces})  {}",
            m.score, m.photo.file_name, m.faces, m.photo.file_url
        );
    }
}

/// Copy every local match into `dir`, returning the written paths.
///
/// Remote photos are skipped. A name already taken in `dir` gets the
/// photo ID as a prefix.
fn copy_matches(matches: &[PhotoMatch], dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut copied = Vec::new();
    for m in matches {
        let Some(source) = m.photo.file_url.strip_prefix("file://") else {
            tracing::debug!("Not copying remote photo {}", m.photo.file_url);
            continue;
        };

        let mut target = dir.join(&m.photo.file_name);
        if target.exists() {
            target = dir.join(format!("{}-{}", m.photo.id, m.photo.file_name));
        }
        std::fs::copy(source, &target)
            .with_context(|| format!("Failed to copy {source} to {}", target.display()))?;
        copied.push(target);
    }

    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapmatch_core::model::{EventId, Photo};
    use tempfile::TempDir;

    fn matched(url: String, name: &str) -> PhotoMatch {
        PhotoMatch {
            photo: Photo::new(EventId::new(), url, name, "producer"),
            score: 0.9,
            faces: 1,
        }
    }

    #[test]
    fn test_copy_matches_skips_remote_photos() {
        let source = TempDir::new().unwrap();
        let local = source.path().join("stage.jpg");
        std::fs::write(&local, b"jpeg bytes").unwrap();

        let out = TempDir::new().unwrap();
        let target_dir = out.path().join("mine");
        let matches = vec![
            matched(format!("file://{}", local.display()), "stage.jpg"),
            matched("https://cdn/remote.jpg".to_string(), "remote.jpg"),
        ];

        let copied = copy_matches(&matches, &target_dir).unwrap();
        assert_eq!(copied, vec![target_dir.join("stage.jpg")]);
        assert_eq!(std::fs::read(&copied[0]).unwrap(), b"jpeg bytes");
        assert!(!target_dir.join("remote.jpg").exists());
    }

    #[test]
    fn test_copy_matches_keeps_same_named_photos_apart() {
        let source = TempDir::new().unwrap();
        let (a, b) = (source.path().join("a"), source.path().join("b"));
        for (dir, body) in [(&a, "first"), (&b, "second")] {
            std::fs::create_dir_all(dir).unwrap();
            std::fs::write(dir.join("IMG_0001.jpg"), body).unwrap();
        }

        let out = TempDir::new().unwrap();
        let matches = vec![
            matched(format!("file://{}", a.join("IMG_0001.jpg").display()), "IMG_0001.jpg"),
            matched(format!("file://{}", b.join("IMG_0001.jpg").display()), "IMG_0001.jpg"),
        ];

        let copied = copy_matches(&matches, out.path()).unwrap();
        assert_eq!(copied.len(), 2);
        assert_ne!(copied[0], copied[1]);
        assert_eq!(std::fs::read_to_string(&copied[0]).unwrap(), "first");
        assert_eq!(std::fs::read_to_string(&copied[1]).unwrap(), "second");
    }
}
