use anyhow::{Context, Result};
use snapmatch_pipeline::{config, Config};
use snapmatch_search::Threshold;
use toml_edit::{value, DocumentMut};

const VALID_KEYS: &str = "database_path, embedding_service_url, request_timeout_secs, \
max_concurrency, min_request_interval_ms, default_threshold, max_results, score_scale, reference_face, log_level";

/// Show the current effective configuration.
pub fn show_config(config: &Config) -> Result<()> {
    println!("Current Configuration");
    println!("=====================\n");

    println!("Config file: {}", config::config_file_path().display());

    let exists = config::config_file_path().exists();
    println!("File exists: {}\n", if exists { "yes" } else { "no (using defaults)" });

    println!("Settings:");
    for key in VALID_KEYS.split(", ") {
        println!("  {key}: {}", lookup(config, key)?);
    }

    println!("\nPriority: CLI args > ENV vars (SNAP_*) > Config file > Defaults");

    Ok(())
}

/// Get a specific config value.
pub fn get_config(config: &Config, key: Option<String>) -> Result<()> {
    if let Some(key) = key {
        println!("{}", lookup(config, &key)?);
    } else {
        // No key provided, show entire config file contents
        let config_path = config::config_file_path();

        if config_path.exists() {
            let contents =
                std::fs::read_to_string(&config_path).context("Failed to read config file")?;
            print!("{}", contents);
        } else {
            println!("Config file does not exist: {}", config_path.display());
            println!("\nRun 'snapmatch config init' to create it.");
        }
    }

    Ok(())
}

fn lookup(config: &Config, key: &str) -> Result<String> {
    let shown = match key {
        "database_path" => config.database_path.display().to_string(),
        "embedding_service_url" => config.embedding_service_url.clone(),
        "request_timeout_secs" => config.request_timeout_secs.to_string(),
        "max_concurrency" => config.max_concurrency.to_string(),
        "min_request_interval_ms" => config.min_request_interval_ms.to_string(),
        "default_threshold" => config.default_threshold.to_string(),
        "max_results" => config.max_results.to_string(),
        "score_scale" => serde_json::to_value(config.score_scale)?
            .as_str()
            .unwrap_or_default()
            .to_string(),
        "reference_face" => serde_json::to_value(config.reference_face)?
            .as_str()
            .unwrap_or_default()
            .to_string(),
        "log_level" => config.log_level.clone(),
        _ => anyhow::bail!("Unknown config key: {}\n\nValid keys: {}", key, VALID_KEYS),
    };
    Ok(shown)
}

/// Set a config value.
pub fn set_config(key: &str, raw: &str) -> Result<()> {
    let config_path = config::config_file_path();

    // Ensure config file exists
    config::ensure_config_file()?;

    let contents = std::fs::read_to_string(&config_path).context("Failed to read config file")?;
    let mut doc: DocumentMut = contents.parse().context("Config file is not valid TOML")?;

    doc[key] = match key {
        "database_path" | "embedding_service_url" | "log_level" => value(raw),
        "request_timeout_secs" | "max_concurrency" | "min_request_interval_ms" | "max_results" => {
            let n: i64 = raw
                .parse()
                .with_context(|| format!("{key} must be a non-negative integer"))?;
            if n < 0 {
                anyhow::bail!("{key} must be a non-negative integer");
            }
            value(n)
        }
        "default_threshold" => {
            let t: f32 = raw.parse().context("default_threshold must be a number")?;
            Threshold::new(t)?;
            value(f64::from(t))
        }
        "score_scale" => match raw {
            "raw" | "unit" => value(raw),
            _ => anyhow::bail!("score_scale must be \"raw\" or \"unit\""),
        },
        "reference_face" => match raw {
            "highest_confidence" | "first" => value(raw),
            _ => anyhow::bail!("reference_face must be \"highest_confidence\" or \"first\""),
        },
        _ => anyhow::bail!("Unknown config key: {}\n\nValid keys: {}", key, VALID_KEYS),
    };

    std::fs::write(&config_path, doc.to_string()).context("Failed to write config file")?;

    println!("✓ Updated {} = {}", key, raw);
    println!("  in {}", config_path.display());

    Ok(())
}

/// Show the config file path.
pub fn show_path() -> Result<()> {
    let config_path = config::config_file_path();
    println!("{}", config_path.display());
    Ok(())
}

/// Show example configuration.
pub fn show_example() -> Result<()> {
    print!("{}", config::example_config());
    Ok(())
}

/// Initialize config file with defaults.
pub fn init_config() -> Result<()> {
    let created = config::ensure_config_file()?;
    let config_path = config::config_file_path();

    if created {
        println!("✓ Created config file: {}", config_path.display());
        println!("\nEdit this file to configure snapmatch.");
    } else {
        println!("Config file already exists: {}", config_path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_keys() {
        let config = Config::default();
        for key in VALID_KEYS.split(", ") {
            assert!(lookup(&config, key).is_ok(), "{key} should be readable");
        }
        assert_eq!(lookup(&config, "score_scale").unwrap(), "raw");
        assert_eq!(
            lookup(&config, "reference_face").unwrap(),
            "highest_confidence"
        );
    }

    #[test]
    fn test_lookup_unknown_key() {
        assert!(lookup(&Config::default(), "similarity_cutoff").is_err());
    }

    #[test]
    fn test_example_config_is_valid_toml() {
        let doc: DocumentMut = config::example_config().parse().unwrap();
        assert_eq!(doc["max_concurrency"].as_integer(), Some(4));
        assert_eq!(doc["score_scale"].as_str(), Some("raw"));
    }
}
