use anyhow::{Context, Result};
use confyg::{env, Confygery};
use serde::{Deserialize, Serialize};
use snapmatch_search::{ScoreScale, Threshold};
use std::path::PathBuf;
use std::time::Duration;

use crate::embedding::ReferenceFace;

/// Configuration for snapmatch.
///
/// Configuration is loaded from multiple sources with the following priority:
/// 1. CLI arguments (highest priority)
/// 2. Environment variables (SNAP_* prefix)
/// 3. Config file (~/.config/snapmatch/config.toml)
/// 4. Built-in defaults (lowest priority)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the SQLite database.
    ///
    /// Can be set via:
    /// - CLI: --db /path/to/db
    /// - ENV: SNAP_DATABASE_PATH
    /// - Config: database_path = "/path/to/db"
    /// - Default: ~/.local/share/snapmatch/snapmatch.db
    pub database_path: PathBuf,

    /// Base URL of the face embedding service.
    ///
    /// - ENV: SNAP_EMBEDDING_SERVICE_URL
    /// - Default: http://localhost:8000
    pub embedding_service_url: String,

    /// Upper bound on a single embedding service call, in seconds.
    #[serde(deserialize_with = "lenient::number")]
    pub request_timeout_secs: u64,

    /// Photos processed concurrently within one batch.
    #[serde(deserialize_with = "lenient::number")]
    pub max_concurrency: usize,

    /// Minimum spacing between embedding service calls, in milliseconds.
    #[serde(deserialize_with = "lenient::number")]
    pub min_request_interval_ms: u64,

    /// Threshold used when a search does not give one.
    #[serde(deserialize_with = "lenient::number")]
    pub default_threshold: f32,

    /// Most matches a search returns, best first. 0 returns every match.
    #[serde(deserialize_with = "lenient::number")]
    pub max_results: usize,

    /// How cosine similarity is scaled before thresholding.
    pub score_scale: ScoreScale,

    /// Which face of a multi-face reference image to search with.
    pub reference_face: ReferenceFace,

    /// Log filter used when RUST_LOG is not set.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_db_path(),
            embedding_service_url: DEFAULT_SERVICE_URL.to_string(),
            request_timeout_secs: 30,
            max_concurrency: 4,
            min_request_interval_ms: 0,
            default_threshold: Threshold::DEFAULT,
            max_results: 0,
            score_scale: ScoreScale::default(),
            reference_face: ReferenceFace::default(),
            log_level: "info".to_string(),
        }
    }
}

const DEFAULT_SERVICE_URL: &str = "http://localhost:8000";

/// Numeric keys accept either a number or a numeric string.
///
/// Environment overrides always arrive as strings (`SNAP_MAX_CONCURRENCY=8`
/// becomes `max_concurrency = '8'`), while the config file holds real numbers.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use std::fmt::Display;
    use std::str::FromStr;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString<T> {
        Number(T),
        String(String),
    }

    pub fn number<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + FromStr,
        T::Err: Display,
    {
        match NumberOrString::<T>::deserialize(deserializer)? {
            NumberOrString::Number(n) => Ok(n),
            NumberOrString::String(s) => s.trim().parse().map_err(|e| {
                serde::de::Error::custom(format!("invalid number {s:?}: {e}"))
            }),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Searches for config file at: ~/.config/snapmatch/config.toml
    /// Reads environment variables with SNAP_ prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_path = config_file_path();

        let mut builder = Confygery::new().context("Failed to create config builder")?;

        if config_path.exists() {
            let path_str = config_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Config path contains invalid UTF-8"))?;
            builder
                .add_file(path_str)
                .context("Failed to load config file")?;
        }

        let env_opts = env::Options::with_top_level("snap");
        builder
            .add_env(env_opts)
            .context("Failed to load environment variables")?;

        let config: Self = builder.build().context("Failed to build configuration")?;

        Ok(config)
    }

    /// Load configuration with custom database path.
    ///
    /// This is used when the --db CLI flag is provided.
    pub fn load_with_db_path(db_path: PathBuf) -> Result<Self> {
        let mut config = Self::load()?;
        config.database_path = db_path;
        Ok(config)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub const fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    /// The result cap for searches, or `None` when `max_results` is 0.
    #[must_use]
    pub const fn search_limit(&self) -> Option<usize> {
        match self.max_results {
            0 => None,
            n => Some(n),
        }
    }

    /// The configured default threshold, validated.
    pub fn threshold(&self) -> Result<Threshold> {
        Threshold::new(self.default_threshold).context("Invalid default_threshold")
    }
}

/// Get the default database path.
///
/// Returns: ~/.local/share/snapmatch/snapmatch.db (or platform equivalent)
pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("snapmatch")
        .join("snapmatch.db")
}

/// Get the config file path.
///
/// Returns:
/// - Linux: ~/.config/snapmatch/config.toml
/// - macOS: ~/Library/Application Support/snapmatch/config.toml
/// - Windows: %APPDATA%\snapmatch\config.toml
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("snapmatch")
        .join("config.toml")
}

/// Get the example config file content.
pub fn example_config() -> &'static str {
    r#"# snapmatch Configuration File
#
# Configuration is loaded from multiple sources with the following priority:
# 1. CLI arguments (highest priority)
# 2. Environment variables (SNAP_* prefix)
# 3. This config file
# 4. Built-in defaults (lowest priority)

# Base URL of the face embedding service.
# The service must expose POST /api/extract-embeddings.
#
# Can also be set via:
# - Environment: SNAP_EMBEDDING_SERVICE_URL=http://faces.internal:8000
embedding_service_url = "http://localhost:8000"

# Upper bound on one embedding call, in seconds. A photo whose call times
# out stays unprocessed and is retried by the next batch run.
request_timeout_secs = 30

# How many photos of a batch are sent to the embedding service at once.
max_concurrency = 4

# Minimum spacing between embedding calls, in milliseconds (0 = no pacing).
min_request_interval_ms = 0

# Similarity a stored face needs to count as a match, in (0, 1].
default_threshold = 0.6

# Most photos a search returns, best first (0 = every match).
max_results = 0

# "raw" compares the cosine value directly; "unit" maps it to (cos + 1) / 2.
score_scale = "raw"

# Face used when a reference image shows several people:
# "highest_confidence" or "first".
reference_face = "highest_confidence"

# Log filter used when RUST_LOG is not set.
log_level = "info"

# Path to the SQLite database
#
# Can also be set via:
# - CLI: snapmatch --db /custom/path.db process <event>
# - Environment: SNAP_DATABASE_PATH=/custom/path.db
#
# Default: Platform-specific data directory
#database_path = "/path/to/custom/snapmatch.db"
"#
}

/// Create default config file if it doesn't exist.
///
/// Returns true if a new file was created, false if it already existed.
pub fn ensure_config_file() -> Result<bool> {
    let config_path = config_file_path();

    if config_path.exists() {
        return Ok(false);
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    std::fs::write(&config_path, example_config()).context("Failed to write config file")?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.database_path.as_os_str().is_empty());
        assert_eq!(config.embedding_service_url, "http://localhost:8000");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.score_scale, ScoreScale::Raw);
        assert_eq!(config.reference_face, ReferenceFace::HighestConfidence);
        assert_eq!(config.threshold().unwrap().value(), 0.6);
        assert_eq!(config.search_limit(), None);
    }

    #[test]
    fn test_search_limit() {
        let config = Config {
            max_results: 10,
            ..Config::default()
        };
        assert_eq!(config.search_limit(), Some(10));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: Config = serde_json::from_value(serde_json::json!({
            "embedding_service_url": "http://faces:9000",
            "score_scale": "unit",
            "reference_face": "first",
        }))
        .unwrap();
        assert_eq!(parsed.embedding_service_url, "http://faces:9000");
        assert_eq!(parsed.score_scale, ScoreScale::Unit);
        assert_eq!(parsed.reference_face, ReferenceFace::First);
        // Unset keys fall back to defaults.
        assert_eq!(parsed.max_concurrency, 4);
    }

    #[test]
    fn test_numeric_keys_accept_strings() {
        let parsed: Config = serde_json::from_value(serde_json::json!({
            "max_concurrency": "8",
            "request_timeout_secs": " 12 ",
            "min_request_interval_ms": 250,
            "default_threshold": "0.7",
        }))
        .unwrap();
        assert_eq!(parsed.max_concurrency, 8);
        assert_eq!(parsed.request_timeout(), Duration::from_secs(12));
        assert_eq!(parsed.min_request_interval(), Duration::from_millis(250));
        assert!((parsed.default_threshold - 0.7).abs() < 1e-6);

        let bad = serde_json::from_value::<Config>(serde_json::json!({
            "max_concurrency": "eight",
        }));
        assert!(bad.is_err());
    }

    #[test]
    fn test_numeric_env_overrides() {
        std::env::set_var("SNAP_MAX_CONCURRENCY", "8");
        std::env::set_var("SNAP_DEFAULT_THRESHOLD", "0.7");
        std::env::set_var("SNAP_REQUEST_TIMEOUT_SECS", "45");
        std::env::set_var("SNAP_MIN_REQUEST_INTERVAL_MS", "100");
        let loaded = Config::load();
        for key in [
            "SNAP_MAX_CONCURRENCY",
            "SNAP_DEFAULT_THRESHOLD",
            "SNAP_REQUEST_TIMEOUT_SECS",
            "SNAP_MIN_REQUEST_INTERVAL_MS",
        ] {
            std::env::remove_var(key);
        }

        let config = loaded.unwrap();
        assert_eq!(config.max_concurrency, 8);
        assert_eq!(config.request_timeout(), Duration::from_secs(45));
        assert_eq!(config.min_request_interval(), Duration::from_millis(100));
        assert!((config.threshold().unwrap().value() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_default_threshold() {
        let config = Config {
            default_threshold: 1.5,
            ..Config::default()
        };
        assert!(config.threshold().is_err());
    }

    #[test]
    fn test_config_load() {
        // Should not fail even if config file doesn't exist
        let result = Config::load();
        assert!(result.is_ok());
    }

    #[test]
    fn test_config_with_custom_db_path() {
        let custom_path = PathBuf::from("/tmp/test.db");
        let config = Config::load_with_db_path(custom_path.clone());
        assert!(config.is_ok());
        assert_eq!(config.unwrap().database_path, custom_path);
    }
}
