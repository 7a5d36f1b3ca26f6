//! Process configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use promptsmith_openai::OpenAiConfig;
use promptsmith_store::RepositoryConfig;

/// Server and pipeline configuration.
///
/// All fields have defaults suitable for local development; override via
/// environment variables. Without `OPENAI_API_KEY` the pipeline runs on its
/// deterministic fallbacks.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `180`, eval creation and
    /// compare both wait on upstream calls).
    pub request_timeout_secs: u64,
    /// Root for the JSON tables.
    pub data_dir: PathBuf,
    /// Root for commit image blobs.
    pub image_dir: PathBuf,
    /// Root for report artifacts.
    pub artifact_dir: PathBuf,
    /// Default per-project drift threshold.
    pub compare_threshold: f64,
    pub openai_api_key: Option<String>,
    pub openai_image_model: String,
    pub openai_vision_model: String,
    pub openai_text_model: String,
    /// Timeout for individual upstream model calls, in seconds.
    pub openai_timeout_secs: u64,
    /// Object-store bucket name; only meaningful to a remote blob driver.
    pub storage_bucket: String,
    /// Public URL prefix for commit images.
    pub storage_prefix: String,
}

impl Settings {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default               |
    /// |-------------------------|-----------------------|
    /// | `HOST`                  | `0.0.0.0`             |
    /// | `PORT`                  | `8000`                |
    /// | `CORS_ORIGINS`          | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`  | `180`                 |
    /// | `APP_DATA_DIR`          | `./data`              |
    /// | `APP_IMAGE_DIR`         | `./images`            |
    /// | `APP_ARTIFACT_DIR`      | `./artifacts`         |
    /// | `APP_COMPARE_THRESHOLD` | `0.30`                |
    /// | `OPENAI_API_KEY`        | (unset = offline)     |
    /// | `OPENAI_IMAGE_MODEL`    | `gpt-image-1`         |
    /// | `OPENAI_VISION_MODEL`   | `gpt-4.1-mini`        |
    /// | `OPENAI_TEXT_MODEL`     | `gpt-4.1-mini`        |
    /// | `OPENAI_TIMEOUT_SECS`   | `120`                 |
    /// | `STORAGE_BUCKET`        | `promptsmith-images`  |
    /// | `STORAGE_PREFIX`        | `images`              |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs: env_u64("REQUEST_TIMEOUT_SECS", 180),
            data_dir: env_path("APP_DATA_DIR", "./data"),
            image_dir: env_path("APP_IMAGE_DIR", "./images"),
            artifact_dir: env_path("APP_ARTIFACT_DIR", "./artifacts"),
            compare_threshold: env_f64("APP_COMPARE_THRESHOLD", 0.30),
            openai_api_key: std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            openai_image_model: std::env::var("OPENAI_IMAGE_MODEL").unwrap_or_else(|_| "gpt-image-1".into()),
            openai_vision_model: std::env::var("OPENAI_VISION_MODEL").unwrap_or_else(|_| "gpt-4.1-mini".into()),
            openai_text_model: std::env::var("OPENAI_TEXT_MODEL").unwrap_or_else(|_| "gpt-4.1-mini".into()),
            openai_timeout_secs: env_u64("OPENAI_TIMEOUT_SECS", 120),
            storage_bucket: std::env::var("STORAGE_BUCKET").unwrap_or_else(|_| "promptsmith-images".into()),
            storage_prefix: std::env::var("STORAGE_PREFIX").unwrap_or_else(|_| "images".into()),
        }
    }

    /// Storage configuration handed to the repository.
    pub fn repository_config(&self) -> RepositoryConfig {
        RepositoryConfig {
            data_dir: self.data_dir.clone(),
            image_dir: self.image_dir.clone(),
            artifact_dir: self.artifact_dir.clone(),
            storage_prefix: self.storage_prefix.clone(),
            compare_threshold: self.compare_threshold,
        }
    }

    /// Connection settings handed to the adapter bundle.
    pub fn openai_config(&self) -> OpenAiConfig {
        OpenAiConfig {
            api_key: self.openai_api_key.clone(),
            image_model: self.openai_image_model.clone(),
            vision_model: self.openai_vision_model.clone(),
            text_model: self.openai_text_model.clone(),
            timeout: Duration::from_secs(self.openai_timeout_secs),
        }
    }
}

fn env_path(name: &str, default: &str) -> PathBuf {
    PathBuf::from(std::env::var(name).unwrap_or_else(|_| default.into()))
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_f64(name: &str, default: f64) -> f64 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
