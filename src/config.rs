//! Configuration management.
//!
//! `Settings` covers filesystem-level concerns (data directory, database
//! path, bind address); `Config` is the `waxworks.toml` file with one
//! section per engine/adapter concern. Secrets can be supplied through
//! `WAXWORKS_*` environment variables instead of the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::adapters::{GenerationConfig, ImageStoreConfig, MarketplaceConfig, SocialConfig};

pub const CONFIG_FILE: &str = "waxworks.toml";

/// Filesystem-level settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root directory for the database and local artifacts.
    pub data_dir: PathBuf,
    /// Default bind address for `wax serve`.
    pub bind: String,
}

impl Settings {
    /// Settings rooted at an explicit data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            bind: default_bind(),
        }
    }

    /// Path to the shared SQLite database.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("waxworks.db")
    }

    /// Create the data directory tree if missing.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            bind: default_bind(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("WAXWORKS_DATA_DIR") {
        return PathBuf::from(shellexpand::tilde(&dir).into_owned());
    }
    dirs::data_dir()
        .map(|d| d.join("waxworks"))
        .unwrap_or_else(|| PathBuf::from("./waxworks-data"))
}

fn default_bind() -> String {
    std::env::var("WAXWORKS_BIND").unwrap_or_else(|_| "127.0.0.1:3030".to_string())
}

/// Load settings from the environment.
pub async fn load_settings() -> Settings {
    Settings::default()
}

/// Engine tuning knobs; every value has a sane default so a missing
/// config file still runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Retry ceiling: attempts at or above this fail permanently.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_batch_size")]
    pub default_batch_size: usize,
    /// Requested batch sizes are clamped here to bound per-invocation
    /// API cost.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// How long a claim holds an item before another dispatcher may
    /// reclaim it.
    #[serde(default = "default_lease_secs")]
    pub lease_secs: u64,
    /// Fixed delay between items in a batch.
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,
    /// Fixed sleep after an upstream 429 before retrying the same call.
    #[serde(default = "default_cooldown_secs")]
    pub rate_limit_cooldown_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_batch_size() -> usize {
    5
}
fn default_max_batch_size() -> usize {
    20
}
fn default_lease_secs() -> u64 {
    300
}
fn default_step_delay_ms() -> u64 {
    750
}
fn default_cooldown_secs() -> u64 {
    30
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            default_batch_size: default_batch_size(),
            max_batch_size: default_max_batch_size(),
            lease_secs: default_lease_secs(),
            step_delay_ms: default_step_delay_ms(),
            rate_limit_cooldown_secs: default_cooldown_secs(),
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub images: ImageStoreConfig,
    #[serde(default)]
    pub marketplace: MarketplaceConfig,
    #[serde(default)]
    pub social: SocialConfig,
}

impl Config {
    /// Load from `waxworks.toml` in the working directory, falling back
    /// to the data directory, then to defaults. Environment variables
    /// override file-provided secrets.
    pub async fn load(settings: &Settings) -> Self {
        let mut config = Self::read_file(Path::new(CONFIG_FILE))
            .await
            .or(Self::read_file(&settings.data_dir.join(CONFIG_FILE)).await)
            .unwrap_or_default();
        config.apply_env();
        config
    }

    async fn read_file(path: &Path) -> Option<Self> {
        let contents = tokio::fs::read_to_string(path).await.ok()?;
        match toml::from_str(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("Ignoring unparseable config {}: {}", path.display(), e);
                None
            }
        }
    }

    fn apply_env(&mut self) {
        if let Ok(endpoint) = std::env::var("WAXWORKS_GENERATION_ENDPOINT") {
            self.generation.endpoint = endpoint;
        }
        if let Ok(token) = std::env::var("WAXWORKS_IMAGES_TOKEN") {
            self.images.token = Some(token);
        }
        if let Ok(token) = std::env::var("WAXWORKS_MARKETPLACE_TOKEN") {
            self.marketplace.token = Some(token);
        }
        if let Ok(token) = std::env::var("WAXWORKS_SOCIAL_TOKEN") {
            self.social.token = Some(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_defaults() {
        let engine = EngineConfig::default();
        assert_eq!(engine.max_attempts, 3);
        assert_eq!(engine.max_batch_size, 20);
        assert!(engine.default_batch_size <= engine.max_batch_size);
    }

    #[test]
    fn test_config_parses_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [engine]
            max_attempts = 5

            [marketplace]
            endpoint = "https://api.example/v2"
            "#,
        )
        .unwrap();
        assert_eq!(config.engine.max_attempts, 5);
        // Unspecified values fall back per-field
        assert_eq!(config.engine.max_batch_size, 20);
        assert_eq!(config.marketplace.endpoint, "https://api.example/v2");
    }

    #[test]
    fn test_database_path_under_data_dir() {
        let settings = Settings::with_data_dir(PathBuf::from("/tmp/wx"));
        assert_eq!(settings.database_path(), PathBuf::from("/tmp/wx/waxworks.db"));
    }
}
