use crate::retry::{BackoffConfig, BackoffMethod, BackoffOptions, BackoffOverrides};
use crate::utils::get_data_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.json";

/// Application configuration
///
/// Every field has a default, so a config file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backoff strategy used when polling the API
    #[serde(default)]
    pub backoff: BackoffConfig,
    /// Delay before the first poll, in milliseconds
    #[serde(default)]
    pub initial_delay_ms: u64,
    /// Attempts before a poll is reported as failed
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Record prepared saves in the audit log (opt-in)
    #[serde(default)]
    pub enable_audit_log: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffConfig::default(),
            initial_delay_ms: 0,
            max_attempts: default_max_attempts(),
            enable_audit_log: false,
        }
    }
}

fn default_max_attempts() -> u32 {
    crate::retry::backoff::DEFAULT_MAX_ATTEMPTS
}

impl AppConfig {
    /// Attempt limits with `overrides` (typically from the command line)
    /// taking precedence over the file values
    pub fn backoff_options(&self, overrides: &BackoffOverrides) -> BackoffOptions {
        BackoffOptions::merged(&BackoffOverrides {
            initial_delay_ms: overrides.initial_delay_ms.or(Some(self.initial_delay_ms)),
            max_attempts: overrides.max_attempts.or(Some(self.max_attempts)),
        })
    }

    pub fn backoff_method(&self, overrides: &BackoffOverrides) -> Box<dyn BackoffMethod> {
        self.backoff.build(self.backoff_options(overrides))
    }
}

/// Default location of the config file, `None` if no home directory is known
pub fn config_path() -> Option<PathBuf> {
    get_data_dir().map(|dir| dir.join(CONFIG_FILE))
}

/// Saves the config to its default location, see [`save_config_to`].
pub async fn save_config(config: &AppConfig) -> std::io::Result<()> {
    if let Some(path) = config_path() {
        save_config_to(&path, config).await?;
    }
    Ok(())
}

/// Saves the config to `path` using an atomic write pattern.
/// 1. Writes to a temporary file next to `path`.
/// 2. Sets restrictive permissions (0o600).
/// 3. Atomically renames to the target path.
///
/// # Async
/// Uses `tokio::fs` for non-blocking I/O.
pub async fn save_config_to(path: &Path, config: &AppConfig) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    let temp_path = path.with_extension("json.tmp");

    // Create file with restrictive permissions from the start to prevent
    // race condition where file is briefly world-readable
    #[cfg(unix)]
    {
        use tokio::fs::OpenOptions;
        use tokio::io::AsyncWriteExt;

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .mode(0o600)
            .open(&temp_path)
            .await?;

        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
    }

    #[cfg(not(unix))]
    {
        use tokio::io::AsyncWriteExt;

        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
    }

    tokio::fs::rename(&temp_path, path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::StorageFull {
            std::io::Error::new(
                std::io::ErrorKind::StorageFull,
                "Disk full: cannot save configuration. Free up space and try again.",
            )
        } else {
            e
        }
    })
}

/// Loads the config from its default location, or returns default if not found.
pub async fn load_config() -> AppConfig {
    match config_path() {
        Some(path) => load_config_from(&path).await,
        None => AppConfig::default(),
    }
}

/// Loads the config from `path`.
///
/// A missing file yields the default config. An unreadable or malformed file
/// is logged and also yields the default.
pub async fn load_config_from(path: &Path) -> AppConfig {
    match tokio::fs::read_to_string(path).await {
        Ok(json) => match serde_json::from_str::<AppConfig>(&json) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), "Ignoring malformed config: {}", e);
                AppConfig::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppConfig::default(),
        Err(e) => {
            tracing::warn!(path = %path.display(), "Failed to read config: {}", e);
            AppConfig::default()
        }
    }
}
