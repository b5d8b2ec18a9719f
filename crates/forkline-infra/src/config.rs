//! Configuration loader for Forkline.
//!
//! Reads `config.toml` from the data directory (`~/.forkline/` in production)
//! and deserializes it into [`ForklineConfig`]. Falls back to defaults when
//! the file is missing or malformed.

use std::path::{Path, PathBuf};

use forkline_types::config::ForklineConfig;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "FORKLINE_DATA_DIR";

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `FORKLINE_DATA_DIR` environment variable
/// 2. `~/.forkline`
/// 3. `./.forkline`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".forkline");
    }

    PathBuf::from(".forkline")
}

/// `{data_dir}/config.toml`.
pub fn default_config_path(data_dir: &Path) -> PathBuf {
    data_dir.join("config.toml")
}

/// Load configuration from `config_path`.
///
/// - If the file does not exist, returns [`ForklineConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_config(config_path: &Path) -> ForklineConfig {
    let content = match tokio::fs::read_to_string(config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return ForklineConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return ForklineConfig::default();
        }
    };

    match toml::from_str::<ForklineConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            ForklineConfig::default()
        }
    }
}
