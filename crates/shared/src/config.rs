//! Local API configuration file.
//!
//! A small JSON document read when the setup screen opens and written after
//! a successful key validation. Lives under the platform config dir.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub gemini_api_key: String,
    #[serde(default)]
    pub configured: bool,
    #[serde(default)]
    pub setup_date: String,
    #[serde(default)]
    pub validation_message: String,
}

impl ApiConfig {
    pub fn configured_key(&self) -> Option<&str> {
        if self.configured && !self.gemini_api_key.is_empty() {
            Some(&self.gemini_api_key)
        } else {
            None
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("com.local", "TIYA", "Tiya")
        .map(|proj| proj.config_dir().join("tiya_config.json"))
}

/// Load the config from disk, falling back to defaults when the file is
/// missing or unreadable. A corrupt file is treated as "not configured".
pub fn load_or_default() -> ApiConfig {
    match config_path() {
        Some(path) => load_from(&path).unwrap_or_default(),
        None => ApiConfig::default(),
    }
}

pub fn load_from(path: &Path) -> Option<ApiConfig> {
    let contents = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&contents) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!("ignoring unreadable config at {}: {e}", path.display());
            None
        }
    }
}

/// Persist the config. Failure here surfaces as `TaskError::Persist` at
/// the task boundary; callers keep the entered key in the input for retry.
pub fn save(config: &ApiConfig) -> Result<()> {
    let path = config_path().context("no config directory available")?;
    save_to(config, &path)
}

pub fn save_to(config: &ApiConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating config dir {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiya_config.json");

        let config = ApiConfig {
            gemini_api_key: "AIza-round-trip".to_string(),
            configured: true,
            setup_date: "2026-08-29".to_string(),
            validation_message: "API key validated successfully".to_string(),
        };
        save_to(&config, &path).unwrap();

        let loaded = load_from(&path).unwrap();
        assert_eq!(loaded.gemini_api_key, "AIza-round-trip");
        assert!(loaded.configured);
        assert_eq!(loaded.configured_key(), Some("AIza-round-trip"));
    }

    #[test]
    fn test_corrupt_config_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiya_config.json");
        fs::write(&path, "{not json").unwrap();

        assert!(load_from(&path).is_none());
    }

    #[test]
    fn test_unconfigured_key_is_hidden() {
        let config = ApiConfig {
            gemini_api_key: "AIza-saved-but-not-validated".to_string(),
            configured: false,
            ..Default::default()
        };
        assert_eq!(config.configured_key(), None);
    }
}
