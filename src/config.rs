//! Engine defaults with optional on-disk overrides.
//!
//! Settings live at the XDG config path as JSON; a missing file just means
//! defaults. Nothing here is required for library use; `ScanOptions` can
//! always be built directly.

use crate::error::{ConfigError, ConfigResult};
use crate::scanner::ScanOptions;
use crate::services;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Persistable scan defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Default worker pool size.
    pub workers: usize,
    /// Default per-connection timeout in milliseconds.
    pub timeout_ms: u64,
    /// Default HTTP status probe timeout in milliseconds.
    pub http_timeout_ms: u64,
    /// Seconds between CDN-suspect warnings.
    pub cdn_warn_interval_secs: u64,
    /// Ports knocked on by the host liveness check.
    pub liveness_ports: Vec<u16>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workers: 500,
            timeout_ms: 3000,
            http_timeout_ms: 5000,
            cdn_warn_interval_secs: 2,
            liveness_ports: services::LIVENESS_PORTS.to_vec(),
        }
    }
}

impl Settings {
    /// Default settings file location (`~/.config/spyglass/settings.json`).
    pub fn default_path() -> ConfigResult<PathBuf> {
        let project =
            ProjectDirs::from("com", "spyglass", "spyglass").ok_or(ConfigError::DirectoryNotFound)?;
        Ok(project.config_dir().join("settings.json"))
    }

    /// Load from the default location; a missing file yields defaults.
    pub fn load() -> ConfigResult<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load from a specific file.
    pub fn load_from(path: &PathBuf) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))
    }

    /// Save to the default location, creating directories as needed.
    pub fn save(&self) -> ConfigResult<()> {
        let path = Self::default_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content).map_err(|e| ConfigError::WriteFailed {
            path,
            reason: e.to_string(),
        })
    }

    /// Scan options seeded from these settings.
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            workers: self.workers,
            timeout: Duration::from_millis(self.timeout_ms),
            http_timeout: Duration::from_millis(self.http_timeout_ms),
            proxy: None,
            cdn_warn_interval_secs: self.cdn_warn_interval_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.workers, 500);
        assert_eq!(settings.timeout_ms, 3000);
        assert!(!settings.liveness_ports.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"workers": 64, "timeout_ms": 1500}}"#).unwrap();

        let settings = Settings::load_from(&file.path().to_path_buf()).unwrap();
        assert_eq!(settings.workers, 64);
        assert_eq!(settings.timeout_ms, 1500);
        // Unspecified fields keep their defaults.
        assert_eq!(settings.http_timeout_ms, 5000);
    }

    #[test]
    fn test_load_rejects_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(Settings::load_from(&file.path().to_path_buf()).is_err());
    }

    #[test]
    fn test_scan_options_conversion() {
        let settings = Settings {
            workers: 8,
            timeout_ms: 250,
            ..Default::default()
        };
        let options = settings.scan_options();
        assert_eq!(options.workers, 8);
        assert_eq!(options.timeout, Duration::from_millis(250));
    }
}
