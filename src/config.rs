//! Dashboard settings persisted in ~/.dpm/config.toml

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub refresh_interval_ms: u64,
    /// Deadline for a single container's stats sample.
    pub sample_timeout_ms: u64,
    /// Grace period handed to stop/restart before the runtime kills.
    pub stop_timeout_secs: u32,
    pub log_tail_lines: usize,
    /// List stopped containers too, so Start actions have targets.
    pub show_all: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 2000,
            sample_timeout_ms: 5000,
            stop_timeout_secs: 10,
            log_tail_lines: 100,
            show_all: true,
        }
    }
}

impl Config {
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .map(|mut p| {
                p.push(".dpm");
                p
            })
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }

    /// Load from `path` (or the default location). Never fails: a missing
    /// file gives defaults, a broken one gives defaults and a warning.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);
        match Self::load(&path) {
            Ok(Some(config)) => {
                debug!(path = %path.display(), "loaded config");
                config
            }
            Ok(None) => Self::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unusable config file");
                Self::default()
            }
        }
    }

    fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(Some(config))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.max(1))
    }

    pub fn sample_timeout(&self) -> Duration {
        Duration::from_millis(self.sample_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(name: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("dpm-config-{}-{name}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("dpm-config-does-not-exist/config.toml");
        assert_eq!(Config::load_or_default(Some(&path)), Config::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let path = scratch_file("partial", "refresh_interval_ms = 500\nshow_all = false\n");
        let config = Config::load_or_default(Some(&path));
        assert_eq!(config.refresh_interval(), Duration::from_millis(500));
        assert!(!config.show_all);
        assert_eq!(config.stop_timeout_secs, 10);
        assert_eq!(config.sample_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let path = scratch_file("invalid", "refresh_interval_ms = \"soon\"\n");
        assert_eq!(Config::load_or_default(Some(&path)), Config::default());
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn default_path_lives_under_dot_dpm() {
        let path = Config::default_path();
        assert!(path.ends_with(".dpm/config.toml"));
    }
}
