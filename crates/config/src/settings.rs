// Application settings
// Loaded from ~/.config/leadgrid/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("cannot serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // API
    #[serde(rename = "api.baseUrl")]
    pub api_base_url: String,

    #[serde(rename = "api.timeoutSecs")]
    pub api_timeout_secs: u64,

    // Grid
    #[serde(rename = "grid.pageSize")]
    pub page_size: u32,

    // Autosave
    #[serde(rename = "autosave.debounceMs")]
    pub debounce_ms: u64,

    // Logging
    #[serde(rename = "log.file", skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            api_timeout_secs: 30,
            page_size: 25,
            debounce_ms: 600,
            log_file: None,
        }
    }
}

const DEFAULT_FILE: &str = r#"{
    // Lead API
    "api.baseUrl": "http://localhost:8000",
    "api.timeoutSecs": 30,

    // Leads per page
    "grid.pageSize": 25,

    // Quiet period after the last keystroke before a cell is saved
    "autosave.debounceMs": 600

    // Log file for the interactive grid (default: cache dir)
    // "log.file": "/tmp/leadgrid.log"
}
"#;

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("leadgrid");
        config_dir.join("settings.json")
    }

    /// Load settings from the default location, falling back to defaults.
    /// A missing file is created with commented defaults.
    pub fn load() -> Self {
        let (settings, fallback) = Self::load_or_default(&Self::config_path());
        if let Some(e) = fallback {
            log::warn!("{}; using default settings", e);
        }
        settings
    }

    /// Like [`Settings::load`] for an explicit `path`, but hands the reason
    /// for any fallback back to the caller instead of logging it. Useful
    /// when logging is not set up yet.
    pub fn load_or_default(path: &Path) -> (Self, Option<ConfigError>) {
        if !path.exists() {
            return (Self::default(), Self::create_default_file(path).err());
        }
        match Self::load_from(path) {
            Ok(settings) => (settings, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    /// Load settings from `path`. Lines starting with `//` are comments.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn parse(contents: &str) -> Result<Self, serde_json::Error> {
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");
        serde_json::from_str(&cleaned)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        ensure_parent(path)?;
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the default settings file with comments.
    pub fn create_default_file(path: &Path) -> Result<(), ConfigError> {
        ensure_parent(path)?;
        fs::write(path, DEFAULT_FILE).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    /// Log file for the interactive grid: `log.file`, else
    /// `<cache dir>/leadgrid/leadgrid.log`.
    pub fn log_path(&self) -> PathBuf {
        self.log_file.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("leadgrid")
                .join("leadgrid.log")
        })
    }
}

fn ensure_parent(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.api_base_url, "http://localhost:8000");
        assert_eq!(s.page_size, 25);
        assert_eq!(s.debounce(), Duration::from_millis(600));
        assert_eq!(s.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_default_file_parses_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        Settings::create_default_file(&path).unwrap();
        assert_eq!(Settings::load_from(&path).unwrap(), Settings::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            "{\n  // staging\n  \"api.baseUrl\": \"https://leads.example.com\",\n  \"autosave.debounceMs\": 250\n}\n",
        )
        .unwrap();

        let s = Settings::load_from(&path).unwrap();
        assert_eq!(s.api_base_url, "https://leads.example.com");
        assert_eq!(s.debounce(), Duration::from_millis(250));
        assert_eq!(s.page_size, 25);
        assert!(s.log_file.is_none());
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ \"grid.pageSize\": \"many\" }").unwrap();

        let err = Settings::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("settings.json"));
    }

    #[test]
    fn test_load_or_default_reports_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ \"grid.pageSize\": \"many\" }").unwrap();

        let (s, fallback) = Settings::load_or_default(&path);
        assert_eq!(s, Settings::default());
        assert!(matches!(fallback, Some(ConfigError::Parse { .. })));

        fs::write(&path, "{ \"grid.pageSize\": 10 }").unwrap();
        let (s, fallback) = Settings::load_or_default(&path);
        assert_eq!(s.page_size, 10);
        assert!(fallback.is_none());
    }

    #[test]
    fn test_load_or_default_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leadgrid").join("settings.json");

        let (s, fallback) = Settings::load_or_default(&path);
        assert_eq!(s, Settings::default());
        assert!(fallback.is_none());
        assert!(path.exists());
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load_from(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let s = Settings {
            page_size: 50,
            log_file: Some(dir.path().join("grid.log")),
            ..Settings::default()
        };
        s.save_to(&path).unwrap();
        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded, s);
        assert_eq!(loaded.log_path(), dir.path().join("grid.log"));
    }

    #[test]
    fn test_default_log_path() {
        let s = Settings::default();
        assert!(s.log_path().ends_with("leadgrid/leadgrid.log"));
    }
}
