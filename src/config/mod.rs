//! Configuration management for the gita reader.
//!
//! Configuration is read from `~/.config/gita/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is created.

use crate::refresh::RefreshConfig;
use crate::worker::WorkerConfig;
use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use url::Url;

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub storage: StorageConfig,
    pub worker: WorkerConfig,
    pub refresh: RefreshConfig,
}

/// Where chapter data and static assets are served from
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Base URL; `data/chapters.json` and `data/chapters/chapter-N.json`
    /// are resolved against it
    pub base_url: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the databases (default: `<data dir>/gita`)
    pub data_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// If the config file exists but is invalid, returns an error.
    /// Missing fields in the config file will use default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the default config file path: `~/.config/gita/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("gita").join("config.toml"))
    }

    /// Directory for the databases, falling back to `<data dir>/gita`.
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.storage.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(dirs::data_dir().ok_or(ConfigError::NoDataDir)?.join("gita")),
        }
    }

    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let mut url = Url::parse(&self.source.base_url).map_err(|e| ConfigError::InvalidUrl {
            url: self.source.base_url.clone(),
            source: e,
        })?;
        // Relative data paths must resolve below the base, not beside it
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    /// Create a default config file with comments.
    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        r##"# Gita reader configuration

[source]
# Where the static site and chapter data are served from
base_url = "http://localhost:8080/"

[storage]
# Directory for the content, preference and worker cache databases.
# Defaults to the platform data directory (e.g. ~/.local/share/gita)
# data_dir = "/path/to/gita"

[worker]
# Cache partition for the precached static assets
cache_name = "gita-v1"

# Cache partition filled with chapter data at runtime
runtime_cache_name = "gita-runtime"

# Fetched and stored before the worker takes control. Paths are relative to
# base_url, so a leading "/" would escape a base URL with a path.
precache = [
    "./",
    "index.html",
    "styles.css",
    "app.js",
    "manifest.json",
    "data/chapters.json",
]

# Served when the network fails
fallback_document = "index.html"

# Requests whose path contains this are cached after a successful fetch
chapter_path_pattern = "/data/chapters/"

[refresh]
# Delay between the refresh signal and the reload (milliseconds)
reload_delay_ms = 1500

# Preferences kept across a refresh
preserve = ["theme", "flavor", "lastRead"]
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Could not determine data directory")]
    NoDataDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid base URL {url}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
}
