//! Configuration file handling for thermafuse.
//!
//! Loads configuration from `~/.config/thermafuse/config.toml` or a custom
//! path. CLI arguments override config values, which override built-in
//! defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration file structure for thermafuse.
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub fusion: FusionConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Default)]
pub struct CameraConfig {
    /// Device index of the visible-light camera
    #[serde(default)]
    pub visible: Option<u32>,
    /// Device index of the thermal camera
    #[serde(default)]
    pub thermal: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
pub struct FusionConfig {
    /// Initial blend opacity in [0, 1]
    #[serde(default)]
    pub opacity: Option<f32>,
    /// Segmentation cutoff for the ThermaVue overlay (0-255)
    #[serde(default)]
    pub overlay_threshold: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
pub struct OutputConfig {
    /// Directory snapshots and recordings are written to
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// File name prefix for snapshots and recordings
    #[serde(default)]
    pub prefix: Option<String>,
}

impl Config {
    /// Load configuration from the default path.
    /// Returns the default config if the file doesn't exist;
    /// an error if it exists but cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let path = default_path();
        if path.exists() {
            Self::load_from_explicit(path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load configuration from an explicit path.
    /// Unlike [`Config::load`], a missing file is an error here: the user
    /// asked for this exact file.
    pub fn load_from_explicit(path: PathBuf) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
            path: path.clone(),
            source: e,
        })?;
        Self::parse(&content, &path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError { path, source } => {
                write!(
                    f,
                    "Failed to read config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::ParseError { path, source } => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    source
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
        }
    }
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("thermafuse").join("config.toml"))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config/thermafuse/config.toml")
        })
}
