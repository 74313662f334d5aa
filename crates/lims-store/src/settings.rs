//! Store settings, persisted as TOML.

use std::io;
use std::path::{Path, PathBuf};

use lims_model::{DEFAULT_MAX_ROWS, DEFAULT_URL_PREFIX, ModelDefaults};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::LogFormat;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to write settings file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Page size for models that do not set one.
    pub default_max_rows: usize,
    /// URL prefix for models that do not set one.
    pub default_url_prefix: String,
    /// Reload a bound model's selections after a URL change when it has
    /// selections or a selections error.
    pub load_selections_on_url_change: bool,
    pub log: LogSettings,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            default_max_rows: DEFAULT_MAX_ROWS,
            default_url_prefix: DEFAULT_URL_PREFIX.to_string(),
            load_selections_on_url_change: true,
            log: LogSettings::default(),
        }
    }
}

impl StoreSettings {
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(content)?)
    }

    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content),
            Err(source) if source.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        let write_error = |source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(write_error)
    }

    pub fn model_defaults(&self) -> ModelDefaults {
        ModelDefaults {
            max_rows: self.default_max_rows,
            url_prefix: self.default_url_prefix.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    pub format: LogFormat,
    pub with_timestamps: bool,
    pub log_data: bool,
    pub log_file: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            with_timestamps: false,
            log_data: false,
            log_file: None,
        }
    }
}
