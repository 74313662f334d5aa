//! Logging setup on `tracing-subscriber`.
//!
//! The store logs through `tracing` only:
//!
//! - `error`: loader failures (per slice)
//! - `warn`: guarded no-ops such as `select_row` on a multi-key query
//! - `debug`: dispatched requests, discarded stale responses
//! - `trace`: filter values and selection keys, only with `log_data`
//!
//! Embedders that already install a subscriber can skip this module.

use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::settings::{LogSettings, SettingsError};

static LOG_DATA_ENABLED: AtomicBool = AtomicBool::new(false);

pub const REDACTED_VALUE: &str = "[REDACTED]";

pub fn log_data_enabled() -> bool {
    LOG_DATA_ENABLED.load(Ordering::Relaxed)
}

/// Returns `value` when row-level logging is on, otherwise a redacted token.
pub fn redact_value(value: &str) -> &str {
    if log_data_enabled() {
        value
    } else {
        REDACTED_VALUE
    }
}

/// Selection keys for a log line: the keys themselves, or just a count.
pub fn redact_keys(keys: &[String]) -> String {
    if log_data_enabled() {
        keys.join(",")
    } else {
        format!("{} keys", keys.len())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
    pub with_timestamps: bool,
    pub with_target: bool,
    pub with_ansi: bool,
    /// Append to this file instead of writing to stderr.
    pub log_file: Option<PathBuf>,
    /// Allow filter values and row keys in log output.
    pub log_data: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::default(),
            with_timestamps: false,
            with_target: false,
            with_ansi: true,
            log_file: None,
            log_data: false,
        }
    }
}

impl LogConfig {
    pub fn from_settings(settings: &LogSettings) -> Result<Self, SettingsError> {
        let level = Level::from_str(&settings.level)
            .map_err(|_| SettingsError::InvalidLogLevel(settings.level.clone()))?;
        Ok(Self {
            level,
            format: settings.format,
            with_timestamps: settings.with_timestamps,
            log_file: settings.log_file.clone(),
            log_data: settings.log_data,
            ..Self::default()
        })
    }

    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_ansi(mut self, enable: bool) -> Self {
        self.with_ansi = enable;
        self
    }

    #[must_use]
    pub fn with_log_data(mut self, enable: bool) -> Self {
        self.log_data = enable;
        self
    }
}

/// Install the global subscriber.
///
/// Returns `Ok(false)` when another subscriber is already installed.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened.
pub fn init_logging(config: &LogConfig) -> io::Result<bool> {
    match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Ok(init_logging_with_writer(config, Mutex::new(file)))
        }
        None => Ok(init_logging_with_writer(config, io::stderr)),
    }
}

/// Install the global subscriber writing to `writer`.
pub fn init_logging_with_writer<W>(config: &LogConfig, writer: W) -> bool
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    LOG_DATA_ENABLED.store(config.log_data, Ordering::Release);
    let filter = build_env_filter(config.level);
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_target(config.with_target),
            )
            .try_init(),
        LogFormat::Compact => {
            let layer = fmt::layer()
                .compact()
                .with_writer(writer)
                .with_ansi(config.with_ansi)
                .with_target(config.with_target);
            if config.with_timestamps {
                registry.with(layer).try_init()
            } else {
                registry.with(layer.without_time()).try_init()
            }
        }
        LogFormat::Pretty => {
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(config.with_ansi)
                .with_target(config.with_target);
            if config.with_timestamps {
                registry.with(layer).try_init()
            } else {
                registry.with(layer.without_time()).try_init()
            }
        }
    };
    installed.is_ok()
}

/// `RUST_LOG` wins; otherwise our crates log at `level`, others at warn.
fn build_env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = level.as_str().to_lowercase();
        EnvFilter::new(format!(
            "warn,lims_model={level},lims_store={level},lims_loader={level}"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_settings_map_to_config() {
        let settings = LogSettings {
            level: "debug".to_string(),
            format: LogFormat::Json,
            log_data: true,
            ..LogSettings::default()
        };
        let config = LogConfig::from_settings(&settings).expect("valid level");
        assert_eq!(config.level, Level::DEBUG);
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.log_data);
    }

    #[test]
    fn unknown_level_is_rejected() {
        let settings = LogSettings {
            level: "chatty".to_string(),
            ..LogSettings::default()
        };
        assert!(matches!(
            LogConfig::from_settings(&settings),
            Err(SettingsError::InvalidLogLevel(level)) if level == "chatty"
        ));
    }

    #[test]
    fn redaction_defaults_to_on() {
        assert_eq!(redact_keys(&["1".to_string(), "2".to_string()]), "2 keys");
        assert_eq!(redact_value("secret"), REDACTED_VALUE);
    }
}
