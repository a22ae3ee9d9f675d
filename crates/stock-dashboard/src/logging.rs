use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::ConfigDoc;
use crate::error::{Error, Result};

pub const LOG_FILE_ENV: &str = "STOCKWATCH_LOG_FILE";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: PathBuf,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: PathBuf::from("stockwatch.log"),
            format: LogFormat::Text,
        }
    }
}

impl LoggingConfig {
    /// `[logging]` from the catalog, with the log file overridable from the
    /// environment.
    pub fn from_doc(doc: &ConfigDoc) -> Result<Self> {
        let mut cfg: Self = doc.deserialize_path("logging")?.unwrap_or_default();
        if let Ok(file) = std::env::var(LOG_FILE_ENV) {
            if !file.trim().is_empty() {
                cfg.file = PathBuf::from(file);
            }
        }
        Ok(cfg)
    }

    // RUST_LOG wins over the catalog level.
    fn filter(&self) -> Result<EnvFilter> {
        EnvFilter::try_from_default_env().or_else(|_| self.level_filter())
    }

    fn level_filter(&self) -> Result<EnvFilter> {
        EnvFilter::try_new(&self.level)
            .map_err(|e| Error::msg(format!("invalid log level '{}': {e}", self.level)))
    }
}

/// Install the global subscriber. Logs go to a file: stdout belongs to the
/// dashboard.
pub fn init(cfg: &LoggingConfig) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&cfg.file)
        .map_err(|e| Error::msg(format!("failed to open log file {}: {e}", cfg.file.display())))?;
    let writer = Mutex::new(file);
    let registry = tracing_subscriber::registry().with(cfg.filter()?);

    let installed = match cfg.format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(writer),
            )
            .try_init(),
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_thread_names(true)
                    .with_writer(writer),
            )
            .try_init(),
    };
    installed.map_err(|e| Error::msg(format!("failed to install log subscriber: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logging_table_parses_with_defaults() {
        let doc = ConfigDoc::parse("<mem>", "[logging]\nformat = \"json\"\n").unwrap();
        let cfg: LoggingConfig = doc.deserialize_path("logging").unwrap().unwrap();
        assert_eq!(cfg.format, LogFormat::Json);
        assert_eq!(cfg.level, "info");
        assert_eq!(cfg.file, PathBuf::from("stockwatch.log"));
    }

    #[test]
    fn bad_level_is_reported() {
        let cfg = LoggingConfig {
            level: "stockwatch=bogus".into(),
            ..Default::default()
        };
        let err = cfg.level_filter().unwrap_err().to_string();
        assert!(err.contains("stockwatch=bogus"), "unexpected err: {err}");
        assert!(LoggingConfig::default().level_filter().is_ok());
    }
}
