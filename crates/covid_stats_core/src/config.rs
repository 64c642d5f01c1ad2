//! Pipeline configuration.
//!
//! # Responsibility
//! - Hold every file path and logging option the entry sequence needs.
//! - Load overrides from an optional JSON config file.
//!
//! # Invariants
//! - Every field has a default, so a partial config file is valid.

use crate::document::json::JsonLayout;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const DEFAULT_SOURCE_XML: &str = "data/raw/covid_stats.xml";
pub const DEFAULT_JSON_PATH: &str = "data/processed/covid_stats.json";
pub const DEFAULT_DATABASE_PATH: &str = "data/covid_stats.sqlite3";
pub const DEFAULT_EXPORTED_JSON: &str = "data/processed/covid_exported.json";
pub const DEFAULT_EXPORTED_XML: &str = "data/processed/covid_stats_exported.xml";
pub const DEFAULT_LOG_DIR: &str = "logs";

/// File locations and logging options for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub source_xml: PathBuf,
    pub json_path: PathBuf,
    pub database_path: PathBuf,
    pub exported_json: PathBuf,
    pub exported_json_layout: JsonLayout,
    pub exported_xml: PathBuf,
    /// `None` selects the build-mode default.
    pub log_level: Option<String>,
    pub log_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_xml: PathBuf::from(DEFAULT_SOURCE_XML),
            json_path: PathBuf::from(DEFAULT_JSON_PATH),
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            exported_json: PathBuf::from(DEFAULT_EXPORTED_JSON),
            exported_json_layout: JsonLayout::Primary,
            exported_xml: PathBuf::from(DEFAULT_EXPORTED_XML),
            log_level: None,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

/// Error while loading a config file.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: serde_json::Error },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "invalid config `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
        }
    }
}

/// Loads a JSON config file; absent keys keep their defaults.
pub fn load_config(path: impl AsRef<Path>) -> Result<PipelineConfig, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_config(text: &str) -> Result<PipelineConfig, serde_json::Error> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::{load_config, parse_config, ConfigError, PipelineConfig};
    use crate::document::json::JsonLayout;
    use std::path::PathBuf;

    #[test]
    fn partial_config_keeps_defaults() {
        let config = parse_config(
            r#"{"database_path": "/tmp/stats.db", "exported_json_layout": "legacy"}"#,
        )
        .expect("config should parse");
        assert_eq!(config.database_path, PathBuf::from("/tmp/stats.db"));
        assert_eq!(config.exported_json_layout, JsonLayout::Legacy);
        assert_eq!(config.source_xml, PipelineConfig::default().source_xml);
        assert_eq!(config.log_level, None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(parse_config(r#"{"databse_path": "typo.db"}"#).is_err());
    }

    #[test]
    fn missing_config_file_reports_io_error() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let err = load_config(dir.path().join("absent.json")).expect_err("load config should fail");
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
