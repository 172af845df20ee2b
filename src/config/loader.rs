//! Configuration loading from disk.

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use thiserror::Error;

use crate::config::model::Configuration;
use crate::config::validation::ValidationError;

/// Boxed error produced by a configuration consumer.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("configuration rejected: {0}")]
    Rejected(#[source] BoxError),

    #[error("poll interval must be greater than zero")]
    ZeroInterval,
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Raw content of a configuration source and its modification time.
#[derive(Debug, Clone)]
pub struct Source {
    pub data: Vec<u8>,
    pub modified: SystemTime,
}

/// Stat a configuration source and return its modification time.
pub async fn modified_time(path: &Path) -> Result<SystemTime, ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    let metadata = tokio::fs::metadata(path).await.map_err(io_err)?;
    metadata.modified().map_err(io_err)
}

/// Read the full content of a configuration source.
pub async fn read_source(path: &Path) -> Result<Source, ConfigError> {
    let modified = modified_time(path).await?;
    let data = tokio::fs::read(path).await.map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Source { data, modified })
}

/// Load and validate configuration from a YAML file.
pub async fn load_config(path: &Path) -> Result<Configuration, ConfigError> {
    let source = read_source(path).await?;
    Configuration::from_yaml(&source.data, source.modified)
}
