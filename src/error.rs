//! src/error.rs
use std::path::PathBuf;

pub fn error_chain_fmt(
    f: &mut std::fmt::Formatter<'_>,
    e: &impl std::error::Error,
) -> std::fmt::Result {
    writeln!(f, "{}\n", e)?;
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{}", cause)?;
        current = cause.source();
    }
    Ok(())
}

#[derive(thiserror::Error)]
pub enum StoreError {
    #[error("Storage I/O failed at {location}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Shard already exists at {location}")]
    ShardExists { location: String },
    #[error("Corrupt shard {location} at line {line}: {reason}")]
    CorruptShard {
        location: String,
        line: usize,
        reason: String,
    },
    #[error("Key '{key}' cannot be used as a storage path component")]
    InvalidKey { key: String },
}

impl StoreError {
    pub fn io(location: impl std::fmt::Display, source: std::io::Error) -> Self {
        StoreError::Io {
            location: location.to_string(),
            source,
        }
    }
}

impl std::fmt::Debug for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(f, self)
    }
}

#[derive(thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Input file doesn't exist: {}", path.display())]
    MissingInput { path: PathBuf },
    #[error("Failed to read input {}", path.display())]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write output {}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Background task failed: {0}")]
    Task(String),
}

impl std::fmt::Debug for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(f, self)
    }
}

#[derive(thiserror::Error)]
pub enum ConfigurationError {
    #[error("Failed to determine the current directory")]
    CurrentDir(#[source] std::io::Error),
    #[error("Failed to load configuration")]
    Load(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl std::fmt::Debug for ConfigurationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(f, self)
    }
}
