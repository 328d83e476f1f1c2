//! Error types for the fallible edges of the crate
//!
//! The progress widget itself never fails: out-of-range input is clamped and
//! calls made before the mount point exists are deferred. Errors only come
//! from loading configuration and from driving a real terminal.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for loadbar operations
pub type Result<T> = std::result::Result<T, LoadbarError>;

#[derive(Error, Debug)]
pub enum LoadbarError {
    #[error("Failed to read configuration {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Terminal error: {0}")]
    Terminal(#[from] std::io::Error),
}

impl LoadbarError {
    /// Whether this error came from the configuration layer
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            LoadbarError::ConfigRead { .. } | LoadbarError::ConfigParse { .. }
        )
    }
}
