//! Error types shared by the Fleet crates.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for configuration and flatfile operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while loading configuration or the flatfile.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Config(String),

    #[error("invalid duration {0:?}: expected a number followed by ms, s or m")]
    Duration(String),

    #[error("flatfile line {line}: invalid address {entry:?}")]
    Flatfile { line: usize, entry: String },
}
