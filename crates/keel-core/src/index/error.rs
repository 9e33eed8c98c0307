//! Discovery error types.
//!
//! There is no null-context or null-cache failure mode: the context and
//! cache are borrowed, never optional.

use std::path::PathBuf;
use thiserror::Error;

/// Error raised by package-index discovery.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The identifier is neither a recognized remote URI nor an existing
    /// local file.
    #[error("no such package index file: \"{0}\"")]
    ManifestNotFound(String),

    /// The manifest script raised an error during evaluation.
    #[error("error evaluating package index \"{identifier}\": {detail}")]
    EvaluationFailure { identifier: String, detail: String },

    /// No known package root is a prefix of the given path.
    #[error("no matching package root for {}", .0.display())]
    NoMatchingRoot(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
