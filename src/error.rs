// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Conditions that abort a run. Everything else (I/O, CSV, HTTP) travels
/// as a plain `anyhow::Error` with context attached.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PipelineError {
    #[error("size of dataset has changed! expecting {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("in-scope column `{0}` is missing from the dataset")]
    UnknownColumn(String),

    #[error("in-scope column `{0}` has no target field and is not tag-only")]
    UnmappedColumn(String),

    #[error("required file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("column `{0}` would appear twice in the output")]
    DuplicateColumn(String),

    #[error("invalid metadata in `{table}`: {reason}")]
    InvalidMetadata { table: String, reason: String },
}
