// ============================================================
// Layer 3 — Dataset Error Kinds
// ============================================================
// Every failure the data layer can report. The upper layers
// wrap these in anyhow::Error; callers that care about the
// kind can still recover it with `downcast_ref::<DatasetError>()`.
//
//   Usage          — an operation was called before its setup
//                    (e.g. next_batch before open)
//   Validation     — malformed input: a bad score range, a row
//                    without three tab-separated fields, ...
//   Resource       — a file could not be opened, read or sought
//   NotImplemented — a configuration option that is rejected
//                    on purpose
//   Empty          — a dataset file contains no rows at all
//
// No error is retried and no partial batch is ever returned.

use std::{io, path::PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("usage error: {0}")]
    Usage(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("cannot access '{}': {source}", .path.display())]
    Resource {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("dataset file '{}' contains no rows", .0.display())]
    Empty(PathBuf),
}

impl DatasetError {
    /// Wrap an io::Error together with the path it concerns
    pub fn resource(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Resource { path: path.into(), source }
    }
}
