use thiserror::Error;

use crate::io::{LoadError, WriteError};
use crate::models::day_series::SeriesError;

/// The unified error type for the `bar_archive` crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A day file could not be read or parsed.
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    /// A day file could not be written.
    #[error("Write error: {0}")]
    Write(#[from] WriteError),

    /// The bars of a day file are structurally invalid.
    #[error("Invalid day series: {0}")]
    Series(#[from] SeriesError),

    /// A generic I/O error (directory listing, metadata).
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True when the failure is a missing required column.
    pub fn is_missing_column(&self) -> bool {
        matches!(self, Error::Load(LoadError::MissingColumn { .. }))
    }
}
