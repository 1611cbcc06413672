//! File-level access to the per-day archive.
//!
//! - [`layout`]: file naming convention (`<prefix><YYYYMMDD><suffix>`)
//! - [`reader`]: parse one day file into a [`DaySeries`](crate::DaySeries)
//! - [`writer`]: write a day series back in the same column layout
//! - [`archive`]: directory-level operations (range loads, prior-day lookup)

pub mod archive;
pub mod layout;
pub mod reader;
pub mod writer;

use std::path::PathBuf;

use snafu::{Backtrace, Snafu};

/// Errors raised while reading a day file.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum LoadError {
    /// The file could not be opened or read as CSV.
    #[snafu(display("Failed to read {}: {source}", path.display()))]
    Csv {
        path: PathBuf,
        source: csv::Error,
        backtrace: Backtrace,
    },

    /// A required column is absent from the header; no bars are produced.
    #[snafu(display("{} is missing required column '{column}'", path.display()))]
    MissingColumn {
        path: PathBuf,
        column: String,
        backtrace: Backtrace,
    },

    /// A cell could not be parsed.
    #[snafu(display("{} row {row}: bad value '{value}' in column '{column}'", path.display()))]
    BadValue {
        path: PathBuf,
        row: usize,
        column: String,
        value: String,
        backtrace: Backtrace,
    },
}

/// Errors raised while writing a day file.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum WriteError {
    /// The destination directory could not be created.
    #[snafu(display("Failed to create directory {}: {source}", path.display()))]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// Writing CSV records failed.
    #[snafu(display("Failed to write {}: {source}", path.display()))]
    WriteCsv {
        path: PathBuf,
        source: csv::Error,
        backtrace: Backtrace,
    },

    /// Flushing the file failed.
    #[snafu(display("Failed to flush {}: {source}", path.display()))]
    Flush {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },
}
