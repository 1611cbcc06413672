//! Minute-bar archive for one futures contract.
//!
//! The archive is a directory of CSV files, one per trading day, named by a
//! fixed date pattern (`TX_20250102_1K.csv` by default). This crate owns the
//! bar model, reading and writing those files, the running VWAP column that
//! downstream analysis relies on, and splitting a raw multi-day export into
//! per-day files.

pub mod errors;
pub mod io;
pub mod models;
pub mod split;
pub mod vwap;

pub use errors::Error;
pub use io::archive::{DayArchive, PriorDay};
pub use io::layout::FileLayout;
pub use models::{bar::Bar, day_series::DaySeries};
