//! Splits a raw multi-day minute export into one archive file per date.
//!
//! Vendor exports cover many sessions in one file and are sometimes written
//! newest-first. Each day's bars are re-sorted by time and written with the
//! six base columns only; the running average is added later by
//! [`DayArchive::ensure_vwap`](crate::DayArchive::ensure_vwap).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::errors::Error;
use crate::io::layout::FileLayout;
use crate::io::{reader, writer};
use crate::models::bar::Bar;

/// Regular session length in minutes (08:46 through 13:45).
pub const DEFAULT_EXPECTED_ROWS: usize = 300;

/// One file produced by [`split_export`].
#[derive(Debug, Clone, PartialEq)]
pub struct SplitDay {
    pub date: NaiveDate,
    pub path: PathBuf,
    pub rows: usize,
}

impl SplitDay {
    /// Whether the day has the expected number of rows.
    pub fn is_complete(&self, expected_rows: usize) -> bool {
        self.rows == expected_rows
    }
}

/// Splits `input` into per-day files under `out_dir`.
///
/// Days whose row count differs from `expected_rows` are still written but
/// logged, since half-day sessions and vendor gaps are common.
pub fn split_export(
    input: &Path,
    layout: &FileLayout,
    out_dir: &Path,
    expected_rows: usize,
) -> Result<Vec<SplitDay>, Error> {
    let bars = reader::read_bars(input)?;
    let total = bars.len();

    let mut by_date: BTreeMap<NaiveDate, Vec<Bar>> = BTreeMap::new();
    for bar in bars {
        by_date.entry(bar.date()).or_default().push(Bar::new(
            bar.timestamp,
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume,
        ));
    }

    let mut out = Vec::with_capacity(by_date.len());
    for (date, mut day) in by_date {
        day.sort_by_key(|b| b.timestamp);
        let path = out_dir.join(layout.file_name(date));
        writer::write_bars(&path, &day)?;

        let split = SplitDay {
            date,
            path,
            rows: day.len(),
        };
        if split.is_complete(expected_rows) {
            info!(%date, rows = split.rows, "wrote day file");
        } else {
            warn!(
                %date,
                rows = split.rows,
                expected = expected_rows,
                "day file has unexpected row count"
            );
        }
        out.push(split);
    }

    info!(input = %input.display(), bars = total, days = out.len(), "export split");
    Ok(out)
}
