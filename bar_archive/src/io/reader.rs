//! CSV parsing for day files and raw exports.
//!
//! The header must contain the six base columns; the running average and the
//! two order-flow columns are optional. Column names are matched
//! case-insensitively after trimming, so vendor exports with `date`/`Close`
//! variations load the same way.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDateTime;
use csv::{ReaderBuilder, StringRecord, Trim};
use snafu::{OptionExt, ResultExt};

use crate::io::{BadValueSnafu, CsvSnafu, LoadError, MissingColumnSnafu};
use crate::models::bar::Bar;

/// Columns every day file must carry.
pub const REQUIRED_COLUMNS: [&str; 6] = ["Date", "Open", "High", "Low", "Close", "Volume"];
/// Running volume-weighted average column.
pub const AVERAGE_COLUMN: &str = "Average";
/// Order-flow strength column.
pub const STRENGTH_COLUMN: &str = "strength";
/// Large-order flow column.
pub const LARGE_ORDER_COLUMN: &str = "largeorder";

const TIMESTAMP_FORMATS: [&str; 6] = [
    "%Y/%m/%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// Parses a bar timestamp in any of the formats the exports use.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// Which header positions hold which fields.
#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    date: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
    average: Option<usize>,
    strength: Option<usize>,
    large_order: Option<usize>,
}

fn find(headers: &StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
}

impl ColumnIndex {
    fn from_headers(headers: &StringRecord, origin: &Path) -> Result<Self, LoadError> {
        let required = |name: &str| {
            find(headers, name).context(MissingColumnSnafu {
                path: origin,
                column: name,
            })
        };
        Ok(Self {
            date: required("Date")?,
            open: required("Open")?,
            high: required("High")?,
            low: required("Low")?,
            close: required("Close")?,
            volume: required("Volume")?,
            average: find(headers, AVERAGE_COLUMN),
            strength: find(headers, STRENGTH_COLUMN),
            large_order: find(headers, LARGE_ORDER_COLUMN),
        })
    }
}

/// Reads every bar from a file on disk.
pub fn read_bars(path: &Path) -> Result<Vec<Bar>, LoadError> {
    let file = File::open(path)
        .map_err(csv::Error::from)
        .context(CsvSnafu { path })?;
    parse_bars(file, path)
}

/// Whether the file's header carries the running average column, whatever
/// its cells hold.
pub fn has_average_column(path: &Path) -> Result<bool, LoadError> {
    let file = File::open(path)
        .map_err(csv::Error::from)
        .context(CsvSnafu { path })?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(file);
    let headers = reader.headers().context(CsvSnafu { path })?;
    Ok(find(headers, AVERAGE_COLUMN).is_some())
}

/// Reads every bar from any CSV source. `origin` is only used in error messages.
pub fn parse_bars<R: Read>(source: R, origin: &Path) -> Result<Vec<Bar>, LoadError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(source);

    let headers = reader.headers().context(CsvSnafu { path: origin })?.clone();
    let idx = ColumnIndex::from_headers(&headers, origin)?;

    let mut bars = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.context(CsvSnafu { path: origin })?;
        bars.push(parse_record(&record, &idx, i + 1, origin)?);
    }
    Ok(bars)
}

fn cell<'r>(record: &'r StringRecord, at: usize) -> &'r str {
    record.get(at).unwrap_or("")
}

fn required_f64(
    record: &StringRecord,
    at: usize,
    column: &str,
    row: usize,
    origin: &Path,
) -> Result<f64, LoadError> {
    let raw = cell(record, at);
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => BadValueSnafu {
            path: origin,
            row,
            column,
            value: raw,
        }
        .fail(),
    }
}

/// Empty and NaN cells are treated as absent.
fn optional_f64(
    record: &StringRecord,
    at: Option<usize>,
    column: &str,
    row: usize,
    origin: &Path,
) -> Result<Option<f64>, LoadError> {
    let Some(at) = at else {
        return Ok(None);
    };
    let raw = cell(record, at);
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_nan() => Ok(None),
        Ok(v) => Ok(Some(v)),
        Err(_) => BadValueSnafu {
            path: origin,
            row,
            column,
            value: raw,
        }
        .fail(),
    }
}

fn parse_record(
    record: &StringRecord,
    idx: &ColumnIndex,
    row: usize,
    origin: &Path,
) -> Result<Bar, LoadError> {
    let raw_ts = cell(record, idx.date);
    let timestamp = parse_timestamp(raw_ts).context(BadValueSnafu {
        path: origin,
        row,
        column: "Date",
        value: raw_ts,
    })?;

    Ok(Bar {
        timestamp,
        open: required_f64(record, idx.open, "Open", row, origin)?,
        high: required_f64(record, idx.high, "High", row, origin)?,
        low: required_f64(record, idx.low, "Low", row, origin)?,
        close: required_f64(record, idx.close, "Close", row, origin)?,
        volume: required_f64(record, idx.volume, "Volume", row, origin)?,
        vwap: optional_f64(record, idx.average, AVERAGE_COLUMN, row, origin)?,
        strength: optional_f64(record, idx.strength, STRENGTH_COLUMN, row, origin)?,
        large_order: optional_f64(record, idx.large_order, LARGE_ORDER_COLUMN, row, origin)?,
    })
}
