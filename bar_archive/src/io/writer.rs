use std::fs;
use std::io::Write;
use std::path::Path;

use csv::WriterBuilder;
use snafu::ResultExt;

use crate::io::reader::{AVERAGE_COLUMN, LARGE_ORDER_COLUMN, REQUIRED_COLUMNS, STRENGTH_COLUMN};
use crate::io::{CreateDirSnafu, FlushSnafu, WriteCsvSnafu, WriteError};
use crate::models::bar::Bar;

/// Vendor timestamp format, one bar per minute.
pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M";

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

/// Writes bars to `path`, creating parent directories as needed.
///
/// Optional columns are emitted only when at least one bar carries them, in
/// the vendor order `strength, largeorder, Average`.
pub fn write_bars(path: &Path, bars: &[Bar]) -> Result<(), WriteError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context(CreateDirSnafu { path: parent })?;
    }
    let file = fs::File::create(path)
        .map_err(csv::Error::from)
        .context(WriteCsvSnafu { path })?;
    write_bars_to(file, bars, path)
}

/// Writes bars to any sink. `origin` is only used in error messages.
pub fn write_bars_to<W: Write>(sink: W, bars: &[Bar], origin: &Path) -> Result<(), WriteError> {
    let with_strength = bars.iter().any(|b| b.strength.is_some());
    let with_large_order = bars.iter().any(|b| b.large_order.is_some());
    let with_average = bars.iter().any(|b| b.vwap.is_some());

    let mut writer = WriterBuilder::new().from_writer(sink);

    let mut header: Vec<&str> = REQUIRED_COLUMNS.to_vec();
    if with_strength {
        header.push(STRENGTH_COLUMN);
    }
    if with_large_order {
        header.push(LARGE_ORDER_COLUMN);
    }
    if with_average {
        header.push(AVERAGE_COLUMN);
    }
    writer
        .write_record(&header)
        .context(WriteCsvSnafu { path: origin })?;

    for bar in bars {
        let mut row = vec![
            bar.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            bar.volume.to_string(),
        ];
        if with_strength {
            row.push(fmt_opt(bar.strength));
        }
        if with_large_order {
            row.push(fmt_opt(bar.large_order));
        }
        if with_average {
            row.push(fmt_opt(bar.vwap));
        }
        writer
            .write_record(&row)
            .context(WriteCsvSnafu { path: origin })?;
    }

    writer.flush().context(FlushSnafu { path: origin })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::reader::parse_bars;
    use chrono::NaiveDate;

    fn bars() -> Vec<Bar> {
        let d = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        let mut a = Bar::new(d.and_hms_opt(8, 45, 0).unwrap(), 100.0, 101.5, 99.0, 101.0, 4.0);
        a.vwap = Some(101.0);
        let b = Bar::new(d.and_hms_opt(8, 46, 0).unwrap(), 101.0, 102.0, 100.0, 100.5, 6.0);
        vec![a, b]
    }

    #[test]
    fn header_only_carries_present_optional_columns() {
        let mut out = Vec::new();
        write_bars_to(&mut out, &bars(), Path::new("mem")).unwrap();
        let text = String::from_utf8(out).unwrap();
        let first = text.lines().next().unwrap();
        assert_eq!(first, "Date,Open,High,Low,Close,Volume,Average");
        assert!(text.contains("2025/01/02 08:45,100,101.5,99,101,4,101"));
        // second bar has no average: trailing empty cell
        assert!(text.contains("2025/01/02 08:46,101,102,100,100.5,6,\n"));
    }

    #[test]
    fn written_bars_read_back_identically() {
        let mut out = Vec::new();
        write_bars_to(&mut out, &bars(), Path::new("mem")).unwrap();
        let back = parse_bars(out.as_slice(), Path::new("mem")).unwrap();
        assert_eq!(back, bars());
    }
}
