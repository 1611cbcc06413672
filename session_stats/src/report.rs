//! CSV report tables.
//!
//! - summary (`segment_probability_analysis.csv`): one row per combination
//! - detail (`segment_detailed_dates.csv`): one row per classified day
//! - daily results: per-day measurements and matched daily conditions
//! - intraday results: bars that matched a bar condition
//!
//! Floats are written in Rust's shortest round-trip form, so reading the
//! detail table back and re-aggregating reproduces the summary exactly.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use thiserror::Error;
use tracing::info;

use crate::classify::{Direction, RatioClass, SegmentLabel};
use crate::combination::{ClassifiedDay, ClassifiedSegment, CombinationTable};
use crate::conditions::IntradayHit;
use crate::pipeline::DailyResult;
use crate::segment::SessionPlan;

pub const SUMMARY_FILE: &str = "segment_probability_analysis.csv";
pub const DETAIL_FILE: &str = "segment_detailed_dates.csv";

/// Date format used in every table.
pub const DATE_FORMAT: &str = "%Y%m%d";
const LIST_SEPARATOR: &str = "|";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("I/O error on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("CSV error in {}: {source}", path.display())]
    Csv { path: PathBuf, source: csv::Error },

    #[error("{}: header does not match the session plan (expected {expected:?}, found {found:?})", path.display())]
    Header {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("{} row {row}: {message}", path.display())]
    Row {
        path: PathBuf,
        row: usize,
        message: String,
    },
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> ReportError + '_ {
    move |source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn csv_err(path: &Path) -> impl Fn(csv::Error) -> ReportError + '_ {
    move |source| ReportError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

fn create(path: &Path) -> Result<File, ReportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    File::create(path).map_err(io_err(path))
}

fn fmt_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn fmt_opt<T: ToString>(v: Option<T>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

fn write_rows<W: Write>(
    sink: W,
    header: &[String],
    rows: impl Iterator<Item = Vec<String>>,
    origin: &Path,
) -> Result<(), ReportError> {
    let mut writer = WriterBuilder::new().from_writer(sink);
    writer.write_record(header).map_err(csv_err(origin))?;
    for row in rows {
        writer.write_record(&row).map_err(csv_err(origin))?;
    }
    writer.flush().map_err(io_err(origin))
}

// ---------------------------------------------------------------------------
// summary

pub fn summary_header(plan: &SessionPlan) -> Vec<String> {
    let mut h: Vec<String> = ["combination", "count", "probability", "date_list"]
        .map(String::from)
        .to_vec();
    h.extend(plan.names().map(|n| format!("{n}_description")));
    h.push("high_point".into());
    h.push("low_point".into());
    h.extend(plan.names().map(|n| format!("avg_{n}_change")));
    h.push("avg_daily_change".into());
    h
}

pub fn write_summary(
    path: &Path,
    plan: &SessionPlan,
    table: &CombinationTable,
) -> Result<(), ReportError> {
    write_summary_to(create(path)?, plan, table, path)?;
    info!(path = %path.display(), combinations = table.rows.len(), "wrote summary table");
    Ok(())
}

pub fn write_summary_to<W: Write>(
    sink: W,
    plan: &SessionPlan,
    table: &CombinationTable,
    origin: &Path,
) -> Result<(), ReportError> {
    let rows = table.rows.iter().map(|r| {
        let mut row = vec![
            r.key.to_string(),
            r.count.to_string(),
            r.probability.to_string(),
            r.dates
                .iter()
                .map(|d| fmt_date(*d))
                .collect::<Vec<_>>()
                .join(LIST_SEPARATOR),
        ];
        row.extend(r.key.labels.iter().map(SegmentLabel::to_string));
        row.push(r.key.high_point().to_string());
        row.push(r.key.low_point().to_string());
        row.extend(r.avg_deltas.iter().map(f64::to_string));
        row.push(r.avg_daily_change.to_string());
        row
    });
    write_rows(sink, &summary_header(plan), rows, origin)
}

// ---------------------------------------------------------------------------
// detail

const DETAIL_SEGMENT_COLUMNS: [&str; 5] = ["class", "change", "high", "low", "delta"];

pub fn detail_header(plan: &SessionPlan) -> Vec<String> {
    let mut h = vec!["date".to_string()];
    for name in plan.names() {
        h.extend(DETAIL_SEGMENT_COLUMNS.iter().map(|c| format!("{name}_{c}")));
    }
    h.extend(
        [
            "closing_high_is_daily_high",
            "closing_low_is_daily_low",
            "daily_change",
            "combination",
        ]
        .map(String::from),
    );
    h
}

pub fn write_detail(
    path: &Path,
    plan: &SessionPlan,
    days: &[ClassifiedDay],
) -> Result<(), ReportError> {
    write_detail_to(create(path)?, plan, days, path)?;
    info!(path = %path.display(), days = days.len(), "wrote detail table");
    Ok(())
}

pub fn write_detail_to<W: Write>(
    sink: W,
    plan: &SessionPlan,
    days: &[ClassifiedDay],
    origin: &Path,
) -> Result<(), ReportError> {
    let rows = days.iter().map(|d| {
        let mut row = vec![fmt_date(d.date)];
        for seg in &d.segments {
            row.push(seg.label.class.to_string());
            row.push(seg.label.direction.to_string());
            row.push(seg.high.to_string());
            row.push(seg.low.to_string());
            row.push(seg.delta.to_string());
        }
        row.push(d.closing_high.to_string());
        row.push(d.closing_low.to_string());
        row.push(d.daily_change.to_string());
        row.push(d.key().to_string());
        row
    });
    write_rows(sink, &detail_header(plan), rows, origin)
}

pub fn read_detail(path: &Path, plan: &SessionPlan) -> Result<Vec<ClassifiedDay>, ReportError> {
    let file = File::open(path).map_err(io_err(path))?;
    let days = parse_detail(file, plan, path)?;
    info!(path = %path.display(), days = days.len(), "loaded detail table");
    Ok(days)
}

/// Parses a detail table. The header must match `plan` exactly and every
/// row's `combination` cell must agree with its label columns.
pub fn parse_detail<R: Read>(
    source: R,
    plan: &SessionPlan,
    origin: &Path,
) -> Result<Vec<ClassifiedDay>, ReportError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(source);

    let expected = detail_header(plan);
    let found: Vec<String> = reader
        .headers()
        .map_err(csv_err(origin))?
        .iter()
        .map(String::from)
        .collect();
    if found != expected {
        return Err(ReportError::Header {
            path: origin.to_path_buf(),
            expected,
            found,
        });
    }

    let mut days = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(csv_err(origin))?;
        let row = i + 1;
        let day = parse_detail_row(&record, plan.len()).map_err(|message| ReportError::Row {
            path: origin.to_path_buf(),
            row,
            message,
        })?;
        days.push(day);
    }
    Ok(days)
}

fn parse_detail_row(record: &StringRecord, segments: usize) -> Result<ClassifiedDay, String> {
    let cell = |at: usize| record.get(at).unwrap_or("");
    fn num(raw: &str, what: &str) -> Result<f64, String> {
        raw.parse::<f64>()
            .map_err(|_| format!("bad {what} value {raw:?}"))
    }
    fn flag(raw: &str, what: &str) -> Result<bool, String> {
        raw.parse::<bool>()
            .map_err(|_| format!("bad {what} value {raw:?}"))
    }

    let date = NaiveDate::parse_from_str(cell(0), DATE_FORMAT)
        .map_err(|e| format!("bad date {:?}: {e}", cell(0)))?;

    let mut parsed = Vec::with_capacity(segments);
    for s in 0..segments {
        let base = 1 + s * DETAIL_SEGMENT_COLUMNS.len();
        let class = cell(base)
            .parse::<RatioClass>()
            .map_err(|e| e.to_string())?;
        let direction = cell(base + 1)
            .parse::<Direction>()
            .map_err(|e| e.to_string())?;
        parsed.push(ClassifiedSegment {
            label: SegmentLabel::new(class, direction),
            high: num(cell(base + 2), "high")?,
            low: num(cell(base + 3), "low")?,
            delta: num(cell(base + 4), "delta")?,
        });
    }

    let tail = 1 + segments * DETAIL_SEGMENT_COLUMNS.len();
    let day = ClassifiedDay {
        date,
        segments: parsed,
        closing_high: flag(cell(tail), "closing_high_is_daily_high")?,
        closing_low: flag(cell(tail + 1), "closing_low_is_daily_low")?,
        daily_change: num(cell(tail + 2), "daily_change")?,
    };

    let key = day.key().to_string();
    if cell(tail + 3) != key {
        return Err(format!(
            "combination {:?} does not match labels ({key})",
            cell(tail + 3)
        ));
    }
    Ok(day)
}

// ---------------------------------------------------------------------------
// daily and intraday results

/// `daily_results_<from>_<to>.csv`
pub fn daily_results_file(from: NaiveDate, to: NaiveDate) -> String {
    format!("daily_results_{}_{}.csv", fmt_date(from), fmt_date(to))
}

/// `intraday_results_<from>_<to>.csv`
pub fn intraday_results_file(from: NaiveDate, to: NaiveDate) -> String {
    format!("intraday_results_{}_{}.csv", fmt_date(from), fmt_date(to))
}

pub fn daily_results_header(plan: &SessionPlan) -> Vec<String> {
    let mut h: Vec<String> = [
        "date",
        "open",
        "high",
        "low",
        "close",
        "volume",
        "range",
        "daily_change",
        "conditions",
    ]
    .map(String::from)
    .to_vec();
    for name in plan.names() {
        h.extend(
            ["ratio", "start", "end", "high", "low"]
                .iter()
                .map(|c| format!("{name}_{c}")),
        );
    }
    h.push("closing_high_is_daily_high".into());
    h.push("closing_low_is_daily_low".into());
    h
}

pub fn write_daily_results(
    path: &Path,
    plan: &SessionPlan,
    results: &[DailyResult],
) -> Result<(), ReportError> {
    write_daily_results_to(create(path)?, plan, results, path)?;
    info!(path = %path.display(), days = results.len(), "wrote daily results");
    Ok(())
}

pub fn write_daily_results_to<W: Write>(
    sink: W,
    plan: &SessionPlan,
    results: &[DailyResult],
    origin: &Path,
) -> Result<(), ReportError> {
    let rows = results.iter().map(|r| {
        let rec = &r.record;
        let mut row = vec![
            fmt_date(rec.date),
            rec.open.to_string(),
            rec.high.to_string(),
            rec.low.to_string(),
            rec.close.to_string(),
            rec.volume.to_string(),
            rec.range().to_string(),
            rec.daily_change().to_string(),
            r.conditions.join(LIST_SEPARATOR),
        ];
        for seg in &rec.segments {
            match seg {
                Some(s) => row.extend([
                    s.ratio.to_string(),
                    s.start_close.to_string(),
                    s.end_close.to_string(),
                    s.high.to_string(),
                    s.low.to_string(),
                ]),
                None => row.extend(std::iter::repeat_n(String::new(), 5)),
            }
        }
        row.push(fmt_opt(rec.closing_high_is_day_high));
        row.push(fmt_opt(rec.closing_low_is_day_low));
        row
    });
    write_rows(sink, &daily_results_header(plan), rows, origin)
}

pub const INTRADAY_HEADER: [&str; 8] = [
    "date", "time", "open", "high", "low", "close", "volume", "conditions",
];

pub fn write_intraday_hits(path: &Path, hits: &[IntradayHit]) -> Result<(), ReportError> {
    write_intraday_hits_to(create(path)?, hits, path)?;
    info!(path = %path.display(), hits = hits.len(), "wrote intraday results");
    Ok(())
}

pub fn write_intraday_hits_to<W: Write>(
    sink: W,
    hits: &[IntradayHit],
    origin: &Path,
) -> Result<(), ReportError> {
    let header = INTRADAY_HEADER.map(String::from);
    let rows = hits.iter().map(|h| {
        vec![
            fmt_date(h.bar.date()),
            h.bar.time().format("%H:%M").to_string(),
            h.bar.open.to_string(),
            h.bar.high.to_string(),
            h.bar.low.to_string(),
            h.bar.close.to_string(),
            h.bar.volume.to_string(),
            h.conditions.join(LIST_SEPARATOR),
        ]
    });
    write_rows(sink, &header, rows, origin)
}

/// Detail table as an Arrow IPC (feather) file.
#[cfg(feature = "feather")]
pub mod feather {
    use std::path::Path;

    use polars::prelude::{Column, DataFrame, PolarsResult};
    use polars_io::SerWriter;
    use polars_io::ipc::IpcWriter;

    use super::{create, fmt_date};
    use crate::combination::ClassifiedDay;
    use crate::segment::SessionPlan;

    pub fn detail_frame(plan: &SessionPlan, days: &[ClassifiedDay]) -> PolarsResult<DataFrame> {
        let mut columns = vec![Column::new(
            "date".into(),
            days.iter().map(|d| fmt_date(d.date)).collect::<Vec<_>>(),
        )];
        for (i, name) in plan.names().enumerate() {
            let seg = |f: fn(&crate::combination::ClassifiedSegment) -> f64| {
                days.iter().map(|d| f(&d.segments[i])).collect::<Vec<f64>>()
            };
            columns.push(Column::new(
                format!("{name}_class").into(),
                days.iter()
                    .map(|d| d.segments[i].label.class.to_string())
                    .collect::<Vec<_>>(),
            ));
            columns.push(Column::new(
                format!("{name}_change").into(),
                days.iter()
                    .map(|d| d.segments[i].label.direction.to_string())
                    .collect::<Vec<_>>(),
            ));
            columns.push(Column::new(format!("{name}_high").into(), seg(|s| s.high)));
            columns.push(Column::new(format!("{name}_low").into(), seg(|s| s.low)));
            columns.push(Column::new(format!("{name}_delta").into(), seg(|s| s.delta)));
        }
        columns.push(Column::new(
            "closing_high_is_daily_high".into(),
            days.iter().map(|d| d.closing_high).collect::<Vec<_>>(),
        ));
        columns.push(Column::new(
            "closing_low_is_daily_low".into(),
            days.iter().map(|d| d.closing_low).collect::<Vec<_>>(),
        ));
        columns.push(Column::new(
            "daily_change".into(),
            days.iter().map(|d| d.daily_change).collect::<Vec<_>>(),
        ));
        columns.push(Column::new(
            "combination".into(),
            days.iter().map(|d| d.key().to_string()).collect::<Vec<_>>(),
        ));
        DataFrame::new(columns)
    }

    pub fn write_detail_feather(
        path: &Path,
        plan: &SessionPlan,
        days: &[ClassifiedDay],
    ) -> anyhow::Result<()> {
        let mut df = detail_frame(plan, days)?;
        let mut file = create(path)?;
        IpcWriter::new(&mut file).finish(&mut df)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combination::aggregate;
    use crate::combination::tests::{day, label};

    fn sample() -> Vec<ClassifiedDay> {
        let a = [
            label(RatioClass::Low, Direction::Down),
            label(RatioClass::Medium, Direction::Up),
            label(RatioClass::High, Direction::Up),
        ];
        let b = [
            label(RatioClass::High, Direction::Up),
            label(RatioClass::Low, Direction::Flat),
            label(RatioClass::Medium, Direction::Down),
        ];
        vec![
            day(0, &a, &[-2.0, 1.0, 3.0], true, false),
            day(1, &b, &[0.1, 0.0, -0.7], false, true),
            day(2, &a, &[-1.5, 2.25, 0.3], true, false),
        ]
    }

    fn origin() -> &'static Path {
        Path::new("mem.csv")
    }

    #[test]
    fn detail_header_follows_plan() {
        let header = detail_header(&SessionPlan::default()).join(",");
        insta::assert_snapshot!(header, @"date,first_trade_class,first_trade_change,first_trade_high,first_trade_low,first_trade_delta,second_trade_class,second_trade_change,second_trade_high,second_trade_low,second_trade_delta,final_trade_class,final_trade_change,final_trade_high,final_trade_low,final_trade_delta,closing_high_is_daily_high,closing_low_is_daily_low,daily_change,combination");
    }

    #[test]
    fn summary_rows_carry_dates_and_descriptions() {
        let plan = SessionPlan::default();
        let table = aggregate(&sample());
        let mut out = Vec::new();
        write_summary_to(&mut out, &plan, &table, origin()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "combination,count,probability,date_list,first_trade_description,\
             second_trade_description,final_trade_description,high_point,low_point,\
             avg_first_trade_change,avg_second_trade_change,avg_final_trade_change,\
             avg_daily_change"
        );
        let first = lines.next().unwrap();
        assert!(first.starts_with("Low_Down_Medium_Up_High_Up_H_Nl,2,0.6666666666666666,20250101|20250103,"));
        assert!(first.contains("Low(Down),Medium(Up),High(Up),closing high is day high,"));
    }

    #[test]
    fn detail_round_trip_reproduces_summary() {
        let plan = SessionPlan::default();
        let days = sample();

        let mut detail = Vec::new();
        write_detail_to(&mut detail, &plan, &days, origin()).unwrap();
        let back = parse_detail(detail.as_slice(), &plan, origin()).unwrap();
        assert_eq!(back, days);

        let mut first = Vec::new();
        write_summary_to(&mut first, &plan, &aggregate(&days), origin()).unwrap();
        let mut rebuilt = Vec::new();
        write_summary_to(&mut rebuilt, &plan, &aggregate(&back), origin()).unwrap();
        assert_eq!(first, rebuilt);
    }

    #[test]
    fn detail_header_mismatch_is_rejected() {
        let plan = SessionPlan::default();
        let err = parse_detail("date,x\n".as_bytes(), &plan, origin()).unwrap_err();
        assert!(matches!(err, ReportError::Header { .. }));
    }

    #[test]
    fn inconsistent_combination_is_rejected() {
        let plan = SessionPlan::default();
        let mut detail = Vec::new();
        write_detail_to(&mut detail, &plan, &sample()[..1], origin()).unwrap();
        let text = String::from_utf8(detail)
            .unwrap()
            .replace("Low_Down_Medium_Up_High_Up_H_Nl", "High_Up_Medium_Up_High_Up_H_Nl");
        let err = parse_detail(text.as_bytes(), &plan, origin()).unwrap_err();
        match err {
            ReportError::Row { row, .. } => assert_eq!(row, 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn result_file_names() {
        let from = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        let to = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();
        assert_eq!(daily_results_file(from, to), "daily_results_20250102_20250331.csv");
        assert_eq!(intraday_results_file(from, to), "intraday_results_20250102_20250331.csv");
    }

    #[cfg(feature = "feather")]
    #[test]
    fn feather_frame_mirrors_the_detail_table() {
        let plan = SessionPlan::default();
        let days = sample();
        let df = feather::detail_frame(&plan, &days).unwrap();
        assert_eq!(df.height(), days.len());
        assert_eq!(df.width(), detail_header(&plan).len());
        for name in detail_header(&plan) {
            assert!(df.column(&name).is_ok(), "missing column {name}");
        }

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("detail.feather");
        feather::write_detail_feather(&path, &plan, &days).unwrap();
        assert!(fs::metadata(&path).unwrap().len() > 0);
    }
}
