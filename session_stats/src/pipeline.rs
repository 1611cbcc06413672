//! Batch scan over a date range of the archive.
//!
//! Load, measure, classify and aggregate every day in the range, and
//! evaluate the configured condition scans along the way. A day that fails
//! at any stage is recorded in [`ScanOutcome::skipped`] and the batch
//! continues.

use std::fmt;
use std::path::{Path, PathBuf};

use bar_archive::{DayArchive, PriorDay};
use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::combination::{ClassifiedDay, CombinationTable, aggregate, classify_day};
use crate::conditions::{IntradayHit, scan_daily, scan_intraday};
use crate::config::AnalysisConfig;
use crate::features::{DayRecord, FeatureExtractor};
use crate::report::{self, DETAIL_FILE, ReportError, SUMMARY_FILE};
use crate::segment::SessionPlan;

/// A measured day and the daily conditions it satisfied.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyResult {
    pub record: DayRecord,
    pub conditions: Vec<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipStage {
    Load,
    Extract,
    Classify,
}

impl fmt::Display for SkipStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Load => "load",
            Self::Extract => "extract",
            Self::Classify => "classify",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedDay {
    pub date: NaiveDate,
    pub stage: SkipStage,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScanOutcome {
    pub daily: Vec<DailyResult>,
    pub classified: Vec<ClassifiedDay>,
    pub table: CombinationTable,
    pub intraday: Vec<IntradayHit>,
    pub skipped: Vec<SkippedDay>,
}

impl ScanOutcome {
    fn skip(&mut self, date: NaiveDate, stage: SkipStage, reason: impl ToString) {
        let reason = reason.to_string();
        warn!(%date, %stage, %reason, "day skipped");
        self.skipped.push(SkippedDay {
            date,
            stage,
            reason,
        });
    }
}

/// Runs the full analysis over `from..=to`.
pub fn scan(
    archive: &DayArchive,
    plan: &SessionPlan,
    config: &AnalysisConfig,
    from: NaiveDate,
    to: NaiveDate,
) -> ScanOutcome {
    let extractor = FeatureExtractor::new(plan).with_extreme_tolerance(config.extreme_tolerance);
    let max_back = config.similarity.max_days_back;
    let mut out = ScanOutcome::default();
    // total volume of every loaded day so far, for multi-day conditions
    let mut volumes: Vec<f64> = Vec::new();

    // prior-day reference, carried forward between consecutive loaded days
    let mut prior: Option<PriorDay> = match archive.previous_day(from, max_back) {
        Ok(p) => p,
        Err(e) => {
            debug!(%from, error = %e, "no usable day before the range");
            None
        }
    };

    for (date, loaded) in archive.load_range(from, to) {
        let series = match loaded {
            Ok(s) => s,
            Err(e) => {
                out.skip(date, SkipStage::Load, e);
                continue;
            }
        };

        let reference = prior.filter(|p| (date - p.date).num_days() <= i64::from(max_back));
        if let (Some(high), Some(low)) = (series.high(), series.low()) {
            prior = Some(PriorDay { date, high, low });
        }

        out.intraday.extend(scan_intraday(&series, &config.bar_conditions));

        let record = match extractor.extract(&series, reference.as_ref()) {
            Ok(r) => r,
            Err(e) => {
                out.skip(date, SkipStage::Extract, e);
                continue;
            }
        };
        out.daily.push(DailyResult {
            record: record.clone(),
            conditions: scan_daily(&series, &volumes, &config.daily_conditions),
        });
        volumes.push(series.volume());

        match classify_day(&record, plan, &config.thresholds) {
            Ok(day) => out.classified.push(day),
            Err(e) => out.skip(date, SkipStage::Classify, e),
        }
    }

    out.table = aggregate(&out.classified);
    info!(
        %from,
        %to,
        measured = out.daily.len(),
        classified = out.classified.len(),
        skipped = out.skipped.len(),
        combinations = out.table.rows.len(),
        intraday_hits = out.intraday.len(),
        "scan finished"
    );
    out
}

/// Paths of the files written by [`write_reports`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReportPaths {
    pub summary: PathBuf,
    pub detail: PathBuf,
    pub daily: PathBuf,
    pub intraday: PathBuf,
}

/// Writes the four report tables for a scan of `from..=to` under `dir`.
pub fn write_reports(
    dir: &Path,
    plan: &SessionPlan,
    outcome: &ScanOutcome,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<ReportPaths, ReportError> {
    let paths = ReportPaths {
        summary: dir.join(SUMMARY_FILE),
        detail: dir.join(DETAIL_FILE),
        daily: dir.join(report::daily_results_file(from, to)),
        intraday: dir.join(report::intraday_results_file(from, to)),
    };
    report::write_summary(&paths.summary, plan, &outcome.table)?;
    report::write_detail(&paths.detail, plan, &outcome.classified)?;
    report::write_daily_results(&paths.daily, plan, &outcome.daily)?;
    report::write_intraday_hits(&paths.intraday, &outcome.intraday)?;
    Ok(paths)
}
