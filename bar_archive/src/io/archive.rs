//! Directory-level access to the per-day archive.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Days, NaiveDate};
use tracing::{debug, info, warn};

use crate::errors::Error;
use crate::io::layout::FileLayout;
use crate::io::{reader, writer};
use crate::models::day_series::DaySeries;
use crate::vwap::with_running_vwap;

/// High and low of the most recent earlier trading day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorDay {
    pub date: NaiveDate,
    pub high: f64,
    pub low: f64,
}

impl PriorDay {
    /// Mid point between the prior high and low, used as a reference level.
    pub fn mid(&self) -> f64 {
        (self.high + self.low) / 2.0
    }
}

/// Outcome of [`DayArchive::ensure_vwap`].
#[derive(Debug, Default)]
pub struct VwapReport {
    /// Files rewritten with a new `Average` column.
    pub updated: Vec<NaiveDate>,
    /// Files that already carried the column.
    pub already_present: Vec<NaiveDate>,
    /// Dates with no file.
    pub missing: Vec<NaiveDate>,
    /// Files that could not be read or written.
    pub failed: Vec<(NaiveDate, String)>,
}

/// A directory of per-day bar files sharing one [`FileLayout`].
#[derive(Debug, Clone)]
pub struct DayArchive {
    root: PathBuf,
    layout: FileLayout,
}

impl DayArchive {
    pub fn new(root: impl Into<PathBuf>, layout: FileLayout) -> Self {
        Self {
            root: root.into(),
            layout,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn layout(&self) -> &FileLayout {
        &self.layout
    }

    /// Path of the file for `date` (whether or not it exists).
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.root.join(self.layout.file_name(date))
    }

    pub fn exists(&self, date: NaiveDate) -> bool {
        self.path_for(date).is_file()
    }

    /// Loads and validates one day.
    pub fn load_day(&self, date: NaiveDate) -> Result<DaySeries, Error> {
        let path = self.path_for(date);
        let bars = reader::read_bars(&path)?;
        let series = DaySeries::new(date, bars);
        series.validate()?;
        Ok(series)
    }

    /// Loads every existing day in `from..=to`.
    ///
    /// Dates without a file are skipped silently (weekends, holidays). Files
    /// that fail to load are returned as errors so the caller decides whether
    /// to skip them; one bad day never hides the others.
    pub fn load_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Vec<(NaiveDate, Result<DaySeries, Error>)> {
        let mut out = Vec::new();
        for date in from.iter_days().take_while(|d| *d <= to) {
            if !self.exists(date) {
                debug!(%date, "no day file");
                continue;
            }
            let loaded = self.load_day(date);
            match &loaded {
                Ok(series) => debug!(%date, bars = series.len(), "loaded day file"),
                Err(e) => warn!(%date, error = %e, "failed to load day file"),
            }
            out.push((date, loaded));
        }
        info!(
            %from,
            %to,
            files = out.len(),
            "archive range scanned"
        );
        out
    }

    /// All dates with a file in the archive directory, ascending.
    pub fn list_dates(&self) -> Result<Vec<NaiveDate>, Error> {
        let mut dates = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if let Some(date) = self.layout.parse_path(&entry.path()) {
                dates.push(date);
            }
        }
        dates.sort_unstable();
        Ok(dates)
    }

    /// Finds the closest earlier day with a file, looking back at most
    /// `max_days_back` calendar days.
    pub fn previous_day(
        &self,
        date: NaiveDate,
        max_days_back: u32,
    ) -> Result<Option<PriorDay>, Error> {
        for back in 1..=u64::from(max_days_back) {
            let Some(candidate) = date.checked_sub_days(Days::new(back)) else {
                break;
            };
            if !self.exists(candidate) {
                continue;
            }
            let series = self.load_day(candidate)?;
            if let (Some(high), Some(low)) = (series.high(), series.low()) {
                return Ok(Some(PriorDay {
                    date: candidate,
                    high,
                    low,
                }));
            }
        }
        Ok(None)
    }

    /// Adds the running `Average` column to every file in `from..=to` that
    /// lacks it. Files that already carry it are left untouched.
    pub fn ensure_vwap(&self, from: NaiveDate, to: NaiveDate) -> VwapReport {
        let mut report = VwapReport::default();
        for date in from.iter_days().take_while(|d| *d <= to) {
            let path = self.path_for(date);
            if !path.is_file() {
                report.missing.push(date);
                continue;
            }
            match self.rewrite_with_vwap(&path, date) {
                Ok(true) => {
                    info!(%date, "added running average");
                    report.updated.push(date);
                }
                Ok(false) => {
                    debug!(%date, "running average already present");
                    report.already_present.push(date);
                }
                Err(e) => {
                    warn!(%date, error = %e, "could not add running average");
                    report.failed.push((date, e.to_string()));
                }
            }
        }
        report
    }

    fn rewrite_with_vwap(&self, path: &Path, date: NaiveDate) -> Result<bool, Error> {
        if reader::has_average_column(path)? {
            return Ok(false);
        }
        let mut series = DaySeries::new(date, reader::read_bars(path)?);
        series.validate()?;
        with_running_vwap(&mut series.bars);
        writer::write_bars(path, &series.bars)?;
        Ok(true)
    }
}
