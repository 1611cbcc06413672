//! Per-day measurements: whole-day OHLCV plus one [`SegmentFeatures`] per
//! segment of the session plan.

use bar_archive::models::day_series::SeriesError;
use bar_archive::{Bar, DaySeries, PriorDay};
use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::segment::SessionPlan;

/// Why a day could not be measured. No partial record is produced.
#[derive(Debug, Error, PartialEq)]
pub enum ExtractError {
    #[error("invalid day series: {0}")]
    InvalidSeries(#[from] SeriesError),

    /// No bar of the segment starting at `timestamp` carries a value.
    #[error("no bar of the segment starting at {timestamp} has an {column} value")]
    MissingColumn {
        column: &'static str,
        timestamp: NaiveDateTime,
    },
}

/// Measurements of one segment on one day.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentFeatures {
    /// Close of the first bar in the window.
    pub start_close: f64,
    /// Close of the last bar in the window.
    pub end_close: f64,
    pub high: f64,
    pub low: f64,
    /// Share of bars that closed on the trend side of the running average,
    /// in `[0, 1]`.
    pub ratio: f64,
    pub bars: usize,
    pub volume: f64,
    /// Sample standard deviation of closes; `None` below two bars.
    pub close_std: Option<f64>,
    /// First open of the window minus the prior day's mid point.
    pub open_offset: Option<f64>,
}

impl SegmentFeatures {
    pub fn delta(&self) -> f64 {
        self.end_close - self.start_close
    }

    /// Rising iff the window closed at or above where it started.
    pub fn is_rising(&self) -> bool {
        self.end_close >= self.start_close
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// Everything measured for one trading day.
#[derive(Debug, Clone, PartialEq)]
pub struct DayRecord {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// One entry per plan segment; `None` when the window had no bars.
    pub segments: Vec<Option<SegmentFeatures>>,
    /// `None` when the closing segment had no bars.
    pub closing_high_is_day_high: Option<bool>,
    pub closing_low_is_day_low: Option<bool>,
}

impl DayRecord {
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn daily_change(&self) -> f64 {
        self.close - self.open
    }
}

/// Measures day series against a fixed plan.
#[derive(Debug, Clone)]
pub struct FeatureExtractor<'a> {
    plan: &'a SessionPlan,
    extreme_tolerance: f64,
}

impl<'a> FeatureExtractor<'a> {
    pub fn new(plan: &'a SessionPlan) -> Self {
        Self {
            plan,
            extreme_tolerance: 0.0,
        }
    }

    /// How far another segment's extreme may exceed the closing segment's
    /// before the closing flag turns false.
    pub fn with_extreme_tolerance(mut self, tolerance: f64) -> Self {
        self.extreme_tolerance = tolerance;
        self
    }

    pub fn plan(&self) -> &SessionPlan {
        self.plan
    }

    /// Measures one day. `reference` is the prior trading day, used for the
    /// per-segment open offset.
    pub fn extract(
        &self,
        series: &DaySeries,
        reference: Option<&PriorDay>,
    ) -> Result<DayRecord, ExtractError> {
        series.validate()?;

        let mut windows: Vec<Vec<&Bar>> = vec![Vec::new(); self.plan.len()];
        for bar in &series.bars {
            if let Some(i) = self.plan.segment_at(bar.time()) {
                windows[i].push(bar);
            }
        }

        let segments = windows
            .iter()
            .map(|w| measure(w, reference))
            .collect::<Result<Vec<_>, _>>()?;

        let (closing_high_is_day_high, closing_low_is_day_low) = self.closing_flags(&segments);

        // validate() guarantees at least one bar
        let first = &series.bars[0];
        let last = &series.bars[series.bars.len() - 1];
        Ok(DayRecord {
            date: series.date,
            open: first.open,
            high: series.high().unwrap_or(first.high),
            low: series.low().unwrap_or(first.low),
            close: last.close,
            volume: series.volume(),
            segments,
            closing_high_is_day_high,
            closing_low_is_day_low,
        })
    }

    fn closing_flags(&self, segments: &[Option<SegmentFeatures>]) -> (Option<bool>, Option<bool>) {
        let closing = self.plan.closing_index();
        let Some(last) = &segments[closing] else {
            return (None, None);
        };
        let others = segments[..closing].iter().flatten();
        let other_high = others.clone().map(|s| s.high).fold(f64::NEG_INFINITY, f64::max);
        let other_low = others.map(|s| s.low).fold(f64::INFINITY, f64::min);
        (
            Some(last.high + self.extreme_tolerance >= other_high),
            Some(last.low - self.extreme_tolerance <= other_low),
        )
    }
}

fn measure(
    window: &[&Bar],
    reference: Option<&PriorDay>,
) -> Result<Option<SegmentFeatures>, ExtractError> {
    let (Some(first), Some(last)) = (window.first(), window.last()) else {
        return Ok(None);
    };
    let rising = last.close >= first.close;

    // bars without an average (no volume traded yet) count as off the trend side
    let mut on_trend_side = 0usize;
    let mut with_average = 0usize;
    let mut high = f64::NEG_INFINITY;
    let mut low = f64::INFINITY;
    let mut volume = 0.0;
    for bar in window {
        if let Some(avg) = bar.vwap {
            with_average += 1;
            let hit = if rising {
                bar.close >= avg
            } else {
                bar.close <= avg
            };
            if hit {
                on_trend_side += 1;
            }
        }
        high = high.max(bar.high);
        low = low.min(bar.low);
        volume += bar.volume;
    }
    if with_average == 0 {
        return Err(ExtractError::MissingColumn {
            column: "Average",
            timestamp: first.timestamp,
        });
    }

    Ok(Some(SegmentFeatures {
        start_close: first.close,
        end_close: last.close,
        high,
        low,
        ratio: on_trend_side as f64 / window.len() as f64,
        bars: window.len(),
        volume,
        close_std: sample_std(window.iter().map(|b| b.close)),
        open_offset: reference.map(|r| first.open - r.mid()),
    }))
}

/// Sample (n - 1) standard deviation.
pub(crate) fn sample_std(values: impl Iterator<Item = f64> + Clone) -> Option<f64> {
    let n = values.clone().count();
    if n < 2 {
        return None;
    }
    let mean = values.clone().sum::<f64>() / n as f64;
    let ss: f64 = values.map(|v| (v - mean).powi(2)).sum();
    Some((ss / (n - 1) as f64).sqrt())
}
