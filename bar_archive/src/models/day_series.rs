//! All minute bars of one trading day.

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::models::bar::Bar;

/// Structural problems with a day's bar series.
#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    /// The day has no bars at all.
    #[error("no bars for {date}")]
    Empty { date: NaiveDate },

    /// Timestamps must be strictly increasing.
    #[error("timestamp {current} does not follow {previous}")]
    OutOfOrder {
        previous: NaiveDateTime,
        current: NaiveDateTime,
    },

    /// A bar is stamped with another calendar date.
    #[error("bar at {timestamp} does not belong to {date}")]
    ForeignDate {
        date: NaiveDate,
        timestamp: NaiveDateTime,
    },
}

/// Groups the bars of a single trading day with the date they belong to.
///
/// Whole-day aggregates are derived on demand; callers are expected to run
/// [`DaySeries::validate`] (the archive loader does) before relying on them.
#[derive(Debug, Clone, PartialEq)]
pub struct DaySeries {
    /// Trading date.
    pub date: NaiveDate,
    /// Bars in time order.
    pub bars: Vec<Bar>,
}

impl DaySeries {
    pub fn new(date: NaiveDate, bars: Vec<Bar>) -> Self {
        Self { date, bars }
    }

    /// Checks the series is non-empty, on one date, and strictly increasing.
    pub fn validate(&self) -> Result<(), SeriesError> {
        if self.bars.is_empty() {
            return Err(SeriesError::Empty { date: self.date });
        }
        let mut previous: Option<NaiveDateTime> = None;
        for bar in &self.bars {
            if bar.date() != self.date {
                return Err(SeriesError::ForeignDate {
                    date: self.date,
                    timestamp: bar.timestamp,
                });
            }
            if let Some(prev) = previous {
                if bar.timestamp <= prev {
                    return Err(SeriesError::OutOfOrder {
                        previous: prev,
                        current: bar.timestamp,
                    });
                }
            }
            previous = Some(bar.timestamp);
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// First open of the day.
    pub fn open(&self) -> Option<f64> {
        self.bars.first().map(|b| b.open)
    }

    /// Last close of the day.
    pub fn close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }

    /// Highest high of the day.
    pub fn high(&self) -> Option<f64> {
        self.bars.iter().map(|b| b.high).reduce(f64::max)
    }

    /// Lowest low of the day.
    pub fn low(&self) -> Option<f64> {
        self.bars.iter().map(|b| b.low).reduce(f64::min)
    }

    /// Total volume of the day.
    pub fn volume(&self) -> f64 {
        self.bars.iter().map(|b| b.volume).sum()
    }

    /// High minus low.
    pub fn range(&self) -> Option<f64> {
        Some(self.high()? - self.low()?)
    }

    /// True when any bar carries a running average. Opening minutes with no
    /// volume traded yet have none.
    pub fn has_vwap(&self) -> bool {
        self.bars.iter().any(|b| b.vwap.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(h: u32, m: u32, o: f64, hi: f64, lo: f64, c: f64, v: f64) -> Bar {
        let ts = NaiveDate::from_ymd_opt(2025, 1, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap();
        Bar::new(ts, o, hi, lo, c, v)
    }

    fn day() -> DaySeries {
        DaySeries::new(
            NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
            vec![
                bar(8, 45, 100.0, 104.0, 99.0, 103.0, 10.0),
                bar(8, 46, 103.0, 108.0, 101.0, 107.0, 5.0),
                bar(8, 47, 107.0, 107.0, 96.0, 98.0, 7.0),
            ],
        )
    }

    #[test]
    fn whole_day_aggregates() {
        let d = day();
        d.validate().unwrap();
        assert_eq!(d.open(), Some(100.0));
        assert_eq!(d.close(), Some(98.0));
        assert_eq!(d.high(), Some(108.0));
        assert_eq!(d.low(), Some(96.0));
        assert_eq!(d.volume(), 22.0);
        assert_eq!(d.range(), Some(12.0));
        assert!(!d.has_vwap());
    }

    #[test]
    fn empty_series_is_invalid() {
        let d = DaySeries::new(NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(), vec![]);
        assert!(matches!(d.validate(), Err(SeriesError::Empty { .. })));
        assert_eq!(d.range(), None);
    }

    #[test]
    fn out_of_order_is_invalid() {
        let mut d = day();
        d.bars.swap(0, 1);
        assert!(matches!(d.validate(), Err(SeriesError::OutOfOrder { .. })));
    }

    #[test]
    fn duplicate_timestamp_is_invalid() {
        let mut d = day();
        let dup = d.bars[0].clone();
        d.bars.insert(1, dup);
        assert!(matches!(d.validate(), Err(SeriesError::OutOfOrder { .. })));
    }

    #[test]
    fn foreign_date_is_invalid() {
        let mut d = day();
        d.date = NaiveDate::from_ymd_opt(2025, 1, 3).unwrap();
        assert!(matches!(d.validate(), Err(SeriesError::ForeignDate { .. })));
    }
}
