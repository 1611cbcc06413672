//! Canonical in-memory representation of a one-minute bar (OHLCV).
//!
//! Timestamps are exchange-local wall-clock times. Session segments are
//! defined in the same clock, so no time zone conversion happens anywhere in
//! the pipeline.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// A single one-minute bar.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    /// Bar timestamp (exchange-local).
    pub timestamp: NaiveDateTime,

    /// Opening price.
    pub open: f64,

    /// Highest price during the minute.
    pub high: f64,

    /// Lowest price during the minute.
    pub low: f64,

    /// Closing price.
    pub close: f64,

    /// Contracts traded during the minute.
    pub volume: f64,

    /// Running volume-weighted average price since the session open
    /// (the `Average` column). Produced by [`crate::vwap`] or by the vendor.
    pub vwap: Option<f64>,

    /// Order-flow strength indicator (`strength` column), when exported.
    pub strength: Option<f64>,

    /// Large-order flow indicator (`largeorder` column), when exported.
    pub large_order: Option<f64>,
}

impl Bar {
    /// Creates a bar with only the OHLCV fields populated.
    pub fn new(
        timestamp: NaiveDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            vwap: None,
            strength: None,
            large_order: None,
        }
    }

    /// Trading date of the bar.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// Wall-clock time of the bar.
    pub fn time(&self) -> NaiveTime {
        self.timestamp.time()
    }

    /// Absolute candle body size.
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors() {
        let ts = NaiveDate::from_ymd_opt(2025, 3, 4)
            .unwrap()
            .and_hms_opt(8, 46, 0)
            .unwrap();
        let bar = Bar::new(ts, 100.0, 110.0, 95.0, 97.0, 12.0);
        assert_eq!(bar.date(), NaiveDate::from_ymd_opt(2025, 3, 4).unwrap());
        assert_eq!(bar.time(), NaiveTime::from_hms_opt(8, 46, 0).unwrap());
        assert_eq!(bar.body(), 3.0);
        assert!(bar.vwap.is_none());
    }
}
