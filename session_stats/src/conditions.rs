//! Condition scans over day series.
//!
//! Both condition families are closed enums, deserialized from the config
//! with an internal `kind` tag:
//!
//! ```toml
//! [[daily_conditions]]
//! kind = "high_volatility"
//! min_range = 200.0
//!
//! [[bar_conditions]]
//! kind = "volume_spike"
//! window = 5
//! multiplier = 2.5
//! ```
//!
//! An unknown `kind` fails when the config is loaded.

use bar_archive::{Bar, DaySeries};
use serde::{Deserialize, Serialize};

/// A predicate over a whole trading day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DailyCondition {
    /// Day range (`high - low`) at least `min_range` points.
    HighVolatility { min_range: f64 },
    /// `|close - open| / range` at least `min_body_ratio`.
    StrongTrend { min_body_ratio: f64 },
    /// Down day that gave back at least `min_body_ratio` of the rally above
    /// the open, or up day that recovered that share of the drop below it.
    Reversal { min_body_ratio: f64 },
    /// Day volume at least `multiplier` times the mean of the previous
    /// `lookback` days.
    HighVolume { lookback: usize, multiplier: f64 },
}

impl DailyCondition {
    pub fn name(&self) -> &'static str {
        match self {
            Self::HighVolatility { .. } => "high_volatility",
            Self::StrongTrend { .. } => "strong_trend",
            Self::Reversal { .. } => "reversal",
            Self::HighVolume { .. } => "high_volume",
        }
    }

    /// `history` holds the total volumes of the earlier days, oldest first.
    /// Multi-day conditions never match without enough of it.
    pub fn check(&self, series: &DaySeries, history: &[f64]) -> bool {
        let (Some(open), Some(high), Some(low), Some(close)) =
            (series.open(), series.high(), series.low(), series.close())
        else {
            return false;
        };
        let range = high - low;
        match *self {
            Self::HighVolatility { min_range } => range >= min_range,
            Self::StrongTrend { min_body_ratio } => {
                range > 0.0 && (close - open).abs() / range >= min_body_ratio
            }
            Self::Reversal { min_body_ratio } => {
                let (body, swing) = if close < open {
                    (open - close, high - open)
                } else if close > open {
                    (close - open, open - low)
                } else {
                    return false;
                };
                swing > 0.0 && body / swing >= min_body_ratio
            }
            Self::HighVolume {
                lookback,
                multiplier,
            } => {
                if lookback == 0 || history.len() < lookback {
                    return false;
                }
                let prev = &history[history.len() - lookback..];
                let mean = prev.iter().sum::<f64>() / lookback as f64;
                series.volume() >= mean * multiplier
            }
        }
    }
}

/// A predicate over one bar, given the bars before it on the same day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BarCondition {
    /// Up bar with a body of at least `min_body` points.
    LongRedCandle { min_body: f64 },
    /// Volume at least `multiplier` times the mean of the previous `window` bars.
    VolumeSpike { window: usize, multiplier: f64 },
    /// High above the highest high of the previous `lookback` bars.
    Breakout { lookback: usize },
}

impl BarCondition {
    pub fn name(&self) -> &'static str {
        match self {
            Self::LongRedCandle { .. } => "long_red_candle",
            Self::VolumeSpike { .. } => "volume_spike",
            Self::Breakout { .. } => "breakout",
        }
    }

    /// Evaluates the condition for `bars[index]`. Out-of-range indices and
    /// bars without enough history never match.
    pub fn check(&self, bars: &[Bar], index: usize) -> bool {
        let Some(bar) = bars.get(index) else {
            return false;
        };
        match *self {
            Self::LongRedCandle { min_body } => bar.close > bar.open && bar.body() >= min_body,
            Self::VolumeSpike { window, multiplier } => {
                if window == 0 || index < window {
                    return false;
                }
                let prev = &bars[index - window..index];
                let mean = prev.iter().map(|b| b.volume).sum::<f64>() / window as f64;
                bar.volume >= mean * multiplier
            }
            Self::Breakout { lookback } => {
                if lookback == 0 || index < lookback {
                    return false;
                }
                let prev_high = bars[index - lookback..index]
                    .iter()
                    .map(|b| b.high)
                    .fold(f64::NEG_INFINITY, f64::max);
                bar.high > prev_high
            }
        }
    }
}

/// Default scan parameters.
pub fn default_daily_conditions() -> Vec<DailyCondition> {
    vec![
        DailyCondition::HighVolatility { min_range: 200.0 },
        DailyCondition::StrongTrend {
            min_body_ratio: 0.6,
        },
        DailyCondition::Reversal {
            min_body_ratio: 0.5,
        },
        DailyCondition::HighVolume {
            lookback: 5,
            multiplier: 1.5,
        },
    ]
}

pub fn default_bar_conditions() -> Vec<BarCondition> {
    vec![
        BarCondition::LongRedCandle { min_body: 15.0 },
        BarCondition::VolumeSpike {
            window: 5,
            multiplier: 2.5,
        },
        BarCondition::Breakout { lookback: 30 },
    ]
}

/// A bar that matched at least one bar condition.
#[derive(Debug, Clone, PartialEq)]
pub struct IntradayHit {
    pub bar: Bar,
    pub conditions: Vec<&'static str>,
}

/// Names of the daily conditions `series` satisfies, in config order.
/// `history` is as for [`DailyCondition::check`].
pub fn scan_daily(
    series: &DaySeries,
    history: &[f64],
    conditions: &[DailyCondition],
) -> Vec<&'static str> {
    conditions
        .iter()
        .filter(|c| c.check(series, history))
        .map(DailyCondition::name)
        .collect()
}

/// Every bar of `series` that satisfies at least one bar condition.
pub fn scan_intraday(series: &DaySeries, conditions: &[BarCondition]) -> Vec<IntradayHit> {
    if conditions.is_empty() {
        return Vec::new();
    }
    (0..series.bars.len())
        .filter_map(|i| {
            let matched: Vec<&'static str> = conditions
                .iter()
                .filter(|c| c.check(&series.bars, i))
                .map(BarCondition::name)
                .collect();
            (!matched.is_empty()).then(|| IntradayHit {
                bar: series.bars[i].clone(),
                conditions: matched,
            })
        })
        .collect()
}
