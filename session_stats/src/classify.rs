//! Segment labels: ratio class and direction.
//!
//! Classification is pure and total over finite inputs. Thresholds are
//! half-open on the upper side: with the defaults a ratio of exactly `0.4` is
//! `Medium` and exactly `0.8` is `High`.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A label string that is not one of the known variants.
#[derive(Debug, Error, PartialEq)]
#[error("unknown {kind} label: {value:?}")]
pub struct LabelParseError {
    pub kind: &'static str,
    pub value: String,
}

impl LabelParseError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// How consistently a segment traded on the trend side of the running average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RatioClass {
    Low,
    Medium,
    High,
}

impl RatioClass {
    pub const ALL: [Self; 3] = [Self::Low, Self::Medium, Self::High];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl fmt::Display for RatioClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RatioClass {
    type Err = LabelParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| LabelParseError::new("ratio class", s))
    }
}

/// Sign of a segment's close-to-close change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Flat,
}

impl Direction {
    pub const ALL: [Self; 3] = [Self::Up, Self::Down, Self::Flat];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Up => "Up",
            Self::Down => "Down",
            Self::Flat => "Flat",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = LabelParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| LabelParseError::new("direction", s))
    }
}

/// Class and direction of one segment, rendered `Low(Down)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentLabel {
    pub class: RatioClass,
    pub direction: Direction,
}

impl SegmentLabel {
    pub const fn new(class: RatioClass, direction: Direction) -> Self {
        Self { class, direction }
    }

    /// All nine labels, class-major.
    pub fn all() -> impl Iterator<Item = Self> {
        RatioClass::ALL
            .into_iter()
            .flat_map(|c| Direction::ALL.into_iter().map(move |d| Self::new(c, d)))
    }
}

impl fmt::Display for SegmentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.class, self.direction)
    }
}

impl FromStr for SegmentLabel {
    type Err = LabelParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || LabelParseError::new("segment", s);
        let inner = s.trim().strip_suffix(')').ok_or_else(bad)?;
        let (class, direction) = inner.split_once('(').ok_or_else(bad)?;
        Ok(Self::new(class.parse()?, direction.parse()?))
    }
}

/// Ratio cut points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Thresholds {
    /// Ratios below this are `Low`.
    pub medium: f64,
    /// Ratios at or above this are `High`.
    pub high: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            medium: 0.4,
            high: 0.8,
        }
    }
}

/// Thresholds outside `0 <= medium <= high <= 1`.
#[derive(Debug, Error, PartialEq)]
#[error("thresholds must satisfy 0 <= medium <= high <= 1 (got medium={medium}, high={high})")]
pub struct ThresholdError {
    pub medium: f64,
    pub high: f64,
}

impl Thresholds {
    pub fn validate(&self) -> Result<(), ThresholdError> {
        let ok = (0.0..=1.0).contains(&self.medium)
            && (0.0..=1.0).contains(&self.high)
            && self.medium <= self.high;
        if ok {
            Ok(())
        } else {
            Err(ThresholdError {
                medium: self.medium,
                high: self.high,
            })
        }
    }

    /// `None` only for NaN.
    pub fn classify_ratio(&self, ratio: f64) -> Option<RatioClass> {
        if ratio.is_nan() {
            None
        } else if ratio < self.medium {
            Some(RatioClass::Low)
        } else if ratio < self.high {
            Some(RatioClass::Medium)
        } else {
            Some(RatioClass::High)
        }
    }
}

/// Direction of `end - start`.
pub fn classify_delta(start: f64, end: f64) -> Direction {
    let delta = end - start;
    if delta > 0.0 {
        Direction::Up
    } else if delta < 0.0 {
        Direction::Down
    } else {
        Direction::Flat
    }
}
