//! Session plan: the ordered, non-overlapping clock-time windows a trading
//! day is cut into.
//!
//! A bar belongs to a segment iff `start <= t < end`. The last segment of the
//! plan is the *closing segment*; the day-extreme flags are computed for it.

use std::collections::HashSet;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Problems with a configured session plan.
#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    #[error("session plan has no segments")]
    Empty,

    #[error("segment name {0:?} is empty or contains whitespace, ',', '=' or ':'")]
    BadName(String),

    #[error("segment name {0:?} is used more than once")]
    DuplicateName(String),

    #[error("segment {name} ends ({end}) at or before it starts ({start})")]
    Inverted {
        name: String,
        start: NaiveTime,
        end: NaiveTime,
    },

    #[error("segment {next} starts before {previous} ends")]
    Overlap { previous: String, next: String },
}

/// One named clock-time window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SegmentSpec {
    pub name: String,
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl SegmentSpec {
    pub fn new(name: impl Into<String>, start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            name: name.into(),
            start,
            end,
        }
    }

    /// Half-open membership test.
    pub fn contains(&self, t: NaiveTime) -> bool {
        self.start <= t && t < self.end
    }
}

/// A validated, ordered list of segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPlan {
    segments: Vec<SegmentSpec>,
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, ',' | '=' | ':'))
}

impl SessionPlan {
    pub fn new(segments: Vec<SegmentSpec>) -> Result<Self, PlanError> {
        if segments.is_empty() {
            return Err(PlanError::Empty);
        }
        let mut seen = HashSet::new();
        for seg in &segments {
            if !valid_name(&seg.name) {
                return Err(PlanError::BadName(seg.name.clone()));
            }
            if !seen.insert(seg.name.as_str()) {
                return Err(PlanError::DuplicateName(seg.name.clone()));
            }
            if seg.start >= seg.end {
                return Err(PlanError::Inverted {
                    name: seg.name.clone(),
                    start: seg.start,
                    end: seg.end,
                });
            }
        }
        for pair in segments.windows(2) {
            if pair[1].start < pair[0].end {
                return Err(PlanError::Overlap {
                    previous: pair[0].name.clone(),
                    next: pair[1].name.clone(),
                });
            }
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[SegmentSpec] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false for a validated plan; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(|s| s.name.as_str())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.segments.iter().position(|s| s.name == name)
    }

    /// Index of the closing segment.
    pub fn closing_index(&self) -> usize {
        self.segments.len() - 1
    }

    /// End of the closing segment.
    pub fn session_end(&self) -> NaiveTime {
        self.segments[self.closing_index()].end
    }

    /// Number of leading segments that have fully ended by `checkpoint`.
    pub fn elapsed_segments(&self, checkpoint: NaiveTime) -> usize {
        self.segments
            .iter()
            .take_while(|s| s.end <= checkpoint)
            .count()
    }

    /// Index of the segment a bar at `t` falls into, if any.
    pub fn segment_at(&self, t: NaiveTime) -> Option<usize> {
        self.segments.iter().position(|s| s.contains(t))
    }
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or_default()
}

/// Opening half hour, second half hour, rest of the regular session.
impl Default for SessionPlan {
    fn default() -> Self {
        Self {
            segments: vec![
                SegmentSpec::new("first_trade", hm(8, 45), hm(9, 15)),
                SegmentSpec::new("second_trade", hm(9, 15), hm(9, 45)),
                SegmentSpec::new("final_trade", hm(9, 45), hm(13, 45)),
            ],
        }
    }
}

/// Parses `HH:MM` or `HH:MM:SS`.
pub fn parse_clock(s: &str) -> Result<NaiveTime, chrono::ParseError> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M").or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
}

/// `HH:MM` serde representation for segment bounds.
pub mod hhmm {
    use chrono::{NaiveTime, Timelike};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        if t.second() == 0 {
            s.collect_str(&t.format("%H:%M"))
        } else {
            s.collect_str(&t.format("%H:%M:%S"))
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_clock(&raw).map_err(|e| D::Error::custom(format!("bad time {raw:?}: {e}")))
    }
}
