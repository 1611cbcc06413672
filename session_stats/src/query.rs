//! Conditional probability queries over the classified history.
//!
//! A [`Query`] constrains some segments (class, direction, or both) and
//! optionally the closing-extreme flags. [`QueryBook::run`] filters the
//! loaded history and reports, for every segment the query leaves open, the
//! distribution of outcomes among the matching days.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;
use tracing::{debug, info};

use crate::classify::{Direction, LabelParseError, RatioClass, SegmentLabel};
use crate::combination::ClassifiedDay;
use crate::report::{self, ReportError};
use crate::segment::SessionPlan;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query has {got} segment filters but the session plan has {expected} segments")]
    SegmentCount { expected: usize, got: usize },

    #[error("segment {segment} has not finished by {checkpoint}")]
    NotYetElapsed {
        segment: String,
        checkpoint: NaiveTime,
    },

    #[error("closing flags are only known after {session_end} (checkpoint {checkpoint})")]
    FlagsBeforeClose {
        session_end: NaiveTime,
        checkpoint: NaiveTime,
    },

    #[error("unknown segment {0:?}")]
    UnknownSegment(String),

    #[error(transparent)]
    Load(#[from] ReportError),
}

/// Constraint on one segment; `None` parts are wildcards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SegmentFilter {
    pub class: Option<RatioClass>,
    pub direction: Option<Direction>,
}

impl SegmentFilter {
    pub const ANY: Self = Self {
        class: None,
        direction: None,
    };

    pub fn exact(label: SegmentLabel) -> Self {
        Self {
            class: Some(label.class),
            direction: Some(label.direction),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.class.is_none() && self.direction.is_none()
    }

    pub fn is_full(&self) -> bool {
        self.class.is_some() && self.direction.is_some()
    }

    pub fn matches(&self, label: &SegmentLabel) -> bool {
        self.class.is_none_or(|c| c == label.class)
            && self.direction.is_none_or(|d| d == label.direction)
    }
}

/// `Class:Direction`, where either side may be empty or `*`
/// (`Low:Down`, `Low`, `:Down`, `*:Up`, `*`).
impl FromStr for SegmentFilter {
    type Err = LabelParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        fn part(p: &str) -> Option<&str> {
            let p = p.trim();
            (!p.is_empty() && p != "*").then_some(p)
        }
        let (class, direction) = s.split_once(':').unwrap_or((s, ""));
        Ok(Self {
            class: part(class).map(str::parse::<RatioClass>).transpose()?,
            direction: part(direction).map(str::parse::<Direction>).transpose()?,
        })
    }
}

/// One filter per plan segment plus optional closing flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub segments: Vec<SegmentFilter>,
    pub closing_high: Option<bool>,
    pub closing_low: Option<bool>,
}

impl Query {
    /// Matches every day of a plan with `segments` segments.
    pub fn any(segments: usize) -> Self {
        Self {
            segments: vec![SegmentFilter::ANY; segments],
            closing_high: None,
            closing_low: None,
        }
    }

    pub fn with_segment(mut self, index: usize, filter: SegmentFilter) -> Self {
        if let Some(slot) = self.segments.get_mut(index) {
            *slot = filter;
        }
        self
    }

    /// Sets the filter of the segment called `name`.
    pub fn set_named(
        &mut self,
        plan: &SessionPlan,
        name: &str,
        filter: SegmentFilter,
    ) -> Result<(), QueryError> {
        let index = plan
            .index_of(name)
            .ok_or_else(|| QueryError::UnknownSegment(name.to_string()))?;
        match self.segments.get_mut(index) {
            Some(slot) => {
                *slot = filter;
                Ok(())
            }
            None => Err(QueryError::SegmentCount {
                expected: plan.len(),
                got: self.segments.len(),
            }),
        }
    }

    pub fn matches(&self, day: &ClassifiedDay) -> bool {
        self.segments
            .iter()
            .zip(&day.segments)
            .all(|(f, s)| f.matches(&s.label))
            && self.closing_high.is_none_or(|h| h == day.closing_high)
            && self.closing_low.is_none_or(|l| l == day.closing_low)
    }

    /// Rejects filters on segments that are still open at `checkpoint`.
    pub fn check_elapsed(&self, plan: &SessionPlan, checkpoint: NaiveTime) -> Result<(), QueryError> {
        let elapsed = plan.elapsed_segments(checkpoint);
        if let Some((spec, _)) = plan
            .segments()
            .iter()
            .zip(&self.segments)
            .skip(elapsed)
            .find(|(_, f)| !f.is_wildcard())
        {
            return Err(QueryError::NotYetElapsed {
                segment: spec.name.clone(),
                checkpoint,
            });
        }
        if (self.closing_high.is_some() || self.closing_low.is_some()) && elapsed < plan.len() {
            return Err(QueryError::FlagsBeforeClose {
                session_end: plan.session_end(),
                checkpoint,
            });
        }
        Ok(())
    }
}

/// Count and share of one outcome among the matched days.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelCount<L> {
    pub label: L,
    pub count: usize,
    pub probability: f64,
}

/// Outcome distribution of one segment among the matched days.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentDistribution {
    pub segment: String,
    pub index: usize,
    /// All three classes in canonical order.
    pub classes: Vec<LabelCount<RatioClass>>,
    /// All three directions in canonical order.
    pub directions: Vec<LabelCount<Direction>>,
    /// All nine labels, most probable first.
    pub labels: Vec<LabelCount<SegmentLabel>>,
}

impl SegmentDistribution {
    pub fn class_probability(&self, class: RatioClass) -> f64 {
        self.classes
            .iter()
            .find(|c| c.label == class)
            .map_or(0.0, |c| c.probability)
    }

    pub fn direction_probability(&self, direction: Direction) -> f64 {
        self.directions
            .iter()
            .find(|d| d.label == direction)
            .map_or(0.0, |d| d.probability)
    }

    pub fn label_probability(&self, label: SegmentLabel) -> f64 {
        self.labels
            .iter()
            .find(|l| l.label == label)
            .map_or(0.0, |l| l.probability)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryReport {
    pub matched_days: usize,
    pub total_days: usize,
    /// `matched_days / total_days`.
    pub match_rate: f64,
    pub dates: Vec<NaiveDate>,
    /// One entry per segment that the query does not fully pin down.
    pub distributions: Vec<SegmentDistribution>,
    pub closing_high_probability: f64,
    pub closing_low_probability: f64,
}

impl QueryReport {
    pub fn distribution(&self, segment: &str) -> Option<&SegmentDistribution> {
        self.distributions.iter().find(|d| d.segment == segment)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// No historical day satisfies the filter; nothing to divide by.
    NoMatchingHistory { total_days: usize },
    Matched(QueryReport),
}

/// The loaded history a session of queries runs against.
#[derive(Debug, Clone)]
pub struct QueryBook {
    plan: SessionPlan,
    days: Vec<ClassifiedDay>,
    source: Option<PathBuf>,
}

impl QueryBook {
    /// An empty book; every query reports no matching history until loaded.
    pub fn new(plan: SessionPlan) -> Self {
        Self {
            plan,
            days: Vec::new(),
            source: None,
        }
    }

    pub fn from_days(plan: SessionPlan, days: Vec<ClassifiedDay>) -> Self {
        Self {
            plan,
            days,
            source: None,
        }
    }

    /// Replaces the history with the detail table at `path`.
    pub fn load(&mut self, path: &Path) -> Result<usize, QueryError> {
        let days = report::read_detail(path, &self.plan)?;
        info!(path = %path.display(), days = days.len(), "query history loaded");
        self.days = days;
        self.source = Some(path.to_path_buf());
        Ok(self.days.len())
    }

    pub fn clear(&mut self) {
        self.days.clear();
        self.source = None;
    }

    pub fn is_loaded(&self) -> bool {
        !self.days.is_empty()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn plan(&self) -> &SessionPlan {
        &self.plan
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn days(&self) -> &[ClassifiedDay] {
        &self.days
    }

    pub fn run(&self, query: &Query) -> Result<QueryOutcome, QueryError> {
        if query.segments.len() != self.plan.len() {
            return Err(QueryError::SegmentCount {
                expected: self.plan.len(),
                got: query.segments.len(),
            });
        }

        let matched: Vec<&ClassifiedDay> = self.days.iter().filter(|d| query.matches(d)).collect();
        let total_days = self.days.len();
        debug!(matched = matched.len(), total = total_days, "query filtered history");
        if matched.is_empty() {
            return Ok(QueryOutcome::NoMatchingHistory { total_days });
        }

        let n = matched.len();
        let share = |count: usize| count as f64 / n as f64;

        let distributions = self
            .plan
            .names()
            .enumerate()
            .filter(|(i, _)| !query.segments[*i].is_full())
            .map(|(i, name)| {
                let seen: Vec<SegmentLabel> = matched
                    .iter()
                    .filter_map(|d| d.segments.get(i))
                    .map(|s| s.label)
                    .collect();

                let classes = RatioClass::ALL
                    .into_iter()
                    .map(|class| {
                        let count = seen.iter().filter(|l| l.class == class).count();
                        LabelCount {
                            label: class,
                            count,
                            probability: share(count),
                        }
                    })
                    .collect();
                let directions = Direction::ALL
                    .into_iter()
                    .map(|direction| {
                        let count = seen.iter().filter(|l| l.direction == direction).count();
                        LabelCount {
                            label: direction,
                            count,
                            probability: share(count),
                        }
                    })
                    .collect();
                let mut labels: Vec<LabelCount<SegmentLabel>> = SegmentLabel::all()
                    .map(|label| {
                        let count = seen.iter().filter(|l| **l == label).count();
                        LabelCount {
                            label,
                            count,
                            probability: share(count),
                        }
                    })
                    .collect();
                labels.sort_by(|a, b| b.count.cmp(&a.count));

                SegmentDistribution {
                    segment: name.to_string(),
                    index: i,
                    classes,
                    directions,
                    labels,
                }
            })
            .collect();

        let highs = matched.iter().filter(|d| d.closing_high).count();
        let lows = matched.iter().filter(|d| d.closing_low).count();

        Ok(QueryOutcome::Matched(QueryReport {
            matched_days: n,
            total_days,
            match_rate: n as f64 / total_days as f64,
            dates: matched.iter().map(|d| d.date).collect(),
            distributions,
            closing_high_probability: share(highs),
            closing_low_probability: share(lows),
        }))
    }
}
