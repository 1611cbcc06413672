//! Nearest historical days by intraday shape.
//!
//! Each day becomes a vector of four numbers per segment: first open minus
//! the prior day's mid, high-low range, sample std-dev of closes, and total
//! volume. The target and all candidates are standardized column-wise
//! together, then ranked by cosine similarity to the target.

use bar_archive::{DayArchive, DaySeries, PriorDay};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::features::sample_std;
use crate::segment::SessionPlan;

/// Values per segment in a [`DayVector`].
pub const FEATURES_PER_SEGMENT: usize = 4;

#[derive(Debug, Error)]
pub enum SimilarityError {
    #[error(transparent)]
    Archive(#[from] bar_archive::Error),

    #[error("no trading day within {max_days_back} days before {date} and no fallback configured")]
    NoPriorDay { date: NaiveDate, max_days_back: u32 },

    #[error("no candidate days to compare {0} against")]
    NoCandidates(NaiveDate),
}

/// Search settings (the `[similarity]` config table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SimilarityConfig {
    /// Calendar days to look back for the prior trading day.
    pub max_days_back: u32,
    /// Number of days to report.
    pub top: usize,
    /// Prior-day high/low used when the archive has none in range.
    pub fallback_prior_high: Option<f64>,
    pub fallback_prior_low: Option<f64>,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            max_days_back: 30,
            top: 5,
            fallback_prior_high: None,
            fallback_prior_low: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayVector {
    pub date: NaiveDate,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimilarDay {
    pub date: NaiveDate,
    pub score: f64,
}

/// Builds the feature vector of one day. Empty segments and single-bar
/// std-devs contribute zeros.
pub fn day_vector(series: &DaySeries, plan: &SessionPlan, prior: &PriorDay) -> DayVector {
    let mid = prior.mid();
    let mut values = Vec::with_capacity(plan.len() * FEATURES_PER_SEGMENT);
    for spec in plan.segments() {
        let window: Vec<_> = series
            .bars
            .iter()
            .filter(|b| spec.contains(b.time()))
            .collect();
        let Some(first) = window.first() else {
            values.extend([0.0; FEATURES_PER_SEGMENT]);
            continue;
        };
        let high = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        let low = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        values.push(first.open - mid);
        values.push(high - low);
        values.push(sample_std(window.iter().map(|b| b.close)).unwrap_or(0.0));
        values.push(window.iter().map(|b| b.volume).sum());
    }
    DayVector {
        date: series.date,
        values,
    }
}

/// Z-scores every column in place (population std-dev). Constant columns
/// become zero.
pub fn standardize(rows: &mut [Vec<f64>]) {
    let Some(width) = rows.first().map(Vec::len) else {
        return;
    };
    let n = rows.len() as f64;
    for col in 0..width {
        let mean = rows.iter().map(|r| r[col]).sum::<f64>() / n;
        let var = rows.iter().map(|r| (r[col] - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        for row in rows.iter_mut() {
            row[col] = if std > 0.0 {
                (row[col] - mean) / std
            } else {
                0.0
            };
        }
    }
}

/// Cosine of the angle between `a` and `b`; zero when either has zero norm.
pub fn cosine(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

/// Standardizes target and candidates together and returns the `top`
/// candidates by similarity, best first.
pub fn rank_similar(target: &DayVector, candidates: &[DayVector], top: usize) -> Vec<SimilarDay> {
    let mut rows: Vec<Vec<f64>> = std::iter::once(&target.values)
        .chain(candidates.iter().map(|c| &c.values))
        .cloned()
        .collect();
    standardize(&mut rows);

    let (target_row, others) = rows.split_at(1);
    let mut ranked: Vec<SimilarDay> = candidates
        .iter()
        .zip(others)
        .map(|(c, row)| SimilarDay {
            date: c.date,
            score: cosine(&target_row[0], row),
        })
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.truncate(top);
    ranked
}

/// Archive-backed similar-day search.
#[derive(Debug)]
pub struct SimilaritySearch<'a> {
    archive: &'a DayArchive,
    plan: &'a SessionPlan,
    config: &'a SimilarityConfig,
}

impl<'a> SimilaritySearch<'a> {
    pub fn new(archive: &'a DayArchive, plan: &'a SessionPlan, config: &'a SimilarityConfig) -> Self {
        Self {
            archive,
            plan,
            config,
        }
    }

    fn prior_for(&self, date: NaiveDate) -> Result<Option<PriorDay>, SimilarityError> {
        if let Some(prior) = self.archive.previous_day(date, self.config.max_days_back)? {
            return Ok(Some(prior));
        }
        let fallback = match (self.config.fallback_prior_high, self.config.fallback_prior_low) {
            (Some(high), Some(low)) => Some(PriorDay { date, high, low }),
            _ => None,
        };
        if fallback.is_some() {
            debug!(%date, "using fallback prior day");
        }
        Ok(fallback)
    }

    /// Ranks every archived day (other than `target`, and after `first_day`
    /// when given) by similarity to `target`.
    pub fn find(
        &self,
        target: NaiveDate,
        first_day: Option<NaiveDate>,
    ) -> Result<Vec<SimilarDay>, SimilarityError> {
        let target_series = self.archive.load_day(target)?;
        let target_prior = self.prior_for(target)?.ok_or(SimilarityError::NoPriorDay {
            date: target,
            max_days_back: self.config.max_days_back,
        })?;
        let target_vec = day_vector(&target_series, self.plan, &target_prior);

        let mut candidates = Vec::new();
        for date in self.archive.list_dates()? {
            if date == target || first_day.is_some_and(|f| date <= f) {
                continue;
            }
            let prior = match self.prior_for(date) {
                Ok(Some(p)) => p,
                Ok(None) => {
                    debug!(%date, "no prior day, skipping candidate");
                    continue;
                }
                Err(e) => {
                    warn!(%date, error = %e, "skipping candidate");
                    continue;
                }
            };
            match self.archive.load_day(date) {
                Ok(series) => candidates.push(day_vector(&series, self.plan, &prior)),
                Err(e) => warn!(%date, error = %e, "skipping candidate"),
            }
        }
        if candidates.is_empty() {
            return Err(SimilarityError::NoCandidates(target));
        }

        let ranked = rank_similar(&target_vec, &candidates, self.config.top);
        info!(%target, candidates = candidates.len(), "similar days ranked");
        Ok(ranked)
    }
}
