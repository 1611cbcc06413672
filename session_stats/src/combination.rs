//! Grouping classified days by their label tuple.
//!
//! A [`CombinationKey`] is the ordered list of segment labels plus the two
//! closing-extreme flags, rendered as e.g. `Low_Down_Medium_Up_High_Up_H_Nl`.
//! [`aggregate`] turns a slice of [`ClassifiedDay`]s into a
//! [`CombinationTable`] whose counts sum to the number of days and whose
//! probabilities sum to one.

use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use indexmap::IndexMap;
use thiserror::Error;
use tracing::debug;

use crate::classify::{LabelParseError, SegmentLabel, Thresholds, classify_delta};
use crate::features::DayRecord;
use crate::segment::SessionPlan;

const HIGH: &str = "H";
const NOT_HIGH: &str = "Nh";
const LOW: &str = "L";
const NOT_LOW: &str = "Nl";

/// Identity of a combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CombinationKey {
    pub labels: Vec<SegmentLabel>,
    pub closing_high: bool,
    pub closing_low: bool,
}

impl CombinationKey {
    pub fn high_point(&self) -> &'static str {
        if self.closing_high {
            "closing high is day high"
        } else {
            "closing high below day high"
        }
    }

    pub fn low_point(&self) -> &'static str {
        if self.closing_low {
            "closing low is day low"
        } else {
            "closing low above day low"
        }
    }
}

impl fmt::Display for CombinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for label in &self.labels {
            write!(f, "{}_{}_", label.class, label.direction)?;
        }
        let h = if self.closing_high { HIGH } else { NOT_HIGH };
        let l = if self.closing_low { LOW } else { NOT_LOW };
        write!(f, "{h}_{l}")
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum KeyParseError {
    #[error("combination key {0:?} has the wrong number of parts")]
    Shape(String),
    #[error("bad closing flag {0:?}")]
    Flag(String),
    #[error(transparent)]
    Label(#[from] LabelParseError),
}

impl FromStr for CombinationKey {
    type Err = KeyParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('_').collect();
        if parts.len() < 4 || parts.len() % 2 != 0 {
            return Err(KeyParseError::Shape(s.to_string()));
        }
        let (label_parts, flags) = parts.split_at(parts.len() - 2);
        let labels = label_parts
            .chunks(2)
            .map(|pair| Ok(SegmentLabel::new(pair[0].parse()?, pair[1].parse()?)))
            .collect::<Result<Vec<_>, KeyParseError>>()?;
        let closing_high = match flags[0] {
            HIGH => true,
            NOT_HIGH => false,
            other => return Err(KeyParseError::Flag(other.to_string())),
        };
        let closing_low = match flags[1] {
            LOW => true,
            NOT_LOW => false,
            other => return Err(KeyParseError::Flag(other.to_string())),
        };
        Ok(Self {
            labels,
            closing_high,
            closing_low,
        })
    }
}

/// One segment of a classified day.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedSegment {
    pub label: SegmentLabel,
    pub high: f64,
    pub low: f64,
    /// `end_close - start_close`.
    pub delta: f64,
}

/// One row of the detailed per-day table.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedDay {
    pub date: NaiveDate,
    pub segments: Vec<ClassifiedSegment>,
    pub closing_high: bool,
    pub closing_low: bool,
    pub daily_change: f64,
}

impl ClassifiedDay {
    pub fn key(&self) -> CombinationKey {
        CombinationKey {
            labels: self.segments.iter().map(|s| s.label).collect(),
            closing_high: self.closing_high,
            closing_low: self.closing_low,
        }
    }
}

/// A day left out of the statistics, with the segments that had no data.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{date} not classified: no data for {}", .missing.join(", "))]
pub struct Unclassified {
    pub date: NaiveDate,
    pub missing: Vec<String>,
}

/// Labels a measured day. Days with any empty segment are excluded rather
/// than labeled with a guess.
pub fn classify_day(
    record: &DayRecord,
    plan: &SessionPlan,
    thresholds: &Thresholds,
) -> Result<ClassifiedDay, Unclassified> {
    let mut missing = Vec::new();
    let mut segments = Vec::with_capacity(plan.len());
    for (spec, features) in plan.segments().iter().zip(&record.segments) {
        let classified = features.as_ref().and_then(|f| {
            let class = thresholds.classify_ratio(f.ratio)?;
            Some(ClassifiedSegment {
                label: SegmentLabel::new(class, classify_delta(f.start_close, f.end_close)),
                high: f.high,
                low: f.low,
                delta: f.delta(),
            })
        });
        match classified {
            Some(c) => segments.push(c),
            None => missing.push(spec.name.clone()),
        }
    }
    if record.segments.len() < plan.len() {
        missing.extend(plan.names().skip(record.segments.len()).map(str::to_string));
    }

    match (record.closing_high_is_day_high, record.closing_low_is_day_low) {
        (Some(closing_high), Some(closing_low)) if missing.is_empty() => Ok(ClassifiedDay {
            date: record.date,
            segments,
            closing_high,
            closing_low,
            daily_change: record.daily_change(),
        }),
        _ => {
            if missing.is_empty() {
                missing.push(plan.segments()[plan.closing_index()].name.clone());
            }
            Err(Unclassified {
                date: record.date,
                missing,
            })
        }
    }
}

/// Statistics for one combination.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinationStats {
    pub key: CombinationKey,
    pub count: usize,
    /// `count / total_days`.
    pub probability: f64,
    /// Dates in input order.
    pub dates: Vec<NaiveDate>,
    /// Mean `delta` per segment over the member days.
    pub avg_deltas: Vec<f64>,
    pub avg_daily_change: f64,
}

/// All combinations, most probable first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CombinationTable {
    pub rows: Vec<CombinationStats>,
    pub total_days: usize,
    pub closing_high_rate: f64,
    pub closing_low_rate: f64,
}

impl CombinationTable {
    pub fn get(&self, key: &CombinationKey) -> Option<&CombinationStats> {
        self.rows.iter().find(|r| &r.key == key)
    }
}

#[derive(Default)]
struct Group {
    dates: Vec<NaiveDate>,
    delta_sums: Vec<f64>,
    change_sum: f64,
}

fn rate(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

/// Groups days by key. Ties in probability keep first-seen order.
pub fn aggregate(days: &[ClassifiedDay]) -> CombinationTable {
    let total = days.len();
    let mut groups: IndexMap<CombinationKey, Group> = IndexMap::new();
    for day in days {
        let group = groups.entry(day.key()).or_default();
        if group.delta_sums.is_empty() {
            group.delta_sums = vec![0.0; day.segments.len()];
        }
        for (sum, seg) in group.delta_sums.iter_mut().zip(&day.segments) {
            *sum += seg.delta;
        }
        group.change_sum += day.daily_change;
        group.dates.push(day.date);
    }

    let mut rows: Vec<CombinationStats> = groups
        .into_iter()
        .map(|(key, g)| {
            let n = g.dates.len() as f64;
            CombinationStats {
                count: g.dates.len(),
                probability: rate(g.dates.len(), total),
                avg_deltas: g.delta_sums.iter().map(|s| s / n).collect(),
                avg_daily_change: g.change_sum / n,
                dates: g.dates,
                key,
            }
        })
        .collect();
    // equal counts mean equal probabilities; stable sort keeps first-seen order
    rows.sort_by(|a, b| b.count.cmp(&a.count));

    let highs = days.iter().filter(|d| d.closing_high).count();
    let lows = days.iter().filter(|d| d.closing_low).count();
    debug!(days = total, combinations = rows.len(), "aggregated combinations");

    CombinationTable {
        rows,
        total_days: total,
        closing_high_rate: rate(highs, total),
        closing_low_rate: rate(lows, total),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::classify::{Direction, RatioClass};
    use crate::features::SegmentFeatures;
    use proptest::prelude::*;

    pub(crate) fn label(class: RatioClass, direction: Direction) -> SegmentLabel {
        SegmentLabel::new(class, direction)
    }

    pub(crate) fn day(
        n: u32,
        labels: &[SegmentLabel],
        deltas: &[f64],
        closing_high: bool,
        closing_low: bool,
    ) -> ClassifiedDay {
        ClassifiedDay {
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap() + chrono::Days::new(u64::from(n)),
            segments: labels
                .iter()
                .zip(deltas)
                .map(|(l, d)| ClassifiedSegment {
                    label: *l,
                    high: 100.0 + d.abs(),
                    low: 100.0 - d.abs(),
                    delta: *d,
                })
                .collect(),
            closing_high,
            closing_low,
            daily_change: deltas.iter().sum(),
        }
    }

    fn features(ratio: f64, start: f64, end: f64) -> SegmentFeatures {
        SegmentFeatures {
            start_close: start,
            end_close: end,
            high: start.max(end) + 1.0,
            low: start.min(end) - 1.0,
            ratio,
            bars: 30,
            volume: 100.0,
            close_std: None,
            open_offset: None,
        }
    }

    fn record(segments: Vec<Option<SegmentFeatures>>, flags: Option<(bool, bool)>) -> DayRecord {
        DayRecord {
            date: NaiveDate::from_ymd_opt(2025, 3, 4).unwrap(),
            open: 100.0,
            high: 110.0,
            low: 95.0,
            close: 102.0,
            volume: 1000.0,
            segments,
            closing_high_is_day_high: flags.map(|f| f.0),
            closing_low_is_day_low: flags.map(|f| f.1),
        }
    }

    #[test]
    fn key_renders_like_the_reports() {
        let key = CombinationKey {
            labels: vec![
                label(RatioClass::Low, Direction::Down),
                label(RatioClass::Medium, Direction::Up),
                label(RatioClass::High, Direction::Up),
            ],
            closing_high: true,
            closing_low: false,
        };
        insta::assert_snapshot!(key.to_string(), @"Low_Down_Medium_Up_High_Up_H_Nl");
        assert_eq!(key.to_string().parse::<CombinationKey>().unwrap(), key);
    }

    #[test]
    fn malformed_keys_are_rejected() {
        assert!(matches!("Low_Down_H".parse::<CombinationKey>(), Err(KeyParseError::Shape(_))));
        assert!(matches!("Low_Down_X_Nl".parse::<CombinationKey>(), Err(KeyParseError::Flag(_))));
        assert!(matches!("Low_Sideways_H_L".parse::<CombinationKey>(), Err(KeyParseError::Label(_))));
    }

    #[test]
    fn classifies_scenario_day() {
        let plan = SessionPlan::default();
        let rec = record(
            vec![
                Some(features(0.3, 100.0, 98.0)),
                Some(features(0.5, 98.0, 99.0)),
                Some(features(0.9, 99.0, 102.0)),
            ],
            Some((true, false)),
        );
        let day = classify_day(&rec, &plan, &Thresholds::default()).unwrap();
        assert_eq!(day.key().to_string(), "Low_Down_Medium_Up_High_Up_H_Nl");
        assert_eq!(
            day.segments.iter().map(|s| s.delta).collect::<Vec<_>>(),
            vec![-2.0, 1.0, 3.0]
        );
        assert_eq!(day.daily_change, 2.0);
    }

    #[test]
    fn flat_segment_is_labeled_flat() {
        let plan = SessionPlan::default();
        let rec = record(
            vec![
                Some(features(0.5, 100.0, 100.0)),
                Some(features(0.5, 100.0, 101.0)),
                Some(features(0.5, 101.0, 102.0)),
            ],
            Some((true, true)),
        );
        let day = classify_day(&rec, &plan, &Thresholds::default()).unwrap();
        assert_eq!(day.segments[0].label.direction, Direction::Flat);
    }

    #[test]
    fn empty_segment_excludes_the_day() {
        let plan = SessionPlan::default();
        let rec = record(
            vec![Some(features(0.3, 100.0, 98.0)), None, None],
            None,
        );
        let err = classify_day(&rec, &plan, &Thresholds::default()).unwrap_err();
        assert_eq!(err.missing, vec!["second_trade", "final_trade"]);
    }

    #[test]
    fn aggregates_in_first_seen_order_by_probability() {
        let a = [label(RatioClass::Low, Direction::Down)];
        let b = [label(RatioClass::High, Direction::Up)];
        let days = vec![
            day(0, &a, &[-1.0], true, false),
            day(1, &b, &[2.0], true, true),
            day(2, &b, &[4.0], true, true),
            day(3, &a, &[-3.0], false, false),
            day(4, &b, &[6.0], true, true),
        ];
        let table = aggregate(&days);
        assert_eq!(table.total_days, 5);
        assert_eq!(table.rows.len(), 3);

        let top = &table.rows[0];
        assert_eq!(top.key.to_string(), "High_Up_H_L");
        assert_eq!(top.count, 3);
        assert_eq!(top.probability, 0.6);
        assert_eq!(top.avg_deltas, vec![4.0]);
        assert_eq!(top.dates, vec![days[1].date, days[2].date, days[4].date]);

        // ties keep first-seen order
        assert_eq!(table.rows[1].key.to_string(), "Low_Down_H_Nl");
        assert_eq!(table.rows[2].key.to_string(), "Low_Down_Nh_Nl");

        assert_eq!(table.closing_high_rate, 0.8);
        assert_eq!(table.closing_low_rate, 0.6);
    }

    #[test]
    fn empty_input_gives_empty_table() {
        let table = aggregate(&[]);
        assert!(table.rows.is_empty());
        assert_eq!(table.total_days, 0);
        assert_eq!(table.closing_high_rate, 0.0);
    }

    fn arb_day() -> impl Strategy<Value = ClassifiedDay> {
        let class = prop::sample::select(RatioClass::ALL.to_vec());
        let dir = prop::sample::select(Direction::ALL.to_vec());
        (
            0u32..2000,
            prop::collection::vec((class, dir, -50.0f64..50.0), 3),
            any::<bool>(),
            any::<bool>(),
        )
            .prop_map(|(n, segs, h, l)| {
                let labels: Vec<_> = segs.iter().map(|(c, d, _)| label(*c, *d)).collect();
                let deltas: Vec<_> = segs.iter().map(|s| s.2).collect();
                day(n, &labels, &deltas, h, l)
            })
    }

    proptest! {
        #[test]
        fn counts_and_probabilities_sum_up(days in prop::collection::vec(arb_day(), 1..60)) {
            let table = aggregate(&days);
            let count: usize = table.rows.iter().map(|r| r.count).sum();
            let prob: f64 = table.rows.iter().map(|r| r.probability).sum();
            prop_assert_eq!(count, days.len());
            prop_assert!((prob - 1.0).abs() < 1e-9);
            for pair in table.rows.windows(2) {
                prop_assert!(pair[0].probability >= pair[1].probability);
            }
        }
    }
}
