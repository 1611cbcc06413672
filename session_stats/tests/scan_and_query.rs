mod common;
use common::*;

use chrono::NaiveTime;
use session_stats::classify::Direction;
use session_stats::combination::aggregate;
use session_stats::config::AnalysisConfig;
use session_stats::pipeline::{SkipStage, scan, write_reports};
use session_stats::query::{Query, QueryBook, QueryOutcome, SegmentFilter};
use session_stats::report::{self, SUMMARY_FILE};
use session_stats::segment::SessionPlan;

fn up() -> SegmentFilter {
    SegmentFilter {
        class: None,
        direction: Some(Direction::Up),
    }
}

#[test]
fn scan_classifies_range_and_skips_bad_days() {
    let dir = setup_dir();
    let archive = archive(&dir.path.join("archive"));
    let days = weekdays(d(2025, 3, 3), 12);
    for (i, date) in days[..10].iter().enumerate() {
        let slopes = if i % 2 == 0 { UP_DOWN_UP } else { DOWN_UP_DOWN };
        write_day(&archive, *date, slopes);
    }
    write_partial_day(
        &archive,
        days[10],
        UP_DOWN_UP,
        NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
    );
    write_garbage(&archive, days[11]);

    let plan = SessionPlan::default();
    let cfg = AnalysisConfig::default();
    let outcome = scan(&archive, &plan, &cfg, days[0], days[11]);

    assert_eq!(outcome.classified.len(), 10);
    // the short day is measured but cannot be classified
    assert_eq!(outcome.daily.len(), 11);
    assert_eq!(outcome.skipped.len(), 2);
    assert_eq!(outcome.skipped[0].date, days[10]);
    assert_eq!(outcome.skipped[0].stage, SkipStage::Classify);
    assert!(outcome.skipped[0].reason.contains("final_trade"));
    assert_eq!(outcome.skipped[1].date, days[11]);
    assert_eq!(outcome.skipped[1].stage, SkipStage::Load);

    let table = &outcome.table;
    assert_eq!(table.total_days, 10);
    assert_eq!(table.rows.len(), 2);
    assert!(table.rows.iter().all(|r| r.count == 5));
    assert_eq!(table.rows[0].dates[0], days[0]);
    let total: f64 = table.rows.iter().map(|r| r.probability).sum();
    assert!((total - 1.0).abs() < 1e-12);

    let first = &outcome.classified[0];
    let directions: Vec<Direction> = first.segments.iter().map(|s| s.label.direction).collect();
    assert_eq!(directions, [Direction::Up, Direction::Down, Direction::Up]);
    assert!(first.closing_high);
}

#[test]
fn reports_reload_into_the_same_statistics() {
    let dir = setup_dir();
    let archive = archive(&dir.path.join("archive"));
    let days = weekdays(d(2025, 3, 3), 8);
    for (i, date) in days.iter().enumerate() {
        let slopes = if i % 4 == 3 { DOWN_UP_DOWN } else { UP_DOWN_UP };
        write_day(&archive, *date, slopes);
    }

    let plan = SessionPlan::default();
    let outcome = scan(&archive, &plan, &AnalysisConfig::default(), days[0], days[7]);
    let out_dir = dir.path.join("reports");
    let paths = write_reports(&out_dir, &plan, &outcome, days[0], days[7]).unwrap();

    assert_eq!(paths.summary, out_dir.join(SUMMARY_FILE));
    for p in [&paths.summary, &paths.detail, &paths.daily, &paths.intraday] {
        assert!(p.is_file(), "{} not written", p.display());
    }

    let reloaded = report::read_detail(&paths.detail, &plan).unwrap();
    assert_eq!(reloaded, outcome.classified);
    assert_eq!(aggregate(&reloaded), outcome.table);

    let mut book = QueryBook::new(plan.clone());
    assert_eq!(book.load(&paths.detail).unwrap(), 8);
    assert_eq!(book.source(), Some(paths.detail.as_path()));

    let q = Query::any(plan.len()).with_segment(0, up());
    let QueryOutcome::Matched(report) = book.run(&q).unwrap() else {
        panic!("expected matches");
    };
    assert_eq!(report.matched_days, 6);
    assert_eq!(report.total_days, 8);
    assert_eq!(report.match_rate, 0.75);
    let second = report.distribution("second_trade").unwrap();
    assert_eq!(second.direction_probability(Direction::Down), 1.0);

    let q = Query::any(plan.len()).with_segment(
        1,
        SegmentFilter {
            class: None,
            direction: Some(Direction::Flat),
        },
    );
    assert_eq!(
        book.run(&q).unwrap(),
        QueryOutcome::NoMatchingHistory { total_days: 8 }
    );
}

#[test]
fn reading_a_detail_table_with_another_plan_fails() {
    let dir = setup_dir();
    let archive = archive(&dir.path.join("archive"));
    let days = weekdays(d(2025, 3, 3), 2);
    for date in &days {
        write_day(&archive, *date, UP_DOWN_UP);
    }
    let plan = SessionPlan::default();
    let outcome = scan(&archive, &plan, &AnalysisConfig::default(), days[0], days[1]);
    let paths = write_reports(&dir.path, &plan, &outcome, days[0], days[1]).unwrap();

    let other = session_stats::config::load_config_str(
        r#"
        [[segments]]
        name = "morning"
        start = "08:45"
        end = "11:00"

        [[segments]]
        name = "afternoon"
        start = "11:00"
        end = "13:45"
        "#,
    )
    .unwrap()
    .session_plan()
    .unwrap();
    let mut book = QueryBook::new(other);
    assert!(book.load(&paths.detail).is_err());
    assert!(!book.is_loaded());
}

#[test]
fn zero_volume_opening_minute_survives_vwap_and_scan() {
    use bar_archive::io::writer::write_bars;

    let dir = setup_dir();
    let archive = archive(&dir.path);
    let days = weekdays(d(2025, 2, 3), 2);
    for date in &days {
        let mut bars = synthetic_day(*date, UP_DOWN_UP, session_close());
        bars[0].volume = 0.0;
        for bar in &mut bars {
            bar.vwap = None;
        }
        write_bars(&archive.path_for(*date), &bars).unwrap();
    }

    let first = archive.ensure_vwap(days[0], days[1]);
    assert_eq!(first.updated, days);
    let second = archive.ensure_vwap(days[0], days[1]);
    assert!(second.updated.is_empty());
    assert_eq!(second.already_present, days);

    let plan = SessionPlan::default();
    let outcome = scan(&archive, &plan, &AnalysisConfig::default(), days[0], days[1]);
    assert!(outcome.skipped.is_empty(), "{:?}", outcome.skipped);
    assert_eq!(outcome.classified.len(), 2);
    let opening = outcome.daily[0].record.segments[0].as_ref().unwrap();
    assert!(opening.ratio < 1.0);
}
