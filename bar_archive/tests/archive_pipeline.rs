mod common;
use common::{setup_dir, write_export};

use bar_archive::split::split_export;
use bar_archive::{DayArchive, FileLayout};
use chrono::NaiveDate;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

#[test]
fn split_then_add_vwap_then_load() {
    let dir = setup_dir();
    let export = write_export(&dir, d(2025, 2, 3), 3, 300);
    let archive_dir = dir.path.join("archive");
    let layout = FileLayout::default();

    let days = split_export(&export, &layout, &archive_dir, 300).expect("split");
    assert_eq!(days.len(), 3);
    assert!(days.iter().all(|s| s.is_complete(300)));

    let archive = DayArchive::new(&archive_dir, layout);
    assert_eq!(
        archive.list_dates().unwrap(),
        vec![d(2025, 2, 3), d(2025, 2, 4), d(2025, 2, 5)]
    );

    let report = archive.ensure_vwap(d(2025, 2, 1), d(2025, 2, 5));
    assert_eq!(report.updated.len(), 3);
    assert_eq!(report.missing, vec![d(2025, 2, 1), d(2025, 2, 2)]);
    assert!(report.failed.is_empty());

    let loaded = archive.load_range(d(2025, 2, 1), d(2025, 2, 10));
    assert_eq!(loaded.len(), 3);
    for (_, series) in loaded {
        let series = series.expect("valid day");
        assert_eq!(series.len(), 300);
        assert!(series.has_vwap());
        // bars come back in time order even though the export was reversed
        assert!(series.bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    let prior = archive.previous_day(d(2025, 2, 5), 30).unwrap().unwrap();
    assert_eq!(prior.date, d(2025, 2, 4));
}

#[test]
fn short_day_is_flagged_but_written() {
    let dir = setup_dir();
    let export = write_export(&dir, d(2025, 2, 3), 1, 120);
    let days = split_export(&export, &FileLayout::default(), &dir.path, 300).unwrap();
    assert_eq!(days.len(), 1);
    assert_eq!(days[0].rows, 120);
    assert!(!days[0].is_complete(300));
    assert!(days[0].path.is_file());
}
