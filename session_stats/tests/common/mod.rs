#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use bar_archive::io::writer::write_bars;
use bar_archive::vwap::with_running_vwap;
use bar_archive::{Bar, DayArchive, FileLayout};
use chrono::{Duration, NaiveDate, NaiveTime};
use tempfile::TempDir;

/// Rising first segment, falling second, rising close.
pub const UP_DOWN_UP: [f64; 3] = [1.0, -1.0, 1.0];
pub const DOWN_UP_DOWN: [f64; 3] = [-1.0, 1.0, -1.0];

pub struct TestDir {
    _dir: TempDir, // keep alive for the life of the test
    pub path: PathBuf,
}

pub fn setup_dir() -> TestDir {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().to_path_buf();
    TestDir { _dir: dir, path }
}

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).expect("date")
}

pub fn archive(root: &Path) -> DayArchive {
    DayArchive::new(root, FileLayout::default())
}

/// Minute bars from 08:45 until (not including) `until`, drifting by
/// `slopes[i]` points per minute inside the i-th default segment
/// (08:45, 09:15, 09:45 boundaries). Carries the running average.
pub fn synthetic_day(date: NaiveDate, slopes: [f64; 3], until: NaiveTime) -> Vec<Bar> {
    let start = date.and_hms_opt(8, 45, 0).expect("time");
    let mut bars = Vec::new();
    let mut px = 20_000.0;
    for m in 0..300 {
        let ts = start + Duration::minutes(m);
        if ts.time() >= until {
            break;
        }
        let slope = match m {
            0..30 => slopes[0],
            30..60 => slopes[1],
            _ => slopes[2],
        };
        let open = px;
        px += slope;
        bars.push(Bar::new(
            ts,
            open,
            open.max(px) + 1.0,
            open.min(px) - 1.0,
            px,
            10.0,
        ));
    }
    with_running_vwap(&mut bars);
    bars
}

pub fn session_close() -> NaiveTime {
    NaiveTime::from_hms_opt(13, 45, 0).expect("time")
}

/// Writes one complete day into the archive.
pub fn write_day(archive: &DayArchive, date: NaiveDate, slopes: [f64; 3]) {
    write_bars(&archive.path_for(date), &synthetic_day(date, slopes, session_close()))
        .expect("write day");
}

/// Writes a day that stops at `until`.
pub fn write_partial_day(archive: &DayArchive, date: NaiveDate, slopes: [f64; 3], until: NaiveTime) {
    write_bars(&archive.path_for(date), &synthetic_day(date, slopes, until)).expect("write day");
}

/// Writes a file under the day's name that is not a bar file.
pub fn write_garbage(archive: &DayArchive, date: NaiveDate) {
    let path = archive.path_for(date);
    fs::create_dir_all(archive.root()).expect("mkdir");
    fs::write(path, "not,a,bar\n1,2,3\n").expect("write garbage");
}

/// Weekdays starting at `first`, `count` of them.
pub fn weekdays(first: NaiveDate, count: usize) -> Vec<NaiveDate> {
    use chrono::Datelike;
    first
        .iter_days()
        .filter(|d| d.weekday().number_from_monday() <= 5)
        .take(count)
        .collect()
}
