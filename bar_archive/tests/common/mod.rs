#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use chrono::{Duration, NaiveDate};
use tempfile::TempDir;

pub struct TestDir {
    _dir: TempDir, // keep alive for the life of the test
    pub path: PathBuf,
}

pub fn setup_dir() -> TestDir {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().to_path_buf();
    TestDir { _dir: dir, path }
}

/// Writes a vendor-style export covering `days` sessions of `minutes` bars,
/// newest row first like the raw download.
pub fn write_export(dir: &TestDir, first: NaiveDate, days: u32, minutes: u32) -> PathBuf {
    let mut rows = Vec::new();
    for day in 0..days {
        let date = first + Duration::days(i64::from(day));
        let open = date.and_hms_opt(8, 46, 0).expect("time");
        for m in 0..minutes {
            let ts = open + Duration::minutes(i64::from(m));
            let px = 20_000.0 + f64::from(day * 10 + m);
            rows.push(format!(
                "{},{},{},{},{},{}",
                ts.format("%Y/%m/%d %H:%M"),
                px,
                px + 2.0,
                px - 2.0,
                px + 1.0,
                10 + m
            ));
        }
    }
    rows.reverse();
    let path = dir.path.join("export.csv");
    let body = format!("Date,Open,High,Low,Close,Volume\n{}\n", rows.join("\n"));
    fs::write(&path, body).expect("write export");
    path
}
