//! Naming convention for per-day bar files.

use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const DATE_FMT: &str = "%Y%m%d";

/// Per-day file naming: `<prefix>_<YYYYMMDD><suffix>`, e.g. `TX_20250102_1K.csv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FileLayout {
    /// Contract prefix, e.g. `TX`.
    pub prefix: String,
    /// Everything after the date, e.g. `_1K.csv`.
    pub suffix: String,
}

impl Default for FileLayout {
    fn default() -> Self {
        Self {
            prefix: "TX".to_string(),
            suffix: "_1K.csv".to_string(),
        }
    }
}

impl FileLayout {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    /// File name for a trading date.
    pub fn file_name(&self, date: NaiveDate) -> String {
        format!("{}_{}{}", self.prefix, date.format(DATE_FMT), self.suffix)
    }

    /// Recovers the trading date from a file name, or `None` if the name does
    /// not follow this layout.
    pub fn parse_file_name(&self, name: &str) -> Option<NaiveDate> {
        let rest = name.strip_prefix(self.prefix.as_str())?.strip_prefix('_')?;
        let digits = rest.strip_suffix(self.suffix.as_str())?;
        if digits.len() != 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        NaiveDate::parse_from_str(digits, DATE_FMT).ok()
    }

    /// Same as [`FileLayout::parse_file_name`] for a path.
    pub fn parse_path(&self, path: &Path) -> Option<NaiveDate> {
        self.parse_file_name(path.file_name()?.to_str()?)
    }
}

/// Parses a `YYYYMMDD` date as used on the command line and in file names.
pub fn parse_compact_date(s: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FMT)
}
