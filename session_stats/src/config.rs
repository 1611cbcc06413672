//! Analysis configuration: TOML parsing, defaults and validation.
//!
//! Every table is optional. An empty file gives a TX archive in the working
//! directory, the three-segment plan and 0.4/0.8 thresholds.
//!
//! ```toml
//! extreme_tolerance = 0.0
//!
//! [archive]
//! dir = "data"
//! prefix = "TX"
//! suffix = "_1K.csv"
//!
//! [[segments]]
//! name = "first_trade"
//! start = "08:45"
//! end = "09:15"
//!
//! [thresholds]
//! medium = 0.4
//! high = 0.8
//!
//! [output]
//! dir = "reports"
//! ```
//!
//! Entrypoints: [`load_config_str`], [`load_config_path`], [`resolve_config`].

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use bar_archive::split::DEFAULT_EXPECTED_ROWS;
use bar_archive::{DayArchive, FileLayout};
use serde::{Deserialize, Serialize};
use shared_utils::env::env_path;
use tracing::debug;

use crate::classify::Thresholds;
use crate::conditions::{BarCondition, DailyCondition, default_bar_conditions, default_daily_conditions};
use crate::segment::{SegmentSpec, SessionPlan};
use crate::similarity::SimilarityConfig;

/// Environment variable naming the config file when `--config` is absent.
pub const CONFIG_ENV: &str = "SESSION_STATS_CONFIG";

/// Where the per-day bar files live.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct ArchiveCfg {
    pub dir: PathBuf,
    pub prefix: String,
    pub suffix: String,
}

impl Default for ArchiveCfg {
    fn default() -> Self {
        let layout = FileLayout::default();
        Self {
            dir: PathBuf::from("."),
            prefix: layout.prefix,
            suffix: layout.suffix,
        }
    }
}

/// Where reports are written.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct OutputCfg {
    pub dir: PathBuf,
    /// Rows a complete day file should have after splitting.
    pub expected_rows: usize,
}

impl Default for OutputCfg {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            expected_rows: DEFAULT_EXPECTED_ROWS,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct AnalysisConfig {
    /// Slack allowed when deciding whether the closing segment made the day
    /// high/low.
    pub extreme_tolerance: f64,
    pub archive: ArchiveCfg,
    pub segments: Vec<SegmentSpec>,
    pub thresholds: Thresholds,
    pub similarity: SimilarityConfig,
    pub daily_conditions: Vec<DailyCondition>,
    pub bar_conditions: Vec<BarCondition>,
    pub output: OutputCfg,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            extreme_tolerance: 0.0,
            archive: ArchiveCfg::default(),
            segments: SessionPlan::default().segments().to_vec(),
            thresholds: Thresholds::default(),
            similarity: SimilarityConfig::default(),
            daily_conditions: default_daily_conditions(),
            bar_conditions: default_bar_conditions(),
            output: OutputCfg::default(),
        }
    }
}

impl AnalysisConfig {
    /// The validated session plan.
    pub fn session_plan(&self) -> anyhow::Result<SessionPlan> {
        SessionPlan::new(self.segments.clone()).context("invalid [[segments]]")
    }

    pub fn layout(&self) -> FileLayout {
        FileLayout {
            prefix: self.archive.prefix.clone(),
            suffix: self.archive.suffix.clone(),
        }
    }

    pub fn archive(&self) -> DayArchive {
        DayArchive::new(&self.archive.dir, self.layout())
    }

    /// Checks every cross-field constraint serde cannot express.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.session_plan()?;
        self.thresholds.validate().context("invalid [thresholds]")?;
        if !self.extreme_tolerance.is_finite() || self.extreme_tolerance < 0.0 {
            bail!(
                "extreme_tolerance must be a finite, non-negative number (got {})",
                self.extreme_tolerance
            );
        }
        if self.similarity.top == 0 {
            bail!("similarity.top must be at least 1");
        }
        if self.similarity.fallback_prior_high.is_some() != self.similarity.fallback_prior_low.is_some() {
            bail!("similarity.fallback_prior_high and fallback_prior_low must be set together");
        }
        if let (Some(high), Some(low)) = (
            self.similarity.fallback_prior_high,
            self.similarity.fallback_prior_low,
        ) {
            if high < low {
                bail!("similarity fallback high {high} is below fallback low {low}");
            }
        }
        for c in &self.daily_conditions {
            if let DailyCondition::HighVolume { lookback: 0, .. } = c {
                bail!("high_volume lookback must be at least 1");
            }
        }
        for c in &self.bar_conditions {
            match *c {
                BarCondition::VolumeSpike { window: 0, .. } => {
                    bail!("volume_spike window must be at least 1")
                }
                BarCondition::Breakout { lookback: 0 } => {
                    bail!("breakout lookback must be at least 1")
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Parse and validate a config from a TOML string.
pub fn load_config_str(s: &str) -> anyhow::Result<AnalysisConfig> {
    let cfg: AnalysisConfig = toml::from_str(s).context("parsing analysis config")?;
    cfg.validate()?;
    Ok(cfg)
}

/// Parse and validate a config file.
pub fn load_config_path<P: AsRef<Path>>(path: P) -> anyhow::Result<AnalysisConfig> {
    let path = path.as_ref();
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    load_config_str(&s).with_context(|| format!("in config {}", path.display()))
}

/// Explicit path, then [`CONFIG_ENV`], then defaults.
pub fn resolve_config(explicit: Option<&Path>) -> anyhow::Result<AnalysisConfig> {
    let path = explicit.map(Path::to_path_buf).or_else(|| env_path(CONFIG_ENV));
    match path {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config_path(path)
        }
        None => {
            debug!("no config file, using defaults");
            Ok(AnalysisConfig::default())
        }
    }
}
