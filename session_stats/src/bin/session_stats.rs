use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use bar_archive::io::layout::parse_compact_date;
use bar_archive::split::split_export;
use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use session_stats::config::{AnalysisConfig, resolve_config};
use session_stats::pipeline::{scan, write_reports};
use session_stats::query::{Query, QueryBook, QueryOutcome, QueryReport, SegmentFilter};
use session_stats::report::DETAIL_FILE;
use session_stats::segment::parse_clock;
use session_stats::similarity::SimilaritySearch;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Session-segment statistics for intraday minute bars")]
struct Cli {
    /// Path to the analysis config (TOML). Falls back to $SESSION_STATS_CONFIG.
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Add the running average column to day files that lack it
    Vwap {
        /// First date, YYYYMMDD
        #[arg(long, value_parser = parse_date)]
        from: NaiveDate,
        /// Last date, YYYYMMDD
        #[arg(long, value_parser = parse_date)]
        to: NaiveDate,
    },

    /// Split a multi-day export into one file per day
    Split {
        #[arg(long, value_name = "FILE")]
        input: PathBuf,
        /// Defaults to the archive directory
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,
        #[arg(long)]
        expected_rows: Option<usize>,
    },

    /// Classify every day in a range and write the report tables
    Scan {
        #[arg(long, value_parser = parse_date)]
        from: NaiveDate,
        #[arg(long, value_parser = parse_date)]
        to: NaiveDate,
        /// Defaults to [output] dir
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,
    },

    /// Outcome probabilities given what the session has shown so far
    Query {
        /// Detailed table written by `scan`
        #[arg(long, value_name = "FILE")]
        detail: Option<PathBuf>,
        /// Clock time the query is made at, HH:MM
        #[arg(long, value_parser = parse_time)]
        checkpoint: NaiveTime,
        /// Segment filter, `name=Class:Direction` (either side may be `*`)
        #[arg(long = "segment", value_name = "NAME=FILTER")]
        segments: Vec<String>,
        #[arg(long)]
        closing_high: Option<bool>,
        #[arg(long)]
        closing_low: Option<bool>,
    },

    /// Rank archived days by similarity to a target day
    Similar {
        #[arg(long, value_parser = parse_date)]
        date: NaiveDate,
        /// First day of the data set; it and earlier days are not candidates
        #[arg(long, value_parser = parse_date)]
        first_day: Option<NaiveDate>,
        #[arg(long)]
        top: Option<usize>,
    },
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    parse_compact_date(s).map_err(|e| format!("expected YYYYMMDD: {e}"))
}

fn parse_time(s: &str) -> Result<NaiveTime, String> {
    parse_clock(s).map_err(|e| format!("expected HH:MM: {e}"))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = resolve_config(cli.config.as_deref())?;

    match cli.cmd {
        Cmd::Vwap { from, to } => run_vwap(&cfg, from, to),
        Cmd::Split {
            input,
            out_dir,
            expected_rows,
        } => {
            let out_dir = out_dir.unwrap_or_else(|| cfg.archive.dir.clone());
            let expected = expected_rows.unwrap_or(cfg.output.expected_rows);
            let days = split_export(&input, &cfg.layout(), &out_dir, expected)?;
            let short = days.iter().filter(|d| !d.is_complete(expected)).count();
            println!("{} day files written to {}", days.len(), out_dir.display());
            if short > 0 {
                println!("{short} of them do not have {expected} rows");
            }
            Ok(())
        }
        Cmd::Scan { from, to, out_dir } => run_scan(&cfg, from, to, out_dir),
        Cmd::Query {
            detail,
            checkpoint,
            segments,
            closing_high,
            closing_low,
        } => run_query(&cfg, detail, checkpoint, &segments, closing_high, closing_low),
        Cmd::Similar {
            date,
            first_day,
            top,
        } => {
            let plan = cfg.session_plan()?;
            let archive = cfg.archive();
            let mut sim = cfg.similarity.clone();
            if let Some(top) = top {
                sim.top = top;
            }
            let ranked = SimilaritySearch::new(&archive, &plan, &sim).find(date, first_day)?;
            println!("Most similar days to {}:", date.format("%Y-%m-%d"));
            for (i, day) in ranked.iter().enumerate() {
                println!(
                    "{:>2}. {} : {:.4}",
                    i + 1,
                    archive.layout().file_name(day.date),
                    day.score
                );
            }
            Ok(())
        }
    }
}

fn ordered(from: NaiveDate, to: NaiveDate) -> Result<()> {
    if from > to {
        bail!("--from {from} is after --to {to}");
    }
    Ok(())
}

fn run_vwap(cfg: &AnalysisConfig, from: NaiveDate, to: NaiveDate) -> Result<()> {
    ordered(from, to)?;
    let report = cfg.archive().ensure_vwap(from, to);
    println!(
        "updated {}, already present {}, missing {}, failed {}",
        report.updated.len(),
        report.already_present.len(),
        report.missing.len(),
        report.failed.len()
    );
    for (date, reason) in &report.failed {
        println!("  {date}: {reason}");
    }
    Ok(())
}

fn run_scan(
    cfg: &AnalysisConfig,
    from: NaiveDate,
    to: NaiveDate,
    out_dir: Option<PathBuf>,
) -> Result<()> {
    ordered(from, to)?;
    let plan = cfg.session_plan()?;
    let archive = cfg.archive();
    let outcome = scan(&archive, &plan, cfg, from, to);

    let dir = out_dir.unwrap_or_else(|| cfg.output.dir.clone());
    let paths = write_reports(&dir, &plan, &outcome, from, to)?;
    #[cfg(feature = "feather")]
    session_stats::report::feather::write_detail_feather(
        &paths.detail.with_extension("feather"),
        &plan,
        &outcome.classified,
    )?;

    let table = &outcome.table;
    println!(
        "{} days classified, {} combinations, {} skipped",
        table.total_days,
        table.rows.len(),
        outcome.skipped.len()
    );
    println!(
        "closing segment made the day high {:.2}% / day low {:.2}% of the time",
        table.closing_high_rate * 100.0,
        table.closing_low_rate * 100.0
    );
    for row in table.rows.iter().take(10) {
        println!(
            "{:>6.2}%  {:>4}  {}",
            row.probability * 100.0,
            row.count,
            row.key
        );
    }
    println!("summary: {}", paths.summary.display());
    println!("detail:  {}", paths.detail.display());
    Ok(())
}

fn parse_segment_arg(arg: &str) -> Result<(&str, SegmentFilter)> {
    let (name, filter) = arg
        .split_once('=')
        .with_context(|| format!("segment filter {arg:?} is not NAME=FILTER"))?;
    let filter = filter
        .parse()
        .with_context(|| format!("segment filter {arg:?}"))?;
    Ok((name.trim(), filter))
}

fn run_query(
    cfg: &AnalysisConfig,
    detail: Option<PathBuf>,
    checkpoint: NaiveTime,
    segments: &[String],
    closing_high: Option<bool>,
    closing_low: Option<bool>,
) -> Result<()> {
    let plan = cfg.session_plan()?;
    let mut query = Query::any(plan.len());
    for arg in segments {
        let (name, filter) = parse_segment_arg(arg)?;
        query.set_named(&plan, name, filter)?;
    }
    query.closing_high = closing_high;
    query.closing_low = closing_low;
    query.check_elapsed(&plan, checkpoint)?;

    let detail = detail.unwrap_or_else(|| cfg.output.dir.join(DETAIL_FILE));
    let mut book = QueryBook::new(plan);
    book.load(&detail)?;
    info!(days = book.len(), "history loaded");

    match book.run(&query)? {
        QueryOutcome::NoMatchingHistory { total_days } => {
            println!("No matching history ({total_days} days searched).");
        }
        QueryOutcome::Matched(report) => print_report(&report, book.source()),
    }
    Ok(())
}

fn pct(p: f64) -> String {
    format!("{:.2}%", p * 100.0)
}

fn print_report(report: &QueryReport, source: Option<&Path>) {
    if let Some(source) = source {
        println!("History: {}", source.display());
    }
    println!(
        "Matched {} of {} days ({})",
        report.matched_days,
        report.total_days,
        pct(report.match_rate)
    );
    for dist in &report.distributions {
        println!();
        println!("{}:", dist.segment);
        let classes: Vec<String> = dist
            .classes
            .iter()
            .map(|c| format!("{} {}", c.label, pct(c.probability)))
            .collect();
        println!("  class      {}", classes.join("  "));
        let directions: Vec<String> = dist
            .directions
            .iter()
            .map(|d| format!("{} {}", d.label, pct(d.probability)))
            .collect();
        println!("  direction  {}", directions.join("  "));
        for cell in dist.labels.iter().filter(|c| c.count > 0) {
            println!("    {:<14} {:>4}  {}", cell.label.to_string(), cell.count, pct(cell.probability));
        }
    }
    println!();
    println!("Closing high is day high: {}", pct(report.closing_high_probability));
    println!("Closing low is day low:   {}", pct(report.closing_low_probability));
}
