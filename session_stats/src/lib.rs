//! Session-segment statistics for intraday futures minute bars.
//!
//! The trading day is cut into fixed clock-time segments. For every day the
//! [`features`] module measures each segment (direction, how much of it was
//! spent on the trend side of the running VWAP, extremes), [`classify`] turns
//! those measurements into labels, [`combination`] groups days by their label
//! tuple into an empirical probability table, and [`query`] answers "given
//! what the session has shown so far, what usually happens next".
//!
//! Supporting modules: [`config`] (TOML settings), [`segment`] (session
//! plan), [`conditions`] (daily and per-bar condition scans), [`similarity`]
//! (nearest historical days), [`report`] (CSV tables) and [`pipeline`]
//! (batch scan over an archive).

pub mod classify;
pub mod combination;
pub mod conditions;
pub mod config;
pub mod features;
pub mod pipeline;
pub mod query;
pub mod report;
pub mod segment;
pub mod similarity;
