//! Running volume-weighted average price.
//!
//! For bar `i` of a session the average is
//! `Σ(close·volume) / Σ(volume)` over bars `0..=i`. Bars before any volume has
//! traded have no defined average and are left as `None`.

use crate::models::bar::Bar;

/// Running VWAP for each bar, in order.
pub fn running_vwap(bars: &[Bar]) -> Vec<Option<f64>> {
    let mut notional = 0.0;
    let mut volume = 0.0;
    bars.iter()
        .map(|b| {
            notional += b.close * b.volume;
            volume += b.volume;
            (volume > 0.0).then(|| notional / volume)
        })
        .collect()
}

/// Overwrites each bar's `vwap` with the running average.
pub fn with_running_vwap(bars: &mut [Bar]) {
    let averages = running_vwap(bars);
    for (bar, avg) in bars.iter_mut().zip(averages) {
        bar.vwap = avg;
    }
}
