//! Moving average enrichment of raw candles.

use crate::{
    engine::{IndicatorPoint, IndicatorPointBuilder},
    errors::Result,
    feed::Kline,
};

/// Simple moving average of `values` over a trailing window of `period` values.
///
/// The first `period - 1` entries are `None`. A zero period yields only `None`.
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    let warm_up = (period - 1).min(values.len());
    let mut averages = vec![None; warm_up];
    averages.extend(
        values
            .windows(period)
            .map(|window| Some(window.iter().sum::<f64>() / period as f64)),
    );
    averages
}

/// Turns raw candles into indicator points carrying a fast and a slow moving average of
/// the close prices.
///
/// ### Example
/// ```rust
/// use pts_rs::prelude::*;
/// use chrono::DateTime;
///
/// let klines: Vec<Kline> = (1..=4)
///     .map(|i| {
///         let price = i as f64;
///         Kline::new(DateTime::default(), price, price, price, price, 1.0, DateTime::default())
///     })
///     .collect();
///
/// let points = enrich(&klines, 2, 3).unwrap();
/// assert_eq!(points[0].fast_sma(), None);
/// assert_eq!(points[1].fast_sma(), Some(1.5));
/// assert_eq!(points[1].slow_sma(), None);
/// assert_eq!(points[3].slow_sma(), Some(3.0));
/// ```
pub fn enrich(klines: &[Kline], fast_period: usize, slow_period: usize) -> Result<Vec<IndicatorPoint>> {
    let closes = klines.iter().map(Kline::close).collect::<Vec<_>>();
    let fast = sma(&closes, fast_period);
    let slow = sma(&closes, slow_period);

    klines
        .iter()
        .zip(fast)
        .zip(slow)
        .map(|((kline, fast_sma), slow_sma)| {
            IndicatorPointBuilder::builder()
                .open_time(kline.open_time())
                .open(kline.open())
                .high(kline.high())
                .low(kline.low())
                .close(kline.close())
                .fast_sma(fast_sma)
                .slow_sma(slow_sma)
                .build()
        })
        .collect()
}
