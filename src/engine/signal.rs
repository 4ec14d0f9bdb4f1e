use std::fmt;

use crate::{config::SessionConfig, engine::IndicatorPoint};

/// Portfolio figures the entry decision depends on.
#[derive(Debug, Clone, Copy)]
pub struct Exposure {
    /// Cash + mark-to-market value of the open positions.
    pub equity: f64,
    /// Sum of the cash committed to the open positions.
    pub committed: f64,
    /// Cash available for a new position.
    pub available_cash: f64,
    /// Whether the instrument already has an open position.
    pub holds_symbol: bool,
}

/// Why an entry was not taken.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SkipReason {
    /// One of the moving averages is not warmed up yet.
    WarmUp,
    /// The fast average is not above the slow one.
    NoUptrend,
    /// The live price is not above the slow average.
    BelowSlowAverage,
    /// The fast average is not rising (or there is no previous point to compare with).
    FlatSlope,
    /// The committed cash already reaches the exposure cap.
    ExposureCap,
    /// The proposed size is too small.
    Dust(f64),
    /// The instrument already has an open position.
    SymbolHeld,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WarmUp => write!(f, "moving averages warming up"),
            Self::NoUptrend => write!(f, "fast average not above slow average"),
            Self::BelowSlowAverage => write!(f, "price not above slow average"),
            Self::FlatSlope => write!(f, "fast average not rising"),
            Self::ExposureCap => write!(f, "exposure cap reached"),
            Self::Dust(amount) => write!(f, "entry size {amount:.4} too small"),
            Self::SymbolHeld => write!(f, "position already open"),
        }
    }
}

/// Decision of the signal evaluator for one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Signal {
    /// Open a position committing `amount` of cash.
    Enter {
        /// Cash to commit.
        amount: f64,
    },
    /// Do not open anything this cycle.
    Skip(SkipReason),
}

/// Decides whether the latest indicator point allows a new entry, and sizes it.
///
/// An entry needs the fast average above the slow one, the price above the slow average,
/// a rising fast average, room under the exposure cap and no open position on the
/// instrument. The size grows with the relative spread between the averages and is capped
/// by the available cash and the remaining exposure room.
///
/// The cap only holds at entry time: committed cash is compared with the current equity,
/// so later price moves may leave it above `max_exposure * equity`.
///
/// ### Example
/// ```rust
/// use pts_rs::prelude::*;
/// use chrono::DateTime;
///
/// let point = |fast: f64| {
///     IndicatorPointBuilder::builder()
///         .open_time(DateTime::default())
///         .open(100.0)
///         .high(111.0)
///         .low(99.0)
///         .close(110.0)
///         .fast_sma(fast)
///         .slow_sma(100.0)
///         .build()
///         .unwrap()
/// };
/// let (prev, curr) = (point(100.0), point(105.0));
/// let exposure = Exposure { equity: 50.0, committed: 0.0, available_cash: 50.0, holds_symbol: false };
///
/// let signal = evaluate(&curr, Some(&prev), 110.0, &exposure, &SessionConfig::default());
/// assert!(matches!(signal, Signal::Enter { amount } if (amount - 22.727).abs() < 1e-3));
/// ```
pub fn evaluate(
    curr: &IndicatorPoint,
    prev: Option<&IndicatorPoint>,
    price: f64,
    exposure: &Exposure,
    config: &SessionConfig,
) -> Signal {
    let Some((fast, slow)) = curr.averages() else {
        return Signal::Skip(SkipReason::WarmUp);
    };

    let spread = fast - slow;
    if spread <= 0.0 {
        return Signal::Skip(SkipReason::NoUptrend);
    }

    let max_exposure = exposure.equity * config.max_exposure;
    if exposure.committed >= max_exposure {
        return Signal::Skip(SkipReason::ExposureCap);
    }

    if price <= slow {
        return Signal::Skip(SkipReason::BelowSlowAverage);
    }

    let rising = prev.and_then(|p| p.fast_sma()).is_some_and(|prev_fast| fast > prev_fast);
    if !rising {
        return Signal::Skip(SkipReason::FlatSlope);
    }

    let spread_pct = spread / price;
    let amount = exposure
        .available_cash
        .min(max_exposure - exposure.committed)
        .min(config.sizing_base * (spread_pct * config.sizing_multiplier));

    if amount <= config.min_entry_amount {
        return Signal::Skip(SkipReason::Dust(amount));
    }

    if exposure.holds_symbol {
        return Signal::Skip(SkipReason::SymbolHeld);
    }

    Signal::Enter { amount }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;
    use crate::engine::IndicatorPointBuilder;

    fn point(fast: impl Into<Option<f64>>, slow: impl Into<Option<f64>>) -> IndicatorPoint {
        IndicatorPointBuilder::builder()
            .open_time(DateTime::default())
            .open(100.0)
            .high(111.0)
            .low(99.0)
            .close(110.0)
            .fast_sma(fast)
            .slow_sma(slow)
            .build()
            .unwrap()
    }

    fn flat() -> Exposure {
        Exposure {
            equity: 50.0,
            committed: 0.0,
            available_cash: 50.0,
            holds_symbol: false,
        }
    }

    #[test]
    fn enter_sized_by_spread() {
        let config = SessionConfig::default();
        let signal = evaluate(&point(105.0, 100.0), Some(&point(100.0, 99.0)), 110.0, &flat(), &config);

        // spread 5, 5 / 110 * 10 * 50 = 22.727..
        let Signal::Enter { amount } = signal else {
            panic!("expected an entry, got {signal:?}");
        };
        assert!((amount - 250.0 / 11.0).abs() < 1e-9);
    }

    #[test]
    fn enter_capped_by_exposure_room() {
        let config = SessionConfig::default();
        let exposure = Exposure {
            committed: 30.0,
            available_cash: 20.0,
            ..flat()
        };
        let signal = evaluate(&point(105.0, 100.0), Some(&point(100.0, 99.0)), 110.0, &exposure, &config);
        // room = 0.8 * 50 - 30 = 10
        assert_eq!(signal, Signal::Enter { amount: 10.0 });
    }

    #[test]
    fn enter_capped_by_cash() {
        let config = SessionConfig::default();
        let exposure = Exposure {
            available_cash: 5.0,
            ..flat()
        };
        let signal = evaluate(&point(105.0, 100.0), Some(&point(100.0, 99.0)), 110.0, &exposure, &config);
        assert_eq!(signal, Signal::Enter { amount: 5.0 });
    }

    #[test]
    fn skip_warm_up() {
        let config = SessionConfig::default();
        let signal = evaluate(&point(105.0, None), None, 110.0, &flat(), &config);
        assert_eq!(signal, Signal::Skip(SkipReason::WarmUp));
    }

    #[test]
    fn skip_without_uptrend() {
        let config = SessionConfig::default();
        let signal = evaluate(&point(100.0, 100.0), Some(&point(99.0, 99.0)), 110.0, &flat(), &config);
        assert_eq!(signal, Signal::Skip(SkipReason::NoUptrend));
    }

    #[test]
    fn skip_below_slow_average() {
        let config = SessionConfig::default();
        let signal = evaluate(&point(105.0, 100.0), Some(&point(100.0, 99.0)), 100.0, &flat(), &config);
        assert_eq!(signal, Signal::Skip(SkipReason::BelowSlowAverage));
    }

    #[test]
    fn skip_falling_or_unknown_slope() {
        let config = SessionConfig::default();
        let curr = point(105.0, 100.0);

        let signal = evaluate(&curr, Some(&point(106.0, 99.0)), 110.0, &flat(), &config);
        assert_eq!(signal, Signal::Skip(SkipReason::FlatSlope));

        let signal = evaluate(&curr, Some(&point(None, None)), 110.0, &flat(), &config);
        assert_eq!(signal, Signal::Skip(SkipReason::FlatSlope));

        let signal = evaluate(&curr, None, 110.0, &flat(), &config);
        assert_eq!(signal, Signal::Skip(SkipReason::FlatSlope));
    }

    #[test]
    fn skip_at_exposure_cap() {
        let config = SessionConfig::default();
        let exposure = Exposure {
            committed: 40.0,
            available_cash: 10.0,
            ..flat()
        };
        let signal = evaluate(&point(105.0, 100.0), Some(&point(100.0, 99.0)), 110.0, &exposure, &config);
        assert_eq!(signal, Signal::Skip(SkipReason::ExposureCap));
    }

    #[test]
    fn skip_dust() {
        let config = SessionConfig::default();
        // spread 0.1 -> 0.1 / 110 * 500 = 0.45
        let signal = evaluate(&point(100.1, 100.0), Some(&point(100.0, 99.0)), 110.0, &flat(), &config);
        assert!(matches!(signal, Signal::Skip(SkipReason::Dust(_))));
    }

    #[test]
    fn skip_held_symbol() {
        let config = SessionConfig::default();
        let exposure = Exposure {
            holds_symbol: true,
            ..flat()
        };
        let signal = evaluate(&point(105.0, 100.0), Some(&point(100.0, 99.0)), 110.0, &exposure, &config);
        assert_eq!(signal, Signal::Skip(SkipReason::SymbolHeld));
    }
}
