//! # PTS: Paper Trading Session for a momentum strategy
//!
//! **PTS** is a Rust library that paper-trades a two moving average momentum strategy on
//! live market data. It opens, scales and closes virtual positions against a virtual cash
//! balance and reports equity and P&L, without ever routing a real order.
//!
//! ## Core Components
//! | Component   | Description                                                                                     |
//! |-------------|-------------------------------------------------------------------------------------------------|
//! | **`IndicatorPoint`** | A candle with its fast and slow simple moving averages.                                |
//! | **`Position`** | An open long trade with a 1% stop-loss/take-profit band.                                     |
//! | **`Wallet`** | Tracks the virtual cash.                                                                       |
//! | **`Ledger`** | Open positions, exposure and equity accounting.                                                |
//! | **`Session`** | The start/stop state machine applying market updates.                                         |
//! | **`Metrics`** | Realized P&L, drawdown, profit factor, Sharpe ratio, win rate.                                |
//! | **`runtime`** | A single-owner actor serializing commands and updates into a session.                         |
//!
//! ## Strategy
//! On every market update for an instrument:
//! 1. Its positions whose stop-loss was breached by the candle low are closed at the stop-loss.
//! 2. Its positions whose take-profit was reached by the live price are re-based: the take-profit
//!    becomes the new entry and a new band is drawn around it.
//! 3. A new position is opened when the fast average is above and rising, the price is above
//!    the slow average, less than 80% of the equity is committed and the instrument has no
//!    open position. Its size follows the spread between the averages.
//!
//! ## Getting Started
//! ```rust
//! use std::sync::Arc;
//!
//! use pts_rs::prelude::*;
//! use chrono::DateTime;
//!
//! let point = |fast: f64| {
//!     IndicatorPointBuilder::builder()
//!         .open_time(DateTime::default())
//!         .open(100.0)
//!         .high(111.0)
//!         .low(109.0)
//!         .close(110.0)
//!         .fast_sma(fast)
//!         .slow_sma(100.0)
//!         .build()
//!         .unwrap()
//! };
//!
//! let mut session = Session::new(SessionConfig::default()).unwrap();
//! session.start();
//!
//! let update = MarketUpdate::new("BTCUSDT", 110.0, Arc::from_iter([point(100.0), point(105.0)]));
//! let events = session.on_market_update(&update).unwrap();
//! assert!(matches!(events[0], SessionEvent::PositionOpened(..)));
//!
//! session.stop().unwrap();
//! println!("{}", Metrics::from(&session));
//! ```
//!
//! ## Features
//! | Feature     | Description                                                                                     |
//! |-------------|-------------------------------------------------------------------------------------------------|
//! | `runtime` *(default)* | The tokio session actor.                                                              |
//! | `binance`   | An async Binance REST client for tickers and candles.                                           |
//! | `serialize` | `Serialize`/`Deserialize` for positions, snapshots and events.                                  |
//!
//! ## Error Handling
//! Missing or warming up market data is never an error: the update is ignored and the previous
//! state is kept. Errors are returned for invalid configurations and inputs, and
//! `Error::Unreachable` reports a broken accounting invariant, which is a bug.
//!
//! ## License
//! MIT
#![warn(missing_docs)]

/// Core paper trading components: positions, wallet, ledger and session.
pub mod engine;

/// Error types for the library.
pub mod errors;

/// Session and feed configuration.
pub mod config;

/// Market data parsing and fetching.
pub mod feed;

/// Moving average enrichment.
pub mod indicators;

/// Performance metrics: drawdown, Sharpe ratio, win rate, etc.
pub mod metrics;

/// Single-owner session actor.
#[cfg(feature = "runtime")]
pub mod runtime;

/// Utility functions and helpers.
mod utils;

/// Re-exports of commonly used types and traits for convenience.
pub mod prelude {
    pub use super::*;
    pub use crate::config::*;
    pub use crate::engine::*;
    pub use crate::errors::*;
    pub use crate::feed::*;
    pub use crate::indicators::*;
    pub use crate::metrics::*;

    #[cfg(feature = "runtime")]
    pub use crate::runtime::*;
}

use std::ops::{Add, Div, Mul, Sub};

/// Trait for performing percentage-based calculations.
///
/// This trait provides methods to add, subtract, and calculate percentages
/// for numeric types, enabling common financial calculations.
pub trait PercentCalculus<Rhs = Self> {
    /// Adds a percentage to the value.
    ///
    /// ### Arguments
    /// * `rhs` - The percentage to add (e.g., 10.0 for 10%).
    ///
    /// ### Returns
    /// The value increased by the given percentage.
    fn addpercent(self, rhs: Rhs) -> Self;

    /// Subtracts a percentage from the value.
    ///
    /// ### Arguments
    /// * `rhs` - The percentage to subtract (e.g., 10.0 for 10%).
    ///
    /// ### Returns
    /// The value decreased by the given percentage.
    fn subpercent(self, rhs: Rhs) -> Self;

    /// Calculates the percentage change between two values.
    ///
    /// ### Arguments
    /// * `new` - The new value to compare with.
    ///
    /// ### Returns
    /// The percentage change from the original value to the new value.
    fn change(self, new: Self) -> Self;
}

impl PercentCalculus for f64 {
    fn addpercent(self, percent: Self) -> Self {
        self.add(self.mul(percent.div(100.0)))
    }

    fn subpercent(self, percent: Self) -> Self {
        self.sub(self.mul(percent.div(100.0)))
    }

    fn change(self, new: Self) -> Self {
        new.sub(self).div(self).mul(100.0)
    }
}

#[cfg(test)]
mod percent {
    use super::*;

    #[test]
    fn add() {
        assert_eq!(110.0, 100.0.addpercent(10.0))
    }

    #[test]
    fn sub() {
        assert_eq!(90.0, 100.0.subpercent(10.0))
    }

    #[test]
    fn change() {
        assert_eq!(10.0, 100.0.change(110.0))
    }
}
