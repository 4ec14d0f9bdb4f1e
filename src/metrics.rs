//! Performance metrics of a trading session.
//!
//! This module provides tools to calculate, from the session event journal and its
//! equity curve:
//! - Realized profit and loss
//! - Max drawdown of the equity
//! - Profit factor
//! - Sharpe ratio of the per-cycle equity returns
//! - Win rate

use std::fmt;

use crate::engine::{Session, SessionEvent};

/// Running aggregates of the per-cycle equity: peak, max drawdown and return moments.
///
/// Each cycle is folded in on arrival, so a long session keeps constant memory.
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct EquityCurve {
    last: f64,
    peak: f64,
    max_drawdown: f64,
    samples: usize,
    mean_return: f64,
    // sum of squared deviations of the returns (Welford)
    m2: f64,
}

impl EquityCurve {
    /// Creates an empty curve starting at `initial_balance`.
    pub fn new(initial_balance: f64) -> Self {
        Self {
            last: initial_balance,
            peak: initial_balance,
            max_drawdown: 0.0,
            samples: 0,
            mean_return: 0.0,
            m2: 0.0,
        }
    }

    /// Folds in the equity of one cycle.
    pub fn record(&mut self, equity: f64) {
        if equity > self.peak {
            self.peak = equity;
        }
        let drawdown = (self.peak - equity) / self.peak;
        if drawdown > self.max_drawdown {
            self.max_drawdown = drawdown;
        }

        let r = (equity - self.last) / self.last;
        self.samples += 1;
        let delta = r - self.mean_return;
        self.mean_return += delta / self.samples as f64;
        self.m2 += delta * (r - self.mean_return);
        self.last = equity;
    }

    /// Returns the number of recorded cycles.
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Returns the maximum drawdown as a percentage.
    pub fn max_drawdown(&self) -> f64 {
        self.max_drawdown * 100.0
    }

    /// Returns the Sharpe ratio of the per-cycle returns, NaN without any cycle.
    pub fn sharpe_ratio(&self, risk_free_rate: f64) -> f64 {
        if self.samples == 0 {
            return f64::NAN;
        }
        let std_dev = (self.m2 / self.samples as f64).sqrt();
        (self.mean_return - risk_free_rate) / std_dev
    }
}

/// A collection of trading metrics calculated from a series of session events.
///
/// `Metrics` is typically constructed from a `Session`, or from a list of events.
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Metrics {
    balance: f64,
    equity: f64,
    initial_balance: f64,
    events: Vec<SessionEvent>,
    curve: EquityCurve,
}

impl From<&Session> for Metrics {
    fn from(value: &Session) -> Self {
        let state = value.state();
        Self {
            balance: state.cash_balance,
            equity: state.equity,
            initial_balance: state.initial_balance,
            events: value.events().cloned().collect(),
            curve: value.equity_curve().clone(),
        }
    }
}

impl Metrics {
    /// Creates a new `Metrics` instance from a list of events, an initial balance, a cash balance and an equity.
    ///
    /// The `Equity` events of the list make up the equity curve.
    pub fn new(events: Vec<SessionEvent>, initial_balance: f64, balance: f64, equity: f64) -> Self {
        let mut curve = EquityCurve::new(initial_balance);
        for event in &events {
            if let SessionEvent::Equity { equity, .. } = event {
                curve.record(*equity);
            }
        }

        Self {
            balance,
            equity,
            events,
            initial_balance,
            curve,
        }
    }

    /// Returns the initial balance.
    pub fn initial_balance(&self) -> f64 {
        self.initial_balance
    }

    /// Returns the events.
    pub fn events(&self) -> std::slice::Iter<'_, SessionEvent> {
        self.events.iter()
    }

    /// Returns the cash balance.
    pub fn balance(&self) -> f64 {
        self.balance
    }

    /// Returns the equity.
    pub fn equity(&self) -> f64 {
        self.equity
    }

    fn closed_pnls(&self) -> impl Iterator<Item = f64> + '_ {
        self.events.iter().filter_map(SessionEvent::realized_pnl)
    }

    /// Returns the number of closed positions.
    pub fn closed_trades(&self) -> usize {
        self.closed_pnls().count()
    }

    /// Returns the sum of the realized profits and losses.
    pub fn realized_pnl(&self) -> f64 {
        self.closed_pnls().sum()
    }

    /// Computes the maximum drawdown of the equity as a percentage.
    pub fn max_drawdown(&self) -> f64 {
        self.curve.max_drawdown()
    }

    /// Computes the profit factor.
    pub fn profit_factor(&self) -> f64 {
        let mut total_gains = 0.0;
        let mut total_losses = 0.0;

        for pnl in self.closed_pnls() {
            if pnl > 0.0 {
                total_gains += pnl;
            } else {
                total_losses += pnl.abs();
            }
        }

        if total_losses == 0.0 {
            return f64::INFINITY;
        }

        total_gains / total_losses
    }

    /// Computes the Sharpe ratio of the per-cycle equity returns.
    ///
    /// `risk_free_rate` is the per-cycle risk-free return (e.g., 0.0 for simplicity).
    /// Without equity updates the ratio is undefined and NaN is returned.
    pub fn sharpe_ratio(&self, risk_free_rate: f64) -> f64 {
        self.curve.sharpe_ratio(risk_free_rate)
    }

    /// Computes the win rate as a percentage of winning trades.
    pub fn win_rate(&self) -> f64 {
        let total_trades = self.closed_trades();
        if total_trades == 0 {
            return 0.0;
        }

        let winning_trades = self.closed_pnls().filter(|pnl| *pnl > 0.0).count();
        (winning_trades as f64 / total_trades as f64) * 100.0
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Session Metrics ===")?;
        writeln!(f, "Initial Balance: {:.2}", self.initial_balance)?;
        writeln!(f, "Cash Balance: {:.2}", self.balance)?;
        writeln!(f, "Equity: {:.2}", self.equity)?;
        writeln!(f, "Realized P&L: {:.2}", self.realized_pnl())?;
        writeln!(f, "Closed Trades: {}", self.closed_trades())?;
        writeln!(f, "Cycles: {}", self.curve.samples())?;
        #[allow(clippy::writeln_empty_string)]
        writeln!(f, "")?;
        writeln!(f, "Max Drawdown: {:.2}%", self.max_drawdown())?;
        writeln!(f, "Profit Factor: {:.2}", self.profit_factor())?;
        writeln!(f, "Sharpe Ratio (risk-free rate = 0.0): {:.2}", self.sharpe_ratio(0.0))?;
        writeln!(f, "Win Rate: {:.2}%", self.win_rate())
    }
}
