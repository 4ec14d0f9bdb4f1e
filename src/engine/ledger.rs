use std::collections::{HashMap, HashSet, VecDeque, vec_deque::Iter};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::{
    engine::{Exit, Position, SessionEvent, Wallet},
    errors::{Error, Result},
};

/// Last known live price of every instrument seen by the session.
#[derive(Debug, Clone, Default)]
pub struct PriceBook(HashMap<String, f64>);

impl PriceBook {
    /// Records the live price of `symbol`.
    pub fn update(&mut self, symbol: &str, price: f64) {
        match self.0.get_mut(symbol) {
            Some(last) => *last = price,
            None => {
                self.0.insert(symbol.to_string(), price);
            }
        }
    }

    /// Returns the last known price of `symbol`.
    pub fn get(&self, symbol: &str) -> Option<f64> {
        self.0.get(symbol).copied()
    }

    fn price_of(&self, position: &Position) -> Result<f64> {
        self.get(position.symbol())
            .ok_or_else(|| Error::Unreachable(format!("no price known for open position on {}", position.symbol())))
    }
}

/// Open positions and cash of a session.
#[derive(Debug, Clone)]
pub struct Ledger {
    wallet: Wallet,
    band_percent: f64,
    positions: VecDeque<Position>,
}

impl std::ops::Deref for Ledger {
    type Target = Wallet;

    fn deref(&self) -> &Self::Target {
        &self.wallet
    }
}

impl Ledger {
    /// Creates an empty ledger.
    ///
    /// ### Arguments
    /// * `initial_balance` - Starting cash.
    /// * `band_percent` - Width of the stop-loss/take-profit band drawn around each entry.
    pub fn new(initial_balance: f64, band_percent: f64) -> Result<Self> {
        Ok(Self {
            band_percent,
            positions: VecDeque::new(),
            wallet: Wallet::new(initial_balance)?,
        })
    }

    /// Returns an iterator over the open positions, oldest first.
    pub fn positions(&self) -> Iter<'_, Position> {
        self.positions.iter()
    }

    /// Returns whether `symbol` has an open position.
    pub fn holds(&self, symbol: &str) -> bool {
        self.positions.iter().any(|p| p.symbol() == symbol)
    }

    /// Returns the cash committed to the open positions.
    pub fn exposure(&self) -> f64 {
        self.positions.iter().map(Position::amount).sum()
    }

    /// Returns the cash plus every position valued at the price of its own symbol.
    pub fn equity(&self, prices: &PriceBook) -> Result<f64> {
        let mut equity = self.wallet.balance();
        for position in &self.positions {
            equity += position.market_value(prices.price_of(position)?);
        }
        Ok(equity)
    }

    /// Opens a position and debits its amount.
    pub(crate) fn open_position(
        &mut self,
        symbol: &str,
        price: f64,
        amount: f64,
        datetime: DateTime<Utc>,
    ) -> Result<Position> {
        if self.holds(symbol) {
            return Err(Error::Unreachable(format!("second position opened on {symbol}")));
        }
        let position = Position::open(symbol, price, amount, self.band_percent, datetime)?;
        self.wallet.debit(position.amount())?;
        self.positions.push_back(position.clone());
        info!(
            id = position.id(),
            symbol,
            price,
            amount,
            stop_loss = position.stop_loss(),
            take_profit = position.take_profit(),
            "position opened"
        );
        Ok(position)
    }

    /// Applies the stop-loss and take-profit rules to the positions of `symbol`.
    ///
    /// Stopped positions are closed at their stop-loss price and credited to the wallet.
    /// Positions reaching their take-profit are replaced by their scaled value.
    pub(crate) fn execute_positions(
        &mut self,
        symbol: &str,
        candle_low: f64,
        price: f64,
        datetime: DateTime<Utc>,
    ) -> Result<Vec<SessionEvent>> {
        let mut events = Vec::new();
        let mut positions = VecDeque::with_capacity(self.positions.len());

        while let Some(position) = self.positions.pop_front() {
            if position.symbol() != symbol {
                positions.push_back(position);
                continue;
            }

            match position.check(candle_low, price) {
                Exit::StopLoss(exit_price) => {
                    let pnl = position.estimate_pnl(exit_price);
                    self.wallet.credit(position.market_value(exit_price))?;
                    info!(id = position.id(), symbol, exit_price, pnl, "position stopped out");
                    events.push(SessionEvent::PositionStopped {
                        datetime,
                        position,
                        exit_price,
                        pnl,
                    });
                }
                Exit::Scale => {
                    let scaled = position.scaled(self.band_percent);
                    info!(
                        id = scaled.id(),
                        symbol,
                        entry_price = scaled.entry_price(),
                        stop_loss = scaled.stop_loss(),
                        take_profit = scaled.take_profit(),
                        "position scaled"
                    );
                    positions.push_back(scaled.clone());
                    events.push(SessionEvent::PositionScaled {
                        datetime,
                        from: position,
                        to: scaled,
                    });
                }
                Exit::Hold => positions.push_back(position),
            }
        }

        self.positions = positions;
        Ok(events)
    }

    /// Recomputes the unrealized P&L of every position.
    pub(crate) fn mark(&mut self, prices: &PriceBook) -> Result<()> {
        let mut marked = VecDeque::with_capacity(self.positions.len());
        for position in &self.positions {
            marked.push_back(position.marked(prices.price_of(position)?));
        }
        self.positions = marked;
        Ok(())
    }

    /// Closes every position at the price of its own symbol.
    pub(crate) fn close_all_positions(
        &mut self,
        prices: &PriceBook,
        datetime: DateTime<Utc>,
    ) -> Result<Vec<SessionEvent>> {
        let mut events = Vec::with_capacity(self.positions.len());
        while let Some(position) = self.positions.pop_front() {
            let exit_price = prices.price_of(&position)?;
            let pnl = position.estimate_pnl(exit_price);
            self.wallet.credit(position.market_value(exit_price))?;
            debug!(id = position.id(), symbol = position.symbol(), exit_price, pnl, "position realized");
            events.push(SessionEvent::PositionRealized {
                datetime,
                position,
                exit_price,
                pnl,
            });
        }
        Ok(events)
    }

    /// Checks the accounting invariants.
    ///
    /// A failure means the engine itself is broken, never that market data was bad.
    pub fn check_invariants(&self) -> Result<()> {
        let balance = self.wallet.balance();
        if balance < 0.0 || !balance.is_finite() {
            return Err(Error::Unreachable(format!("cash balance is {balance}")));
        }

        let mut symbols = HashSet::with_capacity(self.positions.len());
        for position in &self.positions {
            if !symbols.insert(position.symbol()) {
                return Err(Error::Unreachable(format!(
                    "several positions open on {}",
                    position.symbol()
                )));
            }
            if !(position.quantity().is_finite() && position.quantity() > 0.0) {
                return Err(Error::Unreachable(format!(
                    "position {} has quantity {}",
                    position.id(),
                    position.quantity()
                )));
            }
        }
        Ok(())
    }

    /// Empties the ledger and restores the initial balance.
    pub(crate) fn reset(&mut self) {
        self.wallet.reset();
        self.positions = VecDeque::new();
    }
}
