use chrono::{DateTime, Utc};

use crate::{
    PercentCalculus,
    errors::{Error, Result},
    utils::random_id,
};

/// Outcome of checking a position against one market update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Exit {
    /// The candle low breached the stop-loss: close at the stop-loss price.
    StopLoss(f64),
    /// The live price reached the take-profit: re-base the band around it.
    Scale,
    /// Nothing to do.
    Hold,
}

/// An open long position with a fixed quantity and a stop-loss/take-profit band.
///
/// Only the band (`entry_price`, `stop_loss`, `take_profit`) moves, and only by
/// replacing the whole value through [`Position::scaled`].
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    id: u32,
    symbol: String,
    entry_price: f64,
    original_entry_price: f64,
    amount: f64,
    quantity: f64,
    stop_loss: f64,
    take_profit: f64,
    opened_at: DateTime<Utc>,
    unrealized_pnl: f64,
}

impl Position {
    /// Opens a position committing `amount` of cash at `price`.
    ///
    /// The band is `price ± band_percent%`.
    pub fn open(
        symbol: impl Into<String>,
        price: f64,
        amount: f64,
        band_percent: f64,
        opened_at: DateTime<Utc>,
    ) -> Result<Self> {
        if price <= 0.0 || !price.is_finite() {
            return Err(Error::InvalidPrice(price));
        }
        if amount <= 0.0 || !amount.is_finite() {
            return Err(Error::InvalidAmount(amount));
        }

        Ok(Self {
            id: random_id(),
            symbol: symbol.into(),
            entry_price: price,
            original_entry_price: price,
            amount,
            quantity: amount / price,
            stop_loss: price.subpercent(band_percent),
            take_profit: price.addpercent(band_percent),
            opened_at,
            unrealized_pnl: 0.0,
        })
    }

    /// Returns the position id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns the instrument symbol.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Returns the current entry price (the last scaling level).
    pub fn entry_price(&self) -> f64 {
        self.entry_price
    }

    /// Returns the price the position was opened at.
    pub fn original_entry_price(&self) -> f64 {
        self.original_entry_price
    }

    /// Returns the cash committed at opening.
    pub fn amount(&self) -> f64 {
        self.amount
    }

    /// Returns the held quantity.
    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    /// Returns the stop-loss price.
    pub fn stop_loss(&self) -> f64 {
        self.stop_loss
    }

    /// Returns the take-profit price.
    pub fn take_profit(&self) -> f64 {
        self.take_profit
    }

    /// Returns when the position was opened.
    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// Returns the unrealized P&L computed at the last mark.
    pub fn unrealized_pnl(&self) -> f64 {
        self.unrealized_pnl
    }

    /// Returns the value of the position at `price`.
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    /// Returns the profit or loss if the position were closed at `price`.
    pub fn estimate_pnl(&self, price: f64) -> f64 {
        self.market_value(price) - self.amount
    }

    /// Decides what a market update does to this position.
    ///
    /// The stop-loss is checked against the candle low and wins over the take-profit,
    /// which is checked against the live price.
    pub fn check(&self, candle_low: f64, price: f64) -> Exit {
        if candle_low <= self.stop_loss {
            Exit::StopLoss(self.stop_loss)
        } else if price >= self.take_profit {
            Exit::Scale
        } else {
            Exit::Hold
        }
    }

    /// Returns the position re-based on its take-profit: the old take-profit becomes
    /// the entry and a new band is drawn around it.
    pub fn scaled(&self, band_percent: f64) -> Self {
        let entry_price = self.take_profit;
        Self {
            entry_price,
            stop_loss: entry_price.subpercent(band_percent),
            take_profit: entry_price.addpercent(band_percent),
            ..self.clone()
        }
    }

    /// Returns the position with its unrealized P&L marked at `price`.
    pub fn marked(&self, price: f64) -> Self {
        Self {
            unrealized_pnl: self.estimate_pnl(price),
            ..self.clone()
        }
    }
}
