use chrono::{DateTime, Utc};

use crate::engine::Position;

/// State transitions of a trading session.
///
/// Each accepted command or market update emits the events it caused, in order.
/// Observers use them instead of diffing snapshots, e.g. to focus the instrument of a
/// freshly opened position.
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The session was started with a fresh balance.
    Started {
        /// Moment
        datetime: DateTime<Utc>,
        /// Starting cash.
        balance: f64,
    },

    /// The session was stopped and every position realized.
    Stopped {
        /// Moment
        datetime: DateTime<Utc>,
        /// Cash after realizing the positions.
        balance: f64,
    },

    /// A new position was opened.
    PositionOpened(DateTime<Utc>, Position),

    /// A position hit its take-profit and was re-based.
    PositionScaled {
        /// Moment
        datetime: DateTime<Utc>,
        /// The position before scaling.
        from: Position,
        /// The position after scaling.
        to: Position,
    },

    /// A position hit its stop-loss and was closed.
    PositionStopped {
        /// Moment
        datetime: DateTime<Utc>,
        /// The closed position.
        position: Position,
        /// Price the position was closed at.
        exit_price: f64,
        /// Realized profit and loss.
        pnl: f64,
    },

    /// A position was closed at market when the session stopped.
    PositionRealized {
        /// Moment
        datetime: DateTime<Utc>,
        /// The closed position.
        position: Position,
        /// Price the position was closed at.
        exit_price: f64,
        /// Realized profit and loss.
        pnl: f64,
    },

    /// Accounting after a market update was applied.
    Equity {
        /// Moment
        datetime: DateTime<Utc>,
        /// Available cash.
        balance: f64,
        /// Cash plus mark-to-market value of the positions.
        equity: f64,
        /// Cash committed to open positions.
        exposure: f64,
    },
}

impl SessionEvent {
    /// Returns the realized P&L for events closing a position.
    pub fn realized_pnl(&self) -> Option<f64> {
        match self {
            Self::PositionStopped { pnl, .. } | Self::PositionRealized { pnl, .. } => Some(*pnl),
            _ => None,
        }
    }
}
