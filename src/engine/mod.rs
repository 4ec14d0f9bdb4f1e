//! Core paper trading engine components.
//!
//! This module provides the fundamental types of a trading session:
//! - `IndicatorPoint`: a candle enriched with its fast and slow moving averages.
//! - `Position`: an open trade with a stop-loss/take-profit band.
//! - `Wallet`: the virtual cash.
//! - `Ledger`: the open positions and their accounting.
//! - `Session`: the start/stop state machine applying market updates.

mod event;
mod indicator;
mod ledger;
mod position;
mod session;
mod signal;
mod wallet;

pub use event::*;
pub use indicator::*;
pub use ledger::*;
pub use position::*;
pub use session::*;
pub use signal::*;
pub use wallet::*;
