use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::signal;
use crate::{
    config::SessionConfig,
    engine::*,
    errors::{Error, Result},
    metrics::EquityCurve,
};

/// One market update for one instrument: its live price and its freshest indicator series.
#[derive(Debug, Clone)]
pub struct MarketUpdate {
    symbol: String,
    price: f64,
    series: Arc<[IndicatorPoint]>,
}

impl MarketUpdate {
    /// Creates a market update.
    ///
    /// ### Arguments
    /// * `symbol` - The instrument the update is for.
    /// * `price` - The live price.
    /// * `series` - The indicator series, oldest point first.
    pub fn new(symbol: impl Into<String>, price: f64, series: Arc<[IndicatorPoint]>) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            series,
        }
    }

    /// Returns the instrument symbol.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Returns the live price.
    pub fn price(&self) -> f64 {
        self.price
    }

    /// Returns the indicator series.
    pub fn series(&self) -> &[IndicatorPoint] {
        &self.series
    }

    /// Returns the latest point and the one before it.
    pub fn latest(&self) -> Option<(&IndicatorPoint, Option<&IndicatorPoint>)> {
        match self.series.as_ref() {
            [] => None,
            [curr] => Some((curr, None)),
            [.., prev, curr] => Some((curr, Some(prev))),
        }
    }
}

/// Read-only snapshot of a session, published after every accepted command or update.
///
/// The exposure cap is enforced when a position opens. Later price moves can leave
/// [`SessionState::exposure`] above `max_exposure * equity`, which only blocks new entries.
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    /// Whether the session trades.
    pub is_active: bool,
    /// When the running session was started.
    pub started_at: Option<DateTime<Utc>>,
    /// Available cash.
    pub cash_balance: f64,
    /// Cash plus mark-to-market value of the open positions.
    pub equity: f64,
    /// Cash the session started with.
    pub initial_balance: f64,
    /// Open positions, oldest first.
    pub positions: Vec<Position>,
}

impl SessionState {
    /// Returns the most recently opened position.
    pub fn newest_position(&self) -> Option<&Position> {
        self.positions.last()
    }

    /// Returns the cash committed to the open positions.
    pub fn exposure(&self) -> f64 {
        self.positions.iter().map(Position::amount).sum()
    }

    /// Returns the sum of the unrealized P&L of the open positions.
    pub fn unrealized_pnl(&self) -> f64 {
        self.positions.iter().map(Position::unrealized_pnl).sum()
    }
}

/// The paper trading session: a start/stop state machine around a [`Ledger`].
///
/// Market updates are applied one at a time; each either leaves the session untouched
/// (inactive session, missing or warming up data) or runs the full cycle:
/// exits and scaling for the updated instrument, then the entry decision, then the
/// mark-to-market of every position.
#[derive(Debug, Clone)]
pub struct Session {
    config: SessionConfig,
    ledger: Ledger,
    prices: PriceBook,
    state: SessionState,
    events: Vec<SessionEvent>,
    equity_curve: EquityCurve,
}

impl Session {
    /// Creates an inactive session.
    ///
    /// ### Example
    /// ```rust
    /// use pts_rs::prelude::*;
    ///
    /// let mut session = Session::new(SessionConfig::default()).unwrap();
    /// assert!(!session.state().is_active);
    ///
    /// session.start();
    /// assert!(session.state().is_active);
    /// assert_eq!(session.state().cash_balance, 50.0);
    /// ```
    pub fn new(config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let ledger = Ledger::new(config.initial_balance, config.band_percent)?;
        let state = SessionState {
            is_active: false,
            started_at: None,
            cash_balance: ledger.balance(),
            equity: ledger.balance(),
            initial_balance: ledger.initial_balance(),
            positions: Vec::new(),
        };

        Ok(Self {
            ledger,
            state,
            prices: PriceBook::default(),
            events: Vec::new(),
            equity_curve: EquityCurve::new(config.initial_balance),
            config,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the latest snapshot.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Returns the ledger.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Returns the last known live prices.
    pub fn prices(&self) -> &PriceBook {
        &self.prices
    }

    /// Returns an iterator over the events recorded since the last start.
    ///
    /// `Equity` events are not journaled: they are folded into [`Session::equity_curve`].
    pub fn events(&self) -> std::slice::Iter<'_, SessionEvent> {
        self.events.iter()
    }

    /// Returns the per-cycle equity aggregates since the last start.
    pub fn equity_curve(&self) -> &EquityCurve {
        &self.equity_curve
    }

    /// Starts trading with a fresh balance. Ignored when already active.
    pub fn start(&mut self) -> Vec<SessionEvent> {
        if self.state.is_active {
            debug!("start ignored: session already active");
            return Vec::new();
        }

        let datetime = Utc::now();
        self.ledger.reset();
        self.events = Vec::new();
        self.equity_curve = EquityCurve::new(self.ledger.initial_balance());
        self.state = SessionState {
            is_active: true,
            started_at: Some(datetime),
            cash_balance: self.ledger.balance(),
            equity: self.ledger.balance(),
            initial_balance: self.ledger.initial_balance(),
            positions: Vec::new(),
        };
        info!(balance = self.ledger.balance(), "session started");

        let event = SessionEvent::Started {
            datetime,
            balance: self.ledger.balance(),
        };
        self.events.push(event.clone());
        vec![event]
    }

    /// Realizes every position at the last price of its own symbol and stops trading.
    /// Ignored when inactive.
    pub fn stop(&mut self) -> Result<Vec<SessionEvent>> {
        if !self.state.is_active {
            debug!("stop ignored: session not active");
            return Ok(Vec::new());
        }

        let datetime = Utc::now();
        let mut events = self.ledger.close_all_positions(&self.prices, datetime)?;
        self.ledger.check_invariants()?;

        let balance = self.ledger.balance();
        self.state = SessionState {
            is_active: false,
            started_at: None,
            cash_balance: balance,
            equity: balance,
            initial_balance: self.ledger.initial_balance(),
            positions: Vec::new(),
        };
        info!(
            balance,
            pnl = balance - self.ledger.initial_balance(),
            "session stopped"
        );

        events.push(SessionEvent::Stopped { datetime, balance });
        self.events.extend(events.iter().cloned());
        Ok(events)
    }

    /// Records a live price without indicator data, refreshing equity and unrealized P&L.
    ///
    /// No rule is evaluated. Ignored when inactive or when the price is not usable.
    pub fn mark_price(&mut self, symbol: &str, price: f64) -> Result<()> {
        if !self.state.is_active || !is_usable(price) {
            return Ok(());
        }
        self.prices.update(symbol, price);
        self.publish()
    }

    /// Applies one market update.
    ///
    /// Returns the events the update caused; an empty list when the update was ignored.
    /// An error means a broken accounting invariant and must be treated as fatal.
    ///
    /// ### Example
    /// ```rust
    /// use std::sync::Arc;
    ///
    /// use pts_rs::prelude::*;
    /// use chrono::DateTime;
    ///
    /// let point = |fast: f64, low: f64| {
    ///     IndicatorPointBuilder::builder()
    ///         .open_time(DateTime::default())
    ///         .open(100.0)
    ///         .high(111.0)
    ///         .low(low)
    ///         .close(110.0)
    ///         .fast_sma(fast)
    ///         .slow_sma(100.0)
    ///         .build()
    ///         .unwrap()
    /// };
    ///
    /// let mut session = Session::new(SessionConfig::default()).unwrap();
    /// session.start();
    ///
    /// let series = Arc::from_iter([point(100.0, 99.0), point(105.0, 109.0)]);
    /// session.on_market_update(&MarketUpdate::new("BTCUSDT", 110.0, series)).unwrap();
    /// assert_eq!(session.state().positions.len(), 1);
    /// ```
    pub fn on_market_update(&mut self, update: &MarketUpdate) -> Result<Vec<SessionEvent>> {
        if !self.state.is_active {
            return Ok(Vec::new());
        }
        if !is_usable(update.price()) {
            warn!(symbol = update.symbol(), price = update.price(), "unusable live price, update ignored");
            return Ok(Vec::new());
        }
        let Some((curr, prev)) = update.latest() else {
            debug!(symbol = update.symbol(), "empty indicator series, update ignored");
            return Ok(Vec::new());
        };
        if curr.averages().is_none() {
            debug!(symbol = update.symbol(), "moving averages warming up, update ignored");
            return Ok(Vec::new());
        }

        let datetime = Utc::now();
        let symbol = update.symbol();
        let price = update.price();
        self.prices.update(symbol, price);

        // exits and scaling first: sizing must see the post-exit exposure
        let mut events = self.ledger.execute_positions(symbol, curr.low(), price, datetime)?;

        let exposure = Exposure {
            equity: self.ledger.equity(&self.prices)?,
            committed: self.ledger.exposure(),
            available_cash: self.ledger.balance(),
            holds_symbol: self.ledger.holds(symbol),
        };
        match signal::evaluate(curr, prev, price, &exposure, &self.config) {
            Signal::Enter { amount } => {
                let position = self.ledger.open_position(symbol, price, amount, datetime)?;
                events.push(SessionEvent::PositionOpened(datetime, position));
            }
            Signal::Skip(reason) => debug!(symbol, %reason, "no entry"),
        }

        self.publish()?;
        self.equity_curve.record(self.state.equity);
        self.events.extend(events.iter().cloned());
        events.push(SessionEvent::Equity {
            datetime,
            balance: self.state.cash_balance,
            equity: self.state.equity,
            exposure: self.ledger.exposure(),
        });
        Ok(events)
    }

    /// Marks the positions, checks the invariants and refreshes the snapshot.
    fn publish(&mut self) -> Result<()> {
        self.ledger.mark(&self.prices)?;
        self.ledger.check_invariants()?;

        let equity = self.ledger.equity(&self.prices)?;
        if !equity.is_finite() {
            return Err(Error::Unreachable(format!("equity is {equity}")));
        }

        self.state.cash_balance = self.ledger.balance();
        self.state.equity = equity;
        self.state.positions = self.ledger.positions().cloned().collect();
        Ok(())
    }
}

fn is_usable(price: f64) -> bool {
    price > 0.0 && price.is_finite()
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    fn point(fast: impl Into<Option<f64>>, slow: impl Into<Option<f64>>, low: f64) -> IndicatorPoint {
        IndicatorPointBuilder::builder()
            .open_time(DateTime::default())
            .open(100.0)
            .high(115.0)
            .low(low)
            .close(110.0)
            .fast_sma(fast)
            .slow_sma(slow)
            .build()
            .unwrap()
    }

    fn update(symbol: &str, price: f64, points: Vec<IndicatorPoint>) -> MarketUpdate {
        MarketUpdate::new(symbol, price, Arc::from(points))
    }

    /// Uptrend at 110: fast 105 over slow 100, fast rising from 100.
    fn entry_update() -> MarketUpdate {
        update(
            "BTCUSDT",
            110.0,
            vec![point(100.0, 99.0, 99.0), point(105.0, 100.0, 109.5)],
        )
    }

    fn started() -> Session {
        let mut session = Session::new(SessionConfig::default()).unwrap();
        session.start();
        session
    }

    #[test]
    fn new_session_is_inactive() {
        let session = Session::new(SessionConfig::default()).unwrap();
        let state = session.state();
        assert!(!state.is_active);
        assert!(state.started_at.is_none());
        assert_eq!(state.cash_balance, 50.0);
        assert_eq!(state.equity, 50.0);
        assert_eq!(state.initial_balance, 50.0);
        assert!(state.positions.is_empty());
    }

    #[test]
    fn new_session_rejects_bad_config() {
        let config = SessionConfig {
            initial_balance: -1.0,
            ..SessionConfig::default()
        };
        assert!(matches!(Session::new(config), Err(Error::NegZeroBalance(_))));
    }

    #[test]
    fn start_twice_is_start_once() {
        let mut session = started();
        let once = session.state().clone();

        let events = session.start();
        assert!(events.is_empty());
        assert_eq!(session.state(), &once);
        assert!(once.is_active);
        assert!(once.started_at.is_some());
        assert_eq!(once.cash_balance, 50.0);
    }

    #[test]
    fn stop_while_inactive_is_ignored() {
        let mut session = Session::new(SessionConfig::default()).unwrap();
        let before = session.state().clone();
        assert!(session.stop().unwrap().is_empty());
        assert_eq!(session.state(), &before);
    }

    #[test]
    fn updates_ignored_while_inactive() {
        let mut session = Session::new(SessionConfig::default()).unwrap();
        let events = session.on_market_update(&entry_update()).unwrap();
        assert!(events.is_empty());
        assert!(session.state().positions.is_empty());
    }

    #[test]
    fn updates_ignored_without_data() {
        let mut session = started();
        let before = session.state().clone();

        let empty = update("BTCUSDT", 110.0, vec![]);
        assert!(session.on_market_update(&empty).unwrap().is_empty());

        let warm_up = update("BTCUSDT", 110.0, vec![point(100.0, 99.0, 99.0), point(105.0, None, 99.0)]);
        assert!(session.on_market_update(&warm_up).unwrap().is_empty());

        let mut bad_price = entry_update();
        bad_price.price = f64::NAN;
        assert!(session.on_market_update(&bad_price).unwrap().is_empty());

        assert_eq!(session.state(), &before);
    }

    #[test]
    fn scenario_entry() {
        let mut session = started();
        let events = session.on_market_update(&entry_update()).unwrap();

        let state = session.state();
        assert_eq!(state.positions.len(), 1);
        let position = state.newest_position().unwrap();
        assert_eq!(position.symbol(), "BTCUSDT");
        assert!(approx(position.amount(), 250.0 / 11.0));
        assert!(approx(position.stop_loss(), 108.9));
        assert!(approx(position.take_profit(), 111.1));
        assert!(approx(position.quantity(), 250.0 / 11.0 / 110.0));
        assert!(approx(state.cash_balance, 50.0 - 250.0 / 11.0));
        assert!(approx(state.equity, 50.0));

        assert!(matches!(events[0], SessionEvent::PositionOpened(_, _)));
        assert!(matches!(events.last(), Some(SessionEvent::Equity { .. })));
    }

    #[test]
    fn scenario_one_position_per_symbol() {
        let mut session = started();
        session.on_market_update(&entry_update()).unwrap();
        session.on_market_update(&entry_update()).unwrap();
        assert_eq!(session.state().positions.len(), 1);
    }

    #[test]
    fn scenario_stop_loss_beats_scaling() {
        let mut session = started();
        session.on_market_update(&entry_update()).unwrap();
        let position = session.state().newest_position().cloned().unwrap();
        let cash = session.state().cash_balance;

        // low 108.5 breaches the 108.9 stop; 112 is above the 111.1 take-profit.
        // the slope is falling so no new entry follows
        let crash = update(
            "BTCUSDT",
            112.0,
            vec![point(105.0, 100.0, 109.0), point(104.0, 100.0, 108.5)],
        );
        let events = session.on_market_update(&crash).unwrap();

        assert!(session.state().positions.is_empty());
        assert!(approx(
            session.state().cash_balance,
            cash + position.quantity() * position.stop_loss()
        ));
        assert!(approx(session.state().cash_balance, session.state().equity));
        assert!(matches!(events[0], SessionEvent::PositionStopped { .. }));
        assert!(!events.iter().any(|e| matches!(e, SessionEvent::PositionScaled { .. })));
    }

    #[test]
    fn scenario_exit_before_entry() {
        let mut session = started();
        session.on_market_update(&entry_update()).unwrap();
        let btc = session.state().newest_position().cloned().unwrap();

        // a wider spread takes the whole remaining room: 40 committed out of 50
        let eth = update(
            "ETHUSDT",
            110.0,
            vec![point(100.0, 99.0, 99.0), point(108.0, 100.0, 109.5)],
        );
        session.on_market_update(&eth).unwrap();
        let eth_amount = session.state().newest_position().unwrap().amount();
        assert!(approx(session.state().exposure(), 40.0));

        // low 108 stops BTC out, freeing both the symbol and the room for a new entry
        let rebound = update(
            "BTCUSDT",
            110.0,
            vec![point(100.0, 99.0, 99.0), point(105.0, 100.0, 108.0)],
        );
        let events = session.on_market_update(&rebound).unwrap();

        assert!(matches!(events[0], SessionEvent::PositionStopped { .. }));
        assert!(matches!(events[1], SessionEvent::PositionOpened(..)));
        assert!(matches!(events[2], SessionEvent::Equity { .. }));
        assert_eq!(events.len(), 3);

        let cash_after_stop = 10.0 + btc.quantity() * 108.9;
        let room = 0.8 * (cash_after_stop + eth_amount) - eth_amount;
        let reopened = session.state().newest_position().unwrap();
        assert_eq!(reopened.symbol(), "BTCUSDT");
        assert!(approx(reopened.amount(), room));
        assert!(reopened.amount() < btc.amount());
        assert_eq!(session.state().positions.len(), 2);
    }

    #[test]
    fn equity_folded_into_curve() {
        let mut session = started();
        session.on_market_update(&entry_update()).unwrap();
        session.on_market_update(&entry_update()).unwrap();

        assert_eq!(session.equity_curve().samples(), 2);
        assert!(!session.events().any(|e| matches!(e, SessionEvent::Equity { .. })));

        session.stop().unwrap();
        session.start();
        assert_eq!(session.equity_curve().samples(), 0);
    }

    #[test]
    fn scenario_scaling() {
        let mut session = started();
        session.on_market_update(&entry_update()).unwrap();
        let opened = session.state().newest_position().cloned().unwrap();

        let rally = update(
            "BTCUSDT",
            111.5,
            vec![point(105.0, 100.0, 109.0), point(106.0, 100.0, 110.0)],
        );
        session.on_market_update(&rally).unwrap();

        let state = session.state();
        assert_eq!(state.positions.len(), 1);
        let scaled = state.newest_position().unwrap();
        assert!(approx(scaled.entry_price(), 111.1));
        assert!(approx(scaled.stop_loss(), 109.989));
        assert!(approx(scaled.take_profit(), 112.211));
        assert_eq!(scaled.quantity(), opened.quantity());
        assert_eq!(scaled.amount(), opened.amount());
        assert_eq!(scaled.original_entry_price(), 110.0);
        assert!(approx(scaled.unrealized_pnl(), opened.quantity() * 111.5 - opened.amount()));
        assert!(approx(state.equity, state.cash_balance + opened.quantity() * 111.5));
    }

    #[test]
    fn scenario_stop_realizes_at_market() {
        let mut session = started();
        session.on_market_update(&entry_update()).unwrap();
        let position = session.state().newest_position().cloned().unwrap();
        let cash = session.state().cash_balance;

        session.mark_price("BTCUSDT", 111.5).unwrap();
        let events = session.stop().unwrap();

        let state = session.state();
        assert!(!state.is_active);
        assert!(state.started_at.is_none());
        assert!(state.positions.is_empty());
        assert!(approx(state.cash_balance, cash + position.quantity() * 111.5));
        assert_eq!(state.equity, state.cash_balance);
        // realized gain of ~0.31 on the position
        assert!(approx(state.cash_balance - 50.0, position.quantity() * 111.5 - position.amount()));
        assert!((state.cash_balance - 50.0 - 0.3099).abs() < 1e-3);

        assert!(matches!(events[0], SessionEvent::PositionRealized { .. }));
        assert!(matches!(events.last(), Some(SessionEvent::Stopped { .. })));
    }

    #[test]
    fn restart_resets_to_initial_balance() {
        let mut session = started();
        session.on_market_update(&entry_update()).unwrap();
        session.mark_price("BTCUSDT", 100.0).unwrap();
        session.stop().unwrap();
        assert!(session.state().cash_balance < 50.0);

        session.start();
        assert_eq!(session.state().cash_balance, 50.0);
        assert_eq!(session.state().equity, 50.0);
        assert!(session.state().positions.is_empty());
        assert_eq!(session.events().count(), 1);
    }

    #[test]
    fn positions_survive_instrument_switch() {
        let mut session = started();
        session.on_market_update(&entry_update()).unwrap();

        // ETH in a downtrend: no entry, BTC position untouched
        let eth = update(
            "ETHUSDT",
            10.0,
            vec![point(9.0, 10.0, 1.0), point(8.0, 10.0, 1.0)],
        );
        let events = session.on_market_update(&eth).unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(session.state().positions.len(), 1);
        assert_eq!(session.state().newest_position().unwrap().symbol(), "BTCUSDT");
        assert!(approx(session.state().equity, 50.0));
    }

    #[test]
    fn latest_points() {
        let single = update("BTCUSDT", 1.0, vec![point(1.0, 1.0, 1.0)]);
        let (curr, prev) = single.latest().unwrap();
        assert_eq!(curr.fast_sma(), Some(1.0));
        assert!(prev.is_none());

        let double = update("BTCUSDT", 1.0, vec![point(1.0, 1.0, 1.0), point(2.0, 1.0, 1.0)]);
        let (curr, prev) = double.latest().unwrap();
        assert_eq!(curr.fast_sma(), Some(2.0));
        assert_eq!(prev.and_then(|p| p.fast_sma()), Some(1.0));

        assert!(update("BTCUSDT", 1.0, vec![]).latest().is_none());
    }
}
