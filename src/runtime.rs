//! Single-owner actor around a [`Session`].
//!
//! One tokio task owns the session. Commands and market updates are queued on an mpsc
//! channel and applied strictly one after the other, each to completion, so no two
//! updates ever interleave on the ledger. Snapshots are published on a `watch` channel
//! and events on a `broadcast` channel.
//!
//! The actor also tracks the watched instrument. An update for a symbol that is neither
//! watched nor held is a late response for an instrument the caller switched away from,
//! and is discarded. Opening a position moves the focus to its instrument.
//!
//! ```rust
//! use pts_rs::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> pts_rs::errors::Result<()> {
//! let session = Session::new(SessionConfig::default())?;
//! let (handle, task) = spawn(session);
//!
//! handle.watch("BTCUSDT").await?;
//! handle.start().await?;
//! handle.shutdown().await?;
//!
//! let session = task.await.expect("session task panicked")?;
//! assert!(session.state().is_active);
//! assert_eq!(handle.watched().as_deref(), Some("BTCUSDT"));
//! # Ok(())
//! # }
//! ```

use tokio::{
    sync::{broadcast, mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, error, info};

use crate::{
    engine::{MarketUpdate, Session, SessionEvent, SessionState},
    errors::{Error, Result},
};

const COMMAND_CAPACITY: usize = 64;
const EVENT_CAPACITY: usize = 256;

/// Requests accepted by the session actor.
#[derive(Debug, Clone)]
pub enum Command {
    /// Start the session.
    Start,
    /// Stop the session, realizing every position.
    Stop,
    /// Apply a market update.
    Update(MarketUpdate),
    /// Record a live price without indicator data.
    Mark {
        /// Instrument symbol.
        symbol: String,
        /// Live price.
        price: f64,
    },
    /// Focus another instrument.
    Watch(String),
    /// Terminate the actor and hand the session back.
    Shutdown,
}

/// Cloneable handle to a running session actor.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<SessionState>,
    watched: watch::Receiver<Option<String>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    async fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).await.map_err(|_| Error::SessionClosed)
    }

    /// Queues a start.
    pub async fn start(&self) -> Result<()> {
        self.send(Command::Start).await
    }

    /// Queues a stop.
    pub async fn stop(&self) -> Result<()> {
        self.send(Command::Stop).await
    }

    /// Queues a market update.
    pub async fn update(&self, update: MarketUpdate) -> Result<()> {
        self.send(Command::Update(update)).await
    }

    /// Queues a live price.
    pub async fn mark(&self, symbol: impl Into<String>, price: f64) -> Result<()> {
        self.send(Command::Mark {
            symbol: symbol.into(),
            price,
        })
        .await
    }

    /// Queues a switch of the watched instrument.
    pub async fn watch(&self, symbol: impl Into<String>) -> Result<()> {
        self.send(Command::Watch(symbol.into())).await
    }

    /// Queues the termination of the actor. Commands queued before it are still applied.
    pub async fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown).await
    }

    /// Returns the latest published snapshot.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Returns a receiver notified on every published snapshot.
    pub fn state_changes(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Returns the watched instrument.
    pub fn watched(&self) -> Option<String> {
        self.watched.borrow().clone()
    }

    /// Subscribes to the session events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

/// Spawns the actor owning `session` on the current tokio runtime.
///
/// The task ends on [`Command::Shutdown`] or when every handle is dropped, and returns the
/// session. It ends with an error when the session reports a broken invariant.
pub fn spawn(session: Session) -> (SessionHandle, JoinHandle<Result<Session>>) {
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
    let (state_tx, state_rx) = watch::channel(session.state().clone());
    let (watched_tx, watched_rx) = watch::channel(None);
    let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);

    let handle = SessionHandle {
        commands: commands_tx,
        state: state_rx,
        watched: watched_rx,
        events: events_tx.clone(),
    };
    let actor = SessionActor {
        session,
        commands: commands_rx,
        state: state_tx,
        watched: watched_tx,
        events: events_tx,
    };

    (handle, tokio::spawn(actor.run()))
}

struct SessionActor {
    session: Session,
    commands: mpsc::Receiver<Command>,
    state: watch::Sender<SessionState>,
    watched: watch::Sender<Option<String>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionActor {
    async fn run(mut self) -> Result<Session> {
        while let Some(command) = self.commands.recv().await {
            if matches!(command, Command::Shutdown) {
                break;
            }
            if let Err(e) = self.handle(command) {
                error!(error = %e, "session invariant broken, stopping actor");
                return Err(e);
            }
        }
        debug!("session actor terminated");
        Ok(self.session)
    }

    fn handle(&mut self, command: Command) -> Result<()> {
        let events = match command {
            Command::Start => self.session.start(),
            Command::Stop => self.session.stop()?,
            Command::Update(update) => {
                if self.is_stale(update.symbol()) {
                    debug!(symbol = update.symbol(), "stale update discarded");
                    return Ok(());
                }
                self.session.on_market_update(&update)?
            }
            Command::Mark { symbol, price } => {
                self.session.mark_price(&symbol, price)?;
                Vec::new()
            }
            Command::Watch(symbol) => {
                self.focus(symbol);
                Vec::new()
            }
            Command::Shutdown => Vec::new(),
        };

        for event in events {
            if let SessionEvent::PositionOpened(_, position) = &event {
                self.focus(position.symbol().to_string());
            }
            // no subscriber is fine
            let _ = self.events.send(event);
        }
        self.state.send_replace(self.session.state().clone());
        Ok(())
    }

    fn is_stale(&self, symbol: &str) -> bool {
        self.watched.borrow().as_deref() != Some(symbol) && !self.session.ledger().holds(symbol)
    }

    fn focus(&self, symbol: String) {
        self.watched.send_if_modified(|watched| {
            if watched.as_deref() == Some(symbol.as_str()) {
                return false;
            }
            info!(%symbol, "watching instrument");
            *watched = Some(symbol);
            true
        });
    }
}
