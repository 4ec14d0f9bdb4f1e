//! Paper-trades the top Binance gainer until Ctrl-C, then prints the session metrics.
//!
//! ```sh
//! cargo run --example paper --features binance -- [config.toml]
//! ```

use std::{error::Error, path::PathBuf, time::Duration};

use pts_rs::prelude::*;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn Error>> {
    init_logging();

    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => Config::from_file(&path)?,
        None => Config::default(),
    };

    let client = BinanceClient::new(config.feed.clone());
    let (handle, task) = spawn(Session::new(config.session.clone())?);
    handle.start().await?;

    let mut interval = tokio::time::interval(Duration::from_secs(config.feed.poll_interval_secs));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = interval.tick() => {
                // a failed refresh skips the cycle, the session keeps its state
                if let Err(e) = poll(&client, &handle, &config.feed).await {
                    warn!(error = %e, "market data refresh failed");
                }
            }
        }
    }

    handle.stop().await?;
    handle.shutdown().await?;
    let session = task.await??;
    println!("{}", Metrics::from(&session));

    Ok(())
}

/// Refreshes the watched instrument and every held one.
async fn poll(client: &BinanceClient, handle: &SessionHandle, feed: &FeedConfig) -> pts_rs::errors::Result<()> {
    let tickers = client.tickers().await?;
    let gainers = top_gainers(&tickers, feed);

    let focus = match handle.watched() {
        Some(symbol) if gainers.iter().any(|t| t.symbol() == symbol) => Some(symbol),
        _ => gainers.first().map(|t| t.symbol().to_string()),
    };
    if let Some(symbol) = &focus {
        handle.watch(symbol.as_str()).await?;
    }

    let state = handle.state();
    let mut symbols: Vec<String> = state.positions.iter().map(|p| p.symbol().to_string()).collect();
    if let Some(symbol) = focus.filter(|symbol| !symbols.contains(symbol)) {
        symbols.push(symbol);
    }

    for symbol in &symbols {
        // a failed fetch only skips this symbol
        let klines = match client.klines(symbol).await {
            Ok(klines) => klines,
            Err(e) => {
                warn!(%symbol, error = %e, "candles unavailable, no update");
                continue;
            }
        };
        match market_update(symbol, &tickers, &klines, feed) {
            Some(update) => handle.update(update).await?,
            None => {
                if let Some(ticker) = tickers.iter().find(|t| t.symbol() == symbol.as_str()) {
                    handle.mark(symbol.as_str(), ticker.last_price()).await?;
                }
            }
        }
    }

    info!(
        cash = state.cash_balance,
        equity = state.equity,
        performance = state.initial_balance.change(state.equity),
        positions = state.positions.len(),
        "session"
    );
    Ok(())
}

fn init_logging() {
    tracing_subscriber::fmt()
        // Filter messages based on the INFO
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        // Disable colours on release builds
        .with_ansi(cfg!(debug_assertions))
        .init()
}
