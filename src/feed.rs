//! Market data from the Binance REST API: 24h tickers and candles.
//!
//! A malformed ticker is skipped with a warning: that symbol simply has no update.
//! A malformed candle rejects the whole series, since dropping it would shift the latest
//! point and the moving average windows.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::{
    config::FeedConfig,
    engine::MarketUpdate,
    errors::{Error, Result},
    indicators,
};

/// 24h statistics of one symbol.
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Ticker {
    symbol: String,
    last_price: f64,
    price_change_percent: f64,
    volume: f64,
    quote_volume: f64,
    count: u64,
}

impl Ticker {
    /// Creates a ticker.
    pub fn new(symbol: impl Into<String>, last_price: f64, price_change_percent: f64, quote_volume: f64) -> Self {
        Self {
            symbol: symbol.into(),
            last_price,
            price_change_percent,
            volume: 0.0,
            quote_volume,
            count: 0,
        }
    }

    /// Returns the symbol.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Returns the last traded price.
    pub fn last_price(&self) -> f64 {
        self.last_price
    }

    /// Returns the 24h change in percent.
    pub fn price_change_percent(&self) -> f64 {
        self.price_change_percent
    }

    /// Returns the 24h base volume.
    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Returns the 24h quote volume.
    pub fn quote_volume(&self) -> f64 {
        self.quote_volume
    }

    /// Returns the 24h number of trades.
    pub fn count(&self) -> u64 {
        self.count
    }
}

// Binance encodes prices and volumes as strings.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTicker {
    symbol: String,
    last_price: String,
    price_change_percent: String,
    #[serde(default)]
    volume: Option<String>,
    quote_volume: String,
    #[serde(default)]
    count: u64,
}

impl TryFrom<RawTicker> for Ticker {
    type Error = String;

    fn try_from(raw: RawTicker) -> std::result::Result<Self, Self::Error> {
        let number = |field: &str, value: &str| {
            value
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| format!("{}: bad {field} {value:?}", raw.symbol))
        };

        Ok(Self {
            last_price: number("lastPrice", &raw.last_price)?,
            price_change_percent: number("priceChangePercent", &raw.price_change_percent)?,
            volume: raw.volume.as_deref().map(|v| number("volume", v)).transpose()?.unwrap_or(0.0),
            quote_volume: number("quoteVolume", &raw.quote_volume)?,
            count: raw.count,
            symbol: raw.symbol,
        })
    }
}

/// One raw candle.
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kline {
    open_time: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    close_time: DateTime<Utc>,
}

impl Kline {
    /// Creates a candle.
    pub fn new(
        open_time: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        close_time: DateTime<Utc>,
    ) -> Self {
        Self {
            open_time,
            open,
            high,
            low,
            close,
            volume,
            close_time,
        }
    }

    /// Returns the opening time.
    pub fn open_time(&self) -> DateTime<Utc> {
        self.open_time
    }

    /// Returns the open price.
    pub fn open(&self) -> f64 {
        self.open
    }

    /// Returns the highest price.
    pub fn high(&self) -> f64 {
        self.high
    }

    /// Returns the lowest price.
    pub fn low(&self) -> f64 {
        self.low
    }

    /// Returns the close price.
    pub fn close(&self) -> f64 {
        self.close
    }

    /// Returns the base volume.
    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Returns the closing time.
    pub fn close_time(&self) -> DateTime<Utc> {
        self.close_time
    }

    // [openTime, "open", "high", "low", "close", "volume", closeTime, ...]
    fn from_row(row: &[Value]) -> Option<Self> {
        let time = |i: usize| row.get(i)?.as_i64().and_then(DateTime::from_timestamp_millis);
        let price = |i: usize| row.get(i)?.as_str()?.parse::<f64>().ok().filter(|v| v.is_finite());

        Some(Self {
            open_time: time(0)?,
            open: price(1)?,
            high: price(2)?,
            low: price(3)?,
            close: price(4)?,
            volume: price(5)?,
            close_time: time(6)?,
        })
    }
}

/// Parses the response of `GET /ticker/24hr`.
pub fn parse_tickers(json: &str) -> Result<Vec<Ticker>> {
    let values: Vec<Value> = serde_json::from_str(json)?;
    Ok(values
        .into_iter()
        .filter_map(|value| {
            let ticker = serde_json::from_value::<RawTicker>(value)
                .map_err(|e| e.to_string())
                .and_then(Ticker::try_from);
            match ticker {
                Ok(ticker) => Some(ticker),
                Err(e) => {
                    warn!(error = %e, "skipping malformed ticker");
                    None
                }
            }
        })
        .collect())
}

/// Parses the response of `GET /klines`.
///
/// Fails on the first malformed row: a series with a gap is not usable.
pub fn parse_klines(json: &str) -> Result<Vec<Kline>> {
    let rows: Vec<Vec<Value>> = serde_json::from_str(json)?;
    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            Kline::from_row(row).ok_or_else(|| {
                warn!(index, ?row, "malformed kline, series rejected");
                Error::InvalidCandle(format!("malformed kline at row {index}"))
            })
        })
        .collect()
}

/// Keeps the liquid, non-leveraged symbols of the quote asset, best 24h change first.
pub fn top_gainers(tickers: &[Ticker], config: &FeedConfig) -> Vec<Ticker> {
    let mut gainers = tickers
        .iter()
        .filter(|t| t.symbol.ends_with(&config.quote_asset))
        .filter(|t| !config.excluded_tokens.iter().any(|token| t.symbol.contains(token.as_str())))
        .filter(|t| t.quote_volume > config.min_quote_volume)
        .cloned()
        .collect::<Vec<_>>();

    gainers.sort_by(|a, b| b.price_change_percent.total_cmp(&a.price_change_percent));
    gainers.truncate(config.top);
    gainers
}

/// Joins the live price of `symbol` with its enriched candles.
///
/// Returns `None` when the symbol has no ticker or no candles: there is no update this cycle.
pub fn market_update(symbol: &str, tickers: &[Ticker], klines: &[Kline], config: &FeedConfig) -> Option<MarketUpdate> {
    let ticker = tickers.iter().find(|t| t.symbol == symbol)?;
    if klines.is_empty() {
        return None;
    }

    match indicators::enrich(klines, config.fast_period, config.slow_period) {
        Ok(points) => Some(MarketUpdate::new(symbol, ticker.last_price, Arc::from(points))),
        Err(e) => {
            warn!(symbol, error = %e, "malformed candles, no update");
            None
        }
    }
}

/// Async client of the Binance spot REST API.
#[cfg(feature = "binance")]
#[derive(Debug, Clone)]
pub struct BinanceClient {
    http: reqwest::Client,
    config: FeedConfig,
}

#[cfg(feature = "binance")]
impl BinanceClient {
    /// Creates a client using `config.base_url`.
    pub fn new(config: FeedConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Fetches the 24h statistics of every symbol.
    pub async fn tickers(&self) -> Result<Vec<Ticker>> {
        let url = format!("{}/ticker/24hr", self.config.base_url);
        let body = self.http.get(url).send().await?.error_for_status()?.text().await?;
        parse_tickers(&body)
    }

    /// Fetches the latest candles of `symbol` with the configured interval and limit.
    pub async fn klines(&self, symbol: &str) -> Result<Vec<Kline>> {
        let url = format!("{}/klines", self.config.base_url);
        let limit = self.config.limit.to_string();
        let query = [
            ("symbol", symbol),
            ("interval", self.config.interval.as_str()),
            ("limit", limit.as_str()),
        ];
        let body = self
            .http
            .get(url)
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_klines(&body)
    }

    /// Fetches the top gainers.
    pub async fn top_gainers(&self) -> Result<Vec<Ticker>> {
        let tickers = self.tickers().await?;
        Ok(top_gainers(&tickers, &self.config))
    }
}
