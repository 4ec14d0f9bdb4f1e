//! Session and market feed configuration.
//!
//! Every field has a default, so an empty TOML document yields the stock strategy:
//! a 50.00 virtual balance, an 80% exposure cap, a 1% stop-loss/take-profit band and
//! 7/25 period moving averages over hourly Binance candles.
//!
//! ```toml
//! [session]
//! initial_balance = 100.0
//! max_exposure = 0.5
//!
//! [feed]
//! interval = "15m"
//! top = 3
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Parameters of the trading session: balance, risk band and position sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Cash balance the session starts (and restarts) with.
    pub initial_balance: f64,
    /// Fraction of equity that may be committed to open positions (e.g. 0.8 for 80%).
    pub max_exposure: f64,
    /// Width of the stop-loss/take-profit band around the entry, in percent.
    pub band_percent: f64,
    /// Base notional used to size an entry from the moving average spread.
    pub sizing_base: f64,
    /// Multiplier applied to the relative spread when sizing an entry.
    pub sizing_multiplier: f64,
    /// Entries whose size is at or below this amount are discarded as dust.
    pub min_entry_amount: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            initial_balance: 50.0,
            max_exposure: 0.8,
            band_percent: 1.0,
            sizing_base: 50.0,
            sizing_multiplier: 10.0,
            min_entry_amount: 1.0,
        }
    }
}

impl SessionConfig {
    /// Checks that every value is in range.
    pub fn validate(&self) -> Result<()> {
        if !(self.initial_balance.is_finite() && self.initial_balance > 0.0) {
            return Err(Error::NegZeroBalance(self.initial_balance));
        }
        if !(self.max_exposure > 0.0 && self.max_exposure <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "max_exposure must be in (0, 1] (got: {})",
                self.max_exposure
            )));
        }
        if !(self.band_percent > 0.0 && self.band_percent < 100.0) {
            return Err(Error::InvalidConfig(format!(
                "band_percent must be in (0, 100) (got: {})",
                self.band_percent
            )));
        }
        if !(self.sizing_base.is_finite() && self.sizing_base > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "sizing_base must be positive (got: {})",
                self.sizing_base
            )));
        }
        if !(self.sizing_multiplier.is_finite() && self.sizing_multiplier > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "sizing_multiplier must be positive (got: {})",
                self.sizing_multiplier
            )));
        }
        if !(self.min_entry_amount.is_finite() && self.min_entry_amount >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "min_entry_amount must not be negative (got: {})",
                self.min_entry_amount
            )));
        }
        Ok(())
    }
}

/// Parameters of the market data collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Window of the fast simple moving average.
    pub fast_period: usize,
    /// Window of the slow simple moving average.
    pub slow_period: usize,
    /// Candle interval requested from the exchange (e.g. "1h").
    pub interval: String,
    /// Number of candles requested per refresh.
    pub limit: u16,
    /// Delay between two refreshes, in seconds.
    pub poll_interval_secs: u64,
    /// Only symbols quoted in this asset are considered.
    pub quote_asset: String,
    /// Symbols containing any of these tokens (leveraged products) are skipped.
    pub excluded_tokens: Vec<String>,
    /// Minimum 24h quote volume for a symbol to be considered liquid.
    pub min_quote_volume: f64,
    /// Number of top gainers to keep.
    pub top: usize,
    /// REST endpoint of the exchange.
    pub base_url: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            fast_period: 7,
            slow_period: 25,
            interval: "1h".to_string(),
            limit: 200,
            poll_interval_secs: 15,
            quote_asset: "USDT".to_string(),
            excluded_tokens: ["UP", "DOWN", "BULL", "BEAR"].into_iter().map(String::from).collect(),
            min_quote_volume: 10_000_000.0,
            top: 5,
            base_url: "https://api.binance.com/api/v3".to_string(),
        }
    }
}

impl FeedConfig {
    /// Checks that every value is in range.
    pub fn validate(&self) -> Result<()> {
        if self.fast_period == 0 || self.slow_period == 0 {
            return Err(Error::InvalidConfig("moving average periods must be at least 1".into()));
        }
        if self.limit == 0 {
            return Err(Error::InvalidConfig("limit must be at least 1".into()));
        }
        if self.poll_interval_secs == 0 {
            return Err(Error::InvalidConfig("poll_interval_secs must be at least 1".into()));
        }
        if self.top == 0 {
            return Err(Error::InvalidConfig("top must be at least 1".into()));
        }
        Ok(())
    }
}

/// Complete configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Session parameters.
    pub session: SessionConfig,
    /// Market data parameters.
    pub feed: FeedConfig,
}

impl Config {
    /// Loads and validates a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parses and validates a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks both sections.
    pub fn validate(&self) -> Result<()> {
        self.session.validate()?;
        self.feed.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.session.initial_balance, 50.0);
        assert_eq!(config.session.max_exposure, 0.8);
        assert_eq!(config.feed.fast_period, 7);
        assert_eq!(config.feed.slow_period, 25);
        assert_eq!(config.feed.poll_interval_secs, 15);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml(
            r#"
            [session]
            initial_balance = 100.0

            [feed]
            interval = "15m"
            top = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.session.initial_balance, 100.0);
        assert_eq!(config.session.band_percent, 1.0);
        assert_eq!(config.feed.interval, "15m");
        assert_eq!(config.feed.top, 3);
        assert_eq!(config.feed.quote_asset, "USDT");
    }

    #[test]
    fn rejects_zero_balance() {
        let result = Config::from_toml("[session]\ninitial_balance = 0.0");
        assert!(matches!(result, Err(Error::NegZeroBalance(_))));
    }

    #[test]
    fn rejects_exposure_above_one() {
        let result = Config::from_toml("[session]\nmax_exposure = 1.5");
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn rejects_zero_period() {
        let result = Config::from_toml("[feed]\nslow_period = 0");
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn rejects_malformed_toml() {
        let result = Config::from_toml("[session\ninitial_balance = 1");
        assert!(matches!(result, Err(Error::TomlError(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = Config::from_file(Path::new("/nonexistent/pts.toml"));
        assert!(matches!(result, Err(Error::IoError(_))));
    }
}
