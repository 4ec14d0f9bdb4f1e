pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The initial or current balance is not positive. Trading requires a positive balance.
    #[error("Balance must be positive (got: {0})")]
    NegZeroBalance(f64),

    /// The wallet does not have enough funds to open the position.
    /// Expected: {0}, Available: {1}
    #[error("Insufficient funds: required {0}, available {1}")]
    InsufficientFunds(f64, f64),

    /// A price is zero, negative or not finite.
    #[error("Price must be positive and finite (got: {0})")]
    InvalidPrice(f64),

    /// An amount is zero, negative or not finite.
    #[error("Amount must be positive and finite (got: {0})")]
    InvalidAmount(f64),

    /// A required builder field was not set.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// The candle prices are inconsistent (e.g. `high < low`).
    #[error("Invalid candle: {0}")]
    InvalidCandle(String),

    /// The configuration contains an out-of-range value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The session actor is no longer running.
    #[error("Session is closed")]
    SessionClosed,

    /// An unreachable context was encountered. This is likely a bug.
    #[error("Unreachable context (internal error): {0}")]
    Unreachable(String),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML deserialization error occurred.
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// JSON serialization/deserialization error occurred.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// HTTP request error occurred.
    #[cfg(feature = "binance")]
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}
