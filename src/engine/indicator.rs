use chrono::{DateTime, Utc};

use crate::errors::{Error, Result};

/// One candle of the indicator feed: OHLC prices plus the fast and slow moving averages.
///
/// The averages are `None` while their window is still warming up.
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorPoint {
    open_time: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    fast_sma: Option<f64>,
    slow_sma: Option<f64>,
}

impl IndicatorPoint {
    /// Returns the candle opening time.
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

    /// Returns the fast moving average, if warmed up.
    pub fn fast_sma(&self) -> Option<f64> {
        self.fast_sma
    }

    /// Returns the slow moving average, if warmed up.
    pub fn slow_sma(&self) -> Option<f64> {
        self.slow_sma
    }

    /// Returns both moving averages when both are warmed up.
    pub fn averages(&self) -> Option<(f64, f64)> {
        self.fast_sma.zip(self.slow_sma)
    }
}

/// Builder for [`IndicatorPoint`].
#[derive(Debug, Default)]
pub struct IndicatorPointBuilder {
    open_time: Option<DateTime<Utc>>,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    fast_sma: Option<f64>,
    slow_sma: Option<f64>,
}

impl IndicatorPointBuilder {
    /// Starts a new builder.
    pub fn builder() -> Self {
        Self::default()
    }

    /// Sets the opening time.
    pub fn open_time(mut self, open_time: DateTime<Utc>) -> Self {
        self.open_time = Some(open_time);
        self
    }

    /// Sets the open price.
    pub fn open(mut self, open: f64) -> Self {
        self.open = Some(open);
        self
    }

    /// Sets the highest price.
    pub fn high(mut self, high: f64) -> Self {
        self.high = Some(high);
        self
    }

    /// Sets the lowest price.
    pub fn low(mut self, low: f64) -> Self {
        self.low = Some(low);
        self
    }

    /// Sets the close price.
    pub fn close(mut self, close: f64) -> Self {
        self.close = Some(close);
        self
    }

    /// Sets the fast moving average (`None` during warm-up).
    pub fn fast_sma(mut self, fast_sma: impl Into<Option<f64>>) -> Self {
        self.fast_sma = fast_sma.into();
        self
    }

    /// Sets the slow moving average (`None` during warm-up).
    pub fn slow_sma(mut self, slow_sma: impl Into<Option<f64>>) -> Self {
        self.slow_sma = slow_sma.into();
        self
    }

    /// Validates the fields and builds the point.
    pub fn build(self) -> Result<IndicatorPoint> {
        let open_time = self.open_time.ok_or(Error::MissingField("open_time"))?;
        let open = self.open.ok_or(Error::MissingField("open"))?;
        let high = self.high.ok_or(Error::MissingField("high"))?;
        let low = self.low.ok_or(Error::MissingField("low"))?;
        let close = self.close.ok_or(Error::MissingField("close"))?;

        for price in [open, high, low, close] {
            if price <= 0.0 || !price.is_finite() {
                return Err(Error::InvalidPrice(price));
            }
        }
        if high < low {
            return Err(Error::InvalidCandle(format!("high {high} is below low {low}")));
        }
        for sma in [self.fast_sma, self.slow_sma].into_iter().flatten() {
            if !sma.is_finite() {
                return Err(Error::InvalidPrice(sma));
            }
        }

        Ok(IndicatorPoint {
            open_time,
            open,
            high,
            low,
            close,
            fast_sma: self.fast_sma,
            slow_sma: self.slow_sma,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> IndicatorPointBuilder {
        IndicatorPointBuilder::builder()
            .open_time(DateTime::default())
            .open(100.0)
            .high(110.0)
            .low(95.0)
            .close(105.0)
    }

    #[test]
    fn build_warmed_up_point() {
        let point = base().fast_sma(104.0).slow_sma(101.0).build().unwrap();
        assert_eq!(point.close(), 105.0);
        assert_eq!(point.averages(), Some((104.0, 101.0)));
    }

    #[test]
    fn build_warm_up_point() {
        let point = base().fast_sma(104.0).build().unwrap();
        assert_eq!(point.fast_sma(), Some(104.0));
        assert_eq!(point.slow_sma(), None);
        assert_eq!(point.averages(), None);
    }

    #[test]
    fn missing_field() {
        let result = IndicatorPointBuilder::builder().open(1.0).build();
        assert!(matches!(result, Err(Error::MissingField("open_time"))));
    }

    #[test]
    fn high_below_low() {
        let result = base().high(90.0).build();
        assert!(matches!(result, Err(Error::InvalidCandle(_))));
    }

    #[test]
    fn non_positive_price() {
        let result = base().low(0.0).build();
        assert!(matches!(result, Err(Error::InvalidPrice(_))));

        let result = base().close(f64::NAN).build();
        assert!(matches!(result, Err(Error::InvalidPrice(_))));
    }

    #[test]
    fn non_finite_average() {
        let result = base().fast_sma(f64::INFINITY).build();
        assert!(matches!(result, Err(Error::InvalidPrice(_))));
    }
}
