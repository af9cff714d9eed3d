//! Ingress validation: the data-integrity boundary.
//!
//! Malformed or out-of-range payloads are rejected here with a typed
//! error and a log line; nothing invalid ever reaches aggregator state.

use flowtrader_core::{AccountSnapshot, DepthSnapshot, Error, IngressConfig, RawTick, Result};
use tracing::warn;

/// Validates raw bridge payloads before they touch the pipeline.
pub struct IngressValidator {
    price_min: f64,
    price_max: f64,
}

impl IngressValidator {
    /// Create a validator from the configured price band.
    pub fn new(config: &IngressConfig) -> Self {
        Self {
            price_min: config.price_min,
            price_max: config.price_max,
        }
    }

    /// Validate a raw transaction event.
    pub fn validate_tick(&self, tick: &RawTick) -> Result<()> {
        if !tick.price.is_finite() || !tick.size.is_finite() {
            return self.reject(format!(
                "non-finite tick: price={} size={}",
                tick.price, tick.size
            ));
        }
        if tick.size <= 0.0 {
            return self.reject(format!("non-positive tick size: {}", tick.size));
        }
        if tick.price < self.price_min || tick.price > self.price_max {
            return self.reject(format!(
                "tick price {} outside [{}, {}]",
                tick.price, self.price_min, self.price_max
            ));
        }
        // Quote fields are advisory for classification; only reject
        // actively poisonous values.
        if !tick.bid.is_finite() || !tick.ask.is_finite() {
            return self.reject(format!(
                "non-finite quote: bid={} ask={}",
                tick.bid, tick.ask
            ));
        }
        Ok(())
    }

    /// Validate a depth-of-book snapshot.
    pub fn validate_depth(&self, depth: &DepthSnapshot) -> Result<()> {
        if depth.bids.is_empty() && depth.asks.is_empty() {
            return self.reject("empty depth snapshot".to_string());
        }
        for level in depth.bids.iter().chain(depth.asks.iter()) {
            if !level.price.is_finite() || !level.size.is_finite() || level.size < 0.0 {
                return self.reject(format!(
                    "bad depth level: price={} size={}",
                    level.price, level.size
                ));
            }
            if level.price < self.price_min || level.price > self.price_max {
                return self.reject(format!("depth price {} outside band", level.price));
            }
        }
        if let (Some(best_bid), Some(best_ask)) = (depth.bids.first(), depth.asks.first()) {
            if best_bid.price >= best_ask.price {
                return self.reject(format!(
                    "crossed book: bid {} >= ask {}",
                    best_bid.price, best_ask.price
                ));
            }
        }
        Ok(())
    }

    /// Validate an account snapshot.
    pub fn validate_account(&self, account: &AccountSnapshot) -> Result<()> {
        if !account.balance.is_finite()
            || !account.realized_pnl.is_finite()
            || !account.unrealized_pnl.is_finite()
        {
            return self.reject("non-finite account values".to_string());
        }
        Ok(())
    }

    fn reject(&self, msg: String) -> Result<()> {
        warn!(target: "ingress", "{msg}");
        Err(Error::ingress(msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowtrader_core::DepthLevel;

    fn validator() -> IngressValidator {
        IngressValidator::new(&IngressConfig {
            price_min: 1000.0,
            price_max: 20000.0,
        })
    }

    fn tick(price: f64, size: f64) -> RawTick {
        RawTick {
            ts_ms: 0,
            price,
            size,
            bid: price - 0.25,
            ask: price + 0.25,
        }
    }

    #[test]
    fn test_valid_tick() {
        assert!(validator().validate_tick(&tick(5000.0, 1.0)).is_ok());
    }

    #[test]
    fn test_out_of_band_price_rejected() {
        let err = validator().validate_tick(&tick(99.0, 1.0)).unwrap_err();
        assert!(matches!(err, Error::Ingress(_)));
    }

    #[test]
    fn test_nan_price_rejected() {
        assert!(validator().validate_tick(&tick(f64::NAN, 1.0)).is_err());
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(validator().validate_tick(&tick(5000.0, 0.0)).is_err());
    }

    #[test]
    fn test_crossed_book_rejected() {
        let depth = DepthSnapshot {
            ts_ms: 0,
            bids: vec![DepthLevel { price: 5001.0, size: 10.0 }],
            asks: vec![DepthLevel { price: 5000.0, size: 10.0 }],
        };
        assert!(validator().validate_depth(&depth).is_err());
    }

    #[test]
    fn test_sane_depth_accepted() {
        let depth = DepthSnapshot {
            ts_ms: 0,
            bids: vec![DepthLevel { price: 5000.0, size: 10.0 }],
            asks: vec![DepthLevel { price: 5000.25, size: 12.0 }],
        };
        assert!(validator().validate_depth(&depth).is_ok());
    }

    #[test]
    fn test_account_nan_rejected() {
        let account = AccountSnapshot {
            ts_ms: 0,
            balance: f64::NAN,
            realized_pnl: 0.0,
            unrealized_pnl: 0.0,
        };
        assert!(validator().validate_account(&account).is_err());
    }
}
