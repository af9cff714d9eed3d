//! Aggressor side inference using bid/ask alignment.
//!
//! A trade at or above the ask lifted the offer (Buy); at or below the
//! bid it hit the bid (Sell). Trades inside the spread fall back to the
//! tick rule: uptick Buy, downtick Sell, zero-tick continuation of the
//! previous side.

use flowtrader_core::{AggressorSide, RawTick, Tick};

/// Running counts of classification outcomes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassifierStats {
    /// Total ticks classified.
    pub total: u64,
    /// Classified as buy aggression.
    pub buys: u64,
    /// Classified as sell aggression.
    pub sells: u64,
    /// Resolved by the tick-rule fallback rather than the quote.
    pub tick_rule_fallbacks: u64,
}

/// Infers the aggressor side of each raw tick.
///
/// Every tick resolves to Buy or Sell; the downstream data model has no
/// ambiguous state, so inside-spread trades are always settled by the
/// tick rule (midpoint proximity for the very first print).
pub struct AggressorClassifier {
    last_price: Option<f64>,
    last_side: AggressorSide,
    stats: ClassifierStats,
}

impl AggressorClassifier {
    pub fn new() -> Self {
        Self {
            last_price: None,
            last_side: AggressorSide::Buy,
            stats: ClassifierStats::default(),
        }
    }

    /// Classify a validated raw tick into a sided tick.
    pub fn classify(&mut self, raw: &RawTick) -> Tick {
        let side = if raw.ask > raw.bid && raw.price >= raw.ask {
            AggressorSide::Buy
        } else if raw.ask > raw.bid && raw.price <= raw.bid {
            AggressorSide::Sell
        } else {
            self.stats.tick_rule_fallbacks += 1;
            match self.last_price {
                Some(last) if raw.price > last => AggressorSide::Buy,
                Some(last) if raw.price < last => AggressorSide::Sell,
                Some(_) => self.last_side,
                // First print with no history: side of the spread midpoint.
                None => {
                    let mid = (raw.bid + raw.ask) / 2.0;
                    if raw.price >= mid {
                        AggressorSide::Buy
                    } else {
                        AggressorSide::Sell
                    }
                }
            }
        };

        self.stats.total += 1;
        match side {
            AggressorSide::Buy => self.stats.buys += 1,
            AggressorSide::Sell => self.stats.sells += 1,
        }
        self.last_price = Some(raw.price);
        self.last_side = side;

        Tick {
            ts_ms: raw.ts_ms,
            price: raw.price,
            size: raw.size,
            side,
        }
    }

    /// Classification statistics.
    pub fn stats(&self) -> ClassifierStats {
        self.stats
    }

    /// Clear all state.
    pub fn clear(&mut self) {
        self.last_price = None;
        self.last_side = AggressorSide::Buy;
        self.stats = ClassifierStats::default();
    }
}

impl Default for AggressorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(price: f64, bid: f64, ask: f64) -> RawTick {
        RawTick {
            ts_ms: 0,
            price,
            size: 1.0,
            bid,
            ask,
        }
    }

    #[test]
    fn test_at_ask_is_buy() {
        let mut c = AggressorClassifier::new();
        let tick = c.classify(&raw(5000.25, 5000.0, 5000.25));
        assert_eq!(tick.side, AggressorSide::Buy);
    }

    #[test]
    fn test_at_bid_is_sell() {
        let mut c = AggressorClassifier::new();
        let tick = c.classify(&raw(5000.0, 5000.0, 5000.25));
        assert_eq!(tick.side, AggressorSide::Sell);
    }

    #[test]
    fn test_tick_rule_inside_spread() {
        let mut c = AggressorClassifier::new();
        // Establish a last price at the bid.
        c.classify(&raw(5000.0, 5000.0, 5000.75));
        // Uptick inside the spread.
        let up = c.classify(&raw(5000.25, 5000.0, 5000.75));
        assert_eq!(up.side, AggressorSide::Buy);
        // Downtick inside the spread.
        let down = c.classify(&raw(5000.10, 5000.0, 5000.75));
        assert_eq!(down.side, AggressorSide::Sell);
    }

    #[test]
    fn test_zero_tick_continuation() {
        let mut c = AggressorClassifier::new();
        c.classify(&raw(5000.75, 5000.0, 5000.75)); // Buy at ask
        // Same price inside a widened spread continues the buy side.
        let cont = c.classify(&raw(5000.75, 5000.25, 5001.25));
        assert_eq!(cont.side, AggressorSide::Buy);
    }

    #[test]
    fn test_first_print_midpoint_fallback() {
        let mut c = AggressorClassifier::new();
        // No history, inside spread, above mid -> Buy.
        let tick = c.classify(&raw(5000.60, 5000.0, 5001.0));
        assert_eq!(tick.side, AggressorSide::Buy);

        let mut c2 = AggressorClassifier::new();
        let tick2 = c2.classify(&raw(5000.30, 5000.0, 5001.0));
        assert_eq!(tick2.side, AggressorSide::Sell);
    }

    #[test]
    fn test_stats_accumulate() {
        let mut c = AggressorClassifier::new();
        c.classify(&raw(5000.25, 5000.0, 5000.25));
        c.classify(&raw(5000.0, 5000.0, 5000.25));
        let stats = c.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.buys, 1);
        assert_eq!(stats.sells, 1);
    }
}
