//! Footprint bar building: per-price bid/ask volume ledgers.
//!
//! Ticks are bucketed by time and by price-within-bar. Prices snap to
//! the tick grid so a level key is always an exchange-quotable price.

use flowtrader_core::{
    ts_to_bucket, AggressorSide, FootprintBar, FootprintLevel, Price, Tick, TimestampMs,
};
use ordered_float::OrderedFloat;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct FootprintInProgress {
    ts_open: TimestampMs,
    levels: BTreeMap<Price, FootprintLevel>,
    running_delta: f64,
    delta_high: f64,
    delta_low: f64,
}

impl FootprintInProgress {
    fn new(ts_open: TimestampMs) -> Self {
        Self {
            ts_open,
            levels: BTreeMap::new(),
            running_delta: 0.0,
            delta_high: 0.0,
            delta_low: 0.0,
        }
    }

    fn accumulate(&mut self, price_key: Price, tick: &Tick) {
        let level = self.levels.entry(price_key).or_default();
        match tick.side {
            AggressorSide::Buy => level.ask_volume += tick.size,
            AggressorSide::Sell => level.bid_volume += tick.size,
        }
        self.running_delta += tick.signed_size();
        self.delta_high = self.delta_high.max(self.running_delta);
        self.delta_low = self.delta_low.min(self.running_delta);
    }

    fn freeze(self, duration_ms: i64) -> FootprintBar {
        FootprintBar {
            ts_open: self.ts_open,
            duration_ms,
            levels: self.levels,
            delta_high: self.delta_high,
            delta_low: self.delta_low,
            delta_close: self.running_delta,
        }
    }
}

/// Builds footprint bars from a strictly ordered tick stream.
pub struct FootprintBuilder {
    duration_ms: i64,
    tick_size: f64,
    current: Option<FootprintInProgress>,
}

impl FootprintBuilder {
    pub fn new(duration_secs: u32, tick_size: f64) -> Self {
        Self {
            duration_ms: duration_secs as i64 * 1000,
            tick_size,
            current: None,
        }
    }

    fn price_key(&self, price: f64) -> Price {
        OrderedFloat((price / self.tick_size).round() * self.tick_size)
    }

    /// Process one tick. Returns the completed footprint bar when this
    /// tick opens a new bucket.
    pub fn update(&mut self, tick: &Tick) -> Option<FootprintBar> {
        let bucket = ts_to_bucket(tick.ts_ms, self.duration_ms);
        let key = self.price_key(tick.price);

        let rolled_over = matches!(&self.current, Some(open) if open.ts_open != bucket);
        let completed = if rolled_over {
            self.current.take().map(|f| f.freeze(self.duration_ms))
        } else {
            None
        };

        let open = self
            .current
            .get_or_insert_with(|| FootprintInProgress::new(bucket));
        open.accumulate(key, tick);
        completed
    }

    /// Force-close the open bar, if any. Used at session roll.
    pub fn flush(&mut self) -> Option<FootprintBar> {
        self.current.take().map(|f| f.freeze(self.duration_ms))
    }
}
