//! Fixed-duration candle building from classified ticks.
//!
//! The builder holds exactly one open bucket. A tick belonging to a
//! later bucket first closes the open candle (returning it as an
//! immutable unit) and then opens a new one seeded by that tick.

use flowtrader_core::{ts_to_bucket, AggressorSide, Candle, Tick, TimestampMs};

/// A candle that is currently being built.
#[derive(Debug, Clone)]
struct CandleInProgress {
    ts_open: TimestampMs,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    buy_volume: f64,
    sell_volume: f64,
    delta: f64,
    tick_count: u32,
}

impl CandleInProgress {
    fn seed(ts_open: TimestampMs, tick: &Tick) -> Self {
        let mut candle = Self {
            ts_open,
            open: tick.price,
            high: tick.price,
            low: tick.price,
            close: tick.price,
            volume: 0.0,
            buy_volume: 0.0,
            sell_volume: 0.0,
            delta: 0.0,
            tick_count: 0,
        };
        candle.accumulate(tick);
        candle
    }

    fn accumulate(&mut self, tick: &Tick) {
        self.high = self.high.max(tick.price);
        self.low = self.low.min(tick.price);
        self.close = tick.price;
        self.volume += tick.size;
        match tick.side {
            AggressorSide::Buy => self.buy_volume += tick.size,
            AggressorSide::Sell => self.sell_volume += tick.size,
        }
        self.delta += tick.signed_size();
        self.tick_count += 1;
    }

    fn freeze(&self, duration_ms: i64) -> Candle {
        Candle {
            ts_open: self.ts_open,
            duration_ms,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            buy_volume: self.buy_volume,
            sell_volume: self.sell_volume,
            delta: self.delta,
            tick_count: self.tick_count,
        }
    }
}

/// Builds fixed-duration candles from a strictly ordered tick stream.
pub struct CandleBuilder {
    duration_ms: i64,
    current: Option<CandleInProgress>,
}

impl CandleBuilder {
    /// Create a builder for buckets of the given duration.
    pub fn new(duration_secs: u32) -> Self {
        Self {
            duration_ms: duration_secs as i64 * 1000,
            current: None,
        }
    }

    /// Process one tick. Returns the completed candle when this tick
    /// opens a new bucket.
    pub fn update(&mut self, tick: &Tick) -> Option<Candle> {
        let bucket = ts_to_bucket(tick.ts_ms, self.duration_ms);

        match &mut self.current {
            Some(open) if open.ts_open == bucket => {
                open.accumulate(tick);
                None
            }
            Some(open) => {
                let completed = open.freeze(self.duration_ms);
                self.current = Some(CandleInProgress::seed(bucket, tick));
                Some(completed)
            }
            None => {
                self.current = Some(CandleInProgress::seed(bucket, tick));
                None
            }
        }
    }

    /// Snapshot of the open candle, if any. The open candle is mutable
    /// state; the snapshot is an independent copy.
    pub fn current(&self) -> Option<Candle> {
        self.current.as_ref().map(|c| c.freeze(self.duration_ms))
    }

    /// Force-close the open candle, if any. Used at session roll.
    pub fn flush(&mut self) -> Option<Candle> {
        self.current.take().map(|c| c.freeze(self.duration_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(ts_ms: i64, price: f64, size: f64, side: AggressorSide) -> Tick {
        Tick {
            ts_ms,
            price,
            size,
            side,
        }
    }

    #[test]
    fn test_single_bucket_accumulation() {
        let mut builder = CandleBuilder::new(60);

        assert!(builder.update(&tick(10_000, 5000.0, 1.0, AggressorSide::Buy)).is_none());
        assert!(builder.update(&tick(20_000, 5002.0, 2.0, AggressorSide::Sell)).is_none());
        assert!(builder.update(&tick(30_000, 4999.0, 1.0, AggressorSide::Buy)).is_none());

        let open = builder.current().unwrap();
        assert_eq!(open.open, 5000.0);
        assert_eq!(open.high, 5002.0);
        assert_eq!(open.low, 4999.0);
        assert_eq!(open.close, 4999.0);
        assert_eq!(open.volume, 4.0);
        assert_eq!(open.delta, 0.0); // +1 -2 +1
        assert_eq!(open.tick_count, 3);
    }

    #[test]
    fn test_close_on_bucket_boundary() {
        let mut builder = CandleBuilder::new(60);

        builder.update(&tick(10_000, 5000.0, 1.0, AggressorSide::Buy));
        builder.update(&tick(59_999, 5001.0, 1.0, AggressorSide::Buy));

        // First tick of the next bucket closes the previous candle.
        let closed = builder
            .update(&tick(60_000, 5002.0, 3.0, AggressorSide::Sell))
            .unwrap();
        assert_eq!(closed.ts_open, 0);
        assert_eq!(closed.volume, 2.0);
        assert_eq!(closed.close, 5001.0);

        // The boundary tick seeds the new candle, not the closed one.
        let open = builder.current().unwrap();
        assert_eq!(open.ts_open, 60_000);
        assert_eq!(open.open, 5002.0);
        assert_eq!(open.volume, 3.0);
    }

    #[test]
    fn test_volume_conserved_across_close() {
        // No tick is dropped or double counted across a close boundary.
        let mut builder = CandleBuilder::new(60);
        let mut total_in = 0.0;
        let mut total_out = 0.0;

        for i in 0..150 {
            let t = tick(i * 1000, 5000.0 + (i % 7) as f64 * 0.25, 1.5, AggressorSide::Buy);
            total_in += t.size;
            if let Some(closed) = builder.update(&t) {
                total_out += closed.volume;
            }
        }
        if let Some(open) = builder.current() {
            total_out += open.volume;
        }
        assert!((total_in - total_out).abs() < 1e-9);
    }

    #[test]
    fn test_flat_price_delta() {
        // 12 buys and 8 sells of size 1 at a flat price.
        let mut builder = CandleBuilder::new(60);
        for i in 0..12 {
            builder.update(&tick(1000 + i * 100, 5000.0, 1.0, AggressorSide::Buy));
        }
        for i in 0..8 {
            builder.update(&tick(20_000 + i * 100, 5000.0, 1.0, AggressorSide::Sell));
        }

        let bar = builder.flush().unwrap();
        assert_eq!(bar.volume, 20.0);
        assert_eq!(bar.delta, 4.0);
        assert_eq!(bar.buy_volume, 12.0);
        assert_eq!(bar.sell_volume, 8.0);
        assert_eq!(bar.open, 5000.0);
        assert_eq!(bar.close, 5000.0);
    }

    #[test]
    fn test_flush_empty() {
        let mut builder = CandleBuilder::new(60);
        assert!(builder.flush().is_none());
        assert!(builder.current().is_none());
    }
}
