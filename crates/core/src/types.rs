//! Core data types for the flowtrader system.

use chrono::NaiveDate;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Timestamp in milliseconds since Unix epoch (UTC).
pub type TimestampMs = i64;

/// Price type with ordering support (histogram keys).
pub type Price = OrderedFloat<f64>;

/// Size/quantity type (contracts).
pub type Size = f64;

/// Truncate a timestamp to the start of its bucket.
#[inline]
pub fn ts_to_bucket(ts_ms: TimestampMs, bucket_ms: i64) -> TimestampMs {
    (ts_ms / bucket_ms) * bucket_ms
}

/// Side of the book the aggressor hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggressorSide {
    /// Trade lifted the ask (buyer-initiated).
    Buy,
    /// Trade hit the bid (seller-initiated).
    Sell,
}

impl AggressorSide {
    /// Signed multiplier: +1 for buy aggression, -1 for sell.
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            AggressorSide::Buy => 1.0,
            AggressorSide::Sell => -1.0,
        }
    }

    /// The opposing side.
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            AggressorSide::Buy => AggressorSide::Sell,
            AggressorSide::Sell => AggressorSide::Buy,
        }
    }
}

/// A raw transaction event as delivered by the brokerage bridge,
/// before aggressor classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTick {
    /// Timestamp in milliseconds.
    pub ts_ms: TimestampMs,
    /// Trade price.
    pub price: f64,
    /// Trade size (contracts).
    pub size: Size,
    /// Best bid at the time of the trade.
    pub bid: f64,
    /// Best ask at the time of the trade.
    pub ask: f64,
}

/// A classified transaction: the unit every aggregator consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tick {
    /// Timestamp in milliseconds.
    pub ts_ms: TimestampMs,
    /// Trade price.
    pub price: f64,
    /// Trade size (contracts).
    pub size: Size,
    /// Which side of the book was hit.
    pub side: AggressorSide,
}

impl Tick {
    /// Signed size: positive for buy aggression, negative for sell.
    #[inline]
    pub fn signed_size(&self) -> f64 {
        self.size * self.side.sign()
    }
}

/// One level of a depth-of-book ladder.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DepthLevel {
    pub price: f64,
    pub size: Size,
}

/// Periodic depth-of-book snapshot from the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthSnapshot {
    /// Timestamp in milliseconds.
    pub ts_ms: TimestampMs,
    /// Bid ladder, best first.
    pub bids: Vec<DepthLevel>,
    /// Ask ladder, best first.
    pub asks: Vec<DepthLevel>,
}

impl DepthSnapshot {
    /// Total resting bid size.
    pub fn bid_volume(&self) -> Size {
        self.bids.iter().map(|l| l.size).sum()
    }

    /// Total resting ask size.
    pub fn ask_volume(&self) -> Size {
        self.asks.iter().map(|l| l.size).sum()
    }

    /// Book imbalance: (bid - ask) / (bid + ask), in [-1, 1].
    pub fn imbalance(&self) -> f64 {
        let bid = self.bid_volume();
        let ask = self.ask_volume();
        let total = bid + ask;
        if total > 0.0 {
            (bid - ask) / total
        } else {
            0.0
        }
    }
}

/// Periodic account snapshot from the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Timestamp in milliseconds.
    pub ts_ms: TimestampMs,
    /// Cash balance.
    pub balance: f64,
    /// Realized P&L for the day.
    pub realized_pnl: f64,
    /// Unrealized P&L on open positions.
    pub unrealized_pnl: f64,
}

impl AccountSnapshot {
    /// Running daily P&L (realized plus unrealized).
    #[inline]
    pub fn daily_pnl(&self) -> f64 {
        self.realized_pnl + self.unrealized_pnl
    }
}

/// A completed fixed-duration candle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    /// Bucket start timestamp (ms).
    pub ts_open: TimestampMs,
    /// Bucket duration (ms).
    pub duration_ms: i64,
    /// Open price.
    pub open: f64,
    /// High price.
    pub high: f64,
    /// Low price.
    pub low: f64,
    /// Close price.
    pub close: f64,
    /// Total accumulated volume.
    pub volume: Size,
    /// Buy-aggressor volume.
    pub buy_volume: Size,
    /// Sell-aggressor volume.
    pub sell_volume: Size,
    /// Cumulative delta within the bar (signed tick sizes).
    pub delta: f64,
    /// Number of ticks aggregated.
    pub tick_count: u32,
}

impl Candle {
    /// Typical price used for VWAP: (high + low + close) / 3.
    #[inline]
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// High-low range.
    #[inline]
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Bucket end timestamp (exclusive).
    #[inline]
    pub fn ts_close(&self) -> TimestampMs {
        self.ts_open + self.duration_ms
    }
}

/// Volume ledger at one price level inside a footprint bar.
///
/// `bid_volume` is volume that traded at the bid (sell aggression);
/// `ask_volume` traded at the ask (buy aggression).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FootprintLevel {
    pub bid_volume: Size,
    pub ask_volume: Size,
}

impl FootprintLevel {
    /// Delta at this level: buy aggression minus sell aggression.
    #[inline]
    pub fn delta(&self) -> f64 {
        self.ask_volume - self.bid_volume
    }

    /// Total volume at this level.
    #[inline]
    pub fn total(&self) -> Size {
        self.ask_volume + self.bid_volume
    }

    /// Direction of imbalance if the dominant side is at least
    /// `min_ratio` times the other, `None` when balanced.
    pub fn imbalance(&self, min_ratio: f64) -> Option<Direction> {
        if self.ask_volume >= self.bid_volume * min_ratio && self.ask_volume > 0.0 {
            Some(Direction::Bullish)
        } else if self.bid_volume >= self.ask_volume * min_ratio && self.bid_volume > 0.0 {
            Some(Direction::Bearish)
        } else {
            None
        }
    }

    /// Dominant-to-dominated volume ratio. Unbounded side returns
    /// the dominant volume itself to keep the value finite.
    pub fn imbalance_ratio(&self) -> f64 {
        let (hi, lo) = if self.ask_volume >= self.bid_volume {
            (self.ask_volume, self.bid_volume)
        } else {
            (self.bid_volume, self.ask_volume)
        };
        if lo > 0.0 {
            hi / lo
        } else {
            hi
        }
    }
}

/// A run of consecutive same-direction imbalanced levels in a footprint bar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackedRun {
    /// Direction of the imbalanced levels.
    pub direction: Direction,
    /// Number of consecutive levels.
    pub length: u32,
    /// Mean imbalance ratio across the run.
    pub avg_ratio: f64,
    /// Lowest price in the run.
    pub price_low: f64,
    /// Highest price in the run.
    pub price_high: f64,
}

/// A completed footprint bar: a candle plus a per-price volume ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FootprintBar {
    /// Bucket start timestamp (ms).
    pub ts_open: TimestampMs,
    /// Bucket duration (ms).
    pub duration_ms: i64,
    /// Per-price ledger, keyed by price.
    pub levels: BTreeMap<Price, FootprintLevel>,
    /// Highest cumulative delta observed within the bar.
    pub delta_high: f64,
    /// Lowest cumulative delta observed within the bar.
    pub delta_low: f64,
    /// Cumulative delta at close.
    pub delta_close: f64,
}

impl FootprintBar {
    /// Point of control: price level carrying the most volume.
    pub fn poc(&self) -> Option<f64> {
        self.levels
            .iter()
            .max_by(|a, b| {
                a.1.total()
                    .partial_cmp(&b.1.total())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(p, _)| p.0)
    }

    /// Runs of at least `min_len` consecutive same-direction imbalanced
    /// levels (ratio >= `min_ratio`), scanned in price order.
    pub fn stacked_runs(&self, min_ratio: f64, min_len: u32) -> Vec<StackedRun> {
        let mut runs = Vec::new();
        let mut run_dir: Option<Direction> = None;
        let mut members: Vec<(f64, f64)> = Vec::new();

        for (price, level) in &self.levels {
            let imb = level.imbalance(min_ratio);
            if imb.is_some() && imb == run_dir {
                members.push((price.0, level.imbalance_ratio()));
                continue;
            }
            // Run broken: either a balanced level or a direction change.
            if let Some(dir) = run_dir.take() {
                if let Some(run) = Self::finish_run(dir, std::mem::take(&mut members), min_len) {
                    runs.push(run);
                }
            }
            members.clear();
            if let Some(dir) = imb {
                run_dir = Some(dir);
                members.push((price.0, level.imbalance_ratio()));
            }
        }
        if let Some(dir) = run_dir {
            if let Some(run) = Self::finish_run(dir, members, min_len) {
                runs.push(run);
            }
        }
        runs
    }

    fn finish_run(
        direction: Direction,
        members: Vec<(f64, f64)>,
        min_len: u32,
    ) -> Option<StackedRun> {
        if (members.len() as u32) < min_len {
            return None;
        }
        let avg_ratio = members.iter().map(|(_, r)| r).sum::<f64>() / members.len() as f64;
        Some(StackedRun {
            direction,
            length: members.len() as u32,
            avg_ratio,
            price_low: members.first().map(|(p, _)| *p).unwrap_or(0.0),
            price_high: members.last().map(|(p, _)| *p).unwrap_or(0.0),
        })
    }
}

/// Buy/sell volume at one price level of a volume profile.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LevelVolume {
    pub buy: Size,
    pub sell: Size,
}

impl LevelVolume {
    #[inline]
    pub fn total(&self) -> Size {
        self.buy + self.sell
    }

    #[inline]
    pub fn delta(&self) -> f64 {
        self.buy - self.sell
    }
}

/// Value Area derived from a volume profile.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ValueArea {
    /// Point of Control (price with max volume).
    pub poc: f64,
    /// Value Area High.
    pub vah: f64,
    /// Value Area Low.
    pub val: f64,
    /// Coverage actually achieved (e.g. 0.70).
    pub coverage: f64,
    /// Total profile volume.
    pub total_volume: Size,
}

impl ValueArea {
    /// Is the price inside [VAL, VAH]?
    #[inline]
    pub fn contains(&self, price: f64) -> bool {
        price >= self.val && price <= self.vah
    }

    /// VAH - VAL.
    #[inline]
    pub fn width(&self) -> f64 {
        self.vah - self.val
    }
}

/// Coarse shape classification of a daily profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfileShape {
    /// Volume concentrated around the middle; two-sided rotation.
    Balanced,
    /// POC in the upper third of the range (short-covering day).
    PShape,
    /// POC in the lower third of the range (long-liquidation day).
    BShape,
    /// Thin, elongated profile; one-timeframe trend day.
    Trend,
}

/// A closed, immutable daily volume profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyProfile {
    /// Exchange-local trading date.
    pub date: NaiveDate,
    /// Per-price buy/sell volume, keyed by price bin.
    pub levels: BTreeMap<Price, LevelVolume>,
    /// Derived value area; `None` for an empty day.
    pub value_area: Option<ValueArea>,
    /// Coarse shape classification.
    pub shape: ProfileShape,
}

impl DailyProfile {
    /// Total profile volume.
    pub fn total_volume(&self) -> Size {
        self.levels.values().map(|l| l.total()).sum()
    }
}

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Bullish,
    Bearish,
}

impl Direction {
    /// +1 for bullish, -1 for bearish.
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            Direction::Bullish => 1.0,
            Direction::Bearish => -1.0,
        }
    }

    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Direction::Bullish => Direction::Bearish,
            Direction::Bearish => Direction::Bullish,
        }
    }
}

/// Trading session classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionKind {
    /// Overnight / Globex hours.
    Extended,
    /// Regular trading hours.
    Regular,
}

/// Session regime derived from cumulative delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Regime {
    /// Delta inside the threshold band; two-sided trade.
    Rotational,
    /// Delta above +threshold.
    DirectionalBullish,
    /// Delta below -threshold.
    DirectionalBearish,
}

/// Kind of order-flow signal. Closed set; the decision engine matches
/// exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalKind {
    /// Heavy aggression absorbed with little price movement.
    Absorption,
    /// Price extreme not confirmed by delta.
    Divergence,
    /// >= N consecutive same-direction imbalanced footprint levels.
    StackedImbalance,
    /// Failed breakout leaving participants offside.
    TrappedParticipants,
    /// Above-average volume sustained outside value.
    Initiative,
    /// Below-average volume outside value (fade bias).
    Responsive,
    /// Directional move on declining volume/delta.
    Exhaustion,
}

/// An ephemeral order-flow signal. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderFlowSignal {
    pub kind: SignalKind,
    pub direction: Direction,
    /// Strength 0-100.
    pub strength: f64,
    /// Confidence 0-100.
    pub confidence: f64,
    /// Whether the signal clears its actionability gate.
    pub actionable: bool,
    /// Creation timestamp (ms).
    pub ts_ms: TimestampMs,
}

/// Kind of recognized trade setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetupKind {
    /// Fade from composite VAH/VAL back toward POC and VWAP.
    ValueAreaFade,
    /// Continuation beyond composite VAH/VAL.
    ValueAreaBreakout,
    /// Reversion from a +/-1 sigma VWAP band back to VWAP.
    VwapBounce,
}

/// A ranked trade recommendation from the setup recognizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecommendation {
    pub setup: SetupKind,
    pub direction: Direction,
    /// Suggested entry price.
    pub entry: f64,
    /// Protective stop.
    pub stop: f64,
    /// First target.
    pub target_1: f64,
    /// Final target.
    pub target_2: f64,
    /// Confidence 0-100.
    pub confidence: f64,
    /// Human-readable context evidence.
    pub reason: String,
    /// Human-readable invalidation rule.
    pub invalidation: String,
    /// Flipped false on stop/final-target touch or staleness.
    pub active: bool,
    /// Creation timestamp (ms).
    pub created_ts: TimestampMs,
}

impl TradeRecommendation {
    /// True once price has touched the stop or the final target.
    pub fn is_invalidated_by(&self, price: f64) -> bool {
        match self.direction {
            Direction::Bullish => price <= self.stop || price >= self.target_2,
            Direction::Bearish => price >= self.stop || price <= self.target_2,
        }
    }
}

/// Action produced by the decision engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeAction {
    /// Open a long position.
    Buy,
    /// Open a short position.
    Sell,
    /// Flatten the open position.
    Close,
    /// No action.
    Hold,
}

/// The decision engine's output for one evaluation cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub action: TradeAction,
    /// Entry price for Buy/Sell.
    pub entry: Option<f64>,
    /// Stop for Buy/Sell.
    pub stop: Option<f64>,
    /// Target for Buy/Sell.
    pub target: Option<f64>,
    /// Confidence 0-100 (0 for Hold/Close).
    pub confidence: f64,
    /// Concatenated context and order-flow evidence.
    pub reason: String,
}

impl Decision {
    /// A no-action decision with an explanatory reason.
    pub fn hold(reason: impl Into<String>) -> Self {
        Self {
            action: TradeAction::Hold,
            entry: None,
            stop: None,
            target: None,
            confidence: 0.0,
            reason: reason.into(),
        }
    }
}

/// The single mutable position record: sole owner of "flat or not".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Position {
    /// Signed contract count: positive long, negative short, zero flat.
    pub contracts: i32,
    /// Average entry price; meaningless when flat.
    pub entry_price: f64,
    /// Realized P&L accumulated today.
    pub realized_pnl: f64,
    /// Unrealized P&L at the last mark.
    pub unrealized_pnl: f64,
}

impl Position {
    #[inline]
    pub fn is_flat(&self) -> bool {
        self.contracts == 0
    }

    #[inline]
    pub fn is_long(&self) -> bool {
        self.contracts > 0
    }

    #[inline]
    pub fn is_short(&self) -> bool {
        self.contracts < 0
    }

    /// Direction of the open position, `None` when flat.
    pub fn direction(&self) -> Option<Direction> {
        if self.contracts > 0 {
            Some(Direction::Bullish)
        } else if self.contracts < 0 {
            Some(Direction::Bearish)
        } else {
            None
        }
    }
}

/// Execution-side order action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderAction {
    Buy,
    Sell,
}

impl OrderAction {
    #[inline]
    pub fn sign(self) -> i32 {
        match self {
            OrderAction::Buy => 1,
            OrderAction::Sell => -1,
        }
    }
}

/// Lifecycle state of a pending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Queued for the execution collaborator.
    Pending,
    /// Confirmed filled.
    Executed,
    /// Rejected or cancelled by the broker.
    Failed,
    /// Aged out unconfirmed; never executed.
    Expired,
}

/// An order intent owned by the safety gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingOrder {
    /// Unique order id.
    pub id: String,
    pub action: OrderAction,
    /// Contracts, always positive.
    pub quantity: u32,
    /// Creation timestamp (ms).
    pub created_ts: TimestampMs,
    pub status: OrderStatus,
}

impl PendingOrder {
    /// Age of the order at `now`.
    #[inline]
    pub fn age_ms(&self, now: TimestampMs) -> i64 {
        now - self.created_ts
    }
}

/// Terminal status reported back by the execution collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfirmationStatus {
    Filled,
    Rejected,
    Cancelled,
}

/// Order outcome report from the execution collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderConfirmation {
    pub order_id: String,
    pub status: ConfirmationStatus,
    /// Fill price when filled.
    pub filled_price: Option<f64>,
    /// Fill time when filled (ms).
    pub filled_time: Option<TimestampMs>,
    /// Broker reject reason when rejected.
    pub reject_reason: Option<String>,
}

/// Migration of today's value area relative to the composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MigrationKind {
    /// Daily value area shifted above the composite.
    BullishMigration,
    /// Daily value area shifted below the composite.
    BearishMigration,
    /// Value areas mostly overlapping.
    NeutralOverlap,
    /// Price pressing a composite value-area edge.
    BreakoutPending,
}

/// Which reference level a stacked level was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelKind {
    Poc,
    Vah,
    Val,
}

/// A multi-day-confirmed support/resistance level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackedLevel {
    pub kind: LevelKind,
    /// Mean price of the clustered occurrences.
    pub price: f64,
    /// Number of days contributing to the cluster.
    pub occurrences: u32,
    /// Strength 0-100, scaled by occurrence count and capped.
    pub strength: f64,
}

/// VWAP with volume-weighted standard-deviation bands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VwapBands {
    pub vwap: f64,
    pub std_dev: f64,
    pub plus_1: f64,
    pub plus_2: f64,
    pub plus_3: f64,
    pub minus_1: f64,
    pub minus_2: f64,
    pub minus_3: f64,
}

impl VwapBands {
    /// Build bands from a VWAP and its weighted standard deviation.
    pub fn from_vwap(vwap: f64, std_dev: f64) -> Self {
        Self {
            vwap,
            std_dev,
            plus_1: vwap + std_dev,
            plus_2: vwap + 2.0 * std_dev,
            plus_3: vwap + 3.0 * std_dev,
            minus_1: vwap - std_dev,
            minus_2: vwap - 2.0 * std_dev,
            minus_3: vwap - 3.0 * std_dev,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ts_to_bucket() {
        // 00:01:30.500 into a 60s bucket -> 00:01:00.000
        assert_eq!(ts_to_bucket(90_500, 60_000), 60_000);
        assert_eq!(ts_to_bucket(60_000, 60_000), 60_000);
        assert_eq!(ts_to_bucket(59_999, 60_000), 0);
    }

    #[test]
    fn test_signed_size() {
        let buy = Tick {
            ts_ms: 0,
            price: 5000.0,
            size: 3.0,
            side: AggressorSide::Buy,
        };
        let sell = Tick {
            ts_ms: 0,
            price: 5000.0,
            size: 2.0,
            side: AggressorSide::Sell,
        };
        assert_eq!(buy.signed_size(), 3.0);
        assert_eq!(sell.signed_size(), -2.0);
    }

    #[test]
    fn test_depth_imbalance() {
        let snap = DepthSnapshot {
            ts_ms: 0,
            bids: vec![DepthLevel { price: 5000.0, size: 100.0 }],
            asks: vec![DepthLevel { price: 5000.25, size: 50.0 }],
        };
        // (100 - 50) / 150 = 0.333...
        assert!((snap.imbalance() - 1.0 / 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_footprint_level_imbalance() {
        let level = FootprintLevel {
            bid_volume: 10.0,
            ask_volume: 25.0,
        };
        assert_eq!(level.imbalance(2.0), Some(Direction::Bullish));
        assert!((level.imbalance_ratio() - 2.5).abs() < 1e-10);

        let balanced = FootprintLevel {
            bid_volume: 10.0,
            ask_volume: 15.0,
        };
        assert_eq!(balanced.imbalance(2.0), None);
    }

    #[test]
    fn test_stacked_runs_require_min_len() {
        let mut levels = BTreeMap::new();
        // Two consecutive bullish imbalances, then a balanced level.
        levels.insert(OrderedFloat(5000.00), FootprintLevel { bid_volume: 5.0, ask_volume: 20.0 });
        levels.insert(OrderedFloat(5000.25), FootprintLevel { bid_volume: 4.0, ask_volume: 16.0 });
        levels.insert(OrderedFloat(5000.50), FootprintLevel { bid_volume: 10.0, ask_volume: 11.0 });
        let bar = FootprintBar {
            ts_open: 0,
            duration_ms: 60_000,
            levels,
            delta_high: 0.0,
            delta_low: 0.0,
            delta_close: 0.0,
        };

        assert!(bar.stacked_runs(2.0, 3).is_empty());

        let runs = bar.stacked_runs(2.0, 2);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].direction, Direction::Bullish);
        assert_eq!(runs[0].length, 2);
    }

    #[test]
    fn test_stacked_runs_broken_by_opposite() {
        let mut levels = BTreeMap::new();
        levels.insert(OrderedFloat(5000.00), FootprintLevel { bid_volume: 2.0, ask_volume: 10.0 });
        levels.insert(OrderedFloat(5000.25), FootprintLevel { bid_volume: 12.0, ask_volume: 3.0 });
        levels.insert(OrderedFloat(5000.50), FootprintLevel { bid_volume: 2.0, ask_volume: 10.0 });
        let bar = FootprintBar {
            ts_open: 0,
            duration_ms: 60_000,
            levels,
            delta_high: 0.0,
            delta_low: 0.0,
            delta_close: 0.0,
        };
        // Alternating directions never form a run of 3.
        assert!(bar.stacked_runs(2.0, 3).is_empty());
    }

    #[test]
    fn test_footprint_poc() {
        let mut levels = BTreeMap::new();
        levels.insert(OrderedFloat(5000.00), FootprintLevel { bid_volume: 5.0, ask_volume: 5.0 });
        levels.insert(OrderedFloat(5000.25), FootprintLevel { bid_volume: 30.0, ask_volume: 30.0 });
        levels.insert(OrderedFloat(5000.50), FootprintLevel { bid_volume: 1.0, ask_volume: 2.0 });
        let bar = FootprintBar {
            ts_open: 0,
            duration_ms: 60_000,
            levels,
            delta_high: 0.0,
            delta_low: 0.0,
            delta_close: 0.0,
        };
        assert_eq!(bar.poc(), Some(5000.25));
    }

    #[test]
    fn test_recommendation_invalidation() {
        let rec = TradeRecommendation {
            setup: SetupKind::ValueAreaFade,
            direction: Direction::Bearish,
            entry: 5010.0,
            stop: 5015.0,
            target_1: 5000.0,
            target_2: 4995.0,
            confidence: 80.0,
            reason: String::new(),
            invalidation: String::new(),
            active: true,
            created_ts: 0,
        };
        assert!(rec.is_invalidated_by(5015.0)); // stop touched
        assert!(rec.is_invalidated_by(4995.0)); // final target touched
        assert!(!rec.is_invalidated_by(5005.0));
        assert!(!rec.is_invalidated_by(5000.0)); // target_1 alone does not invalidate
    }

    #[test]
    fn test_position_direction() {
        let mut pos = Position::default();
        assert!(pos.is_flat());
        assert_eq!(pos.direction(), None);

        pos.contracts = 2;
        assert!(pos.is_long());
        assert_eq!(pos.direction(), Some(Direction::Bullish));

        pos.contracts = -1;
        assert!(pos.is_short());
        assert_eq!(pos.direction(), Some(Direction::Bearish));
    }

    #[test]
    fn test_vwap_bands() {
        let bands = VwapBands::from_vwap(5000.0, 4.0);
        assert_eq!(bands.plus_1, 5004.0);
        assert_eq!(bands.plus_3, 5012.0);
        assert_eq!(bands.minus_2, 4992.0);
    }
}
