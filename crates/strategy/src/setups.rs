//! Setup recognition over composite context and order-flow evidence.
//!
//! Three setups: value-area fade (reversion from a composite edge),
//! value-area breakout (continuation beyond an edge), and VWAP bounce
//! (reversion from a +/-1 sigma band). Each carries explicit stop and
//! targets and self-invalidates once price touches its stop or final
//! target; recommendations are pruned after an age limit regardless.

use flowtrader_core::{
    Direction, MigrationKind, SetupConfig, SetupKind, SignalKind, TimestampMs,
    TradeRecommendation, ValueArea, VwapBands,
};
use flowtrader_signals::SignalTracker;
use tracing::debug;

/// Read-only market state the recognizer evaluates against.
pub struct MarketContext<'a> {
    pub last_price: f64,
    pub composite_va: Option<ValueArea>,
    pub migration: Option<MigrationKind>,
    pub vwap_bands: Option<VwapBands>,
    pub signals: &'a SignalTracker,
    pub now: TimestampMs,
}

/// Recognizes setups and owns the recommendation list.
pub struct SetupRecognizer {
    tick_size: f64,
    config: SetupConfig,
    recommendations: Vec<TradeRecommendation>,
}

impl SetupRecognizer {
    pub fn new(tick_size: f64, config: SetupConfig) -> Self {
        Self {
            tick_size,
            config,
            recommendations: Vec::new(),
        }
    }

    /// Active (non-invalidated, non-stale) recommendations.
    pub fn active(&self) -> impl Iterator<Item = &TradeRecommendation> {
        self.recommendations.iter().filter(|r| r.active)
    }

    /// Every retained recommendation, for state egress.
    pub fn all(&self) -> &[TradeRecommendation] {
        &self.recommendations
    }

    /// Re-evaluate on a completed bar: invalidate, prune, recognize.
    pub fn evaluate(&mut self, ctx: &MarketContext) {
        self.invalidate(ctx.last_price);
        self.prune(ctx.now);

        let candidates = [
            self.recognize_va_fade(ctx),
            self.recognize_va_breakout(ctx),
            self.recognize_vwap_bounce(ctx),
        ];
        for candidate in candidates.into_iter().flatten() {
            if candidate.confidence < self.config.min_confidence {
                continue;
            }
            // One active recommendation per (setup, direction).
            if self
                .recommendations
                .iter()
                .any(|r| r.active && r.setup == candidate.setup && r.direction == candidate.direction)
            {
                continue;
            }
            debug!(target: "setups", setup = ?candidate.setup, direction = ?candidate.direction,
                   confidence = candidate.confidence, "recommendation emitted");
            self.recommendations.push(candidate);
        }
    }

    fn invalidate(&mut self, last_price: f64) {
        for rec in &mut self.recommendations {
            if rec.active && rec.is_invalidated_by(last_price) {
                rec.active = false;
            }
        }
    }

    fn prune(&mut self, now: TimestampMs) {
        let max_age_ms = self.config.max_age_secs as i64 * 1000;
        self.recommendations
            .retain(|r| now - r.created_ts <= max_age_ms);
    }

    fn tolerance(&self) -> f64 {
        self.config.level_tolerance_ticks as f64 * self.tick_size
    }

    fn stop_buffer(&self) -> f64 {
        self.config.stop_buffer_ticks as f64 * self.tick_size
    }

    /// Price at a composite edge plus a confirming reversal signal.
    fn recognize_va_fade(&self, ctx: &MarketContext) -> Option<TradeRecommendation> {
        let va = ctx.composite_va?;
        let tol = self.tolerance();
        let price = ctx.last_price;

        let (direction, edge) = if (price - va.vah).abs() <= tol {
            (Direction::Bearish, va.vah)
        } else if (price - va.val).abs() <= tol {
            (Direction::Bullish, va.val)
        } else {
            return None;
        };

        let confirm = ctx
            .signals
            .latest_directed(SignalKind::Exhaustion, direction)
            .or_else(|| ctx.signals.latest_directed(SignalKind::Divergence, direction))?;

        let vwap = ctx.vwap_bands.map(|b| b.vwap);
        let (stop, target_2) = match direction {
            Direction::Bearish => (edge + self.stop_buffer(), vwap.unwrap_or(va.poc)),
            Direction::Bullish => (edge - self.stop_buffer(), vwap.unwrap_or(va.poc)),
        };

        // Fades are strongest in balance; migration against the fade
        // costs confidence.
        let migration_adj = match (ctx.migration, direction) {
            (Some(MigrationKind::NeutralOverlap), _) => 10.0,
            (Some(MigrationKind::BullishMigration), Direction::Bearish) => -15.0,
            (Some(MigrationKind::BearishMigration), Direction::Bullish) => -15.0,
            _ => 0.0,
        };

        Some(TradeRecommendation {
            setup: SetupKind::ValueAreaFade,
            direction,
            entry: price,
            stop,
            target_1: va.poc,
            target_2,
            confidence: (0.7 * confirm.confidence + 0.3 * confirm.strength + migration_adj)
                .clamp(0.0, 100.0),
            reason: format!(
                "price {:.2} at composite {} {:.2} with {:?} {:?} confirming",
                price,
                if direction == Direction::Bearish { "VAH" } else { "VAL" },
                edge,
                direction,
                confirm.kind,
            ),
            invalidation: format!("stop {stop:.2} or final target {target_2:.2} touched"),
            active: true,
            created_ts: ctx.now,
        })
    }

    /// Price accepted beyond a composite edge with initiative evidence.
    fn recognize_va_breakout(&self, ctx: &MarketContext) -> Option<TradeRecommendation> {
        let va = ctx.composite_va?;
        let tol = self.tolerance();
        let price = ctx.last_price;

        let (direction, edge) = if price > va.vah + tol {
            (Direction::Bullish, va.vah)
        } else if price < va.val - tol {
            (Direction::Bearish, va.val)
        } else {
            return None;
        };

        let confirm = ctx
            .signals
            .latest_directed(SignalKind::Initiative, direction)
            .or_else(|| ctx.signals.latest_directed(SignalKind::StackedImbalance, direction))?;

        let width = va.width().max(self.tick_size);
        let (stop, target_1, target_2) = match direction {
            Direction::Bullish => (
                edge - self.stop_buffer(),
                edge + 0.5 * width,
                edge + width,
            ),
            Direction::Bearish => (
                edge + self.stop_buffer(),
                edge - 0.5 * width,
                edge - width,
            ),
        };

        let migration_adj = match (ctx.migration, direction) {
            (Some(MigrationKind::BreakoutPending), _) => 10.0,
            (Some(MigrationKind::BullishMigration), Direction::Bullish) => 10.0,
            (Some(MigrationKind::BearishMigration), Direction::Bearish) => 10.0,
            (Some(MigrationKind::NeutralOverlap), _) => -10.0,
            _ => 0.0,
        };

        Some(TradeRecommendation {
            setup: SetupKind::ValueAreaBreakout,
            direction,
            entry: price,
            stop,
            target_1,
            target_2,
            confidence: (0.7 * confirm.confidence + 0.3 * confirm.strength + migration_adj)
                .clamp(0.0, 100.0),
            reason: format!(
                "price {:.2} beyond composite {} {:.2} with {:?} {:?} driving",
                price,
                if direction == Direction::Bullish { "VAH" } else { "VAL" },
                edge,
                direction,
                confirm.kind,
            ),
            invalidation: format!("stop {stop:.2} or final target {target_2:.2} touched"),
            active: true,
            created_ts: ctx.now,
        })
    }

    /// Price at a +/-1 sigma band plus absorption/responsive evidence.
    fn recognize_vwap_bounce(&self, ctx: &MarketContext) -> Option<TradeRecommendation> {
        let bands = ctx.vwap_bands?;
        let tol = self.tolerance();
        let price = ctx.last_price;

        let (direction, band, stop) = if (price - bands.plus_1).abs() <= tol {
            (Direction::Bearish, bands.plus_1, bands.plus_2)
        } else if (price - bands.minus_1).abs() <= tol {
            (Direction::Bullish, bands.minus_1, bands.minus_2)
        } else {
            return None;
        };

        let confirm = ctx
            .signals
            .latest_directed(SignalKind::Absorption, direction)
            .or_else(|| ctx.signals.latest_directed(SignalKind::Responsive, direction))?;

        let target_1 = (band + bands.vwap) / 2.0;
        let target_2 = bands.vwap;

        Some(TradeRecommendation {
            setup: SetupKind::VwapBounce,
            direction,
            entry: price,
            stop,
            target_1,
            target_2,
            confidence: (0.6 * confirm.confidence + 0.4 * confirm.strength).clamp(0.0, 100.0),
            reason: format!(
                "price {:.2} at {}1 sigma band {:.2} with {:?} {:?} defending",
                price,
                if direction == Direction::Bearish { "+" } else { "-" },
                band,
                direction,
                confirm.kind,
            ),
            invalidation: format!("stop {stop:.2} or VWAP {target_2:.2} touched"),
            active: true,
            created_ts: ctx.now,
        })
    }
}
