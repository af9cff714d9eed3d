//! The single-writer market engine.
//!
//! One `MarketEngine` owns every aggregator, detector and state
//! machine as an explicit field; `process_tick` runs the whole cycle —
//! validate, classify, aggregate, re-evaluate context, decide, gate —
//! inside one `&mut self` call, so no two ticks ever interleave and
//! "decide" can never race "gate" for the same position.

use chrono::NaiveDate;
use flowtrader_core::{
    AccountSnapshot, Candle, Config, Decision, DepthSnapshot, Error, FootprintBar,
    MigrationKind, OrderAction, OrderConfirmation, PendingOrder, RawTick, Result, SafetyConfig,
    TimestampMs, TradeAction,
};
use flowtrader_context::{
    CompositeContext, LevelStackingManager, MigrationDetector, SessionClock,
    SessionRegimeTracker,
};
use flowtrader_ingestion::{
    AggressorClassifier, CandleBuilder, FootprintBuilder, IngressValidator, ProfileBuilder,
    VwapCalculator,
};
use flowtrader_safety::{PositionTracker, SafetyGate};
use flowtrader_signals::{
    absorption, divergence, exhaustion, imbalance, initiative, trapped, SignalTracker,
};
use flowtrader_strategy::{DecisionEngine, DecisionInputs, MarketContext, OpenTrade, SetupRecognizer};
use tracing::{info, warn};

use crate::snapshot::StateSnapshot;

/// Closed candles kept for detectors and egress.
const CANDLE_HISTORY: usize = 200;
/// Closed footprint bars kept for the stacked-imbalance detector.
const FOOTPRINT_HISTORY: usize = 50;

/// Stop/target armed by an approved entry, applied at fill time.
#[derive(Debug, Clone)]
struct ArmedIntent {
    stop: f64,
    target: f64,
}

/// The tick-processing pipeline and all of its state.
pub struct MarketEngine {
    config: Config,
    validator: IngressValidator,
    classifier: AggressorClassifier,
    candles: CandleBuilder,
    footprints: FootprintBuilder,
    profile: ProfileBuilder,
    vwap: VwapCalculator,
    sessions: SessionRegimeTracker,
    composite: CompositeContext,
    migration_detector: MigrationDetector,
    stacking: LevelStackingManager,
    signals: SignalTracker,
    recognizer: SetupRecognizer,
    decisions: DecisionEngine,
    gate: SafetyGate,
    positions: PositionTracker,
    open_trade: Option<OpenTrade>,
    armed_intent: Option<ArmedIntent>,
    candle_history: Vec<Candle>,
    footprint_history: Vec<FootprintBar>,
    last_depth: Option<DepthSnapshot>,
    last_price: Option<f64>,
    last_migration: Option<MigrationKind>,
    last_decision: Option<Decision>,
}

impl MarketEngine {
    /// Construct the engine. Fails closed when the safety secret is
    /// missing (the gate refuses to come up).
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let gate = SafetyGate::new(config.safety.clone())?;
        let clock = SessionClock::new(&config.instrument.exchange_timezone, &config.session)?;
        let tick_size = config.instrument.tick_size;

        Ok(Self {
            validator: IngressValidator::new(&config.ingress),
            classifier: AggressorClassifier::new(),
            candles: CandleBuilder::new(config.instrument.candle_duration_secs),
            footprints: FootprintBuilder::new(config.instrument.candle_duration_secs, tick_size),
            // Seeded with the epoch placeholder date; the first tick
            // rolls it to the real trading date without archiving.
            profile: ProfileBuilder::new(
                NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch date"),
                tick_size,
                config.profile.value_area_fraction,
            ),
            vwap: VwapCalculator::new(config.vwap.lookback_bars),
            sessions: SessionRegimeTracker::new(clock, &config.session),
            composite: CompositeContext::new(
                config.profile.composite_days,
                config.profile.value_area_fraction,
            ),
            migration_detector: MigrationDetector::new(
                config.profile.migration_overlap_threshold,
                config.setup.level_tolerance_ticks as f64 * tick_size,
            ),
            stacking: LevelStackingManager::new(
                config.profile.stack_tolerance_ticks as f64 * tick_size,
                config.profile.stack_strength_cap,
                30,
            ),
            signals: SignalTracker::new(config.signal.retention_secs),
            recognizer: SetupRecognizer::new(tick_size, config.setup.clone()),
            decisions: DecisionEngine::new(config.decision.clone()),
            gate,
            positions: PositionTracker::new(config.instrument.point_value),
            open_trade: None,
            armed_intent: None,
            candle_history: Vec::new(),
            footprint_history: Vec::new(),
            last_depth: None,
            last_price: None,
            last_migration: None,
            last_decision: None,
            config,
        })
    }

    /// Process one raw transaction through the full cycle. Returns the
    /// gated decision outcome for this cycle.
    pub fn process_tick(&mut self, raw: RawTick) -> Result<Decision> {
        self.validator.validate_tick(&raw)?;
        let tick = self.classifier.classify(&raw);
        self.last_price = Some(tick.price);

        self.roll_day_if_needed(tick.ts_ms);
        self.sessions.on_tick(&tick);
        self.profile.add_tick(&tick);

        if let Some(closed) = self.footprints.update(&tick) {
            self.footprint_history.push(closed);
            if self.footprint_history.len() > FOOTPRINT_HISTORY {
                self.footprint_history.remove(0);
            }
        }

        if let Some(closed) = self.candles.update(&tick) {
            self.on_candle_closed(closed);
        }

        self.positions.mark(tick.price);
        self.gate.record_daily_pnl(self.positions.daily_pnl());

        let decision = self.decide(tick.price);
        let outcome = self.apply_decision(decision, tick.ts_ms);
        self.last_decision = Some(outcome.clone());
        Ok(outcome)
    }

    /// Ingest a depth-of-book snapshot.
    pub fn ingest_depth(&mut self, depth: DepthSnapshot) -> Result<()> {
        self.validator.validate_depth(&depth)?;
        self.last_depth = Some(depth);
        Ok(())
    }

    /// Ingest an account snapshot; authoritative for the drawdown
    /// breaker.
    pub fn ingest_account(&mut self, account: AccountSnapshot) -> Result<()> {
        self.validator.validate_account(&account)?;
        self.gate.record_daily_pnl(account.daily_pnl());
        Ok(())
    }

    /// Seed a historical daily profile (bridge backfill for the
    /// composite before live data covers enough days).
    pub fn seed_daily_profile(&mut self, profile: flowtrader_core::DailyProfile) {
        if let Some(va) = profile.value_area {
            self.stacking
                .archive_day(profile.date, &va, MigrationKind::NeutralOverlap);
        }
        self.composite.add_daily_profile(profile);
    }

    /// Record an execution-collaborator heartbeat.
    pub fn record_heartbeat(&mut self, now: TimestampMs) {
        self.gate.record_heartbeat(now);
    }

    /// Periodic monitor pass, decoupled from tick arrival: the fence
    /// must activate even when the market goes silent.
    pub fn monitor(&mut self, now: TimestampMs) {
        self.gate.refresh_fence(now);
        self.gate.expire_stale(now);
        self.signals.prune(now);
    }

    /// Pull-based order poll for the execution collaborator.
    pub fn poll_pending_orders(&mut self, now: TimestampMs) -> Vec<PendingOrder> {
        self.gate.poll_pending(now)
    }

    /// Apply an order outcome report from the execution collaborator.
    pub fn confirm_order(&mut self, confirmation: &OrderConfirmation, now: TimestampMs) -> Result<()> {
        if let Some(fill) = self.gate.confirm(confirmation, now)? {
            self.positions.apply_fill(fill.action, fill.quantity, fill.price);
            let position = self.positions.position();
            if position.is_flat() {
                self.open_trade = None;
                self.armed_intent = None;
            } else if self.open_trade.is_none() {
                if let (Some(direction), Some(intent)) =
                    (position.direction(), self.armed_intent.take())
                {
                    self.open_trade = Some(OpenTrade {
                        direction,
                        entry: fill.price,
                        stop: intent.stop,
                        target: intent.target,
                        opened_ts: fill.ts_ms,
                    });
                }
            }
            info!(target: "engine", contracts = position.contracts, "position updated from fill");
        }
        Ok(())
    }

    /// Enable or disable auto-trading (authenticated).
    pub fn set_auto_trading(&mut self, key: &str, enabled: bool) -> Result<()> {
        self.gate.set_auto_trading(key, enabled)
    }

    /// Emergency stop: force-flat plus fence (authenticated).
    pub fn emergency_stop(&mut self, key: &str, now: TimestampMs) -> Result<Option<PendingOrder>> {
        let position = self.positions.position().clone();
        self.gate.emergency_stop(key, &position, now)
    }

    /// Manually clear the drawdown circuit breaker (authenticated).
    pub fn clear_circuit_breaker(&mut self, key: &str, now: TimestampMs) -> Result<()> {
        self.gate.clear_circuit_breaker(key, now)
    }

    /// Replace the safety configuration (authenticated).
    pub fn update_safety_config(&mut self, key: &str, config: SafetyConfig) -> Result<()> {
        self.gate.update_config(key, config)
    }

    /// Closed candles, oldest first.
    pub fn recent_candles(&self) -> &[Candle] {
        &self.candle_history
    }

    /// Publish one consistent snapshot of the engine state.
    pub fn snapshot(&mut self, now: TimestampMs) -> StateSnapshot {
        StateSnapshot {
            ts_ms: now,
            last_price: self.last_price,
            current_candle: self.candles.current(),
            last_closed_candle: self.candle_history.last().cloned(),
            vwap: self.vwap.bands(),
            session: self.sessions.current_session(),
            regime: self.sessions.active_regime(),
            position: self.positions.position().clone(),
            composite_va: self.composite.composite_value_area(),
            daily_va: self.profile.value_area(),
            migration: self.last_migration,
            stacked_levels: self.stacking.stacked_levels(),
            signals: self.signals.to_vec(),
            recommendations: self.recognizer.all().to_vec(),
            last_decision: self.last_decision.clone(),
            safety: self.gate.status(now),
        }
    }

    /// Exchange-local day roll: archive today's profile into the
    /// composite and stacking history, then reset the day-scoped state.
    fn roll_day_if_needed(&mut self, ts_ms: TimestampMs) {
        let today = self.sessions.clock().trading_date(ts_ms);
        if self.profile.date() == today {
            return;
        }

        let had_volume = self.profile.total_volume() > 0.0;
        let closed = self.profile.roll(today);
        if had_volume {
            info!(target: "engine", date = %closed.date, volume = closed.total_volume(),
                  "daily profile closed");
            if let Some(va) = closed.value_area {
                self.stacking.archive_day(
                    closed.date,
                    &va,
                    self.last_migration.unwrap_or(MigrationKind::NeutralOverlap),
                );
            }
            self.composite.add_daily_profile(closed);

            // Day-scoped state starts fresh.
            self.vwap.reset();
            self.positions.reset_daily();
            if let Some(candle) = self.candles.flush() {
                self.push_candle_history(candle);
            }
            if let Some(fp) = self.footprints.flush() {
                self.footprint_history.push(fp);
            }
            self.last_migration = None;
        }
    }

    fn push_candle_history(&mut self, candle: Candle) {
        self.candle_history.push(candle);
        if self.candle_history.len() > CANDLE_HISTORY {
            self.candle_history.remove(0);
        }
    }

    /// Bar-close housekeeping: VWAP, detectors, migration, setups.
    fn on_candle_closed(&mut self, closed: Candle) {
        let now = closed.ts_close();
        self.vwap.add_candle(&closed);
        self.push_candle_history(closed.clone());

        let cfg = &self.config.signal;
        self.signals
            .record(divergence::detect(&self.candle_history, cfg, now));
        self.signals
            .record(trapped::detect(&self.candle_history, cfg, now));
        self.signals
            .record(exhaustion::detect(&self.candle_history, cfg, now));
        self.signals
            .record(absorption::detect(&self.candle_history, cfg, now));
        self.signals
            .record(imbalance::detect(&self.footprint_history, cfg, now));

        let daily_va = self.profile.value_area();
        let composite_va = self.composite.composite_value_area();
        if let Some(va) = composite_va.or(daily_va) {
            self.signals
                .record(initiative::detect(&self.candle_history, &va, cfg, now));
        }
        self.signals.prune(now);

        self.last_migration = match (daily_va, composite_va) {
            (Some(daily), Some(composite)) => {
                Some(self.migration_detector.detect(&daily, &composite, closed.close))
            }
            _ => None,
        };

        self.recognizer.evaluate(&MarketContext {
            last_price: closed.close,
            composite_va,
            migration: self.last_migration,
            vwap_bands: self.vwap.bands(),
            signals: &self.signals,
            now,
        });
    }

    fn decide(&mut self, last_price: f64) -> Decision {
        let session = self
            .sessions
            .current_session()
            .unwrap_or(flowtrader_core::SessionKind::Extended);
        let recommendations: Vec<&_> = self.recognizer.active().collect();
        let inputs = DecisionInputs {
            position: self.positions.position(),
            open_trade: self.open_trade.as_ref(),
            recommendations: &recommendations,
            signals: &self.signals,
            session,
            regime: self.sessions.active_regime(),
            book_imbalance: self.last_depth.as_ref().map(|d| d.imbalance()),
            last_price,
        };
        self.decisions.decide(&inputs)
    }

    /// Hand the decision to the safety gate. A refusal becomes a Hold
    /// outcome carrying the gate's reason; it never aborts the cycle.
    fn apply_decision(&mut self, decision: Decision, now: TimestampMs) -> Decision {
        let (action, quantity) = match decision.action {
            TradeAction::Buy => (OrderAction::Buy, self.config.decision.order_quantity),
            TradeAction::Sell => (OrderAction::Sell, self.config.decision.order_quantity),
            TradeAction::Close => {
                let position = self.positions.position();
                if position.is_flat() {
                    return Decision::hold("close requested but already flat");
                }
                let action = if position.is_long() {
                    OrderAction::Sell
                } else {
                    OrderAction::Buy
                };
                (action, position.contracts.unsigned_abs())
            }
            TradeAction::Hold => return decision,
        };

        match self.gate.submit(action, quantity, now) {
            Ok(order) => {
                if decision.action != TradeAction::Close {
                    self.armed_intent = match (decision.stop, decision.target) {
                        (Some(stop), Some(target)) => Some(ArmedIntent { stop, target }),
                        _ => None,
                    };
                }
                info!(target: "engine", id = %order.id, action = ?decision.action, "order gated through");
                decision
            }
            Err(Error::Safety(reason)) => {
                warn!(target: "engine", %reason, "decision refused by safety gate");
                Decision::hold(format!("refused by safety gate: {reason}"))
            }
            Err(other) => {
                warn!(target: "engine", error = %other, "order submission failed");
                Decision::hold(format!("order submission failed: {other}"))
            }
        }
    }
}
