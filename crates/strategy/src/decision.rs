//! The decision engine: one gated action per evaluation cycle.
//!
//! Exit logic for an open position runs before any entry logic. Entries
//! require a flat position, a recommendation meeting the minimum
//! confidence, and exactly one net directional bias; anything else is a
//! Hold with an explicit reason.

use flowtrader_core::{
    Decision, DecisionConfig, Direction, Position, Regime, SessionKind, SignalKind,
    TimestampMs, TradeAction, TradeRecommendation,
};
use flowtrader_signals::SignalTracker;

/// The trade currently being managed, recorded at fill time.
#[derive(Debug, Clone)]
pub struct OpenTrade {
    pub direction: Direction,
    pub entry: f64,
    pub stop: f64,
    pub target: f64,
    pub opened_ts: TimestampMs,
}

/// Read-only inputs for one decision cycle.
pub struct DecisionInputs<'a> {
    pub position: &'a Position,
    pub open_trade: Option<&'a OpenTrade>,
    pub recommendations: &'a [&'a TradeRecommendation],
    pub signals: &'a SignalTracker,
    pub session: SessionKind,
    pub regime: Regime,
    pub book_imbalance: Option<f64>,
    pub last_price: f64,
}

/// Converts recommendations plus position state into a single action.
pub struct DecisionEngine {
    config: DecisionConfig,
}

impl DecisionEngine {
    pub fn new(config: DecisionConfig) -> Self {
        Self { config }
    }

    /// Evaluate one cycle. Exit checks run first; a flat position falls
    /// through to entry evaluation.
    pub fn decide(&self, inputs: &DecisionInputs) -> Decision {
        if !inputs.position.is_flat() {
            return self.decide_exit(inputs);
        }
        self.decide_entry(inputs)
    }

    fn decide_exit(&self, inputs: &DecisionInputs) -> Decision {
        let held = inputs
            .position
            .direction()
            .expect("non-flat position has a direction");

        // Liquidity-risk policy, not a tradeable signal: no open
        // position outside regular hours, independent of everything else.
        if inputs.session != SessionKind::Regular {
            return self.close("outside regular hours with open position");
        }

        if let Some(trade) = inputs.open_trade {
            let price = inputs.last_price;
            match trade.direction {
                Direction::Bullish => {
                    if price <= trade.stop {
                        return self.close(format!("stop {:.2} touched", trade.stop));
                    }
                    if price >= trade.target {
                        return self.close(format!("target {:.2} reached", trade.target));
                    }
                }
                Direction::Bearish => {
                    if price >= trade.stop {
                        return self.close(format!("stop {:.2} touched", trade.stop));
                    }
                    if price <= trade.target {
                        return self.close(format!("target {:.2} reached", trade.target));
                    }
                }
            }
        }

        // Adverse absorption: passive defense against the held side.
        if let Some(absorption) = inputs.signals.latest(SignalKind::Absorption) {
            if absorption.direction == held.opposite() {
                return self.close(format!(
                    "adverse absorption against {held:?} position"
                ));
            }
        }

        // Order-book imbalance flipped hard against the position.
        if let Some(imbalance) = inputs.book_imbalance {
            let adverse = match held {
                Direction::Bullish => imbalance <= -self.config.book_flip_threshold,
                Direction::Bearish => imbalance >= self.config.book_flip_threshold,
            };
            if adverse {
                return self.close(format!(
                    "book imbalance {imbalance:.2} flipped against {held:?} position"
                ));
            }
        }

        // Session regime flipped against the position.
        let regime_adverse = matches!(
            (held, inputs.regime),
            (Direction::Bullish, Regime::DirectionalBearish)
                | (Direction::Bearish, Regime::DirectionalBullish)
        );
        if regime_adverse {
            return self.close(format!("regime {:?} against {held:?} position", inputs.regime));
        }

        Decision::hold("holding open position")
    }

    fn decide_entry(&self, inputs: &DecisionInputs) -> Decision {
        let qualified: Vec<&TradeRecommendation> = inputs
            .recommendations
            .iter()
            .copied()
            .filter(|r| r.active && r.confidence >= self.config.min_confidence)
            .collect();

        if qualified.is_empty() {
            return Decision::hold("insufficient context: no recommendation meets minimum confidence");
        }

        let has_bullish = qualified.iter().any(|r| r.direction == Direction::Bullish);
        let has_bearish = qualified.iter().any(|r| r.direction == Direction::Bearish);
        if has_bullish && has_bearish {
            return Decision::hold("conflicting directional bias across recommendations");
        }

        let winner = qualified
            .iter()
            .max_by(|a, b| {
                a.confidence
                    .partial_cmp(&b.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .expect("non-empty qualified set");

        let action = match winner.direction {
            Direction::Bullish => TradeAction::Buy,
            Direction::Bearish => TradeAction::Sell,
        };

        Decision {
            action,
            entry: Some(winner.entry),
            stop: Some(winner.stop),
            target: Some(winner.target_2),
            confidence: winner.confidence,
            reason: format!(
                "{:?} {:?} @ {:.2}: {} | regime {:?}",
                winner.setup, winner.direction, winner.entry, winner.reason, inputs.regime
            ),
        }
    }

    fn close(&self, reason: impl Into<String>) -> Decision {
        Decision {
            action: TradeAction::Close,
            entry: None,
            stop: None,
            target: None,
            confidence: 0.0,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowtrader_core::{OrderFlowSignal, SetupKind};

    fn engine() -> DecisionEngine {
        DecisionEngine::new(DecisionConfig::default())
    }

    fn rec(direction: Direction, confidence: f64) -> TradeRecommendation {
        TradeRecommendation {
            setup: SetupKind::ValueAreaFade,
            direction,
            entry: 5010.0,
            stop: 5014.0,
            target_1: 5000.0,
            target_2: 4998.0,
            confidence,
            reason: "test context".to_string(),
            invalidation: String::new(),
            active: true,
            created_ts: 0,
        }
    }

    fn flat() -> Position {
        Position::default()
    }

    fn long() -> Position {
        Position {
            contracts: 1,
            entry_price: 5005.0,
            realized_pnl: 0.0,
            unrealized_pnl: 0.0,
        }
    }

    fn open_trade() -> OpenTrade {
        OpenTrade {
            direction: Direction::Bullish,
            entry: 5005.0,
            stop: 5000.0,
            target: 5020.0,
            opened_ts: 0,
        }
    }

    fn inputs<'a>(
        position: &'a Position,
        open_trade: Option<&'a OpenTrade>,
        recommendations: &'a [&'a TradeRecommendation],
        signals: &'a SignalTracker,
        price: f64,
    ) -> DecisionInputs<'a> {
        DecisionInputs {
            position,
            open_trade,
            recommendations,
            signals,
            session: SessionKind::Regular,
            regime: Regime::Rotational,
            book_imbalance: None,
            last_price: price,
        }
    }

    #[test]
    fn test_entry_from_winning_recommendation() {
        let signals = SignalTracker::new(3600);
        let r = rec(Direction::Bearish, 85.0);
        let recs = [&r];
        let position = flat();

        let decision = engine().decide(&inputs(&position, None, &recs, &signals, 5010.0));
        assert_eq!(decision.action, TradeAction::Sell);
        assert_eq!(decision.entry, Some(5010.0));
        assert_eq!(decision.stop, Some(5014.0));
        assert_eq!(decision.target, Some(4998.0));
        assert!(decision.reason.contains("ValueAreaFade"));
    }

    #[test]
    fn test_low_confidence_is_hold() {
        let signals = SignalTracker::new(3600);
        let r = rec(Direction::Bearish, 50.0);
        let recs = [&r];
        let position = flat();

        let decision = engine().decide(&inputs(&position, None, &recs, &signals, 5010.0));
        assert_eq!(decision.action, TradeAction::Hold);
        assert!(decision.reason.contains("insufficient context"));
    }

    #[test]
    fn test_conflicting_bias_is_hold() {
        let signals = SignalTracker::new(3600);
        let bull = rec(Direction::Bullish, 90.0);
        let bear = rec(Direction::Bearish, 85.0);
        let recs = [&bull, &bear];
        let position = flat();

        let decision = engine().decide(&inputs(&position, None, &recs, &signals, 5010.0));
        assert_eq!(decision.action, TradeAction::Hold);
        assert!(decision.reason.contains("conflicting"));
    }

    #[test]
    fn test_no_entry_while_position_open() {
        // An open position never produces a Buy/Sell, only Close/Hold.
        let signals = SignalTracker::new(3600);
        let r = rec(Direction::Bullish, 95.0);
        let recs = [&r];
        let position = long();
        let trade = open_trade();

        let decision = engine().decide(&inputs(&position, Some(&trade), &recs, &signals, 5010.0));
        assert!(matches!(
            decision.action,
            TradeAction::Hold | TradeAction::Close
        ));
    }

    #[test]
    fn test_stop_touch_forces_close() {
        let signals = SignalTracker::new(3600);
        let position = long();
        let trade = open_trade();

        let decision = engine().decide(&inputs(&position, Some(&trade), &[], &signals, 4999.0));
        assert_eq!(decision.action, TradeAction::Close);
        assert!(decision.reason.contains("stop"));
    }

    #[test]
    fn test_target_touch_forces_close() {
        let signals = SignalTracker::new(3600);
        let position = long();
        let trade = open_trade();

        let decision = engine().decide(&inputs(&position, Some(&trade), &[], &signals, 5020.5));
        assert_eq!(decision.action, TradeAction::Close);
        assert!(decision.reason.contains("target"));
    }

    #[test]
    fn test_outside_regular_hours_hard_exit() {
        let signals = SignalTracker::new(3600);
        let position = long();
        let trade = open_trade();
        // Price comfortably between stop and target; still closed.
        let mut i = inputs(&position, Some(&trade), &[], &signals, 5010.0);
        i.session = SessionKind::Extended;

        let decision = engine().decide(&i);
        assert_eq!(decision.action, TradeAction::Close);
        assert!(decision.reason.contains("outside regular hours"));
    }

    #[test]
    fn test_adverse_absorption_closes_long() {
        let mut signals = SignalTracker::new(3600);
        signals.record(Some(OrderFlowSignal {
            kind: SignalKind::Absorption,
            direction: Direction::Bearish,
            strength: 80.0,
            confidence: 80.0,
            actionable: true,
            ts_ms: 1000,
        }));
        let position = long();
        let trade = open_trade();

        let decision = engine().decide(&inputs(&position, Some(&trade), &[], &signals, 5010.0));
        assert_eq!(decision.action, TradeAction::Close);
        assert!(decision.reason.contains("absorption"));
    }

    #[test]
    fn test_book_flip_closes_long() {
        let signals = SignalTracker::new(3600);
        let position = long();
        let trade = open_trade();
        let mut i = inputs(&position, Some(&trade), &[], &signals, 5010.0);
        i.book_imbalance = Some(-0.75);

        let decision = engine().decide(&i);
        assert_eq!(decision.action, TradeAction::Close);
        assert!(decision.reason.contains("book imbalance"));
    }

    #[test]
    fn test_regime_flip_closes_long() {
        let signals = SignalTracker::new(3600);
        let position = long();
        let trade = open_trade();
        let mut i = inputs(&position, Some(&trade), &[], &signals, 5010.0);
        i.regime = Regime::DirectionalBearish;

        let decision = engine().decide(&i);
        assert_eq!(decision.action, TradeAction::Close);
        assert!(decision.reason.contains("regime"));
    }

    #[test]
    fn test_healthy_position_holds() {
        let signals = SignalTracker::new(3600);
        let position = long();
        let trade = open_trade();

        let decision = engine().decide(&inputs(&position, Some(&trade), &[], &signals, 5010.0));
        assert_eq!(decision.action, TradeAction::Hold);
    }

    #[test]
    fn test_no_recommendations_is_hold() {
        let signals = SignalTracker::new(3600);
        let position = flat();
        let decision = engine().decide(&inputs(&position, None, &[], &signals, 5010.0));
        assert_eq!(decision.action, TradeAction::Hold);
    }
}
