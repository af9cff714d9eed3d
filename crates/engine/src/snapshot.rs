//! Read-only state egress.
//!
//! A snapshot is an immutable copy of the pipeline's published state,
//! safe to hand to presentation and transport collaborators while the
//! engine keeps mutating its own copies.

use flowtrader_core::{
    Candle, Decision, MigrationKind, OrderFlowSignal, Position, Regime, SessionKind,
    StackedLevel, TimestampMs, TradeRecommendation, ValueArea, VwapBands,
};
use flowtrader_safety::SafetyStatus;
use serde::{Deserialize, Serialize};

/// One consistent view of the engine, published after each cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Timestamp of the cycle that produced this snapshot.
    pub ts_ms: TimestampMs,
    /// Last validated trade price.
    pub last_price: Option<f64>,
    /// The candle currently building.
    pub current_candle: Option<Candle>,
    /// Most recently closed candle.
    pub last_closed_candle: Option<Candle>,
    /// VWAP and sigma bands, when available.
    pub vwap: Option<VwapBands>,
    /// Session of the last tick.
    pub session: Option<SessionKind>,
    /// Regime of the active session.
    pub regime: Regime,
    /// The single position record.
    pub position: Position,
    /// Composite value area, when enough days are retained.
    pub composite_va: Option<ValueArea>,
    /// Today's live value area.
    pub daily_va: Option<ValueArea>,
    /// Latest migration classification.
    pub migration: Option<MigrationKind>,
    /// Multi-day stacked levels, strongest first.
    pub stacked_levels: Vec<StackedLevel>,
    /// Retained actionable signals.
    pub signals: Vec<OrderFlowSignal>,
    /// All retained recommendations (active and invalidated).
    pub recommendations: Vec<TradeRecommendation>,
    /// Outcome of the most recent decision cycle.
    pub last_decision: Option<Decision>,
    /// Safety gate state.
    pub safety: SafetyStatus,
}
