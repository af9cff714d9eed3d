//! Session classification and per-session regime state.
//!
//! Wall-clock time converts to the exchange's local time through the
//! IANA tz database, so daylight-saving shifts move the session
//! boundaries with the exchange. Regular hours apply on weekdays
//! inside the configured window; everything else is Extended.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use flowtrader_core::{Error, Regime, Result, SessionConfig, SessionKind, Tick, TimestampMs};
use tracing::info;

/// Converts timestamps to exchange-local sessions and trading dates.
pub struct SessionClock {
    tz: Tz,
    regular_open: NaiveTime,
    regular_close: NaiveTime,
}

impl SessionClock {
    pub fn new(timezone: &str, config: &SessionConfig) -> Result<Self> {
        let tz: Tz = timezone
            .parse()
            .map_err(|_| Error::config(format!("unknown timezone: {timezone}")))?;
        Ok(Self {
            tz,
            regular_open: parse_hhmm(&config.regular_open)?,
            regular_close: parse_hhmm(&config.regular_close)?,
        })
    }

    fn local(&self, ts_ms: TimestampMs) -> DateTime<Tz> {
        Utc.timestamp_millis_opt(ts_ms)
            .single()
            .unwrap_or_else(|| Utc.timestamp_millis_opt(0).unwrap())
            .with_timezone(&self.tz)
    }

    /// Classify a timestamp into a session.
    pub fn classify(&self, ts_ms: TimestampMs) -> SessionKind {
        let local = self.local(ts_ms);
        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return SessionKind::Extended;
        }
        let t = NaiveTime::from_hms_opt(local.hour(), local.minute(), local.second())
            .unwrap_or(self.regular_open);
        if t >= self.regular_open && t < self.regular_close {
            SessionKind::Regular
        } else {
            SessionKind::Extended
        }
    }

    /// Exchange-local calendar date of a timestamp.
    pub fn trading_date(&self, ts_ms: TimestampMs) -> NaiveDate {
        self.local(ts_ms).date_naive()
    }
}

fn parse_hhmm(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|_| Error::config(format!("bad HH:MM time: {s}")))
}

/// Per-session cumulative delta and regime label.
#[derive(Debug, Clone, Copy)]
pub struct RegimeState {
    pub cumulative_delta: f64,
    pub regime: Regime,
}

impl Default for RegimeState {
    fn default() -> Self {
        Self {
            cumulative_delta: 0.0,
            regime: Regime::Rotational,
        }
    }
}

/// A session boundary crossing observed by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTransition {
    pub from: SessionKind,
    pub to: SessionKind,
    pub ts_ms: TimestampMs,
}

/// The session/regime state machine.
///
/// The counter reset at each boundary is deliberately asymmetric and
/// destructive: the regular counter is zeroed at regular open (no
/// overnight carry-over) and the extended counter is zeroed at regular
/// close. State is discarded here, not merged.
pub struct SessionRegimeTracker {
    clock: SessionClock,
    regular_threshold: f64,
    extended_threshold: f64,
    current_session: Option<SessionKind>,
    regular: RegimeState,
    extended: RegimeState,
}

impl SessionRegimeTracker {
    pub fn new(clock: SessionClock, config: &SessionConfig) -> Self {
        Self {
            clock,
            regular_threshold: config.regular_delta_threshold,
            extended_threshold: config.extended_delta_threshold,
            current_session: None,
            regular: RegimeState::default(),
            extended: RegimeState::default(),
        }
    }

    /// Session the last processed tick belonged to.
    pub fn current_session(&self) -> Option<SessionKind> {
        self.current_session
    }

    /// Regime state for a session kind.
    pub fn state(&self, kind: SessionKind) -> RegimeState {
        match kind {
            SessionKind::Regular => self.regular,
            SessionKind::Extended => self.extended,
        }
    }

    /// Regime of the session currently in progress (Rotational before
    /// the first tick).
    pub fn active_regime(&self) -> Regime {
        match self.current_session {
            Some(kind) => self.state(kind).regime,
            None => Regime::Rotational,
        }
    }

    /// Exchange-local clock shared with the rest of the pipeline.
    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }

    /// Process one tick: detect a session boundary, apply the counter
    /// reset, then accumulate into the active session.
    pub fn on_tick(&mut self, tick: &Tick) -> Option<SessionTransition> {
        let session = self.clock.classify(tick.ts_ms);
        let transition = match self.current_session {
            Some(prev) if prev != session => {
                match session {
                    // Regular open: the regular counter starts from zero.
                    SessionKind::Regular => self.regular = RegimeState::default(),
                    // Regular close: the extended counter starts from zero.
                    SessionKind::Extended => self.extended = RegimeState::default(),
                }
                info!(target: "session", from = ?prev, to = ?session, "session transition");
                Some(SessionTransition {
                    from: prev,
                    to: session,
                    ts_ms: tick.ts_ms,
                })
            }
            _ => None,
        };
        self.current_session = Some(session);

        let (state, threshold) = match session {
            SessionKind::Regular => (&mut self.regular, self.regular_threshold),
            SessionKind::Extended => (&mut self.extended, self.extended_threshold),
        };
        state.cumulative_delta += tick.signed_size();
        state.regime = if state.cumulative_delta >= threshold {
            Regime::DirectionalBullish
        } else if state.cumulative_delta <= -threshold {
            Regime::DirectionalBearish
        } else {
            Regime::Rotational
        };

        transition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowtrader_core::AggressorSide;

    fn clock() -> SessionClock {
        SessionClock::new("America/Chicago", &SessionConfig::default()).unwrap()
    }

    fn tracker(regular_th: f64, extended_th: f64) -> SessionRegimeTracker {
        let config = SessionConfig {
            regular_delta_threshold: regular_th,
            extended_delta_threshold: extended_th,
            ..SessionConfig::default()
        };
        SessionRegimeTracker::new(clock(), &config)
    }

    fn tick(ts_ms: i64, size: f64, side: AggressorSide) -> Tick {
        Tick {
            ts_ms,
            price: 5000.0,
            size,
            side,
        }
    }

    // 2025-03-12 is a Wednesday. 14:30 UTC == 09:30 CDT (regular);
    // 10:00 UTC == 05:00 CDT (extended).
    const WED_REGULAR_MS: i64 = 1741789800000; // 2025-03-12 14:30:00 UTC
    const WED_EXTENDED_MS: i64 = 1741773600000; // 2025-03-12 10:00:00 UTC

    #[test]
    fn test_classify_regular_vs_extended() {
        let clock = clock();
        assert_eq!(clock.classify(WED_REGULAR_MS), SessionKind::Regular);
        assert_eq!(clock.classify(WED_EXTENDED_MS), SessionKind::Extended);
    }

    #[test]
    fn test_weekend_is_extended() {
        // 2025-03-15 is a Saturday; 15:00 UTC would be mid-morning local.
        let sat_ms = 1742050800000;
        assert_eq!(clock().classify(sat_ms), SessionKind::Extended);
    }

    #[test]
    fn test_dst_shift_moves_boundary() {
        // 2025-01-15 (CST, UTC-6): 14:00 UTC is 08:00 local -> Extended.
        // 2025-06-18 (CDT, UTC-5): 14:00 UTC is 09:00 local -> Regular.
        let winter_ms = 1736949600000; // 2025-01-15 14:00:00 UTC, Wednesday
        let summer_ms = 1750255200000; // 2025-06-18 14:00:00 UTC, Wednesday
        let clock = clock();
        assert_eq!(clock.classify(winter_ms), SessionKind::Extended);
        assert_eq!(clock.classify(summer_ms), SessionKind::Regular);
    }

    #[test]
    fn test_regime_threshold_crossings() {
        let mut tracker = tracker(10.0, 5.0);

        // Build +10 delta in regular hours: directional bullish.
        for i in 0..10 {
            tracker.on_tick(&tick(WED_REGULAR_MS + i * 1000, 1.0, AggressorSide::Buy));
        }
        assert_eq!(
            tracker.state(SessionKind::Regular).regime,
            Regime::DirectionalBullish
        );

        // Sell pressure pulls delta back inside the band.
        for i in 0..8 {
            tracker.on_tick(&tick(WED_REGULAR_MS + 20_000 + i * 1000, 1.0, AggressorSide::Sell));
        }
        assert_eq!(
            tracker.state(SessionKind::Regular).regime,
            Regime::Rotational
        );
    }

    #[test]
    fn test_extended_threshold_is_tighter() {
        let mut tracker = tracker(10.0, 5.0);
        for i in 0..5 {
            tracker.on_tick(&tick(WED_EXTENDED_MS + i * 1000, 1.0, AggressorSide::Buy));
        }
        assert_eq!(
            tracker.state(SessionKind::Extended).regime,
            Regime::DirectionalBullish
        );
    }

    #[test]
    fn test_regular_delta_zeroed_at_open() {
        let mut tracker = tracker(10.0, 5.0);

        // Accumulate overnight delta.
        for i in 0..50 {
            tracker.on_tick(&tick(WED_EXTENDED_MS + i * 1000, 1.0, AggressorSide::Buy));
        }
        assert_eq!(tracker.state(SessionKind::Extended).cumulative_delta, 50.0);

        // First regular-hours tick crosses the boundary.
        let transition = tracker
            .on_tick(&tick(WED_REGULAR_MS, 1.0, AggressorSide::Buy))
            .unwrap();
        assert_eq!(transition.from, SessionKind::Extended);
        assert_eq!(transition.to, SessionKind::Regular);

        // Regular delta reflects only the opening tick, nothing carried.
        assert_eq!(tracker.state(SessionKind::Regular).cumulative_delta, 1.0);
        // The extended counter is untouched until regular close.
        assert_eq!(tracker.state(SessionKind::Extended).cumulative_delta, 50.0);
    }

    #[test]
    fn test_extended_delta_zeroed_at_close() {
        let mut tracker = tracker(10.0, 5.0);
        tracker.on_tick(&tick(WED_EXTENDED_MS, 3.0, AggressorSide::Buy));
        tracker.on_tick(&tick(WED_REGULAR_MS, 1.0, AggressorSide::Buy));

        // 21:00 UTC = 16:00 CDT, after the regular close.
        let after_close_ms = 1741813200000;
        let transition = tracker
            .on_tick(&tick(after_close_ms, 2.0, AggressorSide::Sell))
            .unwrap();
        assert_eq!(transition.to, SessionKind::Extended);
        // Only the post-close tick remains in the extended counter.
        assert_eq!(tracker.state(SessionKind::Extended).cumulative_delta, -2.0);
    }

    #[test]
    fn test_trading_date() {
        let clock = clock();
        let date = clock.trading_date(WED_REGULAR_MS);
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 3, 12).unwrap());
    }
}
