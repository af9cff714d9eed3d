//! The safety gate: final authority before order transmission.
//!
//! Lifecycle per order: none -> Pending -> Executed | Failed | Expired.
//! The gate enforces at-most-one pending order, expires unconfirmed
//! intents, fences on stale heartbeats, cools down rejected intents,
//! trips a circuit breaker on daily drawdown, and refuses to construct
//! without an authorization secret.

use flowtrader_core::{
    ConfirmationStatus, Error, OrderAction, OrderConfirmation, OrderStatus, PendingOrder,
    Position, Result, SafetyConfig, TimestampMs,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// Read-only safety state for egress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyStatus {
    pub fence_active: bool,
    pub breaker_tripped: bool,
    pub auto_trading: bool,
    pub pending_orders: usize,
    pub daily_pnl: f64,
    /// Age of the last heartbeat, `None` before the first one.
    pub heartbeat_age_ms: Option<i64>,
}

/// A confirmed fill handed back to the caller for position accounting.
#[derive(Debug, Clone)]
pub struct ConfirmedFill {
    pub action: OrderAction,
    pub quantity: u32,
    pub price: f64,
    pub ts_ms: TimestampMs,
}

#[derive(Debug, Clone)]
struct Cooldown {
    action: OrderAction,
    quantity: u32,
    until_ts: TimestampMs,
}

/// The safety gate.
pub struct SafetyGate {
    config: SafetyConfig,
    auto_trading: bool,
    fence_active: bool,
    breaker_tripped: bool,
    pending: Vec<PendingOrder>,
    cooldowns: Vec<Cooldown>,
    last_heartbeat: Option<TimestampMs>,
    daily_pnl: f64,
    next_seq: u64,
}

impl SafetyGate {
    /// Construct the gate. Fails closed: an empty authorization secret
    /// is the one fatal startup condition.
    pub fn new(config: SafetyConfig) -> Result<Self> {
        if config.auth_key.trim().is_empty() {
            return Err(Error::config(
                "safety authorization secret is not configured; refusing to start",
            ));
        }
        Ok(Self {
            config,
            auto_trading: false,
            // Fenced until the first heartbeat proves connectivity.
            fence_active: true,
            breaker_tripped: false,
            pending: Vec::new(),
            cooldowns: Vec::new(),
            last_heartbeat: None,
            daily_pnl: 0.0,
            next_seq: 1,
        })
    }

    /// Verify a control-plane authorization key.
    pub fn authorize(&self, key: &str) -> Result<()> {
        // Length-independent comparison over the byte pairs.
        let a = self.config.auth_key.as_bytes();
        let b = key.as_bytes();
        let mut diff = a.len() ^ b.len();
        for i in 0..a.len().min(b.len()) {
            diff |= (a[i] ^ b[i]) as usize;
        }
        if diff == 0 {
            Ok(())
        } else {
            Err(Error::safety("unauthorized: bad safety key"))
        }
    }

    /// Record a heartbeat from the execution collaborator.
    pub fn record_heartbeat(&mut self, now: TimestampMs) {
        self.last_heartbeat = Some(now);
        self.refresh_fence(now);
    }

    /// Re-evaluate the fence. Runs on the monitor timer so the fence
    /// activates even when ticks stop arriving entirely.
    pub fn refresh_fence(&mut self, now: TimestampMs) -> bool {
        let stale = match self.last_heartbeat {
            Some(ts) => now - ts > self.config.heartbeat_timeout_secs as i64 * 1000,
            None => true,
        };
        let next = stale || self.breaker_tripped;
        if next != self.fence_active {
            if next {
                warn!(target: "safety", "fence activated (stale={stale}, breaker={})", self.breaker_tripped);
            } else {
                info!(target: "safety", "fence cleared, connectivity fresh");
            }
        }
        self.fence_active = next;
        self.fence_active
    }

    /// Submit an order intent. Every refusal carries its reason.
    pub fn submit(
        &mut self,
        action: OrderAction,
        quantity: u32,
        now: TimestampMs,
    ) -> Result<PendingOrder> {
        if !self.auto_trading {
            return Err(Error::safety("auto-trading disabled"));
        }
        if self.breaker_tripped {
            return Err(Error::safety(format!(
                "circuit breaker tripped at daily P&L {:.2}",
                self.daily_pnl
            )));
        }
        self.refresh_fence(now);
        if self.fence_active {
            return Err(Error::safety(
                "fence active: execution connectivity not confirmed",
            ));
        }

        self.expire_stale(now);
        if let Some(pending) = self.pending.first() {
            return Err(Error::safety(format!(
                "order {} already pending; one order in flight at most",
                pending.id
            )));
        }

        self.cooldowns.retain(|c| c.until_ts > now);
        if self
            .cooldowns
            .iter()
            .any(|c| c.action == action && c.quantity == quantity)
        {
            return Err(Error::safety(
                "identical order rejected recently; cooldown active",
            ));
        }

        let order = PendingOrder {
            id: format!("FT-{:06}", self.next_seq),
            action,
            quantity,
            created_ts: now,
            status: OrderStatus::Pending,
        };
        self.next_seq += 1;
        info!(target: "safety", id = %order.id, ?action, quantity, "order queued");
        self.pending.push(order.clone());
        Ok(order)
    }

    /// Expire unconfirmed orders past the configured age. Expired
    /// intents are removed from the queue, never executed.
    pub fn expire_stale(&mut self, now: TimestampMs) -> usize {
        let expiry_ms = self.config.order_expiry_secs as i64 * 1000;
        let before = self.pending.len();
        self.pending.retain(|o| {
            let keep = o.age_ms(now) <= expiry_ms;
            if !keep {
                warn!(target: "safety", id = %o.id, age_ms = o.age_ms(now), "order expired unconfirmed");
            }
            keep
        });
        before - self.pending.len()
    }

    /// Pull-based poll by the execution collaborator. Idempotent:
    /// repeated polls return the same pending intents, never duplicates.
    pub fn poll_pending(&mut self, now: TimestampMs) -> Vec<PendingOrder> {
        self.expire_stale(now);
        self.pending
            .iter()
            .filter(|o| o.status == OrderStatus::Pending)
            .cloned()
            .collect()
    }

    /// Apply an order outcome report. A fill is returned for position
    /// accounting; a reject starts the cooldown.
    pub fn confirm(
        &mut self,
        confirmation: &OrderConfirmation,
        now: TimestampMs,
    ) -> Result<Option<ConfirmedFill>> {
        let idx = self
            .pending
            .iter()
            .position(|o| o.id == confirmation.order_id)
            .ok_or_else(|| {
                Error::execution(format!("unknown order id {}", confirmation.order_id))
            })?;
        let order = self.pending.remove(idx);

        match confirmation.status {
            ConfirmationStatus::Filled => {
                let price = confirmation.filled_price.ok_or_else(|| {
                    Error::execution(format!("fill for {} missing price", order.id))
                })?;
                info!(target: "safety", id = %order.id, price, "order filled");
                Ok(Some(ConfirmedFill {
                    action: order.action,
                    quantity: order.quantity,
                    price,
                    ts_ms: confirmation.filled_time.unwrap_or(now),
                }))
            }
            ConfirmationStatus::Rejected => {
                let reason = confirmation
                    .reject_reason
                    .as_deref()
                    .unwrap_or("no reason given");
                warn!(target: "safety", id = %order.id, reason, "order rejected; cooldown applied");
                self.cooldowns.push(Cooldown {
                    action: order.action,
                    quantity: order.quantity,
                    until_ts: now + self.config.reject_cooldown_secs as i64 * 1000,
                });
                Ok(None)
            }
            ConfirmationStatus::Cancelled => {
                info!(target: "safety", id = %order.id, "order cancelled");
                Ok(None)
            }
        }
    }

    /// Update the running daily P&L; trips the circuit breaker at the
    /// configured drawdown. The breaker forces the fence closed and
    /// disables auto-trading until manually cleared.
    pub fn record_daily_pnl(&mut self, pnl: f64) {
        self.daily_pnl = pnl;
        if !self.breaker_tripped && pnl <= -self.config.max_daily_drawdown {
            self.breaker_tripped = true;
            self.fence_active = true;
            self.auto_trading = false;
            error!(target: "safety",
                pnl, drawdown = self.config.max_daily_drawdown,
                "daily drawdown breached; circuit breaker tripped");
        }
    }

    /// Enable or disable auto-trading. Authenticated.
    pub fn set_auto_trading(&mut self, key: &str, enabled: bool) -> Result<()> {
        self.authorize(key)?;
        self.auto_trading = enabled;
        info!(target: "safety", enabled, "auto-trading toggled");
        Ok(())
    }

    /// Manually clear the circuit breaker. Authenticated. The fence is
    /// re-evaluated from connectivity; auto-trading stays off until
    /// explicitly re-enabled.
    pub fn clear_circuit_breaker(&mut self, key: &str, now: TimestampMs) -> Result<()> {
        self.authorize(key)?;
        self.breaker_tripped = false;
        self.refresh_fence(now);
        info!(target: "safety", "circuit breaker cleared");
        Ok(())
    }

    /// Emergency stop: queue a flattening order for any open position,
    /// drop other pending intents, then fence and disable auto-trading.
    pub fn emergency_stop(
        &mut self,
        key: &str,
        position: &Position,
        now: TimestampMs,
    ) -> Result<Option<PendingOrder>> {
        self.authorize(key)?;
        self.pending.clear();

        let flatten = if position.is_flat() {
            None
        } else {
            let action = if position.is_long() {
                OrderAction::Sell
            } else {
                OrderAction::Buy
            };
            let order = PendingOrder {
                id: format!("FT-{:06}", self.next_seq),
                action,
                quantity: position.contracts.unsigned_abs(),
                created_ts: now,
                status: OrderStatus::Pending,
            };
            self.next_seq += 1;
            self.pending.push(order.clone());
            Some(order)
        };

        self.auto_trading = false;
        self.fence_active = true;
        error!(target: "safety", flattening = flatten.is_some(), "emergency stop engaged");
        Ok(flatten)
    }

    /// Replace the safety configuration. Authenticated; the secret
    /// itself cannot be blanked.
    pub fn update_config(&mut self, key: &str, mut new_config: SafetyConfig) -> Result<()> {
        self.authorize(key)?;
        if new_config.auth_key.trim().is_empty() {
            new_config.auth_key = self.config.auth_key.clone();
        }
        self.config = new_config;
        info!(target: "safety", "safety configuration updated");
        Ok(())
    }

    /// Current safety state for egress.
    pub fn status(&self, now: TimestampMs) -> SafetyStatus {
        SafetyStatus {
            fence_active: self.fence_active,
            breaker_tripped: self.breaker_tripped,
            auto_trading: self.auto_trading,
            pending_orders: self.pending.len(),
            daily_pnl: self.daily_pnl,
            heartbeat_age_ms: self.last_heartbeat.map(|ts| now - ts),
        }
    }
}
