//! The async shell around the engine: a channel-fed single-writer task.
//!
//! Every market event, order report and control mutation is a command
//! on one mpsc queue, drained by one task that owns the `MarketEngine`.
//! Snapshots publish over a watch channel after every state change.
//! The heartbeat/fence monitor runs on its own interval so the fence
//! still activates when ticks stop arriving entirely.

use crate::pipeline::MarketEngine;
use crate::snapshot::StateSnapshot;
use flowtrader_core::{
    AccountSnapshot, Config, DepthSnapshot, Error, OrderConfirmation, PendingOrder, RawTick,
    Result, SafetyConfig, TimestampMs,
};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, Duration};
use tracing::{debug, info};

/// Upper bound on queued commands before ingress backpressure.
const COMMAND_QUEUE: usize = 4096;
/// How long a caller waits on the engine before assuming it is gone.
const REPLY_TIMEOUT: Duration = Duration::from_secs(2);
/// Cadence of the fence/expiry monitor.
const MONITOR_INTERVAL: Duration = Duration::from_secs(5);

enum Command {
    Tick(RawTick),
    Depth(DepthSnapshot),
    Account(AccountSnapshot),
    Heartbeat(TimestampMs),
    PollOrders {
        now: TimestampMs,
        reply: oneshot::Sender<Vec<PendingOrder>>,
    },
    Confirm {
        confirmation: OrderConfirmation,
        now: TimestampMs,
        reply: oneshot::Sender<Result<()>>,
    },
    SetAutoTrading {
        key: String,
        enabled: bool,
        reply: oneshot::Sender<Result<()>>,
    },
    EmergencyStop {
        key: String,
        reply: oneshot::Sender<Result<Option<PendingOrder>>>,
    },
    ClearBreaker {
        key: String,
        reply: oneshot::Sender<Result<()>>,
    },
    UpdateSafetyConfig {
        key: String,
        config: SafetyConfig,
        reply: oneshot::Sender<Result<()>>,
    },
}

fn now_ms() -> TimestampMs {
    chrono::Utc::now().timestamp_millis()
}

/// Cloneable handle to the engine task.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<Command>,
    snapshots: watch::Receiver<StateSnapshot>,
}

impl EngineHandle {
    /// Subscribe to state-change notifications.
    pub fn subscribe(&self) -> watch::Receiver<StateSnapshot> {
        self.snapshots.clone()
    }

    /// Latest published snapshot.
    pub fn latest_snapshot(&self) -> StateSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Enqueue a raw transaction.
    pub async fn ingest_tick(&self, tick: RawTick) -> Result<()> {
        self.send(Command::Tick(tick)).await
    }

    /// Enqueue a depth-of-book snapshot.
    pub async fn ingest_depth(&self, depth: DepthSnapshot) -> Result<()> {
        self.send(Command::Depth(depth)).await
    }

    /// Enqueue an account snapshot.
    pub async fn ingest_account(&self, account: AccountSnapshot) -> Result<()> {
        self.send(Command::Account(account)).await
    }

    /// Record an execution-collaborator heartbeat.
    pub async fn heartbeat(&self) -> Result<()> {
        self.send(Command::Heartbeat(now_ms())).await
    }

    /// Poll pending orders (idempotent pull queue).
    pub async fn poll_pending_orders(&self) -> Result<Vec<PendingOrder>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::PollOrders { now: now_ms(), reply }).await?;
        self.wait(rx).await
    }

    /// Report an order outcome.
    pub async fn confirm_order(&self, confirmation: OrderConfirmation) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Confirm {
            confirmation,
            now: now_ms(),
            reply,
        })
        .await?;
        self.wait(rx).await?
    }

    /// Enable or disable auto-trading (authenticated).
    pub async fn set_auto_trading(&self, key: &str, enabled: bool) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SetAutoTrading {
            key: key.to_string(),
            enabled,
            reply,
        })
        .await?;
        self.wait(rx).await?
    }

    /// Emergency stop: force-flat plus fence (authenticated).
    pub async fn emergency_stop(&self, key: &str) -> Result<Option<PendingOrder>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::EmergencyStop {
            key: key.to_string(),
            reply,
        })
        .await?;
        self.wait(rx).await?
    }

    /// Manually clear the circuit breaker (authenticated).
    pub async fn clear_circuit_breaker(&self, key: &str) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ClearBreaker {
            key: key.to_string(),
            reply,
        })
        .await?;
        self.wait(rx).await?
    }

    /// Replace the safety configuration (authenticated).
    pub async fn update_safety_config(&self, key: &str, config: SafetyConfig) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::UpdateSafetyConfig {
            key: key.to_string(),
            config,
            reply,
        })
        .await?;
        self.wait(rx).await?
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| Error::execution("engine task is gone"))
    }

    /// Bounded wait on a reply; the engine may be wedged or dead, and
    /// callers must never block indefinitely on it.
    async fn wait<T>(&self, rx: oneshot::Receiver<T>) -> Result<T> {
        match timeout(REPLY_TIMEOUT, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(Error::execution("engine dropped the reply")),
            Err(_) => Err(Error::execution("timed out waiting for engine reply")),
        }
    }
}

/// Construct the engine and spawn its single-writer task.
pub fn spawn_engine(config: Config) -> Result<(EngineHandle, JoinHandle<()>)> {
    let mut engine = MarketEngine::new(config)?;
    let (tx, mut rx) = mpsc::channel(COMMAND_QUEUE);
    let (snap_tx, snap_rx) = watch::channel(engine.snapshot(now_ms()));

    let task = tokio::spawn(async move {
        let mut monitor = interval(MONITOR_INTERVAL);
        loop {
            tokio::select! {
                command = rx.recv() => match command {
                    Some(command) => {
                        handle_command(&mut engine, command);
                        let _ = snap_tx.send(engine.snapshot(now_ms()));
                    }
                    None => {
                        info!(target: "engine", "command channel closed; engine task exiting");
                        break;
                    }
                },
                _ = monitor.tick() => {
                    engine.monitor(now_ms());
                    let _ = snap_tx.send(engine.snapshot(now_ms()));
                }
            }
        }
    });

    Ok((
        EngineHandle {
            tx,
            snapshots: snap_rx,
        },
        task,
    ))
}

fn handle_command(engine: &mut MarketEngine, command: Command) {
    match command {
        Command::Tick(tick) => {
            // Rejections are logged at the boundary and must not abort
            // the pipeline.
            if let Err(err) = engine.process_tick(tick) {
                debug!(target: "engine", error = %err, "tick dropped");
            }
        }
        Command::Depth(depth) => {
            if let Err(err) = engine.ingest_depth(depth) {
                debug!(target: "engine", error = %err, "depth dropped");
            }
        }
        Command::Account(account) => {
            if let Err(err) = engine.ingest_account(account) {
                debug!(target: "engine", error = %err, "account snapshot dropped");
            }
        }
        Command::Heartbeat(now) => engine.record_heartbeat(now),
        Command::PollOrders { now, reply } => {
            let _ = reply.send(engine.poll_pending_orders(now));
        }
        Command::Confirm {
            confirmation,
            now,
            reply,
        } => {
            let _ = reply.send(engine.confirm_order(&confirmation, now));
        }
        Command::SetAutoTrading { key, enabled, reply } => {
            let _ = reply.send(engine.set_auto_trading(&key, enabled));
        }
        Command::EmergencyStop { key, reply } => {
            let _ = reply.send(engine.emergency_stop(&key, now_ms()));
        }
        Command::ClearBreaker { key, reply } => {
            let _ = reply.send(engine.clear_circuit_breaker(&key, now_ms()));
        }
        Command::UpdateSafetyConfig { key, config, reply } => {
            let _ = reply.send(engine.update_safety_config(&key, config));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "actor-secret";

    fn config() -> Config {
        let mut config = Config::default();
        config.safety.auth_key = KEY.to_string();
        config
    }

    fn tick(price: f64) -> RawTick {
        RawTick {
            ts_ms: now_ms(),
            price,
            size: 1.0,
            bid: price - 0.25,
            ask: price,
        }
    }

    #[tokio::test]
    async fn test_tick_updates_snapshot() {
        let (handle, task) = spawn_engine(config()).unwrap();
        let mut snapshots = handle.subscribe();

        handle.ingest_tick(tick(5000.0)).await.unwrap();
        snapshots
            .wait_for(|s| s.last_price == Some(5000.0))
            .await
            .unwrap();

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_control_surface_authenticates() {
        let (handle, task) = spawn_engine(config()).unwrap();

        let err = handle.set_auto_trading("wrong-key", true).await.unwrap_err();
        assert!(matches!(err, Error::Safety(_)));
        handle.set_auto_trading(KEY, true).await.unwrap();

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_poll_is_empty_initially() {
        let (handle, task) = spawn_engine(config()).unwrap();
        let pending = handle.poll_pending_orders().await.unwrap();
        assert!(pending.is_empty());

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_heartbeat_clears_fence() {
        let (handle, task) = spawn_engine(config()).unwrap();
        assert!(handle.latest_snapshot().safety.fence_active);

        let mut snapshots = handle.subscribe();
        handle.heartbeat().await.unwrap();
        snapshots
            .wait_for(|s| !s.safety.fence_active)
            .await
            .unwrap();

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_tick_does_not_kill_task() {
        let (handle, task) = spawn_engine(config()).unwrap();

        handle.ingest_tick(tick(1.0)).await.unwrap(); // out of band
        handle.ingest_tick(tick(5000.0)).await.unwrap();

        let mut snapshots = handle.subscribe();
        snapshots
            .wait_for(|s| s.last_price == Some(5000.0))
            .await
            .unwrap();

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_emergency_stop_fences() {
        let (handle, task) = spawn_engine(config()).unwrap();
        handle.heartbeat().await.unwrap();

        let flatten = handle.emergency_stop(KEY).await.unwrap();
        assert!(flatten.is_none()); // flat position, nothing to close

        let mut snapshots = handle.subscribe();
        snapshots.wait_for(|s| s.safety.fence_active).await.unwrap();

        drop(handle);
        task.await.unwrap();
    }
}
