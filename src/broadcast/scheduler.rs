// src/broadcast/scheduler.rs
//! The long-running loop: waits for the next tick (or a manual request),
//! runs it against the single owned [`BroadcastState`], publishes a status
//! snapshot. Nothing else ever touches the state.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::{BroadcastState, Broadcaster};
use crate::config::ScheduleSettings;
use crate::status::StatusSnapshot;

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    pub interval: Duration,
    pub initial_delay: Duration,
}

impl From<&ScheduleSettings> for SchedulerCfg {
    fn from(s: &ScheduleSettings) -> Self {
        Self {
            interval: s.fetch_interval(),
            initial_delay: s.initial_delay(),
        }
    }
}

/// Ask the loop for an immediate tick (the `/latest` command).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickRequest;

/// Handle for requesting ticks; requests coalesce while one is pending.
#[derive(Debug, Clone)]
pub struct TickTrigger {
    tx: mpsc::Sender<TickRequest>,
}

impl TickTrigger {
    /// Returns false when a request is already queued or the loop is gone.
    pub fn request(&self) -> bool {
        self.tx.try_send(TickRequest).is_ok()
    }
}

pub fn tick_channel() -> (TickTrigger, mpsc::Receiver<TickRequest>) {
    let (tx, rx) = mpsc::channel(1);
    (TickTrigger { tx }, rx)
}

/// Run ticks forever. Returns only if the runtime shuts the task down.
pub async fn run_loop(
    broadcaster: Broadcaster,
    mut state: BroadcastState,
    cfg: SchedulerCfg,
    mut requests: mpsc::Receiver<TickRequest>,
    status: watch::Sender<StatusSnapshot>,
) {
    let mut ticker = time::interval_at(Instant::now() + cfg.initial_delay, cfg.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut requests_open = true;

    tracing::info!(
        target: "broadcast",
        source = broadcaster.source_name(),
        interval_secs = cfg.interval.as_secs(),
        initial_delay_secs = cfg.initial_delay.as_secs(),
        "broadcast loop started"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            req = requests.recv(), if requests_open => match req {
                Some(TickRequest) => {
                    tracing::info!(target: "broadcast", "manual tick requested");
                    ticker.reset();
                }
                None => {
                    requests_open = false;
                    continue;
                }
            },
        }

        let report = broadcaster.run_tick(&mut state).await;
        let now = broadcaster.now();
        status.send_modify(|s| {
            s.record_tick(&report, now, state.last_broadcast_at, state.seen.len())
        });
    }
}

/// Spawn [`run_loop`] on the runtime.
pub fn spawn_broadcast_loop(
    broadcaster: Broadcaster,
    state: BroadcastState,
    cfg: SchedulerCfg,
    requests: mpsc::Receiver<TickRequest>,
    status: watch::Sender<StatusSnapshot>,
) -> JoinHandle<()> {
    tokio::spawn(run_loop(broadcaster, state, cfg, requests, status))
}
