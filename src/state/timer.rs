//! Per-room round countdown.
//!
//! The countdown runs in its own task and re-enters the room lock on every tick. Each
//! arming gets a fresh epoch; disarming bumps the epoch, so a tick that was already
//! waiting on the lock when the round ended sees a stale epoch and stops.

use std::{ops::ControlFlow, sync::Weak, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};

use super::room::Room;

/// Countdown handle owned by a room session.
#[derive(Debug, Default)]
pub struct RoundTimer {
    epoch: u64,
    task: Option<JoinHandle<()>>,
}

impl RoundTimer {
    /// Whether a countdown is currently running.
    pub fn is_armed(&self) -> bool {
        self.task.is_some()
    }

    /// Epoch of the latest arming.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether `epoch` identifies the countdown that is currently armed.
    pub fn is_current(&self, epoch: u64) -> bool {
        self.is_armed() && self.epoch == epoch
    }

    /// Start ticking every `period`, replacing any running countdown.
    pub fn arm(&mut self, room: Weak<Room>, period: Duration) {
        self.disarm();
        let epoch = self.epoch;
        self.task = Some(tokio::spawn(run_countdown(room, epoch, period)));
    }

    /// Stop the countdown; ticks already in flight become no-ops.
    pub fn disarm(&mut self) {
        self.epoch += 1;
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for RoundTimer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_countdown(room: Weak<Room>, epoch: u64, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(room) = room.upgrade() else {
            return;
        };
        let mut session = room.lock().await;
        if let ControlFlow::Break(()) = session.on_timer_tick(epoch) {
            return;
        }
    }
}
