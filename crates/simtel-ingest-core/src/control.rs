use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Run state as seen by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Active,
    Paused,
    Stopped,
}

/// Shared run/pause/override flags.
///
/// Created once at startup and handed to every task behind an `Arc`. The
/// command loop is the only writer; sources only read. Each field is an
/// independent scalar, there is no cross-field snapshot.
#[derive(Debug, Default)]
pub struct ControlState {
    stop: CancellationToken,
    paused: AtomicBool,
    speed_override: Mutex<Option<i32>>,
}

impl ControlState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        !self.stop.is_cancelled()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn speed_override(&self) -> Option<i32> {
        *self.speed_override.lock()
    }

    pub fn phase(&self) -> Phase {
        if !self.is_running() {
            Phase::Stopped
        } else if self.is_paused() {
            Phase::Paused
        } else {
            Phase::Active
        }
    }

    /// Active -> Paused. Returns false when nothing changed.
    pub fn pause(&self) -> bool {
        if !self.is_running() {
            return false;
        }
        !self.paused.swap(true, Ordering::SeqCst)
    }

    /// Paused -> Active. Returns false when nothing changed.
    pub fn resume(&self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.paused.swap(false, Ordering::SeqCst)
    }

    /// Terminal; there is no way back to Active.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// The override is never cleared for the lifetime of the process.
    pub fn set_speed_override(&self, speed: i32) {
        *self.speed_override.lock() = Some(speed);
    }

    /// Resolves once `stop` has been called.
    pub async fn stopped(&self) {
        self.stop.cancelled().await
    }

    /// Sleep for `period`, waking early on stop. Returns false if stopped.
    pub async fn sleep(&self, period: Duration) -> bool {
        tokio::select! {
            _ = self.stop.cancelled() => false,
            _ = tokio::time::sleep(period) => self.is_running(),
        }
    }
}
