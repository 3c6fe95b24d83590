//! Activity liveness signaling
//!
//! Long-running activities emit periodic heartbeats through a lightweight
//! cloneable handle threaded into the activity, independent of its return
//! value. The worker's watchdog resets its stall timer on every signal.

use tokio::sync::mpsc;

/// One liveness signal with progress details
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatSignal {
    pub step: String,
    pub progress: u32,
    pub total: u32,
}

impl HeartbeatSignal {
    pub fn percentage(&self) -> u32 {
        if self.total == 0 {
            0
        } else {
            (self.progress * 100) / self.total
        }
    }
}

/// Cloneable heartbeat handle
///
/// A disabled handle (no receiver) is valid and makes every beat a no-op,
/// so activities can be invoked directly in tests.
#[derive(Clone, Default)]
pub struct Heartbeat {
    tx: Option<mpsc::UnboundedSender<HeartbeatSignal>>,
}

impl Heartbeat {
    /// A handle whose beats go nowhere
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// A connected handle plus the receiving end for the watchdog
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<HeartbeatSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Emit a liveness signal; never fails, even if the watchdog is gone
    pub fn beat(&self, step: &str, progress: u32, total: u32) {
        let signal = HeartbeatSignal {
            step: step.to_string(),
            progress,
            total,
        };
        tracing::trace!(step = %signal.step, progress, total, "Heartbeat");
        if let Some(tx) = &self.tx {
            let _ = tx.send(signal);
        }
    }
}
