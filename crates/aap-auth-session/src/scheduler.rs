//! Automatic logout timer.
//!
//! At most one timer is pending per scheduler. Arming replaces whatever was
//! armed before; a timer that was replaced or cancelled never fires.
//!
//! # State Machine
//!
//! ```text
//!                   arm(delay)
//!     ┌────────┐ ────────────────▶ ┌─────────┐ ───┐ arm(delay):
//!     │  Idle  │                   │  Armed  │    │ previous timer
//!     └────────┘ ◀──────────────── └─────────┘ ◀──┘ aborted
//!            cancel(), or deadline
//!            reached (runs on_fire)
//! ```

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::Instant;

/// Longest delay a timer is armed with; larger delays are clamped to it.
pub const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

struct Pending {
    generation: u64,
    task: AbortHandle,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    pending: Option<Pending>,
}

/// Single pending timer running a callback at a deadline.
#[derive(Default)]
pub struct ExpiryScheduler {
    slot: Arc<Mutex<Slot>>,
}

impl ExpiryScheduler {
    /// Create an idle scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer to run `on_fire` once after `delay`, replacing any
    /// armed timer.
    ///
    /// The timer runs on the ambient tokio runtime. Without one, the
    /// previous timer is still cancelled, a warning is logged and `false`
    /// is returned.
    pub fn arm<F>(&self, delay: Duration, on_fire: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let Ok(runtime) = Handle::try_current() else {
            self.cancel();
            tracing::warn!(
                delay_ms = delay.as_millis(),
                "No tokio runtime available, expiry timer not armed"
            );
            return false;
        };

        let deadline = deadline_after(delay);

        // The lock is held until the new timer is recorded, so a timer with
        // a zero delay cannot observe the slot before it is registered.
        let mut slot = self.slot.lock();
        if let Some(previous) = slot.pending.take() {
            previous.task.abort();
        }
        slot.generation += 1;
        let generation = slot.generation;

        let shared = Arc::downgrade(&self.slot);
        let task = runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if take_if_current(&shared, generation) {
                on_fire();
            }
        });

        slot.pending = Some(Pending {
            generation,
            task: task.abort_handle(),
        });
        tracing::debug!(delay_ms = delay.as_millis(), "Expiry timer armed");
        true
    }

    /// Cancel the armed timer. No-op when idle.
    pub fn cancel(&self) {
        if let Some(pending) = self.slot.lock().pending.take() {
            pending.task.abort();
            tracing::debug!("Expiry timer cancelled");
        }
    }

    /// Returns true while a timer is pending.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.slot.lock().pending.is_some()
    }
}

impl Drop for ExpiryScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Move the slot back to idle if `generation` is still the armed timer.
fn take_if_current(shared: &Weak<Mutex<Slot>>, generation: u64) -> bool {
    let Some(slot) = shared.upgrade() else {
        return false;
    };
    let mut slot = slot.lock();
    match slot.pending {
        Some(ref pending) if pending.generation == generation => {
            slot.pending = None;
            true
        }
        _ => false,
    }
}

fn deadline_after(delay: Duration) -> Instant {
    Instant::now() + delay.min(FAR_FUTURE)
}
