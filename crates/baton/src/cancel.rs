//! Cooperative cancellation for blocked buffer calls.
//!
//! OS threads cannot be interrupted from the outside, so a [`CancelToken`]
//! plays that role: every buffer wait and every simulated task delay that
//! observes a token returns [`BatonError::Cancelled`] once the token fires.
//!
//! A buffer registers itself with a token the first time a cancellable call
//! uses it. Firing the token then wakes that buffer's waiters under the
//! buffer's own lock, so a waiter that checked the flag just before blocking
//! cannot miss the wakeup.

use crate::error::{BatonError, Result};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::debug;

/// Something whose blocked waiters must re-check their conditions when a
/// token fires.
pub(crate) trait Interrupt: Send + Sync {
    fn interrupt(&self);
}

/// Cloneable cancellation handle shared between the canceller and the tasks.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    cancelled: AtomicBool,
    listeners: Mutex<Vec<Weak<dyn Interrupt>>>,
    sleep_lock: Mutex<()>,
    sleepers: Condvar,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the token. Idempotent.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("Cancel token fired");

        {
            let _guard = self.inner.sleep_lock.lock();
            self.inner.sleepers.notify_all();
        }

        // Snapshot first: interrupting takes each buffer's lock, and a waiter
        // may be registering with this token at the same time.
        let listeners: Vec<_> = self.inner.listeners.lock().clone();
        for listener in listeners.iter().filter_map(Weak::upgrade) {
            listener.interrupt();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Fail with `Cancelled` if the token has fired.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(BatonError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleep for `duration`, returning early with `Cancelled` if the token
    /// fires in the meantime.
    pub fn sleep(&self, duration: Duration) -> Result<()> {
        let deadline = Instant::now() + duration;
        let mut guard = self.inner.sleep_lock.lock();
        loop {
            self.check()?;
            if Instant::now() >= deadline {
                return Ok(());
            }
            self.inner.sleepers.wait_until(&mut guard, deadline);
        }
    }

    /// Register `target` to be interrupted when the token fires.
    ///
    /// Must happen before the caller checks the flag under its own lock.
    pub(crate) fn register(&self, target: Weak<dyn Interrupt>) {
        let mut listeners = self.inner.listeners.lock();
        listeners.retain(|listener| listener.strong_count() > 0);
        if !listeners.iter().any(|listener| Weak::ptr_eq(listener, &target)) {
            listeners.push(target);
        }
    }

    #[cfg(test)]
    fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
