//! Bounded blocking buffer (monitor) shared by a producer and a consumer.
//!
//! The buffer combines a FIFO queue, a fixed capacity and a completion flag
//! behind a single lock:
//! - `put` blocks while the queue is full (backpressure)
//! - `take` blocks while the queue is empty and production is still running
//! - `mark_production_finished` releases every blocked `take` so the consumer
//!   can observe EMPTY_AND_DONE (`None`) and stop
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐  put   ┌──────────────────────────────┐  take   ┌──────────┐
//! │ Producer │───────▶│ Mutex<State>                 │────────▶│ Consumer │
//! └──────────┘        │  items: VecDeque<T> (<= cap) │         └──────────┘
//!      ▲              │  production_finished: bool   │              ▲
//!      │  not_full    │  stats: BufferStats          │  not_empty   │
//!      └──────────────┴──────────────────────────────┴──────────────┘
//! ```
//!
//! Every mutation broadcasts on the opposite condition variable and every
//! waiter re-checks its condition in a loop, so spurious or surplus wakeups
//! never deliver the wrong item.
//!
//! # Example
//!
//! ```
//! use baton::BoundedBuffer;
//!
//! let buffer = BoundedBuffer::new(2)?;
//! buffer.put(1);
//! buffer.put(2);
//! buffer.mark_production_finished();
//!
//! assert_eq!(buffer.take(), Some(1));
//! assert_eq!(buffer.take(), Some(2));
//! assert_eq!(buffer.take(), None);
//! # Ok::<(), baton::BatonError>(())
//! ```

use crate::cancel::{CancelToken, Interrupt};
use crate::error::{BatonError, Result};
use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Counters kept under the buffer lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BufferStats {
    /// Fixed capacity of the buffer
    pub capacity: usize,

    /// Items accepted by `put`
    pub puts: u64,

    /// Items handed out by `take`
    pub takes: u64,

    /// `put` calls that found the buffer full and had to wait
    pub full_waits: u64,

    /// `take` calls that found the buffer empty and had to wait
    pub empty_waits: u64,

    /// Largest queue length ever observed
    pub high_water_mark: usize,
}

impl BufferStats {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Items accepted but not yet taken.
    pub fn in_flight(&self) -> u64 {
        self.puts - self.takes
    }
}

struct State<T> {
    items: VecDeque<T>,
    production_finished: bool,
    stats: BufferStats,
}

struct Monitor<T> {
    state: Mutex<State<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
}

impl<T: Send> Interrupt for Monitor<T> {
    fn interrupt(&self) {
        // Holding the lock orders this wakeup after any in-progress flag check.
        let _state = self.state.lock();
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }
}

/// How a blocked call waits.
#[derive(Clone, Copy)]
enum Wait<'a> {
    Forever,
    Until { deadline: Instant, timeout: Duration },
    Cancellable(&'a CancelToken),
}

impl<'a> Wait<'a> {
    fn timeout(timeout: Duration) -> Self {
        Self::Until {
            deadline: Instant::now() + timeout,
            timeout,
        }
    }

    /// Block once on `condvar`; the caller re-checks its condition afterwards.
    fn block<T>(
        self,
        condvar: &Condvar,
        state: &mut MutexGuard<'_, State<T>>,
        op: &'static str,
    ) -> Result<()> {
        match self {
            Wait::Forever => {
                condvar.wait(state);
            }
            Wait::Until { deadline, timeout } => {
                if Instant::now() >= deadline {
                    warn!(op, ?timeout, len = state.items.len(), "Buffer wait timed out");
                    return Err(BatonError::Timeout(timeout));
                }
                condvar.wait_until(state, deadline);
            }
            Wait::Cancellable(token) => {
                if token.is_cancelled() {
                    warn!(op, len = state.items.len(), "Buffer wait cancelled");
                    return Err(BatonError::Cancelled);
                }
                condvar.wait(state);
            }
        }
        Ok(())
    }
}

/// Fixed-capacity FIFO with blocking `put`/`take` and a completion flag.
///
/// Share it between tasks with an `Arc`; the buffer itself is not `Clone`.
pub struct BoundedBuffer<T> {
    monitor: Arc<Monitor<T>>,
}

impl<T> BoundedBuffer<T> {
    /// Create a buffer holding at most `capacity` items.
    ///
    /// A zero capacity could never accept an item and is rejected.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(BatonError::InvalidCapacity(capacity));
        }

        Ok(Self {
            monitor: Arc::new(Monitor {
                state: Mutex::new(State {
                    items: VecDeque::with_capacity(capacity),
                    production_finished: false,
                    stats: BufferStats::new(capacity),
                }),
                not_full: Condvar::new(),
                not_empty: Condvar::new(),
                capacity,
            }),
        })
    }

    /// Append `item`, blocking while the buffer is full.
    pub fn put(&self, item: T) {
        // An unbounded, uncancellable wait has no failure path.
        let _ = self.put_with(item, Wait::Forever);
    }

    /// Remove the head item, blocking while the buffer is empty and
    /// production is still running.
    ///
    /// Returns `None` once the buffer is empty and production has finished.
    pub fn take(&self) -> Option<T> {
        self.take_with(Wait::Forever).unwrap_or(None)
    }

    /// Like [`put`](Self::put), but gives up with `Timeout` after `timeout`.
    /// The item is not inserted on timeout.
    pub fn put_timeout(&self, item: T, timeout: Duration) -> Result<()> {
        self.put_with(item, Wait::timeout(timeout))
    }

    /// Like [`take`](Self::take), but gives up with `Timeout` after `timeout`.
    pub fn take_timeout(&self, timeout: Duration) -> Result<Option<T>> {
        self.take_with(Wait::timeout(timeout))
    }

    /// Signal that no further items will be put. Idempotent.
    ///
    /// Wakes every blocked `take` so it can re-evaluate the empty-and-done
    /// condition. Items already buffered are still delivered.
    pub fn mark_production_finished(&self) {
        let mut state = self.monitor.state.lock();
        if !state.production_finished {
            state.production_finished = true;
            debug!(remaining = state.items.len(), "Production marked finished");
        }
        self.monitor.not_empty.notify_all();
    }

    pub fn capacity(&self) -> usize {
        self.monitor.capacity
    }

    /// Current number of buffered items.
    pub fn len(&self) -> usize {
        self.monitor.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.monitor.capacity
    }

    pub fn is_production_finished(&self) -> bool {
        self.monitor.state.lock().production_finished
    }

    /// Snapshot of the buffer counters.
    pub fn stats(&self) -> BufferStats {
        self.monitor.state.lock().stats
    }

    fn put_with(&self, item: T, wait: Wait<'_>) -> Result<()> {
        let monitor = &*self.monitor;
        let mut state = monitor.state.lock();

        if state.items.len() == monitor.capacity {
            state.stats.full_waits += 1;
            debug!(capacity = monitor.capacity, "Buffer full, producer waiting");
        }
        while state.items.len() == monitor.capacity {
            wait.block(&monitor.not_full, &mut state, "put")?;
        }

        state.items.push_back(item);
        let len = state.items.len();
        state.stats.puts += 1;
        state.stats.high_water_mark = state.stats.high_water_mark.max(len);
        trace!(len, "Item added");

        monitor.not_empty.notify_all();
        Ok(())
    }

    fn take_with(&self, wait: Wait<'_>) -> Result<Option<T>> {
        let monitor = &*self.monitor;
        let mut state = monitor.state.lock();

        if state.items.is_empty() && !state.production_finished {
            state.stats.empty_waits += 1;
            debug!("Buffer empty, consumer waiting");
        }
        loop {
            if let Some(item) = state.items.pop_front() {
                state.stats.takes += 1;
                trace!(len = state.items.len(), "Item removed");
                monitor.not_full.notify_all();
                return Ok(Some(item));
            }
            if state.production_finished {
                return Ok(None);
            }
            wait.block(&monitor.not_empty, &mut state, "take")?;
        }
    }
}

impl<T: Send + 'static> BoundedBuffer<T> {
    /// Like [`put`](Self::put), but aborts with `Cancelled` if `token` fires
    /// while waiting. The item is not inserted on cancellation.
    pub fn put_cancellable(&self, item: T, token: &CancelToken) -> Result<()> {
        self.watch(token);
        self.put_with(item, Wait::Cancellable(token))
    }

    /// Like [`take`](Self::take), but aborts with `Cancelled` if `token` fires
    /// while waiting. Nothing is removed on cancellation.
    pub fn take_cancellable(&self, token: &CancelToken) -> Result<Option<T>> {
        self.watch(token);
        self.take_with(Wait::Cancellable(token))
    }

    fn watch(&self, token: &CancelToken) {
        let monitor: Weak<dyn Interrupt> = Arc::downgrade(&self.monitor) as Weak<dyn Interrupt>;
        token.register(monitor);
    }
}

impl<T> fmt::Debug for BoundedBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.monitor.state.lock();
        f.debug_struct("BoundedBuffer")
            .field("capacity", &self.monitor.capacity)
            .field("len", &state.items.len())
            .field("production_finished", &state.production_finished)
            .finish()
    }
}
