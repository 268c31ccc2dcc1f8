//! Producer and consumer tasks driving a shared [`BoundedBuffer`].
//!
//! Each task owns its private sequence (source or destination) and holds an
//! `Arc` to the buffer. `run` executes the task on the calling thread, so the
//! caller decides how the two are scheduled.
//!
//! A producer marks production finished on every exit path, including
//! cancellation and unwinding, so a consumer never waits for items that can
//! no longer arrive.

use crate::buffer::BoundedBuffer;
use crate::cancel::CancelToken;
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Marks production finished when dropped.
struct FinishGuard<'a, T> {
    buffer: &'a BoundedBuffer<T>,
}

impl<T> Drop for FinishGuard<'_, T> {
    fn drop(&mut self) {
        self.buffer.mark_production_finished();
    }
}

/// Pauses between items. Without a token the pause cannot be interrupted.
fn pause(delay: Duration, cancel: Option<&CancelToken>) -> Result<()> {
    if delay.is_zero() {
        return Ok(());
    }
    match cancel {
        Some(token) => token.sleep(delay),
        None => {
            std::thread::sleep(delay);
            Ok(())
        }
    }
}

/// Moves a finite source into the buffer, in order.
pub struct Producer<T> {
    buffer: Arc<BoundedBuffer<T>>,
    source: Vec<T>,
    delay: Duration,
    cancel: Option<CancelToken>,
}

impl<T: Send + 'static> Producer<T> {
    pub fn new(buffer: Arc<BoundedBuffer<T>>, source: impl IntoIterator<Item = T>) -> Self {
        Self {
            buffer,
            source: source.into_iter().collect(),
            delay: Duration::ZERO,
            cancel: None,
        }
    }

    /// Sleep this long before each `put`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Abort delays and blocked `put`s when `token` fires.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Produce every source item, then mark production finished.
    ///
    /// Returns the number of items accepted by the buffer. On cancellation the
    /// remaining items are dropped, production is still marked finished and
    /// `Cancelled` is returned.
    pub fn run(self) -> Result<usize> {
        let Self {
            buffer,
            source,
            delay,
            cancel,
        } = self;
        let _finish = FinishGuard { buffer: &buffer };
        let total = source.len();
        info!(items = total, ?delay, "Producer started");

        let mut produced = 0;
        for item in source {
            let sent = pause(delay, cancel.as_ref()).and_then(|()| match &cancel {
                Some(token) => buffer.put_cancellable(item, token),
                None => {
                    buffer.put(item);
                    Ok(())
                }
            });

            if let Err(e) = sent {
                warn!(produced, remaining = total - produced, "Producer stopped: {}", e);
                return Err(e);
            }
            produced += 1;
        }

        info!(produced, "Producer finished");
        Ok(produced)
    }
}

/// Callback run on each received item before it is stored.
type Inspect<T> = Box<dyn FnMut(&T) + Send>;

/// Drains the buffer into a private destination until EMPTY_AND_DONE.
pub struct Consumer<T> {
    buffer: Arc<BoundedBuffer<T>>,
    destination: Vec<T>,
    delay: Duration,
    cancel: Option<CancelToken>,
    inspect: Option<Inspect<T>>,
}

impl<T: Send + 'static> Consumer<T> {
    pub fn new(buffer: Arc<BoundedBuffer<T>>) -> Self {
        Self {
            buffer,
            destination: Vec::new(),
            delay: Duration::ZERO,
            cancel: None,
            inspect: None,
        }
    }

    /// Sleep this long before each `take`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Abort delays and blocked `take`s when `token` fires.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Observe every received item, in receive order, before it is stored.
    pub fn with_inspect(mut self, inspect: impl FnMut(&T) + Send + 'static) -> Self {
        self.inspect = Some(Box::new(inspect));
        self
    }

    /// Consume until the buffer reports it is empty and production finished.
    ///
    /// Returns the received items in receive order.
    pub fn run(self) -> Result<Vec<T>> {
        let Self {
            buffer,
            mut destination,
            delay,
            cancel,
            mut inspect,
        } = self;
        info!(?delay, "Consumer started");

        loop {
            let next = pause(delay, cancel.as_ref()).and_then(|()| match &cancel {
                Some(token) => buffer.take_cancellable(token),
                None => Ok(buffer.take()),
            });

            match next {
                Ok(Some(item)) => {
                    if let Some(inspect) = inspect.as_mut() {
                        inspect(&item);
                    }
                    destination.push(item);
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(received = destination.len(), "Consumer stopped: {}", e);
                    return Err(e);
                }
            }
        }

        info!(received = destination.len(), "Consumer finished");
        Ok(destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel;
    use std::thread;

    fn buffer<T>(capacity: usize) -> Arc<BoundedBuffer<T>> {
        Arc::new(BoundedBuffer::new(capacity).unwrap())
    }

    #[test]
    fn test_empty_source_still_marks_finished() {
        let buffer = buffer::<i32>(2);
        let produced = Producer::new(Arc::clone(&buffer), Vec::new()).run().unwrap();

        assert_eq!(produced, 0);
        assert!(buffer.is_production_finished());
        assert_eq!(Consumer::new(buffer).run().unwrap(), Vec::<i32>::new());
    }

    #[test]
    fn test_producer_then_consumer_same_thread() {
        let buffer = buffer(8);
        let produced = Producer::new(Arc::clone(&buffer), 1..=5).run().unwrap();
        let received = Consumer::new(buffer).run().unwrap();

        assert_eq!(produced, 5);
        assert_eq!(received, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_concurrent_tasks_with_delays() {
        let buffer = buffer(2);
        let producer = Producer::new(Arc::clone(&buffer), 0..12).with_delay(Duration::from_millis(2));
        let consumer = Consumer::new(Arc::clone(&buffer)).with_delay(Duration::from_millis(5));

        let producer = thread::spawn(move || producer.run());
        let received = consumer.run().unwrap();

        assert_eq!(producer.join().unwrap().unwrap(), 12);
        assert_eq!(received, (0..12).collect::<Vec<_>>());
        assert!(buffer.stats().high_water_mark <= 2);
    }

    #[test]
    fn test_cancelled_producer_releases_consumer() {
        let buffer = buffer(1);
        let token = CancelToken::new();

        // Nobody consumes, so the second put blocks until the token fires.
        let producer = Producer::new(Arc::clone(&buffer), vec![1, 2, 3]).with_cancel(token.clone());
        let handle = thread::spawn(move || producer.run());

        thread::sleep(Duration::from_millis(100));
        token.cancel();

        let err = handle.join().unwrap().unwrap_err();
        assert!(err.is_cancelled());
        assert!(buffer.is_production_finished());

        // The consumer drains what was accepted and then terminates.
        assert_eq!(Consumer::new(buffer).run().unwrap(), vec![1]);
    }

    #[test]
    fn test_cancel_interrupts_producer_delay() {
        let buffer = buffer::<u32>(4);
        let token = CancelToken::new();
        let producer = Producer::new(Arc::clone(&buffer), vec![1, 2])
            .with_delay(Duration::from_secs(30))
            .with_cancel(token.clone());

        let (tx, rx) = channel::bounded(1);
        let handle = thread::spawn(move || tx.send(producer.run()).unwrap());

        thread::sleep(Duration::from_millis(50));
        token.cancel();

        let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(result.unwrap_err().is_cancelled());
        handle.join().unwrap();
        assert!(buffer.is_empty());
        assert!(buffer.is_production_finished());
    }

    #[test]
    fn test_cancelled_consumer_stops() {
        let buffer = buffer::<u32>(4);
        let token = CancelToken::new();
        let consumer = Consumer::new(Arc::clone(&buffer)).with_cancel(token.clone());

        let handle = thread::spawn(move || consumer.run());
        thread::sleep(Duration::from_millis(50));
        token.cancel();

        assert!(handle.join().unwrap().unwrap_err().is_cancelled());
        assert!(!buffer.is_production_finished());
    }

    #[test]
    fn test_inspect_sees_items_in_order() {
        let buffer = buffer(3);
        Producer::new(Arc::clone(&buffer), vec!['a', 'b', 'c']).run().unwrap();

        let (tx, rx) = channel::unbounded();
        let received = Consumer::new(buffer)
            .with_inspect(move |item| tx.send(*item).unwrap())
            .run()
            .unwrap();

        assert_eq!(received, vec!['a', 'b', 'c']);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), received);
    }

    #[test]
    fn test_producer_panic_still_marks_finished() {
        let buffer = buffer::<i32>(1);
        let guarded = Arc::clone(&buffer);
        let result: thread::Result<()> = thread::spawn(move || {
            let _finish = FinishGuard { buffer: &guarded };
            panic!("source failed");
        })
        .join();

        assert!(result.is_err());
        assert!(buffer.is_production_finished());
    }
}
