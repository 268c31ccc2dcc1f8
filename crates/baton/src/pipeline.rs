//! One producer, one consumer, one buffer: the end-to-end run.
//!
//! The runner spawns both tasks on named threads, joins both, and compares
//! what the consumer received with the source it started from.

use crate::buffer::{BoundedBuffer, BufferStats};
use crate::cancel::CancelToken;
use crate::config::PipelineConfig;
use crate::error::{BatonError, Result};
use crate::task::{Consumer, Producer};
use serde::Serialize;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport<T> {
    /// Items in the order the consumer received them
    pub destination: Vec<T>,
    /// Items the producer handed to the buffer
    pub produced: usize,
    /// Buffer counters at the end of the run
    pub stats: BufferStats,
    /// Wall-clock time from buffer creation to both joins
    pub elapsed: Duration,
    /// Whether the destination equals the source
    pub integrity_ok: bool,
}

/// Fires the token if the consumer unwinds, so a producer blocked on a full
/// buffer is released instead of waiting forever.
struct CancelOnPanic(CancelToken);

impl Drop for CancelOnPanic {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.cancel();
        }
    }
}

/// Runs a producer and a consumer over a fresh buffer.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    cancel: Option<CancelToken>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: None,
        })
    }

    /// Let an outside caller abort the run.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Move `source` through the buffer and collect it on the other side.
    ///
    /// Both threads are always joined before this returns. A panicked task is
    /// reported before any task error, the producer's first in each case.
    pub fn run<T>(&self, source: Vec<T>) -> Result<PipelineReport<T>>
    where
        T: Clone + PartialEq + Send + 'static,
    {
        self.run_with_inspect(source, |_: &T| {})
    }

    /// Like [`run`](Self::run), calling `inspect` on the consumer thread for
    /// every received item.
    pub fn run_with_inspect<T, F>(&self, source: Vec<T>, inspect: F) -> Result<PipelineReport<T>>
    where
        T: Clone + PartialEq + Send + 'static,
        F: FnMut(&T) + Send + 'static,
    {
        let start = Instant::now();
        let token = self.cancel.clone().unwrap_or_default();
        let buffer = Arc::new(BoundedBuffer::new(self.config.capacity)?);
        let expected = source.clone();

        info!(
            items = source.len(),
            capacity = self.config.capacity,
            producer_delay_ms = self.config.producer_delay_ms,
            consumer_delay_ms = self.config.consumer_delay_ms,
            "Starting pipeline"
        );

        let producer = Producer::new(Arc::clone(&buffer), source)
            .with_delay(self.config.producer_delay())
            .with_cancel(token.clone());
        let consumer = Consumer::new(Arc::clone(&buffer))
            .with_delay(self.config.consumer_delay())
            .with_cancel(token.clone())
            .with_inspect(inspect);

        let producer_handle = thread::Builder::new()
            .name("producer".to_string())
            .spawn(move || producer.run())?;

        let consumer_token = token.clone();
        let consumer_handle = match thread::Builder::new()
            .name("consumer".to_string())
            .spawn(move || {
                let _guard = CancelOnPanic(consumer_token);
                consumer.run()
            }) {
            Ok(handle) => handle,
            Err(e) => {
                token.cancel();
                let _ = producer_handle.join();
                return Err(e.into());
            }
        };

        let produced = producer_handle
            .join()
            .map_err(|_| BatonError::task_panicked("producer"));
        let received = consumer_handle
            .join()
            .map_err(|_| BatonError::task_panicked("consumer"));

        let (produced, destination) = match (produced, received) {
            (Err(e), _) | (_, Err(e)) => return Err(e),
            (Ok(produced), Ok(received)) => (produced?, received?),
        };

        let elapsed = start.elapsed();
        let stats = buffer.stats();
        let integrity_ok = destination == expected;

        if integrity_ok {
            info!(
                produced,
                received = destination.len(),
                high_water_mark = stats.high_water_mark,
                ?elapsed,
                "Pipeline complete, integrity verified"
            );
        } else {
            error!(
                produced,
                received = destination.len(),
                "Pipeline complete, destination does not match source"
            );
        }

        Ok(PipelineReport {
            destination,
            produced,
            stats,
            elapsed,
            integrity_ok,
        })
    }
}

/// Run `source` through a pipeline built from `config`.
pub fn run_pipeline<T>(source: Vec<T>, config: &PipelineConfig) -> Result<PipelineReport<T>>
where
    T: Clone + PartialEq + Send + 'static,
{
    Pipeline::new(config.clone())?.run(source)
}
