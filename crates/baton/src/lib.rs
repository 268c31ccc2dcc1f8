//! Bounded blocking hand-off between one producer and one consumer thread.
//!
//! The core is [`BoundedBuffer`], a monitor combining a fixed-capacity FIFO,
//! backpressure on `put`, blocking `take`, and a completion flag that lets the
//! consumer stop cleanly. [`Producer`] and [`Consumer`] drive it from either
//! side, [`Pipeline`] wires both onto named threads and checks integrity.
//!
//! ```
//! use baton::{run_pipeline, PipelineConfig};
//!
//! let config = PipelineConfig {
//!     capacity: 2,
//!     producer_delay_ms: 0,
//!     consumer_delay_ms: 0,
//!     ..PipelineConfig::default()
//! };
//! let report = run_pipeline((1..=10).collect::<Vec<u32>>(), &config)?;
//! assert!(report.integrity_ok);
//! # Ok::<(), baton::BatonError>(())
//! ```

pub mod buffer;
pub mod cancel;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod task;

pub use buffer::{BoundedBuffer, BufferStats};
pub use cancel::CancelToken;
pub use config::PipelineConfig;
pub use error::{BatonError, Result};
pub use pipeline::{run_pipeline, Pipeline, PipelineReport};
pub use task::{Consumer, Producer};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::buffer::{BoundedBuffer, BufferStats};
    pub use crate::cancel::CancelToken;
    pub use crate::error::{BatonError, Result};
    pub use crate::task::{Consumer, Producer};
}
