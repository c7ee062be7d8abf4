#![deny(clippy::expect_used, clippy::unwrap_used)]

//! In-process scheduling and execution primitives: a hashed timing wheel for
//! delayed tasks and an elastic worker pool for bounded concurrent execution.
//! 进程内调度与执行原语：用于延迟任务的哈希时间轮，以及用于有界并发执行的弹性工作池。

pub mod config;
pub mod delay_queue;
pub mod error;
pub mod pool;
pub mod timer;

mod panic;

pub use delay_queue::{DelayQueue, DelayedEvent, EventSink};
pub use error::{BoxError, Error, Result};
pub use pool::{ElasticPool, FairLock, PoolBuilder, TaskError};
pub use timer::{TimingWheelHandle, start_timing_wheel};
