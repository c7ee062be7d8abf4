//! 弹性工作池模块
//! Elastic Worker Pool Module
//!
//! 该模块实现了一个根据队列压力在上下限之间自动伸缩的并发工作池，
//! 支持有界队列背压、单次尝试超时和失败重试。
//!
//! This module implements a concurrent worker pool that scales between a
//! floor and a ceiling according to queue pressure, with bounded-queue
//! backpressure, per-attempt timeouts and retries.

pub mod builder;
pub mod core;
pub mod lock;
pub mod scaler;
pub mod state;
pub mod task;
mod worker;


pub use builder::PoolBuilder;
pub use self::core::{ElasticPool, PoolStats};
pub use lock::{DefaultLock, FairLock, PoolLock};
pub use scaler::ScaleDecision;
pub use state::PoolState;
pub use task::{ErrorCallback, PoolTask, ResultCallback, TaskError, TaskResult};
