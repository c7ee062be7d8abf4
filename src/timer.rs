//! 时间轮定时器模块
//! Timing Wheel Timer Module
//!
//! 该模块实现了基于哈希时间轮的延迟任务调度器。所有槽位和键索引的修改
//! 都发生在单个控制循环中，调用方通过 [`TimingWheelHandle`] 与之交互。
//! 到期的任务在独立的 tokio 任务中执行（即发即忘）。
//!
//! This module implements a delayed-task scheduler based on a hashed timing
//! wheel. Every mutation of slots and the key index happens inside a single
//! control loop, which callers talk to through [`TimingWheelHandle`]. Due
//! tasks run in their own tokio tasks (fire-and-forget).

pub mod actor;
pub mod commands;
pub mod handle;
pub mod stats;
pub mod task;
pub mod wheel;

#[cfg(test)]
mod tests;

pub use handle::{TimingWheelHandle, start_timing_wheel};
pub use stats::TimingWheelStats;
pub use task::{TaskKey, TimerAction, TimerTask};
pub use wheel::TimingWheel;
