//! 时间轮控制循环的命令定义
//! Command definitions for the timing wheel control loop
//!
//! 定义了句柄与控制循环之间的通信协议。每个请求都携带一个 oneshot 应答
//! 通道，调用方在控制循环应用请求之后才会返回。
//!
//! Defines the communication protocol between the handle and the control
//! loop. Every request carries a oneshot reply channel so the caller only
//! returns once the loop has applied the request.

use crate::timer::stats::TimingWheelStats;
use crate::timer::task::{TaskKey, TimerAction};
use tokio::sync::oneshot;
use tokio::time::Instant;

/// 时间轮命令
/// Timing wheel commands
pub enum WheelCommand {
    /// 添加（或替换）任务
    /// Add (or replace) a task
    AddTask {
        key: TaskKey,
        fire_at: Instant,
        action: TimerAction,
        /// 是否替换了同键的旧任务
        /// Whether an older task under the same key was replaced
        response_tx: oneshot::Sender<bool>,
    },
    /// 移除任务
    /// Remove a task
    RemoveTask {
        key: TaskKey,
        /// 是否确实移除了任务
        /// Whether a task was actually removed
        response_tx: oneshot::Sender<bool>,
    },
    /// 查询键是否已调度
    /// Query whether a key is scheduled
    Contains {
        key: TaskKey,
        response_tx: oneshot::Sender<bool>,
    },
    /// 获取统计信息
    /// Get statistics
    GetStats {
        response_tx: oneshot::Sender<TimingWheelStats>,
    },
}

impl std::fmt::Debug for WheelCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AddTask { key, fire_at, .. } => f
                .debug_struct("AddTask")
                .field("key", key)
                .field("fire_at", fire_at)
                .finish_non_exhaustive(),
            Self::RemoveTask { key, .. } => {
                f.debug_struct("RemoveTask").field("key", key).finish_non_exhaustive()
            }
            Self::Contains { key, .. } => {
                f.debug_struct("Contains").field("key", key).finish_non_exhaustive()
            }
            Self::GetStats { .. } => f.write_str("GetStats"),
        }
    }
}
