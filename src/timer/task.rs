//! 时间轮中的定时任务记录
//! Timer task record held by the timing wheel

use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;

/// 定时任务的键，同一键在任一时刻最多只有一个已调度任务
/// Key of a timer task; at most one task is scheduled per key at any time
pub type TaskKey = String;

/// 到期时执行的回调，返回一个在独立任务中运行的 future
/// Callback run on expiry, producing a future that runs in its own task
pub type TimerAction = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send + 'static>;

/// 将闭包装箱为 [`TimerAction`]
/// Boxes a closure into a [`TimerAction`]
pub fn boxed_action<F, Fut>(action: F) -> TimerAction
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Box::new(move || Box::pin(action()))
}

/// 时间轮中的一个延迟任务
/// A deferred unit of work inside the timing wheel
pub struct TimerTask {
    /// 唯一键
    /// Unique key
    pub key: TaskKey,
    /// 目标槽位
    /// Target slot
    pub slot: usize,
    /// 到期前还需经过的完整轮数
    /// Full revolutions left before the task is due
    pub cycle: u64,
    /// 到期回调
    /// Expiry callback
    pub action: TimerAction,
}

impl TimerTask {
    /// 创建新的定时任务
    /// Create new timer task
    pub fn new(key: TaskKey, slot: usize, cycle: u64, action: TimerAction) -> Self {
        Self {
            key,
            slot,
            cycle,
            action,
        }
    }

    /// 本轮扫描时是否到期
    /// Whether the task is due on the current pass of its slot
    pub fn is_due(&self) -> bool {
        self.cycle == 0
    }
}

impl fmt::Debug for TimerTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerTask")
            .field("key", &self.key)
            .field("slot", &self.slot)
            .field("cycle", &self.cycle)
            .field("action", &"<closure>")
            .finish()
    }
}
