//! 时间轮统计信息
//! Timing wheel statistics

use std::time::Duration;

/// 时间轮统计信息
/// Timing wheel statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimingWheelStats {
    /// 总槽位数
    /// Total number of slots
    pub total_slots: usize,
    /// 非空槽位数
    /// Number of non-empty slots
    pub non_empty_slots: usize,
    /// 已调度的任务数
    /// Number of scheduled tasks
    pub scheduled_tasks: usize,
    /// 最大槽位大小
    /// Maximum slot size
    pub max_slot_size: usize,
    /// 当前槽位
    /// Current slot
    pub current_slot: usize,
    /// tick 间隔
    /// Tick interval
    pub tick_interval: Duration,
    /// 已触发的任务数
    /// Number of fired tasks
    pub fired_tasks: u64,
    /// 被移除或替换的任务数
    /// Number of removed or replaced tasks
    pub cancelled_tasks: u64,
}

impl std::fmt::Display for TimingWheelStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "TimingWheelStats {{ slots: {}/{}, tasks: {}, max_slot: {}, current: {}, tick: {:?}, fired: {}, cancelled: {} }}",
            self.non_empty_slots,
            self.total_slots,
            self.scheduled_tasks,
            self.max_slot_size,
            self.current_slot,
            self.tick_interval,
            self.fired_tasks,
            self.cancelled_tasks
        )
    }
}
