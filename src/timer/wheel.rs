//! 时间轮数据结构实现
//! Timing Wheel Data Structure Implementation
//!
//! 时间轮将时间分为固定数量的槽位，游标每个 tick 前进一格。每个任务记录
//! 它所在的槽位以及到期前还需经过的完整轮数（cycle）。该结构只由控制循环
//! 持有和修改，因此内部不需要任何锁。
//!
//! The timing wheel divides time into a fixed number of slots and the cursor
//! moves one slot per tick. Every task records its slot and the number of
//! full revolutions (cycle) left before it is due. The structure is owned and
//! mutated by the control loop only, so it needs no locking.

use crate::config::WheelConfig;
use crate::timer::stats::TimingWheelStats;
use crate::timer::task::{TaskKey, TimerAction, TimerTask};
use std::collections::HashMap;
use std::time::Duration;
use tracing::trace;

/// 哈希时间轮
/// Hashed timing wheel
#[derive(Debug)]
pub struct TimingWheel {
    /// 槽位数量
    /// Number of slots
    slot_count: usize,
    /// 每个槽位的时间间隔
    /// Time interval per slot
    tick_interval: Duration,
    /// 当前指针位置，下一次 tick 将扫描此槽位
    /// Current pointer position, scanned by the next tick
    current_slot: usize,
    /// 槽位数组
    /// Slot array
    slots: Vec<Vec<TimerTask>>,
    /// 键到 (槽位, 槽内位置) 的索引
    /// Index from key to (slot, position in slot)
    index: HashMap<TaskKey, (usize, usize)>,
    fired_tasks: u64,
    cancelled_tasks: u64,
}

impl TimingWheel {
    /// 根据配置创建时间轮，配置会先经过钳制
    /// Create a timing wheel from a config, which is normalized first
    pub fn new(config: &WheelConfig) -> Self {
        let config = config.clone().normalized();
        let mut slots = Vec::with_capacity(config.slot_count);
        for _ in 0..config.slot_count {
            slots.push(Vec::new());
        }

        Self {
            slot_count: config.slot_count,
            tick_interval: config.tick_interval,
            current_slot: 0,
            slots,
            index: HashMap::new(),
            fired_tasks: 0,
            cancelled_tasks: 0,
        }
    }

    /// 计算给定延迟对应的 (槽位, 轮数)
    /// Compute the (slot, cycle) pair for a delay
    ///
    /// `slot = (current_slot + delay / tick) mod slots`,
    /// `cycle = delay / (tick * slots)`.
    pub fn position_for(&self, delay: Duration) -> (usize, u64) {
        let tick = self.tick_interval.as_nanos();
        let delay = delay.as_nanos();
        let slots = self.slot_count as u128;

        let slot = (self.current_slot as u128 + delay / tick) % slots;
        let cycle = delay / (tick * slots);
        (slot as usize, u64::try_from(cycle).unwrap_or(u64::MAX))
    }

    /// 在给定延迟后调度任务，返回是否替换了同键的旧任务
    /// Schedule a task after `delay`; returns whether an older task under the
    /// same key was replaced
    pub fn add_task(&mut self, key: TaskKey, delay: Duration, action: TimerAction) -> bool {
        let (slot, cycle) = self.position_for(delay);
        self.insert(TimerTask::new(key, slot, cycle, action))
    }

    /// 插入一个已经定位好的任务
    /// Insert an already positioned task
    pub fn insert(&mut self, task: TimerTask) -> bool {
        let replaced = self.remove_task(&task.key).is_some();

        let slot = task.slot % self.slot_count;
        let bucket = &mut self.slots[slot];
        let position = bucket.len();

        trace!(
            key = %task.key,
            slot,
            cycle = task.cycle,
            replaced,
            "Task scheduled on timing wheel"
        );

        self.index.insert(task.key.clone(), (slot, position));
        bucket.push(TimerTask { slot, ..task });
        replaced
    }

    /// 移除任务；未知键返回 `None`
    /// Remove a task; unknown keys yield `None`
    pub fn remove_task(&mut self, key: &str) -> Option<TimerTask> {
        let (slot, position) = self.index.remove(key)?;
        let bucket = &mut self.slots[slot];
        if position >= bucket.len() {
            return None;
        }

        // 交换删除：被移到空位的元素需要更新索引
        // Swap removal: the element moved into the hole needs its index updated
        let task = bucket.swap_remove(position);
        if let Some(moved) = bucket.get(position) {
            if let Some(entry) = self.index.get_mut(&moved.key) {
                *entry = (slot, position);
            }
        }

        self.cancelled_tasks += 1;
        Some(task)
    }

    /// 扫描当前槽位并前进游标，返回所有到期任务
    /// Scan the current slot, advance the cursor, and return every due task
    pub fn tick(&mut self) -> Vec<TimerTask> {
        let slot = self.current_slot;
        let bucket = std::mem::take(&mut self.slots[slot]);
        let mut kept = Vec::with_capacity(bucket.len());
        let mut due = Vec::new();

        for mut task in bucket {
            if task.is_due() {
                self.index.remove(&task.key);
                due.push(task);
            } else {
                task.cycle -= 1;
                if let Some(entry) = self.index.get_mut(&task.key) {
                    *entry = (slot, kept.len());
                }
                kept.push(task);
            }
        }

        self.slots[slot] = kept;
        self.current_slot = (slot + 1) % self.slot_count;
        self.fired_tasks += due.len() as u64;
        due
    }

    /// 键是否已调度
    /// Whether a key is scheduled
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// 清空所有任务，返回被丢弃的数量
    /// Drop every scheduled task, returning how many were dropped
    pub fn clear(&mut self) -> usize {
        let count = self.index.len();
        for bucket in &mut self.slots {
            bucket.clear();
        }
        self.index.clear();
        count
    }

    /// 获取统计信息
    /// Get statistics
    pub fn stats(&self) -> TimingWheelStats {
        let non_empty_slots = self.slots.iter().filter(|s| !s.is_empty()).count();
        let max_slot_size = self.slots.iter().map(Vec::len).max().unwrap_or(0);

        TimingWheelStats {
            total_slots: self.slot_count,
            non_empty_slots,
            scheduled_tasks: self.index.len(),
            max_slot_size,
            current_slot: self.current_slot,
            tick_interval: self.tick_interval,
            fired_tasks: self.fired_tasks,
            cancelled_tasks: self.cancelled_tasks,
        }
    }
}
