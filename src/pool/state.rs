//! 工作池生命周期状态
//! Worker pool lifecycle state

use std::sync::atomic::{AtomicU8, Ordering};

/// 工作池生命周期：`Created -> Running -> Releasing -> Released`，不可回退
/// Pool lifecycle: `Created -> Running -> Releasing -> Released`, never backwards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PoolState {
    /// 已创建，工作者尚未启动
    /// Created, workers not started yet
    Created = 0,
    /// 接受提交，伸缩循环运行中
    /// Accepting submissions, scaling active
    Running = 1,
    /// 队列已关闭，伸缩已停止，正在排空
    /// Queue closed, scaling stopped, draining
    Releasing = 2,
    /// 终态
    /// Terminal
    Released = 3,
}

impl PoolState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Created,
            1 => Self::Running,
            2 => Self::Releasing,
            _ => Self::Released,
        }
    }

    /// 是否接受新的提交
    /// Whether new submissions are accepted
    pub fn is_accepting(self) -> bool {
        self == Self::Running
    }
}

/// 原子状态单元
/// Atomic state cell
#[derive(Debug)]
pub(crate) struct AtomicPoolState(AtomicU8);

impl AtomicPoolState {
    pub(crate) fn new(state: PoolState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn load(&self) -> PoolState {
        PoolState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, state: PoolState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// 仅当当前状态为 `from` 时迁移到 `to`
    /// Move to `to` only if the current state is `from`
    pub(crate) fn transition(&self, from: PoolState, to: PoolState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
