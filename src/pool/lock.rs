//! 工作池核心锁
//! Worker pool core lock
//!
//! 工作者列表和空闲栈由一把互斥锁保护。默认使用 `parking_lot` 的原始互斥锁，
//! 也可以通过 [`PoolBuilder::lock`](crate::pool::PoolBuilder::lock) 换成任何
//! 实现了 [`lock_api::RawMutex`] 的锁，例如公平锁。
//!
//! One mutex guards the worker list and the idle stack. It defaults to the
//! `parking_lot` raw mutex and can be swapped through
//! [`PoolBuilder::lock`](crate::pool::PoolBuilder::lock) for any
//! [`lock_api::RawMutex`] implementation, such as a fair lock.

use lock_api::RawMutex;

/// 默认的核心锁
/// Default core lock
pub type DefaultLock = parking_lot::RawMutex;

/// 公平的核心锁，解锁时把锁直接交给等待者
/// Fair core lock; unlocking hands the lock straight to a waiter
pub type FairLock = parking_lot::RawFairMutex;

/// 可以保护工作池核心状态的原始互斥锁
/// A raw mutex able to guard the pool core state
pub trait PoolLock: RawMutex + Send + Sync + 'static {}

impl<L: RawMutex + Send + Sync + 'static> PoolLock for L {}

pub(crate) type CoreMutex<L, T> = lock_api::Mutex<L, T>;
