//! 工作池构建器
//! Worker pool builder
//!
//! 每个方法对应一个工作池选项，未设置的选项使用 [`PoolConfig`] 的默认值。
//!
//! Every method corresponds to one pool option; options left unset keep the
//! [`PoolConfig`] defaults.

use crate::config::PoolConfig;
use crate::pool::core::ElasticPool;
use crate::pool::lock::{DefaultLock, PoolLock};
use crate::pool::task::{Callbacks, TaskError};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// [`ElasticPool`] 的构建器
/// Builder for [`ElasticPool`]
pub struct PoolBuilder<T, L = DefaultLock> {
    config: PoolConfig,
    callbacks: Callbacks<T>,
    _lock: PhantomData<fn() -> L>,
}

impl<T: Send + 'static> PoolBuilder<T> {
    pub fn new(max_workers: usize) -> Self {
        Self::from_config(PoolConfig::new(max_workers))
    }

    /// 从完整配置开始构建
    /// Start from a complete config
    pub fn from_config(config: PoolConfig) -> Self {
        Self {
            config,
            callbacks: Callbacks::none(),
            _lock: PhantomData,
        }
    }
}

impl<T: Send + 'static, L: PoolLock> PoolBuilder<T, L> {
    /// 工作者数量下限，默认等于上限
    /// Floor of the worker count; defaults to the ceiling
    pub fn min_workers(mut self, min_workers: usize) -> Self {
        self.config.min_workers = Some(min_workers);
        self
    }

    /// 单次尝试的截止时间
    /// Deadline of a single attempt
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// 首次失败后的额外尝试次数
    /// Extra attempts after the first failure
    pub fn retry_count(mut self, retry_count: usize) -> Self {
        self.config.retry_count = retry_count;
        self
    }

    pub fn task_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.task_queue_capacity = capacity;
        self
    }

    pub fn scale_interval(mut self, interval: Duration) -> Self {
        self.config.scale_interval = interval;
        self
    }

    pub fn wait_poll_interval(mut self, interval: Duration) -> Self {
        self.config.wait_poll_interval = interval;
        self
    }

    /// 超时后中止任务体，而不是让它在后台继续运行
    /// Abort a timed-out body instead of leaving it running detached
    pub fn abort_on_timeout(mut self, abort: bool) -> Self {
        self.config.abort_on_timeout = abort;
        self
    }

    /// 选择保护工作者列表和空闲栈的原始互斥锁，例如 [`FairLock`](crate::pool::FairLock)
    /// Pick the raw mutex guarding the worker list and the idle stack, e.g.
    /// [`FairLock`](crate::pool::FairLock)
    pub fn lock<M: PoolLock>(self) -> PoolBuilder<T, M> {
        PoolBuilder {
            config: self.config,
            callbacks: self.callbacks,
            _lock: PhantomData,
        }
    }

    /// 任务成功时调用
    /// Invoked when a task succeeds
    pub fn result_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.callbacks.on_result = Some(Arc::new(callback));
        self
    }

    /// 任务在所有尝试后仍失败时调用
    /// Invoked when a task still fails after every attempt
    pub fn error_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(TaskError) + Send + Sync + 'static,
    {
        self.callbacks.on_error = Some(Arc::new(callback));
        self
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// 启动工作池。必须在 tokio 运行时中调用。
    /// Start the pool. Must be called inside a tokio runtime.
    pub fn build(self) -> ElasticPool<T, L> {
        ElasticPool::<T, L>::start(self.config, self.callbacks)
    }
}
