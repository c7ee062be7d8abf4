//! 工作池任务类型定义
//! Worker pool task type definitions

use crate::error::BoxError;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// 单次任务尝试的结果
/// Result of one task attempt
pub type TaskResult<T> = std::result::Result<T, BoxError>;

/// 提交到工作池的任务。任务可能因重试被调用多次，所以是 `Fn` 而不是 `FnOnce`。
/// A task submitted to the pool. It may be invoked several times because of
/// retries, hence `Fn` rather than `FnOnce`.
pub type PoolTask<T> = Arc<dyn Fn() -> BoxFuture<'static, TaskResult<T>> + Send + Sync + 'static>;

/// 任务成功时调用的回调
/// Callback invoked when a task succeeds
pub type ResultCallback<T> = Arc<dyn Fn(T) + Send + Sync + 'static>;

/// 任务最终失败时调用的回调
/// Callback invoked when a task finally fails
pub type ErrorCallback = Arc<dyn Fn(TaskError) + Send + Sync + 'static>;

/// 任务执行错误
/// Task execution errors
#[derive(Debug, Error)]
pub enum TaskError {
    /// 单次尝试超过了配置的截止时间
    /// An attempt exceeded the configured deadline
    #[error("task timed out after {0:?}")]
    Timeout(Duration),
    /// 任务体返回了错误
    /// The task body returned an error
    #[error("task failed: {0}")]
    Failed(#[source] BoxError),
    /// 任务体 panic，已在执行边界被捕获
    /// The task body panicked; caught at the execution boundary
    #[error("task panicked: {0}")]
    Panicked(String),
    /// 任务被运行时取消
    /// The task was cancelled by the runtime
    #[error("task was cancelled")]
    Cancelled,
}

impl TaskError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// 工作者完成任务后调用的回调集合
/// Callbacks run by a worker after it finishes a task
pub(crate) struct Callbacks<T> {
    pub(crate) on_result: Option<ResultCallback<T>>,
    pub(crate) on_error: Option<ErrorCallback>,
}

impl<T> Callbacks<T> {
    pub(crate) fn none() -> Self {
        Self {
            on_result: None,
            on_error: None,
        }
    }
}

impl<T> Clone for Callbacks<T> {
    fn clone(&self) -> Self {
        Self {
            on_result: self.on_result.clone(),
            on_error: self.on_error.clone(),
        }
    }
}
