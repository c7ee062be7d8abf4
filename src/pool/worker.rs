//! 工作者实现
//! Worker implementation
//!
//! 每个工作者是一个带深度为 1 邮箱的 tokio 任务。它一次只持有一个任务，
//! 完成后（无论成功、失败或超时）把自己的索引压回空闲栈。
//!
//! Each worker is a tokio task with a depth-1 mailbox. It holds at most one
//! task at a time and, once done (success, failure, or timeout), pushes its
//! own index back onto the idle stack.

use crate::config::PoolConfig;
use crate::panic::panic_message;
use crate::pool::core::Shared;
use crate::pool::lock::PoolLock;
use crate::pool::task::{Callbacks, PoolTask, TaskError};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};

/// 工作者句柄，由工作池持有
/// Worker handle held by the pool
pub(crate) struct Worker<T> {
    index: usize,
    mailbox: mpsc::Sender<PoolTask<T>>,
    join: JoinHandle<()>,
}

impl<T: Send + 'static> Worker<T> {
    /// 创建并启动工作者
    /// Create and start a worker
    pub(crate) fn spawn<L: PoolLock>(shared: Arc<Shared<T, L>>, index: usize) -> Self {
        let (mailbox, inbox) = mpsc::channel(1);
        let join = tokio::spawn(run(shared, index, inbox));
        trace!(worker = index, "Worker started");
        Self {
            index,
            mailbox,
            join,
        }
    }

    pub(crate) fn mailbox(&self) -> mpsc::Sender<PoolTask<T>> {
        self.mailbox.clone()
    }

    /// 关闭邮箱并等待工作者退出
    /// Close the mailbox and wait for the worker to exit
    pub(crate) async fn shutdown(self) {
        let Self { index, mailbox, join } = self;
        drop(mailbox);
        if let Err(err) = join.await {
            error!(worker = index, error = %err, "Worker exited abnormally");
        }
    }
}

async fn run<T: Send + 'static, L: PoolLock>(
    shared: Arc<Shared<T, L>>,
    index: usize,
    mut inbox: mpsc::Receiver<PoolTask<T>>,
) {
    while let Some(task) = inbox.recv().await {
        let outcome = execute(shared.config(), &task).await;
        handle_outcome(shared.callbacks(), index, outcome);
        // 先归还再接收下一个任务
        // Return to the idle stack before taking the next task
        shared.push_idle(index);
    }
    trace!(worker = index, "Worker mailbox closed");
}

/// 最多尝试 `retry_count + 1` 次，首次成功即停止
/// Try up to `retry_count + 1` times, stopping at the first success
pub(crate) async fn execute<T: Send + 'static>(
    config: &PoolConfig,
    task: &PoolTask<T>,
) -> Result<T, TaskError> {
    let attempts = config.retry_count + 1;
    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = match config.timeout {
            Some(deadline) => attempt_with_timeout(task, deadline, config.abort_on_timeout).await,
            None => attempt_inline(task).await,
        };
        match result {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= attempts => return Err(err),
            Err(err) => debug!(attempt, attempts, error = %err, "Task attempt failed, retrying"),
        }
    }
}

async fn attempt_inline<T>(task: &PoolTask<T>) -> Result<T, TaskError> {
    match AssertUnwindSafe(async { task().await }).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(TaskError::Failed(err)),
        Err(payload) => Err(TaskError::Panicked(panic_message(payload.as_ref()))),
    }
}

/// 任务体在独立任务中与截止时间竞争。超时后默认不等待也不终止任务体。
/// The body races the deadline in its own task. On expiry the body is, by
/// default, neither awaited nor terminated.
async fn attempt_with_timeout<T: Send + 'static>(
    task: &PoolTask<T>,
    deadline: Duration,
    abort_on_timeout: bool,
) -> Result<T, TaskError> {
    let body = task.clone();
    let handle = tokio::spawn(async move { body().await });
    let abort = handle.abort_handle();

    match tokio::time::timeout(deadline, handle).await {
        Ok(Ok(Ok(value))) => Ok(value),
        Ok(Ok(Err(err))) => Err(TaskError::Failed(err)),
        Ok(Err(join_err)) if join_err.is_panic() => {
            Err(TaskError::Panicked(panic_message(join_err.into_panic().as_ref())))
        }
        Ok(Err(_)) => Err(TaskError::Cancelled),
        Err(_) => {
            if abort_on_timeout {
                abort.abort();
            }
            Err(TaskError::Timeout(deadline))
        }
    }
}

/// 失败时调用错误回调，成功时调用结果回调。回调中的 panic 被捕获。
/// Failure goes to the error callback, success to the result callback.
/// A panic inside a callback is caught.
fn handle_outcome<T>(callbacks: &Callbacks<T>, index: usize, outcome: Result<T, TaskError>) {
    let invoked = match outcome {
        Ok(value) => match &callbacks.on_result {
            Some(on_result) => std::panic::catch_unwind(AssertUnwindSafe(|| on_result(value))),
            None => Ok(()),
        },
        Err(err) => {
            debug!(worker = index, error = %err, "Task failed");
            match &callbacks.on_error {
                Some(on_error) => std::panic::catch_unwind(AssertUnwindSafe(|| on_error(err))),
                None => Ok(()),
            }
        }
    };

    if let Err(payload) = invoked {
        error!(
            worker = index,
            panic = %panic_message(payload.as_ref()),
            "Pool callback panicked"
        );
    }
}
