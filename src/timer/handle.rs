//! 时间轮句柄
//! Timing wheel handle
//!
//! 句柄是时间轮对外的唯一接口。添加和移除都是与控制循环的同步交接：
//! 调用方等待直到控制循环应用了该请求。
//!
//! The handle is the only public surface of the timing wheel. Adding and
//! removing are synchronous hand-offs with the control loop: the caller waits
//! until the loop has applied the request.

use crate::config::WheelConfig;
use crate::error::{Error, Result};
use crate::timer::actor::WheelTask;
use crate::timer::commands::WheelCommand;
use crate::timer::stats::TimingWheelStats;
use crate::timer::task::{TaskKey, boxed_action};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{error, info};

struct Inner {
    command_tx: mpsc::Sender<WheelCommand>,
    stop_tx: watch::Sender<bool>,
    stopped: AtomicBool,
    /// 控制循环退出后变为 `true`
    /// Turns `true` once the control loop has exited
    done_rx: watch::Receiver<bool>,
}

/// 时间轮的句柄，可克隆并在多个任务间共享
/// Handle of a timing wheel; cheap to clone and share between tasks
#[derive(Clone)]
pub struct TimingWheelHandle {
    inner: Arc<Inner>,
}

impl TimingWheelHandle {
    /// 启动时间轮控制循环并返回句柄。必须在 tokio 运行时中调用。
    /// Start the control loop and return its handle. Must be called inside a tokio runtime.
    pub fn start(config: WheelConfig) -> Self {
        let config = config.normalized();
        let (command_tx, command_rx) = mpsc::channel(config.command_buffer_size);
        let (stop_tx, stop_rx) = watch::channel(false);
        let (done_tx, done_rx) = watch::channel(false);

        let task = WheelTask::new(&config, command_rx, stop_rx);
        let join = tokio::spawn(task.run());

        // 监督任务：控制循环的 panic 至少要留下诊断信息
        // Supervisor: a panic of the control loop must at least leave a diagnostic
        tokio::spawn(async move {
            if let Err(err) = join.await {
                if err.is_panic() {
                    error!(error = %err, "Timing wheel control loop panicked");
                }
            }
            let _ = done_tx.send(true);
        });

        Self {
            inner: Arc::new(Inner {
                command_tx,
                stop_tx,
                stopped: AtomicBool::new(false),
                done_rx,
            }),
        }
    }

    /// 在 `fire_at` 时刻（或之后）执行 `action`
    /// Run `action` at or after `fire_at`
    ///
    /// 同一键的旧任务会先被移除，只有最近一次注册会触发。返回是否发生了替换。
    /// An older task under the same key is removed first so only the latest
    /// registration fires. Returns whether a replacement happened.
    pub async fn add_task<F, Fut>(
        &self,
        key: impl Into<TaskKey>,
        action: F,
        fire_at: Instant,
    ) -> Result<bool>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (response_tx, response_rx) = oneshot::channel();
        let command = WheelCommand::AddTask {
            key: key.into(),
            fire_at,
            action: boxed_action(action),
            response_tx,
        };
        self.request(command, response_rx).await
    }

    /// 移除任务；未知键是无操作。返回是否移除了任务。
    /// Remove a task; unknown keys are a no-op. Returns whether a task was removed.
    pub async fn remove_task(&self, key: impl Into<TaskKey>) -> Result<bool> {
        let (response_tx, response_rx) = oneshot::channel();
        let command = WheelCommand::RemoveTask {
            key: key.into(),
            response_tx,
        };
        self.request(command, response_rx).await
    }

    /// 键当前是否已调度
    /// Whether a key is currently scheduled
    pub async fn contains(&self, key: impl Into<TaskKey>) -> Result<bool> {
        let (response_tx, response_rx) = oneshot::channel();
        let command = WheelCommand::Contains {
            key: key.into(),
            response_tx,
        };
        self.request(command, response_rx).await
    }

    /// 获取统计信息
    /// Get statistics
    pub async fn stats(&self) -> Result<TimingWheelStats> {
        let (response_tx, response_rx) = oneshot::channel();
        self.request(WheelCommand::GetStats { response_tx }, response_rx)
            .await
    }

    /// 停止 tick 源和控制循环。只有第一次调用生效，可并发调用。
    /// Stop the tick source and the control loop. Only the first call has an
    /// effect; safe to call concurrently.
    ///
    /// 已经触发的任务不会被取消或等待。
    /// Tasks that already fired are neither cancelled nor awaited.
    pub fn stop(&self) {
        if self.inner.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        // 控制循环可能已经退出，此时没有接收者
        // The loop may already be gone, leaving no receiver
        let _ = self.inner.stop_tx.send(true);
        info!("Timing wheel stop requested");
    }

    /// 停止时间轮并等待控制循环退出。返回后不会再有任务触发。
    /// Stop the wheel and wait for the control loop to exit. No task fires
    /// after this returns.
    ///
    /// 已触发任务的 future 在返回前都已创建，但它们在各自的任务中运行，不会被等待。
    /// Every fired task has had its future built by then; those futures run
    /// in their own tasks and are not awaited.
    pub async fn shutdown(&self) {
        self.stop();
        let mut done_rx = self.inner.done_rx.clone();
        // 发送端只会在写入 `true` 之后被丢弃
        // The sender is only dropped after writing `true`
        let _ = done_rx.wait_for(|done| *done).await;
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    async fn request<T>(&self, command: WheelCommand, response_rx: oneshot::Receiver<T>) -> Result<T> {
        if self.is_stopped() {
            return Err(Error::WheelStopped);
        }

        self.inner
            .command_tx
            .send(command)
            .await
            .map_err(|_| Error::WheelStopped)?;

        response_rx.await.map_err(|_| Error::WheelStopped)
    }
}

/// 启动时间轮
/// Start a timing wheel
pub fn start_timing_wheel(config: WheelConfig) -> TimingWheelHandle {
    TimingWheelHandle::start(config)
}

impl std::fmt::Debug for TimingWheelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimingWheelHandle")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
