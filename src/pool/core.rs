//! 弹性工作池核心实现
//! Elastic worker pool core implementation
//!
//! 一把互斥锁（类型由 [`PoolLock`] 决定）加一个 [`Notify`]（充当条件变量）
//! 保护工作者列表和空闲栈。
//! 有界任务队列是一个 tokio mpsc 通道，队满时 `submit` 等待，从而形成背压。
//! 分发循环按 FIFO 取出任务，把它交给最近归还的空闲工作者（LIFO 复用）。
//!
//! One mutex (its raw lock chosen through [`PoolLock`]) plus a [`Notify`]
//! (acting as the condition variable) guard the worker list and the idle
//! stack. The bounded task queue is a tokio mpsc
//! channel; `submit` waits while it is full, which is the backpressure
//! mechanism. The dispatch loop takes tasks in FIFO order and hands each one
//! to the most recently idled worker (LIFO reuse).

use crate::config::PoolConfig;
use crate::error::{Error, Result};
use crate::pool::builder::PoolBuilder;
use crate::pool::lock::{CoreMutex, DefaultLock, PoolLock};
use crate::pool::scaler::{self, ScaleDecision};
use crate::pool::state::{AtomicPoolState, PoolState};
use crate::pool::task::{Callbacks, PoolTask, TaskResult};
use crate::pool::worker::Worker;
use futures::FutureExt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// 获取互斥锁，中毒时直接恢复
/// Lock a mutex, recovering from poisoning
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 受锁保护的工作者集合
/// Worker set guarded by the lock
pub(crate) struct PoolCore<T> {
    workers: Vec<Worker<T>>,
    /// 空闲工作者索引栈
    /// Stack of idle worker indices
    idle: Vec<usize>,
}

impl<T> PoolCore<T> {
    fn busy(&self) -> usize {
        self.workers.len() - self.idle.len()
    }
}

/// 分发循环、工作者和伸缩循环共享的状态
/// State shared by the dispatcher, the workers and the scaler
pub(crate) struct Shared<T, L> {
    config: PoolConfig,
    callbacks: Callbacks<T>,
    core: CoreMutex<L, PoolCore<T>>,
    /// 空闲工作者出现或数量变化时唤醒等待者
    /// Wakes waiters whenever a worker becomes idle or the worker set changes
    available: Notify,
    /// 已进入队列但尚未交给工作者的任务数
    /// Tasks accepted into the queue but not yet handed to a worker
    queued: AtomicUsize,
    state: AtomicPoolState,
}

impl<T: Send + 'static, L: PoolLock> Shared<T, L> {
    pub(crate) fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub(crate) fn callbacks(&self) -> &Callbacks<T> {
        &self.callbacks
    }

    fn queued(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    /// 工作者完成任务后归还自己
    /// A worker returns itself after finishing a task
    pub(crate) fn push_idle(&self, index: usize) {
        {
            let mut core = self.core.lock();
            if index < core.workers.len() {
                core.idle.push(index);
            }
        }
        self.available.notify_waiters();
    }

    /// 等待并弹出最近归还的空闲工作者
    /// Wait for, then pop, the most recently idled worker
    async fn acquire_worker(&self) -> (usize, mpsc::Sender<PoolTask<T>>) {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(acquired) = self.try_pop_idle() {
                return acquired;
            }
            notified.await;
        }
    }

    fn try_pop_idle(&self) -> Option<(usize, mpsc::Sender<PoolTask<T>>)> {
        let mut core = self.core.lock();
        let index = core.idle.pop()?;
        Some((index, core.workers[index].mailbox()))
    }

    fn all_idle(&self) -> bool {
        self.core.lock().busy() == 0
    }

    /// 等待所有工作者空闲
    /// Wait until every worker is idle
    async fn wait_until_idle(&self) {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.all_idle() {
                return;
            }
            notified.await;
        }
    }

    /// 执行一次伸缩检查
    /// Run one scaling check
    pub(crate) fn adjust_workers(self: &Arc<Self>) {
        let decision = {
            let mut core = self.core.lock();
            let workers = core.workers.len();
            let decision = scaler::plan(
                self.queued(),
                workers,
                core.idle.len(),
                self.config.min_workers(),
                self.config.max_workers,
            );

            match decision {
                ScaleDecision::Grow(count) => {
                    for _ in 0..count {
                        let index = core.workers.len();
                        core.workers.push(Worker::spawn(self.clone(), index));
                        core.idle.push(index);
                    }
                }
                ScaleDecision::Shrink(count) => {
                    // 排序后截断，保留索引最小的工作者
                    // Sort before truncating so the lowest indices survive
                    core.idle.sort_unstable();
                    let keep = workers - count;
                    core.idle.truncate(keep);
                    // 被移除的工作者邮箱随句柄一起关闭，其任务随即退出
                    // Mailboxes of removed workers close with their handles, ending their tasks
                    core.workers.truncate(keep);
                }
                ScaleDecision::Hold => {}
            }
            decision
        };

        if decision != ScaleDecision::Hold {
            debug!(?decision, workers = self.worker_count(), "Worker pool resized");
            self.available.notify_waiters();
        }
    }

    fn worker_count(&self) -> usize {
        self.core.lock().workers.len()
    }
}

/// 分发循环：FIFO 取任务，交给 LIFO 弹出的空闲工作者
/// Dispatch loop: take tasks FIFO, hand them to LIFO-popped idle workers
async fn dispatch<T: Send + 'static, L: PoolLock>(
    shared: Arc<Shared<T, L>>,
    mut queue_rx: mpsc::Receiver<PoolTask<T>>,
) {
    while let Some(mut task) = queue_rx.recv().await {
        loop {
            let (index, mailbox) = shared.acquire_worker().await;
            match mailbox.send(task).await {
                Ok(()) => {
                    shared.queued.fetch_sub(1, Ordering::AcqRel);
                    break;
                }
                Err(mpsc::error::SendError(returned)) => {
                    warn!(worker = index, "Worker mailbox closed, redispatching task");
                    task = returned;
                }
            }
        }
    }
    debug!("Task queue closed and drained");
}

/// 工作池快照
/// Point-in-time pool snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub state: PoolState,
    pub workers: usize,
    pub running: usize,
    pub idle: usize,
    pub queued: usize,
    pub queue_capacity: usize,
    pub min_workers: usize,
    pub max_workers: usize,
}

#[derive(Default)]
struct Background {
    dispatcher: Option<JoinHandle<()>>,
    scaler: Option<JoinHandle<()>>,
}

/// 弹性工作池
/// Elastic worker pool
///
/// `T` 是任务成功时产生的值，会交给结果回调。`L` 是保护核心状态的锁。
/// `T` is the value a successful task produces; it is handed to the result
/// callback. `L` is the lock guarding the core state.
pub struct ElasticPool<T: Send + 'static, L: PoolLock = DefaultLock> {
    shared: Arc<Shared<T, L>>,
    queue_tx: Mutex<Option<mpsc::Sender<PoolTask<T>>>>,
    stop_tx: watch::Sender<bool>,
    background: Mutex<Background>,
}

impl<T: Send + 'static> ElasticPool<T> {
    /// 使用默认选项创建工作池，最小工作者数量等于最大值
    /// Create a pool with default options; the minimum equals the maximum
    pub fn new(max_workers: usize) -> Self {
        Self::builder(max_workers).build()
    }

    pub fn builder(max_workers: usize) -> PoolBuilder<T> {
        PoolBuilder::new(max_workers)
    }

    /// 从配置创建工作池，不带回调
    /// Create a pool from a config, without callbacks
    pub fn with_config(config: PoolConfig) -> Self {
        Self::start(config, Callbacks::none())
    }
}

impl<T: Send + 'static, L: PoolLock> ElasticPool<T, L> {
    /// 启动工作者、分发循环和伸缩循环。必须在 tokio 运行时中调用。
    /// Start workers, dispatcher and scaler. Must be called inside a tokio runtime.
    pub(crate) fn start(config: PoolConfig, callbacks: Callbacks<T>) -> Self {
        let config = config.normalized();
        let min_workers = config.min_workers();
        let (queue_tx, queue_rx) = mpsc::channel(config.task_queue_capacity);
        let (stop_tx, stop_rx) = watch::channel(false);

        let shared = Arc::new(Shared {
            config,
            callbacks,
            core: CoreMutex::new(PoolCore {
                workers: Vec::with_capacity(min_workers),
                idle: Vec::with_capacity(min_workers),
            }),
            available: Notify::new(),
            queued: AtomicUsize::new(0),
            state: AtomicPoolState::new(PoolState::Created),
        });

        {
            let mut core = shared.core.lock();
            for index in 0..min_workers {
                core.workers.push(Worker::spawn(shared.clone(), index));
                core.idle.push(index);
            }
        }

        let background = Background {
            dispatcher: Some(tokio::spawn(dispatch(shared.clone(), queue_rx))),
            scaler: Some(tokio::spawn(scaler::run(shared.clone(), stop_rx))),
        };
        shared.state.store(PoolState::Running);

        info!(
            min_workers,
            max_workers = shared.config.max_workers,
            queue_capacity = shared.config.task_queue_capacity,
            "Worker pool started"
        );

        Self {
            shared,
            queue_tx: Mutex::new(Some(queue_tx)),
            stop_tx,
            background: Mutex::new(background),
        }
    }

    /// 提交任务；队列满时等待空位（背压）
    /// Submit a task, waiting for room while the queue is full (backpressure)
    ///
    /// 工作池释放后返回 [`Error::PoolClosed`]。任务的成功或失败只能通过回调观察。
    /// Returns [`Error::PoolClosed`] once the pool is releasing. Success or
    /// failure of the task is only observable through the callbacks.
    pub async fn submit<F, Fut>(&self, task: F) -> Result<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TaskResult<T>> + Send + 'static,
    {
        let task: PoolTask<T> = Arc::new(move || task().boxed());
        self.submit_task(task).await
    }

    /// 提交已装箱的任务
    /// Submit an already boxed task
    pub async fn submit_task(&self, task: PoolTask<T>) -> Result<()> {
        if !self.shared.state.load().is_accepting() {
            return Err(Error::PoolClosed);
        }
        let queue_tx = lock(&self.queue_tx).clone().ok_or(Error::PoolClosed)?;

        let permit = queue_tx.reserve().await.map_err(|_| Error::PoolClosed)?;
        // 先计数再入队，分发循环看到任务时计数一定已经包含它
        // Count before enqueueing so the dispatcher never sees an uncounted task
        self.shared.queued.fetch_add(1, Ordering::AcqRel);
        permit.send(task);
        Ok(())
    }

    /// 轮询直到队列为空且所有工作者空闲
    /// Poll until the queue is empty and every worker is idle
    pub async fn wait(&self) {
        let poll = self.shared.config.wait_poll_interval;
        while self.shared.queued() != 0 || !self.shared.all_idle() {
            tokio::time::sleep(poll).await;
        }
    }

    /// 释放工作池：停止接收、停止伸缩、排空队列、等待所有工作者空闲后关闭它们
    /// Release the pool: stop accepting, stop scaling, drain the queue, wait
    /// for every worker to go idle, then shut them down
    ///
    /// 只能成功调用一次，之后的调用返回 [`Error::PoolClosed`]。
    /// Succeeds only once; later calls return [`Error::PoolClosed`].
    pub async fn release(&self) -> Result<()> {
        if !self
            .shared
            .state
            .transition(PoolState::Running, PoolState::Releasing)
        {
            return Err(Error::PoolClosed);
        }
        info!(queued = self.shared.queued(), "Releasing worker pool");

        // 丢弃发送端；仍在等待空位的提交完成后通道才真正关闭
        // Drop the sender; the channel closes once in-flight submissions finish
        drop(lock(&self.queue_tx).take());
        let _ = self.stop_tx.send(true);

        let (dispatcher, scaler) = {
            let mut background = lock(&self.background);
            (background.dispatcher.take(), background.scaler.take())
        };
        for (name, handle) in [("scaler", scaler), ("dispatcher", dispatcher)] {
            if let Some(handle) = handle {
                if let Err(err) = handle.await {
                    error!(task = name, error = %err, "Pool background task failed");
                }
            }
        }

        self.shared.wait_until_idle().await;

        let workers = {
            let mut core = self.shared.core.lock();
            core.idle.clear();
            std::mem::take(&mut core.workers)
        };
        let count = workers.len();
        for worker in workers {
            worker.shutdown().await;
        }

        self.shared.state.store(PoolState::Released);
        info!(workers = count, "Worker pool released");
        Ok(())
    }

    /// 正在执行任务的工作者数量
    /// Number of workers currently running a task
    pub fn running(&self) -> usize {
        self.shared.core.lock().busy()
    }

    /// 工作者总数
    /// Total number of workers
    pub fn workers(&self) -> usize {
        self.shared.worker_count()
    }

    /// 等待分发的任务数量，包括分发循环手中尚未交给工作者的任务
    /// Number of tasks waiting to be dispatched, including the one the
    /// dispatcher holds before a worker takes it
    pub fn task_queue_size(&self) -> usize {
        self.shared.queued()
    }

    pub fn task_queue_capacity(&self) -> usize {
        self.shared.config.task_queue_capacity
    }

    pub fn state(&self) -> PoolState {
        self.shared.state.load()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    pub fn stats(&self) -> PoolStats {
        let core = self.shared.core.lock();
        PoolStats {
            state: self.shared.state.load(),
            workers: core.workers.len(),
            running: core.busy(),
            idle: core.idle.len(),
            queued: self.shared.queued(),
            queue_capacity: self.shared.config.task_queue_capacity,
            min_workers: self.shared.config.min_workers(),
            max_workers: self.shared.config.max_workers,
        }
    }
}

impl<T: Send + 'static, L: PoolLock> Drop for ElasticPool<T, L> {
    fn drop(&mut self) {
        if self.shared.state.load() == PoolState::Released {
            return;
        }
        self.shared.state.store(PoolState::Released);

        // 未释放就被丢弃：放弃排队任务，正在执行的任务会在完成后随工作者退出
        // Dropped without release: queued tasks are discarded, running ones
        // finish and their workers exit
        let background = std::mem::take(&mut *lock(&self.background));
        for handle in [background.dispatcher, background.scaler].into_iter().flatten() {
            handle.abort();
        }
        lock(&self.queue_tx).take();
        let workers = std::mem::take(&mut self.shared.core.lock().workers);
        self.shared.core.lock().idle.clear();

        let discarded = self.shared.queued();
        if discarded > 0 {
            warn!(discarded, "Worker pool dropped without release");
        }
        drop(workers);
    }
}

impl<T: Send + 'static, L: PoolLock> std::fmt::Debug for ElasticPool<T, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticPool")
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn idle_stack<T: Send + 'static, L: PoolLock>(pool: &ElasticPool<T, L>) -> Vec<usize> {
        pool.shared.core.lock().idle.clone()
    }

    #[tokio::test]
    async fn test_idle_stack_is_lifo() {
        let pool = ElasticPool::<()>::new(3);
        assert_eq!(idle_stack(&pool), vec![0, 1, 2]);

        let (first, _) = pool.shared.try_pop_idle().unwrap();
        assert_eq!(first, 2);
        pool.shared.push_idle(first);
        let (again, _) = pool.shared.try_pop_idle().unwrap();
        assert_eq!(again, 2);

        let (next, _) = pool.shared.try_pop_idle().unwrap();
        assert_eq!(next, 1);
        pool.shared.push_idle(next);
        pool.shared.push_idle(again);
        assert_eq!(pool.shared.try_pop_idle().unwrap().0, 2);
        pool.shared.push_idle(2);

        pool.release().await.unwrap();
    }

    #[tokio::test]
    async fn test_shrink_keeps_lowest_indices() {
        let pool = ElasticPool::<()>::builder(6)
            .min_workers(2)
            .scale_interval(Duration::from_secs(3600))
            .build();

        pool.shared.queued.store(10, Ordering::Release);
        pool.shared.adjust_workers();
        assert_eq!(pool.workers(), 4);
        pool.shared.adjust_workers();
        assert_eq!(pool.workers(), 6);
        pool.shared.adjust_workers();
        assert_eq!(pool.workers(), 6);

        pool.shared.queued.store(0, Ordering::Release);
        pool.shared.core.lock().idle = vec![5, 0, 3, 1, 4, 2];
        pool.shared.adjust_workers();
        assert_eq!(pool.workers(), 4);
        assert_eq!(idle_stack(&pool), vec![0, 1, 2, 3]);

        pool.shared.adjust_workers();
        assert_eq!(pool.workers(), 3);
        pool.shared.adjust_workers();
        assert_eq!(pool.workers(), 2);
        pool.shared.adjust_workers();
        assert_eq!(pool.workers(), 2);

        pool.release().await.unwrap();
    }

    #[tokio::test]
    async fn test_push_idle_ignores_removed_worker() {
        let pool = ElasticPool::<()>::new(2);
        pool.shared.core.lock().idle.clear();
        pool.shared.push_idle(7);
        assert!(idle_stack(&pool).is_empty());
        pool.shared.push_idle(1);
        pool.shared.push_idle(0);
        assert_eq!(idle_stack(&pool), vec![1, 0]);

        pool.release().await.unwrap();
    }
}
