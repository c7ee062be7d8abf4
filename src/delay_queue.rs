//! 延迟队列：时间轮与工作池的组合
//! Delay queue: the timing wheel composed with the worker pool
//!
//! 事件按键挂到时间轮上；到期时事件被提交到工作池，由工作池的重试和超时策略
//! 负责把它投递到 [`EventSink`]。同一键的再次调度会替换之前的事件。
//!
//! Events are armed on the timing wheel under their key. When one fires it is
//! submitted to the worker pool, whose retry and timeout policy governs its
//! delivery to the [`EventSink`]. Scheduling a key again replaces the earlier
//! event.

use crate::config::WheelConfig;
use crate::error::{BoxError, Result};
use crate::pool::{ElasticPool, PoolBuilder, TaskResult};
use crate::timer::{TaskKey, TimingWheelHandle};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};

/// 延迟事件的信封
/// Envelope of a delayed event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelayedEvent {
    /// 调度键，同时用于取消和替换
    /// Scheduling key, also used for cancellation and replacement
    pub key: TaskKey,
    pub topic: String,
    pub data: Bytes,
}

impl DelayedEvent {
    pub fn new(key: impl Into<TaskKey>, topic: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            topic: topic.into(),
            data: data.into(),
        }
    }
}

/// 到期事件的出口，例如消息代理的生产者。
///
/// 一次投递可能因重试被调用多次，实现应当能容忍重复。
///
/// Outbound edge for due events, e.g. a message broker producer.
///
/// A delivery may be attempted several times because of retries, so
/// implementations should tolerate duplicates.
#[async_trait]
pub trait EventSink: Send + Sync + 'static {
    /// 投递一个到期事件
    /// Deliver one due event
    async fn deliver(&self, event: DelayedEvent) -> std::result::Result<(), BoxError>;
}

#[async_trait]
impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    async fn deliver(&self, event: DelayedEvent) -> std::result::Result<(), BoxError> {
        (**self).deliver(event).await
    }
}

/// 已触发但尚未进入工作池的投递
/// Deliveries that fired but have not entered the pool yet
#[derive(Default)]
struct DeliveryTracker {
    in_flight: AtomicUsize,
    drained: Notify,
    /// 因工作池已关闭而丢弃的事件数
    /// Events dropped because the pool was already closed
    dropped: AtomicU64,
}

impl DeliveryTracker {
    fn enter(self: &Arc<Self>) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        InFlightGuard(self.clone())
    }

    /// 等待所有已触发的投递进入工作池
    /// Wait until every fired delivery has entered the pool
    async fn wait_drained(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.in_flight.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}

struct InFlightGuard(Arc<DeliveryTracker>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.drained.notify_waiters();
        }
    }
}

/// 延迟队列
/// Delay queue
pub struct DelayQueue<S: EventSink> {
    wheel: TimingWheelHandle,
    pool: Arc<ElasticPool<()>>,
    sink: Arc<S>,
    tracker: Arc<DeliveryTracker>,
}

impl<S: EventSink> DelayQueue<S> {
    /// 启动时间轮和工作池。必须在 tokio 运行时中调用。
    /// Start the timing wheel and the worker pool. Must be called inside a tokio runtime.
    pub fn new(sink: S, wheel_config: WheelConfig, pool: PoolBuilder<()>) -> Self {
        Self {
            wheel: TimingWheelHandle::start(wheel_config),
            pool: Arc::new(pool.build()),
            sink: Arc::new(sink),
            tracker: Arc::default(),
        }
    }

    /// 在 `fire_at` 时刻投递事件，返回是否替换了同键的旧事件
    /// Deliver the event at `fire_at`; returns whether an older event under
    /// the same key was replaced
    pub async fn schedule(&self, event: DelayedEvent, fire_at: Instant) -> Result<bool> {
        let key = event.key.clone();
        let pool = self.pool.clone();
        let sink = self.sink.clone();
        let tracker = self.tracker.clone();

        // 守卫在控制循环触发任务时获取，早于任何 `shutdown` 对工作池的释放
        // The guard is taken when the control loop fires the task, before any
        // `shutdown` can release the pool
        let action = move || {
            let guard = tracker.enter();
            submit_delivery(pool, sink, event, guard)
        };
        self.wheel.add_task(key, action, fire_at).await
    }

    /// 取消尚未到期的事件
    /// Cancel an event that has not fired yet
    pub async fn cancel(&self, key: impl Into<TaskKey>) -> Result<bool> {
        self.wheel.remove_task(key).await
    }

    /// 事件是否仍在等待到期
    /// Whether an event is still waiting to fire
    pub async fn is_pending(&self, key: impl Into<TaskKey>) -> Result<bool> {
        self.wheel.contains(key).await
    }

    /// 停止时间轮并等待它退出，等待已触发的事件全部进入工作池，
    /// 然后释放工作池并等待投递完成。尚未到期的事件被丢弃。
    ///
    /// Stop the wheel and wait for it to exit, wait for every fired event to
    /// enter the pool, then release the pool and wait for the deliveries.
    /// Events that have not fired yet are dropped.
    pub async fn shutdown(&self) -> Result<()> {
        self.wheel.shutdown().await;
        self.tracker.wait_drained().await;
        self.pool.release().await
    }

    /// 已触发但因工作池关闭而未能投递的事件数
    /// Number of fired events that could not be delivered because the pool was closed
    pub fn dropped_events(&self) -> u64 {
        self.tracker.dropped.load(Ordering::Acquire)
    }

    pub fn wheel(&self) -> &TimingWheelHandle {
        &self.wheel
    }

    pub fn pool(&self) -> &ElasticPool<()> {
        &self.pool
    }
}

impl<S: EventSink> std::fmt::Debug for DelayQueue<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayQueue")
            .field("wheel", &self.wheel)
            .field("pool", &self.pool)
            .field("dropped_events", &self.dropped_events())
            .finish()
    }
}

async fn submit_delivery<S: EventSink>(
    pool: Arc<ElasticPool<()>>,
    sink: Arc<S>,
    event: DelayedEvent,
    guard: InFlightGuard,
) {
    let key = event.key.clone();
    debug!(key = %key, topic = %event.topic, "Delayed event due");

    let submitted = pool
        .submit(move || deliver(sink.clone(), event.clone()))
        .await;
    if let Err(err) = submitted {
        guard.0.dropped.fetch_add(1, Ordering::AcqRel);
        warn!(key = %key, error = %err, "Dropping due event");
    }
}

async fn deliver<S: EventSink>(sink: Arc<S>, event: DelayedEvent) -> TaskResult<()> {
    sink.deliver(event).await
}
