//! 定义了时间轮和工作池的可配置参数。
//! Defines configurable parameters for the timing wheel and the worker pool.

use std::time::Duration;

/// 时间轮允许的最小槽位数。
/// Smallest slot count a timing wheel is allowed to have.
pub const MIN_SLOT_COUNT: usize = 10;

/// 时间轮的默认 tick 间隔。
/// Default tick interval of a timing wheel.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// 工作池任务队列的默认容量。
/// Default capacity of the worker pool's task queue.
pub const DEFAULT_TASK_QUEUE_CAPACITY: usize = 1_000_000;

/// Parameters of a timing wheel.
///
/// 时间轮的参数。
#[derive(Debug, Clone)]
pub struct WheelConfig {
    /// Number of slots. Raised to [`MIN_SLOT_COUNT`] if smaller.
    /// 槽位数量。小于 [`MIN_SLOT_COUNT`] 时会被提升。
    pub slot_count: usize,
    /// Time covered by one slot. A zero interval becomes [`DEFAULT_TICK_INTERVAL`].
    /// 每个槽位覆盖的时间。为零时使用 [`DEFAULT_TICK_INTERVAL`]。
    pub tick_interval: Duration,
    /// Capacity of the command channel feeding the control loop.
    /// 控制循环命令通道的容量。
    pub command_buffer_size: usize,
}

impl WheelConfig {
    /// 使用给定的槽位数和 tick 间隔创建配置。
    /// Creates a config with the given slot count and tick interval.
    pub fn new(slot_count: usize, tick_interval: Duration) -> Self {
        Self {
            slot_count,
            tick_interval,
            ..Self::default()
        }
    }

    /// 应用钳制规则，返回可以直接使用的配置。
    /// Applies the clamping rules and returns a config ready for use.
    pub fn normalized(mut self) -> Self {
        if self.slot_count < MIN_SLOT_COUNT {
            self.slot_count = MIN_SLOT_COUNT;
        }
        if self.tick_interval.is_zero() {
            self.tick_interval = DEFAULT_TICK_INTERVAL;
        }
        self.command_buffer_size = self.command_buffer_size.max(1);
        self
    }

    /// 时间轮转动一整圈所需的时间。
    /// Time needed for one full revolution of the wheel.
    pub fn revolution(&self) -> Duration {
        self.tick_interval * self.slot_count as u32
    }
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self {
            slot_count: 60,
            tick_interval: DEFAULT_TICK_INTERVAL,
            command_buffer_size: 1024,
        }
    }
}

/// Parameters of an elastic worker pool.
///
/// 弹性工作池的参数。
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Ceiling of the worker count.
    /// 工作者数量上限。
    pub max_workers: usize,
    /// Floor of the worker count; the pool starts with this many workers.
    /// `None` means equal to `max_workers`.
    /// 工作者数量下限，工作池以此数量启动。`None` 表示等于 `max_workers`。
    pub min_workers: Option<usize>,
    /// Deadline for a single attempt of a task.
    /// 单次任务尝试的截止时间。
    pub timeout: Option<Duration>,
    /// Extra attempts after the first failure.
    /// 首次失败后的额外尝试次数。
    pub retry_count: usize,
    /// Bound on pending submissions; `submit` waits when it is reached.
    /// 待处理提交的上限，达到后 `submit` 会等待。
    pub task_queue_capacity: usize,
    /// Period of the auto-scaling loop.
    /// 自动伸缩循环的周期。
    pub scale_interval: Duration,
    /// Polling period used by `wait`.
    /// `wait` 使用的轮询周期。
    pub wait_poll_interval: Duration,
    /// Abort a timed-out attempt instead of leaving it running detached.
    /// 超时后中止该次尝试，而不是让其在后台继续运行。
    pub abort_on_timeout: bool,
}

impl PoolConfig {
    /// 使用给定的最大工作者数量创建配置。
    /// Creates a config with the given maximum worker count.
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers,
            ..Self::default()
        }
    }

    /// 应用钳制规则，返回可以直接使用的配置。
    /// Applies the clamping rules and returns a config ready for use.
    pub fn normalized(mut self) -> Self {
        self.max_workers = self.max_workers.max(1);
        let min = self.min_workers.unwrap_or(self.max_workers);
        self.min_workers = Some(min.clamp(1, self.max_workers));
        self.task_queue_capacity = self.task_queue_capacity.max(1);
        if self.scale_interval.is_zero() {
            self.scale_interval = Duration::from_secs(1);
        }
        if self.wait_poll_interval.is_zero() {
            self.wait_poll_interval = Duration::from_millis(50);
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            self.timeout = None;
        }
        self
    }

    /// 生效的最小工作者数量。
    /// Effective minimum worker count.
    pub fn min_workers(&self) -> usize {
        self.min_workers.unwrap_or(self.max_workers)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: 8,
            min_workers: None,
            timeout: None,
            retry_count: 0,
            task_queue_capacity: DEFAULT_TASK_QUEUE_CAPACITY,
            scale_interval: Duration::from_secs(1),
            wait_poll_interval: Duration::from_millis(50),
            abort_on_timeout: false,
        }
    }
}
