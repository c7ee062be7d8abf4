//! 自动伸缩
//! Auto-scaling
//!
//! 伸缩循环按固定间隔观察队列压力：待处理任务超过工作者数量的 75% 时
//! 工作者数量翻倍（不超过上限）；队列为空且全部空闲时移除超出下限部分的
//! 一半（向上取整），索引最大的工作者先被移除。
//!
//! The scaling loop observes queue pressure on a fixed interval. When pending
//! tasks exceed 75% of the worker count the pool doubles (capped at the
//! maximum); when the queue is empty and every worker is idle it removes half
//! (rounded up) of the workers above the minimum, highest indices first.

use crate::pool::core::Shared;
use crate::pool::lock::PoolLock;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Instant, interval_at};
use tracing::debug;

/// 一次伸缩检查的决定
/// Outcome of one scaling check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDecision {
    /// 新增给定数量的工作者
    /// Add this many workers
    Grow(usize),
    /// 移除给定数量的工作者
    /// Remove this many workers
    Shrink(usize),
    Hold,
}

/// 根据当前观测值计算伸缩决定
/// Compute the scaling decision for the current observation
pub fn plan(queued: usize, workers: usize, idle: usize, min: usize, max: usize) -> ScaleDecision {
    if queued > workers * 3 / 4 && workers < max {
        ScaleDecision::Grow((workers * 2).min(max) - workers)
    } else if queued == 0 && idle == workers && workers > min {
        ScaleDecision::Shrink((workers - min).div_ceil(2))
    } else {
        ScaleDecision::Hold
    }
}

/// 运行伸缩循环直到收到停止信号
/// Run the scaling loop until the stop signal arrives
pub(crate) async fn run<T: Send + 'static, L: PoolLock>(
    shared: Arc<Shared<T, L>>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let period = shared.config().scale_interval;
    let mut ticker = interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            biased;

            _ = stop_rx.changed() => break,

            _ = ticker.tick() => {
                shared.adjust_workers();
            }
        }
    }

    debug!("Scaling loop stopped");
}
