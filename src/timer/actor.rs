//! 时间轮控制循环
//! Timing wheel control loop
//!
//! 控制循环是时间轮状态的唯一所有者。它在一个 `select!` 中复用三个事件源：
//! 周期性 tick、来自句柄的命令以及停止信号。所有对槽位和索引的修改都在
//! 这里串行发生。
//!
//! The control loop is the sole owner of the wheel state. It multiplexes
//! three event sources in one `select!`: the periodic tick, commands from
//! handles, and the stop signal. Every mutation of slots and the index
//! happens here, serially.

use crate::config::WheelConfig;
use crate::panic::panic_message;
use crate::timer::commands::WheelCommand;
use crate::timer::task::TimerTask;
use crate::timer::wheel::TimingWheel;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, interval_at};
use tracing::{debug, error, info, trace, warn};

/// 时间轮控制循环任务
/// Timing wheel control loop task
pub struct WheelTask {
    /// 时间轮
    /// Timing wheel
    wheel: TimingWheel,
    /// 命令接收通道
    /// Command receiver channel
    command_rx: mpsc::Receiver<WheelCommand>,
    /// 停止信号
    /// Stop signal
    stop_rx: watch::Receiver<bool>,
}

impl WheelTask {
    /// 创建新的控制循环任务
    /// Create new control loop task
    pub fn new(
        config: &WheelConfig,
        command_rx: mpsc::Receiver<WheelCommand>,
        stop_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            wheel: TimingWheel::new(config),
            command_rx,
            stop_rx,
        }
    }

    /// 运行控制循环直到收到停止信号或所有句柄被丢弃
    /// Run the control loop until stopped or until every handle is dropped
    pub async fn run(mut self) {
        let tick = self.wheel.tick_interval();
        // 第一次 tick 发生在一个间隔之后，而不是立即发生
        // The first tick happens one interval from now, not immediately
        let mut ticker = interval_at(Instant::now() + tick, tick);

        info!(
            slots = self.wheel.slot_count(),
            tick_ms = tick.as_millis() as u64,
            "Timing wheel started"
        );

        loop {
            tokio::select! {
                biased;

                _ = self.stop_rx.changed() => {
                    debug!("Timing wheel received stop signal");
                    break;
                }

                _ = ticker.tick() => {
                    self.on_tick();
                }

                command = self.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("All timing wheel handles dropped");
                        break;
                    }
                },
            }
        }

        let dropped = self.wheel.clear();
        info!(dropped, "Timing wheel stopped");
    }

    fn on_tick(&mut self) {
        let slot = self.wheel.current_slot();
        let due = self.wheel.tick();
        if !due.is_empty() {
            trace!(slot, count = due.len(), "Firing due tasks");
        }
        for task in due {
            fire(task);
        }
    }

    fn handle_command(&mut self, command: WheelCommand) {
        match command {
            WheelCommand::AddTask {
                key,
                fire_at,
                action,
                response_tx,
            } => {
                // 过去的时间点被钳制为立即执行
                // Instants in the past are clamped to "fire at the next tick"
                let delay = fire_at.saturating_duration_since(Instant::now());
                let replaced = self.wheel.add_task(key, delay, action);
                if response_tx.send(replaced).is_err() {
                    warn!("Failed to send add task response");
                }
            }

            WheelCommand::RemoveTask { key, response_tx } => {
                let removed = self.wheel.remove_task(&key).is_some();
                trace!(key = %key, removed, "Remove task handled");
                if response_tx.send(removed).is_err() {
                    warn!("Failed to send remove task response");
                }
            }

            WheelCommand::Contains { key, response_tx } => {
                if response_tx.send(self.wheel.contains(&key)).is_err() {
                    warn!("Failed to send contains response");
                }
            }

            WheelCommand::GetStats { response_tx } => {
                if response_tx.send(self.wheel.stats()).is_err() {
                    warn!("Failed to send stats response");
                }
            }
        }
    }
}

/// 在控制循环上取出任务的 future，再在独立任务中运行它；两个阶段的 panic 都被捕获并记录
/// Build the task's future on the control loop, then run it in its own tokio
/// task; a panic in either stage is caught and logged
fn fire(task: TimerTask) {
    let TimerTask { key, action, .. } = task;
    let future = match std::panic::catch_unwind(AssertUnwindSafe(action)) {
        Ok(future) => future,
        Err(payload) => {
            error!(
                key = %key,
                panic = %panic_message(payload.as_ref()),
                "Timer task panicked"
            );
            return;
        }
    };
    tokio::spawn(async move {
        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(()) => trace!(key = %key, "Timer task completed"),
            Err(payload) => error!(
                key = %key,
                panic = %panic_message(payload.as_ref()),
                "Timer task panicked"
            ),
        }
    });
}
