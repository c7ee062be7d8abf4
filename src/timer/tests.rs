//! 时间轮控制循环测试
//! Timing wheel control loop tests

use crate::config::WheelConfig;
use crate::error::Error;
use crate::timer::{TimingWheelHandle, start_timing_wheel};
use std::sync::{Arc, Mutex};
use tokio::time::{Duration, Instant, sleep, timeout};

const TICK: Duration = Duration::from_millis(100);

type FireLog = Arc<Mutex<Vec<(&'static str, Duration)>>>;

fn new_wheel() -> TimingWheelHandle {
    start_timing_wheel(WheelConfig::new(10, TICK))
}

/// 返回一个在触发时记录名称和相对耗时的回调
/// Returns a callback that records its name and elapsed time when fired
fn recorder(
    log: &FireLog,
    name: &'static str,
    start: Instant,
) -> impl FnOnce() -> std::future::Ready<()> + Send + 'static {
    let log = log.clone();
    move || {
        log.lock().unwrap().push((name, start.elapsed()));
        std::future::ready(())
    }
}

async fn explode() {
    panic!("timer task failure")
}

fn explode_on_call() -> std::future::Ready<()> {
    panic!("timer action failure")
}

fn fired_names(log: &FireLog) -> Vec<&'static str> {
    log.lock().unwrap().iter().map(|(name, _)| *name).collect()
}

fn fired_after(log: &FireLog, name: &str) -> Option<Duration> {
    log.lock()
        .unwrap()
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, elapsed)| *elapsed)
}

#[tokio::test(start_paused = true)]
async fn test_replacement_only_latest_fires() {
    let wheel = new_wheel();
    let log = FireLog::default();
    let start = Instant::now();

    let replaced = wheel
        .add_task("k", recorder(&log, "first", start), start + Duration::from_secs(3))
        .await
        .unwrap();
    assert!(!replaced);

    let replaced = wheel
        .add_task("k", recorder(&log, "second", start), start + Duration::from_secs(1))
        .await
        .unwrap();
    assert!(replaced);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(fired_names(&log), vec!["second"]);

    wheel.stop();
}

#[tokio::test(start_paused = true)]
async fn test_remove_task() {
    let wheel = new_wheel();
    let log = FireLog::default();
    let start = Instant::now();

    wheel
        .add_task("gone", recorder(&log, "gone", start), start + Duration::from_millis(300))
        .await
        .unwrap();
    assert!(wheel.contains("gone").await.unwrap());
    assert!(wheel.remove_task("gone").await.unwrap());
    assert!(!wheel.contains("gone").await.unwrap());

    // 移除未知键不会报错
    assert!(!wheel.remove_task("absent").await.unwrap());

    sleep(Duration::from_secs(2)).await;
    assert!(fired_names(&log).is_empty());

    wheel.stop();
}

#[tokio::test(start_paused = true)]
async fn test_immediate_fire_within_one_tick() {
    let wheel = new_wheel();
    let log = FireLog::default();
    let start = Instant::now();

    wheel
        .add_task("now", recorder(&log, "now", start), start)
        .await
        .unwrap();

    sleep(TICK * 2).await;
    let elapsed = fired_after(&log, "now").expect("task should have fired");
    assert!(elapsed <= TICK, "fired after {:?}", elapsed);

    wheel.stop();
}

#[tokio::test(start_paused = true)]
async fn test_past_instant_is_clamped_to_immediate() {
    let wheel = new_wheel();
    let log = FireLog::default();
    let start = Instant::now();
    let past = start.checked_sub(Duration::from_secs(5)).unwrap();

    wheel
        .add_task("past", recorder(&log, "past", start), past)
        .await
        .unwrap();

    sleep(TICK * 2).await;
    let elapsed = fired_after(&log, "past").expect("task should have fired");
    assert!(elapsed <= TICK, "fired after {:?}", elapsed);

    wheel.stop();
}

#[tokio::test(start_paused = true)]
async fn test_cycle_spans_multiple_revolutions() {
    let wheel = new_wheel();
    let log = FireLog::default();
    let start = Instant::now();

    wheel
        .add_task("five", recorder(&log, "five", start), start + Duration::from_secs(5))
        .await
        .unwrap();

    // 一圈只有 1 秒，任务不能在第一圈触发
    sleep(Duration::from_millis(1_500)).await;
    assert!(fired_names(&log).is_empty());

    sleep(Duration::from_secs(4)).await;
    let elapsed = fired_after(&log, "five").expect("task should have fired");
    assert!(elapsed >= Duration::from_secs(5), "fired early after {:?}", elapsed);
    assert!(elapsed <= Duration::from_secs(5) + TICK * 2, "fired late after {:?}", elapsed);

    wheel.stop();
}

#[tokio::test(start_paused = true)]
async fn test_panicking_task_does_not_stop_others() {
    let wheel = new_wheel();
    let log = FireLog::default();
    let start = Instant::now();
    let at = start + Duration::from_millis(200);

    wheel
        .add_task("boom", explode, at)
        .await
        .unwrap();
    wheel
        .add_task("sibling", recorder(&log, "sibling", start), at)
        .await
        .unwrap();
    wheel
        .add_task("later", recorder(&log, "later", start), start + Duration::from_millis(700))
        .await
        .unwrap();

    sleep(Duration::from_secs(1)).await;
    let mut names = fired_names(&log);
    names.sort();
    assert_eq!(names, vec!["later", "sibling"]);

    // 控制循环仍然存活
    assert!(wheel.stats().await.is_ok());
    wheel.stop();
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent() {
    let wheel = new_wheel();
    let log = FireLog::default();
    let start = Instant::now();

    wheel
        .add_task("never", recorder(&log, "never", start), start + Duration::from_millis(300))
        .await
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let wheel = wheel.clone();
            tokio::spawn(async move { wheel.stop() })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }
    wheel.stop();
    assert!(wheel.is_stopped());

    sleep(Duration::from_secs(1)).await;
    assert!(fired_names(&log).is_empty());

    let result = wheel.add_task("late", || async {}, Instant::now()).await;
    assert_eq!(result, Err(Error::WheelStopped));
    assert_eq!(wheel.remove_task("late").await, Err(Error::WheelStopped));
}

#[tokio::test(start_paused = true)]
async fn test_stats_track_scheduled_and_fired() {
    let wheel = new_wheel();
    let start = Instant::now();

    wheel.add_task("a", || async {}, start).await.unwrap();
    wheel
        .add_task("b", || async {}, start + Duration::from_secs(3))
        .await
        .unwrap();
    wheel
        .add_task("b", || async {}, start + Duration::from_secs(2))
        .await
        .unwrap();

    let stats = wheel.stats().await.unwrap();
    assert_eq!(stats.total_slots, 10);
    assert_eq!(stats.scheduled_tasks, 2);
    assert_eq!(stats.cancelled_tasks, 1);

    sleep(Duration::from_millis(250)).await;
    let stats = wheel.stats().await.unwrap();
    assert_eq!(stats.scheduled_tasks, 1);
    assert_eq!(stats.fired_tasks, 1);
    assert_eq!(stats.current_slot, 2);

    wheel.stop();
}

#[tokio::test]
async fn test_dropping_all_handles_ends_loop() {
    let wheel = new_wheel();
    let clone = wheel.clone();
    drop(wheel);
    // 仍有一个句柄存活，控制循环继续工作
    assert!(clone.stats().await.is_ok());
    drop(clone);
}

#[tokio::test(start_paused = true)]
async fn test_action_panicking_on_call_is_contained() {
    let wheel = new_wheel();
    let log = FireLog::default();
    let start = Instant::now();
    let at = start + Duration::from_millis(200);

    wheel.add_task("boom", explode_on_call, at).await.unwrap();
    wheel
        .add_task("sibling", recorder(&log, "sibling", start), at)
        .await
        .unwrap();

    sleep(Duration::from_millis(500)).await;
    assert_eq!(fired_names(&log), vec!["sibling"]);

    let stats = wheel.stats().await.unwrap();
    assert_eq!(stats.fired_tasks, 2);
    wheel.stop();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_loop_exit() {
    let wheel = new_wheel();
    let log = FireLog::default();
    let start = Instant::now();

    wheel
        .add_task("due", recorder(&log, "due", start), start + Duration::from_millis(200))
        .await
        .unwrap();
    wheel
        .add_task("pending", recorder(&log, "pending", start), start + Duration::from_secs(5))
        .await
        .unwrap();

    sleep(Duration::from_millis(300)).await;
    timeout(Duration::from_secs(1), wheel.shutdown())
        .await
        .expect("shutdown should return once the loop exits");
    assert!(wheel.is_stopped());
    assert_eq!(fired_names(&log), vec!["due"]);

    let result = wheel.add_task("late", || async {}, Instant::now()).await;
    assert_eq!(result, Err(Error::WheelStopped));

    // 第二次调用立即返回
    timeout(Duration::from_millis(10), wheel.shutdown())
        .await
        .expect("a second shutdown should return at once");

    sleep(Duration::from_secs(10)).await;
    assert_eq!(fired_names(&log), vec!["due"]);
}
