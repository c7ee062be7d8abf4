//! 时间轮端到端场景测试
//! Timing wheel end-to-end scenario tests

pub mod common;

use common::harness::{FireLog, init_tracing};
use tokio::time::{Duration, Instant, sleep};
use wheelpool::config::WheelConfig;
use wheelpool::{Error, start_timing_wheel};

const TICK: Duration = Duration::from_millis(100);

async fn explode() {
    panic!("scheduled task failure")
}

#[tokio::test(start_paused = true)]
async fn test_mixed_schedule_over_six_seconds() {
    init_tracing();
    let wheel = start_timing_wheel(WheelConfig::new(10, TICK));
    let log = FireLog::new();
    let start = log.start();

    wheel.add_task("now", log.action("now"), start).await.unwrap();
    wheel
        .add_task("one", log.action("one"), start + Duration::from_secs(1))
        .await
        .unwrap();
    wheel
        .add_task("a", log.action("a-stale"), start + Duration::from_secs(3))
        .await
        .unwrap();
    let replaced = wheel
        .add_task("a", log.action("a"), start + Duration::from_secs(3))
        .await
        .unwrap();
    assert!(replaced);
    wheel
        .add_task("b", log.action("b"), start + Duration::from_secs(3))
        .await
        .unwrap();
    wheel
        .add_task("boom", explode, start + Duration::from_secs(2))
        .await
        .unwrap();

    let stats = wheel.stats().await.unwrap();
    assert_eq!(stats.scheduled_tasks, 5);
    assert_eq!(stats.total_slots, 10);

    sleep(Duration::from_secs(6)).await;

    assert_eq!(log.count("a-stale"), 0);
    for (name, delay) in [
        ("now", Duration::ZERO),
        ("one", Duration::from_secs(1)),
        ("a", Duration::from_secs(3)),
        ("b", Duration::from_secs(3)),
    ] {
        assert_eq!(log.count(name), 1, "{name} should fire exactly once");
        let elapsed = log.elapsed_of(name).unwrap();
        assert!(elapsed >= delay, "{name} fired early: {elapsed:?}");
        assert!(elapsed <= delay + 2 * TICK, "{name} fired late: {elapsed:?}");
    }

    let stats = wheel.stats().await.unwrap();
    assert_eq!(stats.scheduled_tasks, 0);
    assert_eq!(stats.fired_tasks, 5);
    // 替换计为一次取消
    assert_eq!(stats.cancelled_tasks, 1);

    wheel.stop();
    let after_stop = wheel.add_task("late", log.action("late"), Instant::now()).await;
    assert_eq!(after_stop, Err(Error::WheelStopped));
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_keys_never_fire() {
    init_tracing();
    let wheel = start_timing_wheel(WheelConfig::new(10, TICK));
    let log = FireLog::new();
    let start = log.start();

    for i in 0..20u64 {
        let name = format!("task-{i}");
        wheel
            .add_task(name.clone(), log.action(&name), start + Duration::from_millis(150 * i))
            .await
            .unwrap();
    }
    for i in (0..20u64).filter(|i| i % 2 == 1) {
        assert!(wheel.remove_task(format!("task-{i}")).await.unwrap());
    }
    assert!(!wheel.remove_task("missing").await.unwrap());

    sleep(Duration::from_secs(5)).await;

    let mut fired = log.names();
    fired.sort();
    let mut expected: Vec<String> = (0..20).step_by(2).map(|i| format!("task-{i}")).collect();
    expected.sort();
    assert_eq!(fired, expected);

    let stats = wheel.stats().await.unwrap();
    assert_eq!(stats.cancelled_tasks, 10);
    wheel.stop();
}

#[tokio::test]
async fn test_real_clock_fires_after_delay() {
    init_tracing();
    let wheel = start_timing_wheel(WheelConfig::new(16, Duration::from_millis(10)));
    let log = FireLog::new();

    wheel
        .add_task("real", log.action("real"), log.start() + Duration::from_millis(50))
        .await
        .unwrap();
    sleep(Duration::from_millis(300)).await;

    let elapsed = log.elapsed_of("real").unwrap();
    assert!(elapsed >= Duration::from_millis(50), "fired early: {elapsed:?}");
    wheel.stop();
}
