//! tests/common/harness.rs
use std::sync::{Arc, Mutex, Once};
use tokio::time::{Duration, Instant};
use tracing_subscriber::fmt::format::FmtSpan;

/// Initializes tracing for tests, ensuring it's only done once.
pub fn init_tracing() {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| {
        let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "wheelpool=debug".to_string());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .with_test_writer()
            .init();
    });
}

/// Records which named callbacks ran and how long after `start` they ran.
#[derive(Clone)]
pub struct FireLog {
    start: Instant,
    entries: Arc<Mutex<Vec<(String, Duration)>>>,
}

impl FireLog {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            entries: Arc::default(),
        }
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    /// Returns a wheel action that records `name` when it fires.
    pub fn action(&self, name: &str) -> impl FnOnce() -> std::future::Ready<()> + Send + 'static {
        let log = self.clone();
        let name = name.to_string();
        move || {
            log.record(name);
            std::future::ready(())
        }
    }

    pub fn record(&self, name: impl Into<String>) {
        let elapsed = self.start.elapsed();
        self.entries.lock().unwrap().push((name.into(), elapsed));
    }

    pub fn names(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(n, _)| n == name)
            .count()
    }

    pub fn elapsed_of(&self, name: &str) -> Option<Duration> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, elapsed)| *elapsed)
    }
}
