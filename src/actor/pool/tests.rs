//! Worker pool tests.
//!
//! Builders here are in-process test doubles; the process builder is
//! covered in `builder::command`.

use std::cell::Cell;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::*;
use crate::builder::{BuildRequest, BuildResult, CancellationToken, SiteBuilder};

thread_local! {
    /// Set by a build; a fresh worker must never observe it.
    static PROBE: Cell<bool> = const { Cell::new(false) };
}

fn config(size: usize) -> PoolConfig {
    PoolConfig {
        size,
        build_timeout: Duration::from_secs(5),
        warmup_timeout: Duration::from_secs(2),
    }
}

fn request(name: &str) -> BuildRequest {
    BuildRequest::new(name, "/tmp/storyreload-test")
}

fn factory<B, F>(make: F) -> Arc<dyn BuilderFactory>
where
    B: SiteBuilder + 'static,
    F: Fn() -> B + Send + Sync + 'static,
{
    Arc::new(move || Box::new(make()) as Box<dyn SiteBuilder>)
}

async fn wait_for_size(pool: &WorkerPool, idle: usize) -> PoolStatus {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let status = pool.status();
        if status.idle == idle || Instant::now() > deadline {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// =============================================================================
// Test builders
// =============================================================================

/// Fails if it sees state from a previous build, in its thread or itself.
#[derive(Default)]
struct FreshStateBuilder {
    builds: usize,
}

impl SiteBuilder for FreshStateBuilder {
    fn build(&mut self, _: &BuildRequest, _: &CancellationToken) -> BuildResult {
        let leaked_thread_state = PROBE.with(|p| p.replace(true));
        self.builds += 1;
        if leaked_thread_state {
            BuildResult::failure("thread-local state leaked from a previous build")
        } else if self.builds > 1 {
            BuildResult::failure("builder instance reused")
        } else {
            BuildResult::success()
        }
    }
}

struct ThreadRecorder(Arc<Mutex<Vec<ThreadId>>>);

impl SiteBuilder for ThreadRecorder {
    fn build(&mut self, _: &BuildRequest, _: &CancellationToken) -> BuildResult {
        self.0.lock().push(thread::current().id());
        BuildResult::success()
    }
}

struct Failing;

impl SiteBuilder for Failing {
    fn build(&mut self, request: &BuildRequest, _: &CancellationToken) -> BuildResult {
        BuildResult::failure(format!("no module named '{}'", request.package_location))
    }
}

struct Panicking;

impl SiteBuilder for Panicking {
    fn build(&mut self, _: &BuildRequest, _: &CancellationToken) -> BuildResult {
        panic!("catalog exploded");
    }
}

/// Runs until cancelled; records that it saw the cancellation.
struct Hanging(Arc<AtomicBool>);

impl SiteBuilder for Hanging {
    fn build(&mut self, _: &BuildRequest, cancel: &CancellationToken) -> BuildResult {
        while !cancel.is_cancelled() {
            thread::sleep(Duration::from_millis(5));
        }
        self.0.store(true, Ordering::SeqCst);
        BuildResult::failure("cancelled")
    }
}

struct Slow {
    delay: Duration,
    log: Arc<Mutex<Vec<String>>>,
}

impl SiteBuilder for Slow {
    fn build(&mut self, request: &BuildRequest, _: &CancellationToken) -> BuildResult {
        thread::sleep(self.delay);
        self.log.lock().push(request.package_location.clone());
        BuildResult::success()
    }
}

struct BadWarmUp(Arc<AtomicUsize>);

impl SiteBuilder for BadWarmUp {
    fn warm_up(&mut self) -> anyhow::Result<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("interpreter failed to import catalog")
    }

    fn build(&mut self, _: &BuildRequest, _: &CancellationToken) -> BuildResult {
        BuildResult::success()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_pool_starts_with_n_warm_workers() {
    let pool = WorkerPool::new(factory(FreshStateBuilder::default), config(3)).await;
    assert_eq!(
        pool.status(),
        PoolStatus {
            idle: 3,
            busy: 0,
            warming: 0
        }
    );
    assert_eq!(pool.size(), 3);
}

#[tokio::test]
async fn test_fresh_state_across_builds() {
    let pool = WorkerPool::new(factory(FreshStateBuilder::default), config(1)).await;
    for i in 0..5 {
        let result = pool.submit(request("catalog")).await.unwrap();
        assert!(result.ok, "build {i}: {:?}", result.error);
    }
}

#[tokio::test]
async fn test_no_thread_handles_two_builds() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let pool = WorkerPool::new(factory(move || ThreadRecorder(Arc::clone(&recorder))), config(2)).await;

    for _ in 0..6 {
        assert!(pool.submit(request("catalog")).await.unwrap().ok);
    }

    let ids = seen.lock().clone();
    assert_eq!(ids.len(), 6);
    let unique: HashSet<ThreadId> = ids.into_iter().collect();
    assert_eq!(unique.len(), 6, "a worker thread was reused");
}

#[tokio::test]
async fn test_pool_recovers_to_n_after_build() {
    let pool = WorkerPool::new(factory(FreshStateBuilder::default), config(2)).await;
    pool.submit(request("a")).await.unwrap();
    pool.submit(request("b")).await.unwrap();

    let status = wait_for_size(&pool, 2).await;
    assert_eq!(status.idle, 2);
    assert_eq!(status.busy, 0);
    assert_eq!(status.total(), 2);
}

#[tokio::test]
async fn test_builder_failure_is_a_result() {
    let pool = WorkerPool::new(factory(|| Failing), config(1)).await;
    let result = pool.submit(request("missing.pkg")).await.unwrap();
    assert!(!result.ok);
    assert_eq!(result.error.as_deref(), Some("no module named 'missing.pkg'"));
    assert_eq!(wait_for_size(&pool, 1).await.idle, 1);
}

#[tokio::test]
async fn test_builder_panic_does_not_crash_pool() {
    let pool = WorkerPool::new(factory(|| Panicking), config(1)).await;
    let result = pool.submit(request("catalog")).await.unwrap();
    assert!(!result.ok);
    assert!(result.error.unwrap().contains("catalog exploded"));

    // still serving
    let again = pool.submit(request("catalog")).await.unwrap();
    assert!(!again.ok);
    assert_eq!(wait_for_size(&pool, 1).await.idle, 1);
}

#[tokio::test]
async fn test_timeout_cancels_and_pool_keeps_running() {
    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancelled);
    let pool = WorkerPool::new(
        factory(move || Hanging(Arc::clone(&flag))),
        PoolConfig {
            build_timeout: Duration::from_millis(100),
            ..config(1)
        },
    )
    .await;

    let err = pool.submit(request("catalog")).await.unwrap_err();
    assert_eq!(err, PoolError::BuildTimeout(Duration::from_millis(100)));

    let deadline = Instant::now() + Duration::from_secs(2);
    while !cancelled.load(Ordering::SeqCst) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(cancelled.load(Ordering::SeqCst), "builder never saw cancellation");
    assert_eq!(wait_for_size(&pool, 1).await.idle, 1);
}

#[tokio::test]
async fn test_warm_up_failure_still_usable() {
    let warmups = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&warmups);
    let pool = WorkerPool::new(factory(move || BadWarmUp(Arc::clone(&counter))), config(2)).await;

    assert_eq!(warmups.load(Ordering::SeqCst), 2);
    assert_eq!(pool.status().idle, 2);
    assert!(pool.submit(request("catalog")).await.unwrap().ok);
}

#[tokio::test]
async fn test_waiters_served_in_fifo_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let pool = WorkerPool::new(
        factory(move || Slow {
            delay: Duration::from_millis(80),
            log: Arc::clone(&sink),
        }),
        config(1),
    )
    .await;

    let mut handles = Vec::new();
    for name in ["first", "second", "third"] {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move { pool.submit(request(name)).await }));
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    for handle in handles {
        assert!(handle.await.unwrap().unwrap().ok);
    }

    assert_eq!(*log.lock(), vec!["first", "second", "third"]);
}

#[tokio::test]
async fn test_status_reports_busy_worker() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let pool = WorkerPool::new(
        factory(move || Slow {
            delay: Duration::from_millis(200),
            log: Arc::clone(&sink),
        }),
        config(2),
    )
    .await;

    let runner = pool.clone();
    let build = tokio::spawn(async move { runner.submit(request("catalog")).await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let status = pool.status();
    assert_eq!(status.busy, 1);
    assert_eq!(status.idle, 1);

    assert!(build.await.unwrap().unwrap().ok);
}

#[tokio::test]
async fn test_shutdown_drains_in_flight() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let pool = WorkerPool::new(
        factory(move || Slow {
            delay: Duration::from_millis(150),
            log: Arc::clone(&sink),
        }),
        config(1),
    )
    .await;

    let runner = pool.clone();
    let build = tokio::spawn(async move { runner.submit(request("catalog")).await });
    tokio::time::sleep(Duration::from_millis(30)).await;

    pool.shutdown(Duration::from_secs(5)).await;
    assert!(build.await.unwrap().unwrap().ok);
    assert_eq!(*log.lock(), vec!["catalog"]);

    assert_eq!(pool.submit(request("late")).await, Err(PoolError::Closed));
    assert!(pool.is_closed());
    assert_eq!(pool.status().idle, 0);
}

#[tokio::test]
async fn test_shutdown_force_stops_after_grace() {
    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancelled);
    let pool = WorkerPool::new(factory(move || Hanging(Arc::clone(&flag))), config(1)).await;

    let runner = pool.clone();
    let build = tokio::spawn(async move { runner.submit(request("catalog")).await });
    tokio::time::sleep(Duration::from_millis(30)).await;

    let start = Instant::now();
    pool.shutdown(Duration::from_millis(100)).await;
    assert!(start.elapsed() < Duration::from_secs(2));

    let result = build.await.unwrap().unwrap();
    assert!(!result.ok);
    assert!(cancelled.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_waiting_submit_fails_on_shutdown() {
    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancelled);
    let pool = WorkerPool::new(factory(move || Hanging(Arc::clone(&flag))), config(1)).await;

    let busy = pool.clone();
    let _running = tokio::spawn(async move { busy.submit(request("a")).await });
    tokio::time::sleep(Duration::from_millis(30)).await;

    let waiter = pool.clone();
    let waiting = tokio::spawn(async move { waiter.submit(request("b")).await });
    tokio::time::sleep(Duration::from_millis(30)).await;

    pool.shutdown(Duration::from_millis(50)).await;
    assert_eq!(waiting.await.unwrap(), Err(PoolError::Closed));
}
