//! Build Worker Pool
//!
//! Fixed-size pool of single-use build workers.
//!
//! ```text
//! submit ──acquire──> [idle: W1 W2] ──run──> W1 (busy) ──done──> discarded
//!                                                          └──> replacement warming ──> idle
//! ```
//!
//! Invariants:
//! - `idle + busy + warming == size` while the pool is open
//! - no worker ever runs a second build
//! - waiting submitters are served in FIFO order (fair semaphore)

mod worker;

#[cfg(test)]
mod tests;

pub use worker::WorkerId;

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::future::join_all;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::{Notify, Semaphore};

use crate::builder::{BuildRequest, BuildResult, BuilderFactory, CancellationToken};
use crate::{debug, log};
use worker::Worker;

/// Pool-level failure. Builder failures are reported in [`BuildResult`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("build timed out after {}s", .0.as_secs_f32())]
    BuildTimeout(Duration),
    #[error("worker pool is shut down")]
    Closed,
    #[error("build worker exited without a result")]
    WorkerLost,
}

/// Pool sizing and timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub size: usize,
    pub build_timeout: Duration,
    pub warmup_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: 2,
            build_timeout: Duration::from_secs(60),
            warmup_timeout: Duration::from_secs(10),
        }
    }
}

/// Point-in-time worker counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStatus {
    pub idle: usize,
    pub busy: usize,
    pub warming: usize,
}

impl PoolStatus {
    pub fn total(&self) -> usize {
        self.idle + self.busy + self.warming
    }
}

/// Handle to the pool. Cheap to clone.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    factory: Arc<dyn BuilderFactory>,
    config: PoolConfig,
    runtime: Handle,
    /// Warm workers. `permits` always equals its length.
    idle: Mutex<VecDeque<Worker>>,
    permits: Semaphore,
    busy: AtomicUsize,
    warming: AtomicUsize,
    closed: AtomicBool,
    next_id: AtomicU64,
    in_flight: Mutex<FxHashMap<WorkerId, CancellationToken>>,
    drained: Notify,
}

impl WorkerPool {
    /// Spawn and warm `config.size` workers, then return the ready pool.
    ///
    /// Warm-up failures are logged; the affected workers are still used.
    pub async fn new(factory: Arc<dyn BuilderFactory>, config: PoolConfig) -> Self {
        let size = config.size.max(1);
        let inner = Arc::new(PoolInner {
            factory,
            config: PoolConfig { size, ..config },
            runtime: Handle::current(),
            idle: Mutex::new(VecDeque::with_capacity(size)),
            permits: Semaphore::new(0),
            busy: AtomicUsize::new(0),
            warming: AtomicUsize::new(size),
            closed: AtomicBool::new(false),
            next_id: AtomicU64::new(0),
            in_flight: Mutex::new(FxHashMap::default()),
            drained: Notify::new(),
        });

        join_all((0..size).map(|_| PoolInner::warm_and_park(Arc::clone(&inner)))).await;

        let status = inner.status();
        log!("pool"; "ready: {} workers ({} idle)", size, status.idle);
        Self { inner }
    }

    /// Run one build on a fresh worker.
    ///
    /// Waits (FIFO) for a free worker, then for the build, up to the build
    /// timeout. The worker is discarded afterwards and replaced in the
    /// background.
    pub async fn submit(&self, request: BuildRequest) -> Result<BuildResult, PoolError> {
        let inner = &self.inner;
        if inner.closed.load(Ordering::SeqCst) {
            return Err(PoolError::Closed);
        }

        let worker = inner.acquire().await?;
        let lease = Lease::new(inner, &worker);
        debug!("pool"; "worker {} building {}", lease.id, request.package_location);

        let reply = worker.run(request)?;
        let timeout = inner.config.build_timeout;
        match tokio::time::timeout(timeout, reply).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) => Err(PoolError::WorkerLost),
            Err(_) => {
                log!("pool"; "worker {} timed out after {:?}, abandoning", lease.id, timeout);
                lease.cancel();
                Err(PoolError::BuildTimeout(timeout))
            }
        }
    }

    pub fn status(&self) -> PoolStatus {
        self.inner.status()
    }

    pub fn size(&self) -> usize {
        self.inner.config.size
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Stop accepting work, drain in-flight builds for up to `grace`, then
    /// cancel whatever is still running and release idle workers.
    pub async fn shutdown(&self, grace: Duration) {
        let inner = &self.inner;
        if inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        inner.permits.close();

        let drained = tokio::time::timeout(grace, inner.wait_drained()).await.is_ok();
        if !drained {
            let running: Vec<CancellationToken> = inner.in_flight.lock().values().cloned().collect();
            log!("pool"; "grace period elapsed, cancelling {} build(s)", running.len());
            for token in running {
                token.cancel();
            }
        }

        let released = {
            let mut idle = inner.idle.lock();
            let n = idle.len();
            idle.clear();
            n
        };
        debug!("pool"; "shut down, released {} idle worker(s)", released);
    }
}

impl PoolInner {
    fn status(&self) -> PoolStatus {
        PoolStatus {
            idle: self.idle.lock().len(),
            busy: self.busy.load(Ordering::SeqCst),
            warming: self.warming.load(Ordering::SeqCst),
        }
    }

    async fn acquire(&self) -> Result<Worker, PoolError> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| PoolError::Closed)?;
        permit.forget();
        self.idle.lock().pop_front().ok_or(PoolError::WorkerLost)
    }

    async fn wait_drained(&self) {
        loop {
            let notified = self.drained.notified();
            if self.busy.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Spawn one worker, wait for its warm-up and park it as idle.
    ///
    /// The caller has already counted it in `warming`.
    async fn warm_and_park(self: Arc<Self>) {
        let id = WorkerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let spawned = Worker::spawn(id, Arc::clone(&self.factory));

        let worker = match spawned {
            Ok((worker, ready)) => {
                match tokio::time::timeout(self.config.warmup_timeout, ready).await {
                    Ok(Ok(Ok(()))) => {
                        debug!("pool"; "worker {} warm", id);
                        Some(worker)
                    }
                    Ok(Ok(Err(e))) => {
                        log!("pool"; "worker {} warm-up failed: {}", id, e);
                        Some(worker)
                    }
                    Ok(Err(_)) => {
                        log!("error"; "worker {} exited during warm-up", id);
                        None
                    }
                    Err(_) => {
                        log!("pool"; "worker {} warm-up exceeded {:?}, using it anyway", id, self.config.warmup_timeout);
                        Some(worker)
                    }
                }
            }
            Err(e) => {
                log!("error"; "failed to spawn worker {}: {}", id, e);
                None
            }
        };

        if let Some(worker) = worker
            && !self.closed.load(Ordering::SeqCst)
        {
            self.idle.lock().push_back(worker);
            self.permits.add_permits(1);
        }
        self.warming.fetch_sub(1, Ordering::SeqCst);
    }

    /// Discard a finished worker and start warming its replacement.
    fn retire(self: &Arc<Self>, id: WorkerId) {
        self.in_flight.lock().remove(&id);

        let replace = !self.closed.load(Ordering::SeqCst);
        if replace {
            self.warming.fetch_add(1, Ordering::SeqCst);
        }
        if self.busy.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.drained.notify_waiters();
        }

        if replace {
            self.runtime.spawn(Arc::clone(self).warm_and_park());
        }
    }
}

/// Marks a worker busy for the duration of one build.
///
/// Dropping the lease (normal completion, timeout, or the submitting future
/// being dropped) cancels the build and retires the worker.
struct Lease<'a> {
    pool: &'a Arc<PoolInner>,
    id: WorkerId,
    cancel: CancellationToken,
}

impl<'a> Lease<'a> {
    fn new(pool: &'a Arc<PoolInner>, worker: &Worker) -> Self {
        let id = worker.id();
        let cancel = worker.cancel_token();
        pool.busy.fetch_add(1, Ordering::SeqCst);
        pool.in_flight.lock().insert(id, cancel.clone());
        Self { pool, id, cancel }
    }

    fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.pool.retire(self.id);
    }
}
