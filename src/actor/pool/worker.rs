//! Single-use build worker.
//!
//! A worker is one dedicated OS thread that creates its own builder, warms
//! it up, runs exactly one build and exits. Dropping an unused worker closes
//! its job channel and the thread exits without building.

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread;

use crossbeam::channel::{self, Receiver, Sender};
use tokio::sync::oneshot;

use super::PoolError;
use crate::builder::{BuildRequest, BuildResult, BuilderFactory, CancellationToken, SiteBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub u64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outcome of the builder's readiness probe.
pub type WarmUp = Result<(), String>;

struct Job {
    request: BuildRequest,
    reply: oneshot::Sender<BuildResult>,
}

/// Handle to a warm (or warming) worker thread.
pub struct Worker {
    id: WorkerId,
    jobs: Sender<Job>,
    cancel: CancellationToken,
}

impl Worker {
    /// Spawn the worker thread. The receiver resolves once warm-up finishes.
    pub fn spawn(
        id: WorkerId,
        factory: Arc<dyn BuilderFactory>,
    ) -> std::io::Result<(Self, oneshot::Receiver<WarmUp>)> {
        let (jobs_tx, jobs_rx) = channel::bounded(1);
        let (ready_tx, ready_rx) = oneshot::channel();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        thread::Builder::new()
            .name(format!("build-worker-{}", id.0))
            .spawn(move || run(factory, jobs_rx, ready_tx, token))?;

        Ok((
            Self {
                id,
                jobs: jobs_tx,
                cancel,
            },
            ready_rx,
        ))
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Hand the worker its only job. Consumes the worker.
    pub fn run(self, request: BuildRequest) -> Result<oneshot::Receiver<BuildResult>, PoolError> {
        let (reply, result) = oneshot::channel();
        self.jobs
            .try_send(Job { request, reply })
            .map_err(|_| PoolError::WorkerLost)?;
        Ok(result)
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker").field("id", &self.id).finish()
    }
}

/// Worker thread body.
fn run(
    factory: Arc<dyn BuilderFactory>,
    jobs: Receiver<Job>,
    ready: oneshot::Sender<WarmUp>,
    cancel: CancellationToken,
) {
    let mut builder: Option<Box<dyn SiteBuilder>> = None;

    let warm = catch_unwind(AssertUnwindSafe(|| {
        let mut created = factory.create();
        let probe = created.warm_up().map_err(|e| format!("{e:#}"));
        builder = Some(created);
        probe
    }))
    .unwrap_or_else(|payload| Err(format!("warm-up panicked: {}", panic_message(&*payload))));
    let _ = ready.send(warm);

    // Sender dropped: the pool discarded this worker unused.
    let Ok(job) = jobs.recv() else {
        return;
    };

    let result = match builder.as_mut() {
        Some(builder) => catch_unwind(AssertUnwindSafe(|| builder.build(&job.request, &cancel)))
            .unwrap_or_else(|payload| {
                BuildResult::failure(format!("builder panicked: {}", panic_message(&*payload)))
            }),
        None => BuildResult::failure("builder could not be created"),
    };
    let _ = job.reply.send(result);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
