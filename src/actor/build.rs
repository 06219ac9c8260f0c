//! Build Actor - the watch orchestrator
//!
//! For each debounced trigger:
//!
//! ```text
//! ChangeSet → classify each path → coalesce → pool.submit → route (on success)
//! ```
//!
//! Triggers are handled one at a time in arrival order. A trigger that
//! arrives mid-build waits in the channel; the FsActor keeps collecting
//! changes for the next window meanwhile.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use super::fs::{ChangeSet, WatchFilter};
use super::messages::BuildMsg;
use super::pool::WorkerPool;
use super::ws::{BroadcastRouter, RouteReport, coalesce};
use crate::builder::{BuildRequest, BuildResult};
use crate::logger;
use crate::reload::classify::{Classification, classify};

/// What one trigger produced.
#[derive(Debug, Default)]
pub struct BuildOutcome {
    pub plan: Vec<Classification>,
    pub result: Option<BuildResult>,
    pub reports: Vec<RouteReport>,
}

pub struct BuildActor {
    rx: mpsc::Receiver<BuildMsg>,
    pool: WorkerPool,
    router: Arc<BroadcastRouter>,
    request: BuildRequest,
    filter: WatchFilter,
}

impl BuildActor {
    pub fn new(
        rx: mpsc::Receiver<BuildMsg>,
        pool: WorkerPool,
        router: Arc<BroadcastRouter>,
        request: BuildRequest,
        filter: WatchFilter,
    ) -> Self {
        Self {
            rx,
            pool,
            router,
            request,
            filter,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.rx.recv().await {
            match msg {
                BuildMsg::Rebuild(changes) => {
                    self.handle(changes).await;
                }
                BuildMsg::Shutdown => {
                    crate::debug!("build"; "shutting down");
                    break;
                }
            }
        }
    }

    /// Build once before watching starts. Failure is reported, not fatal.
    pub async fn initial_build(&self) -> Option<BuildResult> {
        crate::log!("build"; "initial build of {}", self.request.package_location);
        self.build("initial build").await
    }

    /// Classify, rebuild, and broadcast one trigger.
    pub async fn handle(&self, changes: ChangeSet) -> BuildOutcome {
        let plan = coalesce(changes.paths().map(|p| {
            let classification = classify(self.filter.relative(p));
            crate::debug!("build"; "{} -> {}", p.display(), classification);
            classification
        }));
        let summary = summarize(&changes);

        let Some(result) = self.build(&summary).await else {
            return BuildOutcome {
                plan,
                ..BuildOutcome::default()
            };
        };

        let mut reports = Vec::with_capacity(plan.len());
        if result.ok {
            for classification in &plan {
                reports.push(self.router.route(classification, &result).await);
            }
        }

        BuildOutcome {
            plan,
            result: Some(result),
            reports,
        }
    }

    /// Submit a build and report the outcome on the status line.
    ///
    /// `None` when the pool itself failed (timeout, closed).
    async fn build(&self, what: &str) -> Option<BuildResult> {
        let started = Instant::now();
        match self.pool.submit(self.request.clone()).await {
            Ok(result) if result.ok => {
                let elapsed = started.elapsed().as_millis();
                logger::status_success(&format!("rebuilt in {elapsed}ms: {what}"));
                Some(result)
            }
            Ok(result) => {
                let detail = result.error.clone().unwrap_or_default();
                logger::status_error(&format!("build failed: {what}"), &detail);
                Some(result)
            }
            Err(e) => {
                logger::status_error(&format!("build failed: {what}"), &e.to_string());
                None
            }
        }
    }
}

/// Short human description of a trigger.
fn summarize(changes: &ChangeSet) -> String {
    let mut paths = changes.paths();
    let Some(first) = paths.next() else {
        return "no changes".to_string();
    };
    let name = first
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| first.display().to_string());
    match changes.len() {
        1 => name,
        n => format!("{name} and {} more", n - 1),
    }
}
