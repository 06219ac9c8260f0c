//! Actor Coordinator - Wires up the Live Reload Actor System
//!
//! The Coordinator is a thin orchestrator that:
//! - Creates communication channels
//! - Wires up actors, the worker pool and the broadcast router
//! - Runs them concurrently until shutdown
//!
//! ```text
//! FsActor --Rebuild--> BuildActor --submit--> WorkerPool
//!                          |
//!                          +--route--> BroadcastRouter --> clients
//! ws server --AddClient--> WsActor --page_info--> ConnectionRegistry
//! ```
//!
//! Shutdown order: stop watching, drain the pool (bounded by the grace
//! period), stop the BuildActor, close every connection.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam::channel::Receiver;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::build::BuildActor;
use super::fs::FsActor;
use super::messages::{BuildMsg, WsMsg};
use super::pool::WorkerPool;
use super::ws::{BroadcastRouter, ConnectionRegistry, WsActor};
use crate::builder::BuilderFactory;
use crate::config::ReloadConfig;
use crate::reload::content::FsContentReader;

const CHANNEL_BUFFER: usize = 32;

/// How long stopped actors get to wind down.
const STOP_TIMEOUT: Duration = Duration::from_millis(500);

/// Coordinator - wires up and runs the actor system.
pub struct Coordinator {
    config: Arc<ReloadConfig>,
    factory: Arc<dyn BuilderFactory>,
    shutdown_rx: Option<Receiver<()>>,
}

impl Coordinator {
    pub fn new(config: Arc<ReloadConfig>, factory: Arc<dyn BuilderFactory>) -> Self {
        Self {
            config,
            factory,
            shutdown_rx: None,
        }
    }

    /// Set shutdown signal receiver.
    pub fn with_shutdown_signal(mut self, rx: Receiver<()>) -> Self {
        self.shutdown_rx = Some(rx);
        self
    }

    /// Run the actor system.
    pub async fn run(mut self) -> Result<()> {
        let config = Arc::clone(&self.config);
        let request = config
            .build_request()
            .context("no package to build; pass one to `serve` or set [build] package")?;

        let (build_tx, build_rx) = mpsc::channel::<BuildMsg>(CHANNEL_BUFFER);
        let (ws_tx, ws_rx) = mpsc::channel::<WsMsg>(CHANNEL_BUFFER);

        let registry = Arc::new(ConnectionRegistry::new());
        let port = crate::reload::server::start_ws_server(
            config.serve.interface,
            config.serve.ws_port,
            ws_tx.clone(),
        )
        .await
        .context("live reload unavailable")?;
        crate::cli::serve::set_actual_ws_port(port);
        crate::log!("ws"; "ws://{}:{}", config.serve.interface, port);

        // Watcher first: edits made during the initial build still trigger.
        let filter = config.watch_filter();
        let fs_actor = FsActor::new(filter.clone(), config.debouncer(), build_tx.clone())
            .map_err(|e| anyhow::anyhow!("watcher failed: {}", e))?;
        for root in fs_actor.roots() {
            crate::debug!("watch"; "{}", root.display());
        }

        let pool = WorkerPool::new(Arc::clone(&self.factory), config.pool_config()).await;
        let router = Arc::new(BroadcastRouter::new(
            Arc::clone(&registry),
            Arc::new(FsContentReader::new(&config.build.output)),
            config.send_timeout(),
        ));
        let build_actor = BuildActor::new(build_rx, pool.clone(), router, request, filter);
        let ws_actor = WsActor::new(ws_rx, registry, config.send_timeout());

        build_actor.initial_build().await;

        crate::debug!("actor"; "start");
        let handles = Handles {
            fs: tokio::spawn(fs_actor.run()),
            build: tokio::spawn(build_actor.run()),
            ws: tokio::spawn(ws_actor.run()),
        };

        wait_for_signal(self.shutdown_rx.take(), &handles).await;
        handles
            .stop(&pool, config.shutdown_grace(), &build_tx, &ws_tx)
            .await;

        crate::debug!("actor"; "stopped");
        Ok(())
    }
}

struct Handles {
    fs: JoinHandle<()>,
    build: JoinHandle<()>,
    ws: JoinHandle<()>,
}

impl Handles {
    async fn stop(
        self,
        pool: &WorkerPool,
        grace: Duration,
        build_tx: &mpsc::Sender<BuildMsg>,
        ws_tx: &mpsc::Sender<WsMsg>,
    ) {
        self.fs.abort();

        crate::debug!("actor"; "draining build pool");
        pool.shutdown(grace).await;

        let _ = build_tx.send(BuildMsg::Shutdown).await;
        let _ = tokio::time::timeout(STOP_TIMEOUT, self.build).await;

        let _ = ws_tx.send(WsMsg::Shutdown).await;
        let _ = tokio::time::timeout(STOP_TIMEOUT, self.ws).await;
    }
}

/// Block until the shutdown signal, or until any actor exits on its own.
async fn wait_for_signal(shutdown_rx: Option<Receiver<()>>, handles: &Handles) {
    let Some(rx) = shutdown_rx else {
        loop {
            if handles.fs.is_finished() || handles.build.is_finished() || handles.ws.is_finished() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    };

    loop {
        if rx.try_recv().is_ok() {
            crate::debug!("actor"; "shutdown signal received");
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}
