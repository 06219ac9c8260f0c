//! FileSystem Actor
//!
//! Watches the catalog sources and sends one debounced trigger per quiet
//! window to the BuildActor. The watcher starts before the initial build so
//! edits made while it runs are not lost.
//!
//! ```text
//! notify → WatchFilter → Debouncer (timing + dedup) → BuildMsg::Rebuild
//! ```

use std::path::PathBuf;

use notify::RecommendedWatcher;
use tokio::sync::mpsc;

use super::messages::BuildMsg;

// Window timing and per-path deduplication.
mod debouncer;
// Content / extra / output scoping.
mod filter;
// Shared fs event types.
mod types;
// Watch root attach/re-attach lifecycle.
mod watch_roots;


pub use debouncer::{DEFAULT_DEBOUNCE_MS, Debouncer};
pub use filter::{WatchFilter, normalize_path};
pub use types::{ChangeKind, ChangeSet};
use watch_roots::WatchRoots;

/// FileSystem Actor - watches for file changes
pub struct FsActor {
    /// Channel to receive notify events (sync -> async bridge)
    notify_rx: std::sync::mpsc::Receiver<notify::Result<notify::Event>>,
    /// Watcher handle (must be kept alive)
    watcher: RecommendedWatcher,
    watch_roots: WatchRoots,
    filter: WatchFilter,
    debouncer: Debouncer,
    build_tx: mpsc::Sender<BuildMsg>,
}

impl FsActor {
    /// Start watching immediately; events buffer until [`run`](Self::run).
    pub fn new(
        filter: WatchFilter,
        debouncer: Debouncer,
        build_tx: mpsc::Sender<BuildMsg>,
    ) -> notify::Result<Self> {
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();

        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;

        let mut watch_roots = WatchRoots::new(filter.roots());
        watch_roots.attach_existing(&mut watcher)?;

        Ok(Self {
            notify_rx,
            watcher,
            watch_roots,
            filter,
            debouncer,
            build_tx,
        })
    }

    pub fn roots(&self) -> Vec<PathBuf> {
        self.filter.roots()
    }

    /// Run the actor event loop until the BuildActor goes away.
    pub async fn run(self) {
        let notify_rx = self.notify_rx;
        let mut watcher = self.watcher;
        let mut watch_roots = self.watch_roots;

        let (async_tx, async_rx) = mpsc::channel::<notify::Event>(64);

        // notify is sync; bridge it on a plain thread
        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                match result {
                    Ok(event) => {
                        if async_tx.blocking_send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => crate::log!("watch"; "notify error: {}", e),
                }
            }
        });

        debounce_loop(async_rx, self.debouncer, &self.filter, &self.build_tx, || {
            watch_roots.maintain(&mut watcher);
        })
        .await;
    }
}

/// Core watch loop, independent of the OS watcher.
///
/// Returns when the event source closes or the BuildActor shuts down.
pub(crate) async fn debounce_loop(
    mut events: mpsc::Receiver<notify::Event>,
    mut debouncer: Debouncer,
    filter: &WatchFilter,
    build_tx: &mpsc::Sender<BuildMsg>,
    mut maintain: impl FnMut(),
) {
    loop {
        tokio::select! {
            biased;
            event = events.recv() => match event {
                Some(event) => debouncer.add_event(&event, filter),
                None => break,
            },
            _ = tokio::time::sleep(debouncer.sleep_duration()) => {
                maintain();
                let Some(changes) = debouncer.take_if_ready() else {
                    continue;
                };
                crate::debug_do! {
                    for (path, kind) in &changes.0 {
                        crate::log!("watch"; "{}: {}", kind.label(), path.display());
                    }
                    crate::log!("watch"; "trigger with {} change(s)", changes.len());
                }
                if build_tx.send(BuildMsg::Rebuild(changes)).await.is_err() {
                    break;
                }
            }
        }
    }
}
