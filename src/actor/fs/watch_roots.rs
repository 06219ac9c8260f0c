use std::path::PathBuf;

use notify::{RecursiveMode, Watcher};
use rustc_hash::FxHashMap;

/// Keeps the OS watcher attached to every configured root.
///
/// A root that is missing at startup, or deleted and recreated while
/// serving (e.g. `git checkout` of a theme directory), is attached as soon
/// as it exists again.
pub struct WatchRoots {
    /// Root → currently attached
    roots: FxHashMap<PathBuf, bool>,
}

impl WatchRoots {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            roots: paths.into_iter().map(|p| (p, false)).collect(),
        }
    }

    pub fn attach_existing<W: Watcher>(&mut self, watcher: &mut W) -> notify::Result<()> {
        for (path, attached) in &mut self.roots {
            if !path.exists() {
                crate::log!("watch"; "not found, will watch once created: {}", path.display());
                continue;
            }
            watcher.watch(path, RecursiveMode::Recursive)?;
            *attached = true;
        }
        Ok(())
    }

    pub fn maintain<W: Watcher>(&mut self, watcher: &mut W) {
        for (path, attached) in &mut self.roots {
            let exists = path.exists();
            if *attached && !exists {
                crate::debug!("watch"; "root vanished: {}", path.display());
                // The OS handle died with the directory.
                let _ = watcher.unwatch(path);
                *attached = false;
            } else if !*attached && exists && watcher.watch(path, RecursiveMode::Recursive).is_ok() {
                crate::log!("watch"; "re-attached: {}", path.display());
                *attached = true;
            }
        }
    }

    #[cfg(test)]
    pub fn is_attached(&self, path: &std::path::Path) -> bool {
        self.roots.get(path).copied().unwrap_or(false)
    }
}
