use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use super::filter::{WatchFilter, normalize_path};
use super::types::{ChangeKind, ChangeSet};

pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Path segments that never trigger a rebuild.
const NOISE_SEGMENTS: &[&str] = &["__pycache__"];

/// Windowed debouncer: fires once the window has passed since the first
/// change of the pending batch, so a steady stream of edits still yields one
/// trigger per window. Only handles timing and per-path deduplication.
pub struct Debouncer {
    window: Duration,
    ignore: Vec<String>,
    /// Path → ChangeKind, plus first-seen order for stable triggers
    pub(super) changes: FxHashMap<PathBuf, ChangeKind>,
    order: Vec<PathBuf>,
    /// When the pending batch opened; later changes join it without moving it
    pub(super) first_pending: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            ignore: Vec::new(),
            changes: FxHashMap::default(),
            order: Vec::new(),
            first_pending: None,
        }
    }

    /// Additional path segments to treat as noise.
    pub fn with_ignore(mut self, ignore: Vec<String>) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Add a notify event, keeping only paths the filter accepts.
    pub fn add_event(&mut self, event: &notify::Event, filter: &WatchFilter) {
        let Some(kind) = ChangeKind::from_notify(&event.kind) else {
            return;
        };

        crate::debug!("watch"; "raw notify: {:?} {:?}", event.kind, event.paths);

        for path in &event.paths {
            let path = normalize_path(path);
            if filter.accepts(&path) {
                self.add_change(path, kind);
            }
        }
    }

    /// Record one change, applying dedup rules:
    /// - Deleted + Created/Modified → the later kind (file was restored)
    /// - Modified + Deleted → Deleted
    /// - Created + Deleted → dropped (net no-op)
    /// - otherwise: first event wins
    ///
    /// Returns whether the change was accepted (noise is not).
    pub fn add_change(&mut self, path: PathBuf, kind: ChangeKind) -> bool {
        if self.is_noise(&path) {
            return false;
        }

        if let Some(&existing) = self.changes.get(&path) {
            match (existing, kind) {
                (ChangeKind::Deleted, ChangeKind::Created | ChangeKind::Modified) => {
                    crate::debug!("watch"; "restore deleted->{}: {}", kind.label(), path.display());
                    self.changes.insert(path, kind);
                }
                (ChangeKind::Modified, ChangeKind::Deleted) => {
                    crate::debug!("watch"; "upgrade modified->deleted: {}", path.display());
                    self.changes.insert(path, ChangeKind::Deleted);
                }
                (ChangeKind::Created, ChangeKind::Deleted) => {
                    crate::debug!("watch"; "discard created+deleted: {}", path.display());
                    self.changes.remove(&path);
                    self.order.retain(|p| p != &path);
                }
                _ => {}
            }
            self.first_pending.get_or_insert_with(Instant::now);
            return true;
        }

        crate::debug!("watch"; "event {}: {}", kind.label(), path.display());
        self.order.push(path.clone());
        self.changes.insert(path, kind);
        self.first_pending.get_or_insert_with(Instant::now);
        true
    }

    /// Take accumulated changes if the window has elapsed.
    pub fn take_if_ready(&mut self) -> Option<ChangeSet> {
        let opened = self.first_pending?;
        if opened.elapsed() < self.window {
            return None;
        }

        self.first_pending = None;
        let mut changes = std::mem::take(&mut self.changes);
        let set: Vec<_> = std::mem::take(&mut self.order)
            .into_iter()
            .filter_map(|path| changes.remove(&path).map(|kind| (path, kind)))
            .collect();

        (!set.is_empty()).then_some(ChangeSet(set))
    }

    #[cfg(test)]
    pub fn is_ready(&self) -> bool {
        self.first_pending
            .is_some_and(|t| t.elapsed() >= self.window && !self.changes.is_empty())
    }

    /// Precise sleep duration until the window can close.
    pub fn sleep_duration(&self) -> Duration {
        let Some(opened) = self.first_pending else {
            return Duration::from_secs(86400);
        };

        self.window
            .saturating_sub(opened.elapsed())
            .max(Duration::from_millis(1))
    }

    fn is_noise(&self, path: &Path) -> bool {
        let in_noise_dir = path.components().any(|c| {
            let segment = c.as_os_str().to_string_lossy();
            NOISE_SEGMENTS.contains(&segment.as_ref()) || self.ignore.iter().any(|i| *i == segment)
        });
        in_noise_dir || is_compiled_artifact(path) || is_temp_file(path)
    }
}

fn is_compiled_artifact(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("pyc" | "pyo")
    )
}

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}
