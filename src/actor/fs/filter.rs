//! Watch scope: which changed paths are relevant to a rebuild.
//!
//! - everything under the content root
//! - only static assets under the extra (theme/layout) roots
//! - nothing under the output directory, which the build itself writes

use std::path::{Path, PathBuf};

/// Extensions treated as static assets under extra watch roots.
const STATIC_EXTENSIONS: &[&str] = &["css", "js", "png", "jpg", "jpeg", "svg", "ico", "gif"];

#[derive(Debug, Clone)]
pub struct WatchFilter {
    content: PathBuf,
    extra: Vec<PathBuf>,
    output: PathBuf,
}

impl WatchFilter {
    pub fn new(content: &Path, extra: &[PathBuf], output: &Path) -> Self {
        Self {
            content: normalize_path(content),
            extra: extra.iter().map(|p| normalize_path(p)).collect(),
            output: normalize_path(output),
        }
    }

    /// All roots to hand to the OS watcher.
    pub fn roots(&self) -> Vec<PathBuf> {
        let mut roots = vec![self.content.clone()];
        for root in &self.extra {
            if !roots.iter().any(|r| root.starts_with(r)) {
                roots.push(root.clone());
            }
        }
        roots
    }

    pub fn accepts(&self, path: &Path) -> bool {
        if path.starts_with(&self.output) {
            return false;
        }
        if path.starts_with(&self.content) {
            return true;
        }
        self.extra.iter().any(|root| path.starts_with(root)) && is_static_asset(path)
    }

    /// Path relative to the root it was found under, for classification.
    pub fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        std::iter::once(&self.content)
            .chain(&self.extra)
            .find_map(|root| path.strip_prefix(root).ok())
            .unwrap_or(path)
    }
}

fn is_static_asset(path: &Path) -> bool {
    if path.components().any(|c| c.as_os_str() == "static") {
        return true;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| STATIC_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Absolute, canonical where possible. Deleted paths keep their given form.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        }
    })
}
