//! Story Content Reader
//!
//! Reads a story's rendered container HTML from the output directory so the
//! router can morph it into open tabs.

use std::fs;
use std::path::{Component, Path, PathBuf};

use super::classify::STORY_CONTAINER_FILE;

/// Source of freshly rendered story HTML.
pub trait ContentReader: Send + Sync {
    /// Read the HTML for `story_id`, or `None` if missing or unsafe.
    fn read_story_html(&self, story_id: &str) -> Option<String>;
}

/// Reads `<root>/<story_id>/themed_story.html`.
#[derive(Debug, Clone)]
pub struct FsContentReader {
    root: PathBuf,
}

impl FsContentReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve the container file for `story_id`, confined to the root.
    fn resolve(&self, story_id: &str) -> Option<PathBuf> {
        let id = Path::new(story_id);
        if story_id.is_empty() || story_id.contains('\0') {
            return None;
        }
        let only_normal = id.components().all(|c| matches!(c, Component::Normal(_)));
        if !only_normal {
            return None;
        }

        let root = self.root.canonicalize().ok()?;
        let file = root.join(id).join(STORY_CONTAINER_FILE).canonicalize().ok()?;
        file.starts_with(&root).then_some(file)
    }
}

impl ContentReader for FsContentReader {
    fn read_story_html(&self, story_id: &str) -> Option<String> {
        let Some(path) = self.resolve(story_id) else {
            crate::debug!("route"; "rejected story id: {}", story_id);
            return None;
        };
        match fs::read_to_string(&path) {
            Ok(html) => Some(html),
            Err(e) => {
                crate::debug!("route"; "read {} failed: {}", path.display(), e);
                None
            }
        }
    }
}
