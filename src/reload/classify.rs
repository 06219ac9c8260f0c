//! Change Classification
//!
//! Pure functions mapping a changed path to its reload blast radius.
//! No filesystem access, no side effects, never fails.
//!
//! ```text
//! .../themed_story.html            -> GlobalAsset
//! .../static/**/*.{css,js,mjs}     -> GlobalAsset
//! .../<section>/.../story-N/index.html -> StorySpecific("<section>/.../story-N")
//! anything else                    -> NonStory
//! ```

use std::fmt;
use std::path::{Component, Path};

/// Shared story-container template; every story page embeds it.
pub const STORY_CONTAINER_FILE: &str = "themed_story.html";

/// Catalog index document name.
pub const INDEX_FILE: &str = "index.html";

/// Output-root directory names stripped from the front of a story id.
///
/// Known ambiguity: a real catalog section named e.g. `build` in the first
/// two segments is stripped too. Kept for compatibility with existing sites.
const OUTPUT_ROOT_PREFIXES: &[&str] = &["output", "build", "dist", "_output", "public"];

/// Only this many leading segments are considered as strippable prefixes.
const MAX_PREFIX_SEGMENTS: usize = 2;

/// Stylesheet/script extensions treated as global when under `static/`.
const GLOBAL_ASSET_EXTENSIONS: &[&str] = &["css", "js", "mjs"];

/// Reload blast radius of a single changed path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Classification {
    /// Affects every open story page.
    GlobalAsset,
    /// Affects exactly one story's rendered HTML.
    StorySpecific { story_id: String },
    /// Catalog-level or documentation page.
    NonStory,
}

impl Classification {
    pub fn label(&self) -> &'static str {
        match self {
            Self::GlobalAsset => "global_asset",
            Self::StorySpecific { .. } => "story_specific",
            Self::NonStory => "non_story",
        }
    }

    pub fn story_id(&self) -> Option<&str> {
        match self {
            Self::StorySpecific { story_id } => Some(story_id),
            _ => None,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StorySpecific { story_id } => write!(f, "story_specific({story_id})"),
            other => f.write_str(other.label()),
        }
    }
}

/// Classify a changed path.
///
/// Total over all inputs: malformed or empty paths degrade to `NonStory`.
pub fn classify(path: &Path) -> Classification {
    let segments = segments(path);
    let Some(file_name) = segments.last().map(String::as_str) else {
        return Classification::NonStory;
    };

    if file_name == STORY_CONTAINER_FILE {
        return Classification::GlobalAsset;
    }

    let in_static = segments[..segments.len() - 1]
        .iter()
        .any(|s| s == "static");
    if in_static && has_global_asset_extension(file_name) {
        return Classification::GlobalAsset;
    }

    if file_name == INDEX_FILE
        && let Some(story_id) = story_id_from_segments(&segments[..segments.len() - 1])
    {
        return Classification::StorySpecific { story_id };
    }

    Classification::NonStory
}

#[cfg(test)]
fn classify_str(path: &str) -> Classification {
    classify(Path::new(path))
}

/// Check whether a segment looks like `story-<digits>`.
pub fn is_story_segment(segment: &str) -> bool {
    segment
        .strip_prefix("story-")
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// Build a story id from directory segments (file name excluded).
///
/// Takes segments after the recognized leading prefixes through the first
/// `story-<digits>` segment inclusive.
fn story_id_from_segments(dirs: &[String]) -> Option<String> {
    let story_idx = dirs.iter().position(|s| is_story_segment(s))?;

    let mut start = 0;
    for segment in dirs.iter().take(story_idx.min(MAX_PREFIX_SEGMENTS)) {
        if is_strippable_prefix(segment) {
            start += 1;
        } else {
            break;
        }
    }

    Some(dirs[start..=story_idx].join("/"))
}

fn is_strippable_prefix(segment: &str) -> bool {
    if segment == "/" || segment.starts_with('.') {
        return true;
    }
    let lower = segment.to_ascii_lowercase();
    OUTPUT_ROOT_PREFIXES.contains(&lower.as_str())
}

fn has_global_asset_extension(file_name: &str) -> bool {
    let Some((_, ext)) = file_name.rsplit_once('.') else {
        return false;
    };
    let ext = ext.to_ascii_lowercase();
    GLOBAL_ASSET_EXTENSIONS.contains(&ext.as_str())
}

/// Split a path into display segments. The root becomes `/`.
fn segments(path: &Path) -> Vec<String> {
    path.components()
        .map(|c| match c {
            Component::RootDir => "/".to_string(),
            Component::CurDir => ".".to_string(),
            Component::ParentDir => "..".to_string(),
            Component::Prefix(p) => p.as_os_str().to_string_lossy().into_owned(),
            Component::Normal(s) => s.to_string_lossy().into_owned(),
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
