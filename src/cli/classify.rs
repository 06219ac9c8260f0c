//! `classify`: show how a change to each path would be routed.

use std::path::PathBuf;

use owo_colors::OwoColorize;

use crate::config::ReloadConfig;
use crate::reload::classify::{Classification, classify};

/// Print one line per path. Absolute paths are taken relative to the
/// watched content root.
pub fn classify_paths(config: &ReloadConfig, paths: &[PathBuf]) {
    let filter = config.watch_filter();
    for path in paths {
        let line = describe(&classify(filter.relative(path)));
        println!("{}  {}", path.display(), line);
    }
}

fn describe(classification: &Classification) -> String {
    match classification {
        Classification::GlobalAsset => format!(
            "{} {}",
            classification.label().yellow(),
            "(iframe reload on every story page)".dimmed()
        ),
        Classification::StorySpecific { story_id } => format!(
            "{} {} {}",
            classification.label().green(),
            story_id,
            "(morph on matching story pages)".dimmed()
        ),
        Classification::NonStory => format!(
            "{} {}",
            classification.label().blue(),
            "(full reload on non-story pages)".dimmed()
        ),
    }
}
