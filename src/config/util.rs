//! Configuration utility functions.

use std::path::{Path, PathBuf};

use crate::actor::fs::normalize_path;

/// Find config file by searching upward from `start`
///
/// ```text
/// /home/user/catalog/components/button/  ← start
/// /home/user/catalog/storyreload.toml     ← found!
/// ```
pub fn find_config_file(config_name: &Path, start: &Path) -> Option<PathBuf> {
    if config_name.is_absolute() {
        return config_name.exists().then(|| config_name.to_path_buf());
    }

    let mut current = start;
    loop {
        let candidate = current.join(config_name);
        if candidate.is_file() {
            return Some(candidate);
        }
        current = current.parent()?;
    }
}

/// Expand `~` and anchor relative paths at `root`.
pub fn resolve_path(path: &Path, root: &Path) -> PathBuf {
    let expanded = match path.to_str() {
        Some(s) => PathBuf::from(shellexpand::tilde(s).into_owned()),
        None => path.to_path_buf(),
    };
    let full = if expanded.is_relative() {
        root.join(expanded)
    } else {
        expanded
    };
    normalize_path(&full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_config_walks_up() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let nested = root.join("components/button");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(root.join("storyreload.toml"), "").unwrap();

        let found = find_config_file(Path::new("storyreload.toml"), &nested).unwrap();
        assert_eq!(found, root.join("storyreload.toml"));
    }

    #[test]
    fn test_find_config_missing() {
        let temp = TempDir::new().unwrap();
        assert!(find_config_file(Path::new("nope-storyreload.toml"), temp.path()).is_none());
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let temp = TempDir::new().unwrap();
        let root = normalize_path(temp.path());
        std::fs::create_dir(root.join("var")).unwrap();

        assert_eq!(resolve_path(Path::new("var"), &root), root.join("var"));
        assert_eq!(resolve_path(&root.join("var"), Path::new("/elsewhere")), root.join("var"));
    }

    #[test]
    fn test_resolve_expands_tilde() {
        let resolved = resolve_path(Path::new("~/catalog"), Path::new("/root-dir"));
        assert!(!resolved.to_string_lossy().contains('~'));
        assert!(resolved.ends_with("catalog"));
    }
}
