//! Overlay-root directory scanner.
//!
//! Walks each configured root in order and materializes a component for
//! every directory found. Roots later in the list overlay earlier ones:
//! a directory name seen again maps onto the existing component and only
//! contributes its source path.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::tree::{ComponentId, ComponentTree};

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("failed to read component root {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Scan every root into the tree. Returns the number of directories
/// visited across all roots.
pub fn scan_roots(tree: &mut ComponentTree, roots: &[PathBuf]) -> Result<usize, ScanError> {
    let mut visited = 0;
    let base = tree.root();
    for root in roots {
        visited += scan_dir(tree, base, root)?;
        debug!(root = %root.display(), "component root scanned");
    }
    Ok(visited)
}

fn scan_dir(
    tree: &mut ComponentTree,
    parent: ComponentId,
    dir: &Path,
) -> Result<usize, ScanError> {
    let entries = fs::read_dir(dir).map_err(|source| ScanError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    // Deterministic traversal regardless of filesystem order.
    let mut names: Vec<(String, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ScanError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        names.push((name.to_string(), path));
    }
    names.sort();

    let mut visited = 0;
    for (name, path) in names {
        let id = tree.get_or_create(parent, &name, &path);
        visited += 1 + scan_dir(tree, id, &path)?;
    }
    Ok(visited)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_roots_merge_into_one_tree() {
        let base = tempfile::tempdir().unwrap();
        let theme = tempfile::tempdir().unwrap();
        fs::create_dir_all(base.path().join("docs/guide")).unwrap();
        fs::create_dir_all(theme.path().join("docs")).unwrap();
        fs::create_dir_all(theme.path().join("admin")).unwrap();

        let mut tree = ComponentTree::new();
        let visited = scan_roots(
            &mut tree,
            &[base.path().to_path_buf(), theme.path().to_path_buf()],
        )
        .unwrap();

        assert_eq!(visited, 4);
        let docs = tree.find("/docs").unwrap();
        assert_eq!(tree.source_paths(docs).len(), 2);
        assert!(tree.find("/docs/guide").is_some());
        assert!(tree.find("/admin").is_some());
    }

    #[test]
    fn missing_root_is_an_error() {
        let mut tree = ComponentTree::new();
        let err = scan_roots(&mut tree, &[PathBuf::from("/definitely/not/here")]);
        assert!(err.is_err());
    }
}
