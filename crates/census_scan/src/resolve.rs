//! Root path normalization and deduplication.

use std::path::{Component, Path, PathBuf};

/// Resolve configured scan paths into a minimal covering set of roots.
///
/// Each input is canonicalized (absolute, symlinks resolved) when possible;
/// a path that does not currently exist is absolutized lexically so the
/// missing-root policy can be applied at scan time instead. The result is
/// sorted component-wise and contains no member that is a descendant of
/// another, so every retained root is scanned exactly once. Containment is
/// segment-wise: `/data/ab` is not inside `/data/a`.
pub fn resolve_roots(paths: &[String]) -> Vec<PathBuf> {
    let mut resolved: Vec<PathBuf> = paths
        .iter()
        .map(|path| resolve_one(Path::new(path)))
        .collect();
    resolved.sort();

    let mut roots: Vec<PathBuf> = Vec::new();
    for path in resolved {
        if !roots.iter().any(|root| path.starts_with(root)) {
            roots.push(path);
        }
    }
    roots
}

fn resolve_one(path: &Path) -> PathBuf {
    match std::fs::canonicalize(path) {
        Ok(resolved) => resolved,
        Err(_) => lexical_absolute(path),
    }
}

/// Absolute form without touching the filesystem: `.` components dropped,
/// `..` popped, relative paths anchored at the current directory.
fn lexical_absolute(path: &Path) -> PathBuf {
    let mut absolute = if path.is_absolute() {
        PathBuf::new()
    } else {
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"))
    };
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                absolute.pop();
            }
            other => absolute.push(other),
        }
    }
    absolute
}
