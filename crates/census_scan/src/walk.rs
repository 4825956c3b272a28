//! Depth-first directory walker producing inventory records.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, ScanError};
use crate::record::{RecordKind, ScanRecord};

/// Metadata directory some NAS systems plant in every folder. Excluded from
/// traversal and output, like dotfiles.
const RESERVED_METADATA_DIR: &str = "@eaDir";

pub struct TreeScanner {
    follow_symlinks: bool,
}

impl TreeScanner {
    pub fn new(follow_symlinks: bool) -> Self {
        Self { follow_symlinks }
    }

    /// Start a walk at `root`. Fails when the root itself does not exist;
    /// every later per-entry error is logged and the entry skipped.
    ///
    /// The walk is lazy and carries no state between invocations: calling
    /// `scan` again re-walks the tree from scratch.
    pub fn scan(&self, root: &Path) -> Result<Walk> {
        if fs::symlink_metadata(root).is_err() {
            return Err(ScanError::MissingRoot(root.to_path_buf()));
        }
        Ok(Walk {
            root: root.to_string_lossy().into_owned(),
            follow_symlinks: self.follow_symlinks,
            pending: VecDeque::from([root.to_path_buf()]),
            records: VecDeque::new(),
            skipped_dirs: 0,
        })
    }
}

/// Lazy record sequence for one root.
///
/// Emission order per visited directory: all subdirectory records, then all
/// file records, both sorted by name, before descending into the
/// subdirectories in the same order.
#[derive(Debug)]
pub struct Walk {
    root: String,
    follow_symlinks: bool,
    pending: VecDeque<PathBuf>,
    records: VecDeque<ScanRecord>,
    skipped_dirs: u64,
}

impl Walk {
    /// Directories that could not be read and were skipped.
    pub fn skipped_dirs(&self) -> u64 {
        self.skipped_dirs
    }

    fn visit(&mut self, dir: &Path) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(path = %dir.display(), error = %err, "skipping unreadable directory");
                self.skipped_dirs += 1;
                return;
            }
        };

        // (name, path, descend)
        let mut subdirs: Vec<(String, PathBuf, bool)> = Vec::new();
        let mut files: Vec<(String, PathBuf)> = Vec::new();

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(path = %dir.display(), error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || name == RESERVED_METADATA_DIR {
                continue;
            }
            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable entry");
                    continue;
                }
            };

            let is_symlink = file_type.is_symlink();
            // Classification follows the link target; a broken symlink counts
            // as a file entry.
            let is_dir = if is_symlink {
                fs::metadata(&path).map(|meta| meta.is_dir()).unwrap_or(false)
            } else {
                file_type.is_dir()
            };

            if is_dir {
                let descend = !is_symlink || self.follow_symlinks;
                subdirs.push((name, path, descend));
            } else {
                files.push((name, path));
            }
        }

        subdirs.sort_by(|a, b| a.0.cmp(&b.0));
        files.sort_by(|a, b| a.0.cmp(&b.0));

        let mut descend_into: Vec<PathBuf> = Vec::new();
        for (name, path, descend) in subdirs {
            if descend {
                descend_into.push(path.clone());
            }
            self.records.push_back(ScanRecord {
                kind: RecordKind::Dir,
                root_path: self.root.clone(),
                full_path: path.to_string_lossy().into_owned(),
                name,
            });
        }
        for (name, path) in files {
            self.records.push_back(ScanRecord {
                kind: RecordKind::File,
                root_path: self.root.clone(),
                full_path: path.to_string_lossy().into_owned(),
                name,
            });
        }

        // Depth-first: visit this directory's subdirectories before any
        // pending sibling.
        for path in descend_into.into_iter().rev() {
            self.pending.push_front(path);
        }
    }
}

impl Iterator for Walk {
    type Item = ScanRecord;

    fn next(&mut self) -> Option<ScanRecord> {
        loop {
            if let Some(record) = self.records.pop_front() {
                return Some(record);
            }
            let dir = self.pending.pop_front()?;
            self.visit(&dir);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_file(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, b"x").expect("write file");
    }

    fn collect(root: &Path, follow_symlinks: bool) -> Vec<ScanRecord> {
        TreeScanner::new(follow_symlinks)
            .scan(root)
            .expect("root should exist")
            .collect()
    }

    #[test]
    fn missing_root_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = TreeScanner::new(false)
            .scan(&temp.path().join("absent"))
            .expect_err("missing root must fail");
        assert!(matches!(err, ScanError::MissingRoot(_)));
    }

    #[test]
    fn hidden_and_reserved_names_are_excluded() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        write_file(&root.join("visible.txt"));
        write_file(&root.join(".hidden"));
        write_file(&root.join("@eaDir/thumb.dat"));
        write_file(&root.join(".git/config"));
        write_file(&root.join("sub/.DS_Store"));
        write_file(&root.join("sub/data.csv"));

        let records = collect(root, false);
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["sub", "visible.txt", "data.csv"]);
        assert!(records
            .iter()
            .all(|r| !r.name.starts_with('.') && r.name != "@eaDir"));
    }

    #[test]
    fn directories_emit_before_files_then_descend() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        write_file(&root.join("zz.txt"));
        write_file(&root.join("aa.txt"));
        write_file(&root.join("beta/inner.txt"));
        fs::create_dir_all(root.join("alpha")).expect("create alpha");

        let records = collect(root, false);
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        // Root's entries first (dirs sorted, then files sorted), then the
        // first subdirectory's contents.
        assert_eq!(names, vec!["alpha", "beta", "aa.txt", "zz.txt", "inner.txt"]);

        let kinds: Vec<RecordKind> = records.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                RecordKind::Dir,
                RecordKind::Dir,
                RecordKind::File,
                RecordKind::File,
                RecordKind::File,
            ]
        );
    }

    #[test]
    fn descent_is_depth_first() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        write_file(&root.join("a/deep/bottom.txt"));
        write_file(&root.join("b/side.txt"));

        let records = collect(root, false);
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        // a's whole subtree is walked before b's contents.
        assert_eq!(names, vec!["a", "b", "deep", "bottom.txt", "side.txt"]);
    }

    #[test]
    fn full_paths_stay_under_the_root() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        write_file(&root.join("one/two/three.txt"));

        let records = collect(root, false);
        let root_str = root.to_string_lossy().into_owned();
        for record in &records {
            assert_eq!(record.root_path, root_str);
            assert!(
                record.full_path.starts_with(&root_str),
                "{} escapes {}",
                record.full_path,
                root_str
            );
            assert!(Path::new(&record.full_path)
                .file_name()
                .is_some_and(|n| n.to_string_lossy() == record.name));
        }
    }

    #[test]
    fn repeated_walks_are_deterministic() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        for name in ["m.txt", "c/n.txt", "a/o.txt", "z.txt"] {
            write_file(&root.join(name));
        }

        let first = collect(root, false);
        let second = collect(root, false);
        assert_eq!(first, second);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_dir_is_listed_but_not_descended() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path().join("root");
        let target = temp.path().join("target");
        write_file(&target.join("inside.txt"));
        fs::create_dir_all(&root).expect("create root");
        std::os::unix::fs::symlink(&target, root.join("linked")).expect("create symlink");

        let records = collect(&root, false);
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["linked"]);
        assert_eq!(records[0].kind, RecordKind::Dir);

        let followed = collect(&root, true);
        let names: Vec<&str> = followed.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["linked", "inside.txt"]);
    }
}
