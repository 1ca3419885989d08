//! Filesystem walking: initial page discovery and recovery snapshots.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use glob::Pattern;
use quire_paths::normalize;

use crate::error::WatchError;
use crate::event::{ChangeKind, FileChange};

/// Directories never descended into during discovery.
const SKIPPED_DIRS: &[&str] = &["node_modules", "target"];

/// Decides which files under the input directory are pages.
#[derive(Clone, Debug)]
pub struct PageMatcher {
    input_dir: PathBuf,
    patterns: Vec<Pattern>,
}

impl PageMatcher {
    /// Compile page glob patterns relative to `input_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Pattern`] for an invalid pattern.
    pub fn new(input_dir: &Path, patterns: &[String]) -> Result<Self, WatchError> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|source| WatchError::Pattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<_, _>>()?;

        Ok(Self {
            input_dir: normalize(input_dir),
            patterns,
        })
    }

    /// Absolute input directory.
    #[must_use]
    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    /// Whether the absolute `path` is a page.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        let Ok(rel) = path.strip_prefix(&self.input_dir) else {
            return false;
        };
        if !is_visible(rel) {
            return false;
        }
        self.patterns.is_empty() || self.patterns.iter().any(|p| p.matches_path(rel))
    }
}

/// Discover pages under the matcher's input directory.
///
/// Hidden and `_`-prefixed entries are skipped, as are `node_modules` and
/// `target`. Returns absolute paths sorted lexicographically; an empty list
/// if the directory does not exist.
#[must_use]
pub fn scan_pages(matcher: &PageMatcher) -> Vec<PathBuf> {
    let mut pages = Vec::new();
    walk(matcher.input_dir(), &mut |path| {
        if matcher.matches(path) {
            pages.push(path.to_path_buf());
        }
    });
    pages.sort();
    pages
}

fn walk(dir: &Path, visit: &mut impl FnMut(&Path)) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    let mut entries: Vec<_> = entries
        .filter_map(Result::ok)
        .map(|e| (e.path(), e.file_type().is_ok_and(|t| t.is_dir())))
        .collect();
    entries.sort();

    for (path, is_dir) in entries {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if name.starts_with('.') || name.starts_with('_') {
            continue;
        }
        if is_dir {
            if !SKIPPED_DIRS.contains(&name.as_str()) {
                walk(&path, visit);
            }
        } else {
            visit(&path);
        }
    }
}

fn is_visible(rel: &Path) -> bool {
    rel.components().all(|c| {
        let name = c.as_os_str().to_string_lossy();
        !name.starts_with('.') && !name.starts_with('_')
    })
}

/// Modification times of every file under a watched root.
pub(crate) type Snapshot = BTreeMap<PathBuf, SystemTime>;

/// Take an mtime snapshot of `root`, skipping `ignore`d subtrees.
///
/// Unlike [`scan_pages`], every file counts: any of them may be a
/// dependency.
pub(crate) fn snapshot(root: &Path, ignore: &[PathBuf]) -> io::Result<Snapshot> {
    let mut files = Snapshot::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = normalize(&entry.path());
            if is_ignored(&path, ignore) {
                continue;
            }
            let metadata = entry.metadata()?;
            if metadata.is_dir() {
                pending.push(path);
            } else {
                files.insert(path, metadata.modified()?);
            }
        }
    }

    Ok(files)
}

/// Turn one debounced change into the file changes it stands for.
///
/// Backends report renames as modifications of the old and new names, and a
/// renamed directory only under the directory's own name. The result is
/// checked against the disk: a vanished path is `Removed` (for every known
/// file beneath it when it was a directory), and a directory that appeared
/// or changed is diffed against what `known` holds for it. `known` is
/// updated to match.
pub(crate) fn reconcile(
    known: &mut Snapshot,
    change: FileChange,
    ignore: &[PathBuf],
) -> Vec<FileChange> {
    let path = change.path;
    match fs::metadata(&path) {
        Ok(metadata) if metadata.is_dir() => {
            let current = match snapshot(&path, ignore) {
                Ok(current) => current,
                Err(err) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %err,
                        "Failed to rescan directory"
                    );
                    return Vec::new();
                }
            };
            let before: Snapshot = take_subtree(known, &path).into_iter().collect();
            let changes = diff(&before, &current);
            known.extend(current);
            changes
        }
        Ok(metadata) => {
            let mtime = metadata.modified().ok();
            let previous = match mtime {
                Some(mtime) => known.insert(path.clone(), mtime),
                None => known.get(&path).copied(),
            };
            let kind = match change.kind {
                // Already reported when its directory appeared
                ChangeKind::Created if previous.is_some() && previous == mtime => return Vec::new(),
                ChangeKind::Removed => ChangeKind::Modified,
                kind => kind,
            };
            vec![FileChange { path, kind }]
        }
        Err(_) => {
            let gone = take_subtree(known, &path);
            if gone.is_empty() || gone.iter().all(|(p, _)| *p == path) {
                return vec![FileChange {
                    path,
                    kind: ChangeKind::Removed,
                }];
            }
            gone.into_iter()
                .map(|(path, _)| FileChange {
                    path,
                    kind: ChangeKind::Removed,
                })
                .collect()
        }
    }
}

/// Remove and return `path` and every entry beneath it.
fn take_subtree(known: &mut Snapshot, path: &Path) -> Vec<(PathBuf, SystemTime)> {
    let paths: Vec<PathBuf> = known
        .range(path.to_path_buf()..)
        .map(|(p, _)| p)
        .take_while(|p| p.starts_with(path))
        .cloned()
        .collect();
    paths
        .into_iter()
        .filter_map(|p| known.remove(&p).map(|mtime| (p, mtime)))
        .collect()
}

/// Changes that turn `before` into `after`, sorted by path.
pub(crate) fn diff(before: &Snapshot, after: &Snapshot) -> Vec<FileChange> {
    let mut changes: Vec<FileChange> = after
        .iter()
        .filter_map(|(path, mtime)| {
            let kind = match before.get(path) {
                None => ChangeKind::Created,
                Some(previous) if previous != mtime => ChangeKind::Modified,
                Some(_) => return None,
            };
            Some(FileChange {
                path: path.clone(),
                kind,
            })
        })
        .chain(
            before
                .keys()
                .filter(|path| !after.contains_key(*path))
                .map(|path| FileChange {
                    path: path.clone(),
                    kind: ChangeKind::Removed,
                }),
        )
        .collect();
    changes.sort_by(|a, b| a.path.cmp(&b.path));
    changes
}

/// Whether `path` lies under one of the `ignore` roots.
pub(crate) fn is_ignored(path: &Path, ignore: &[PathBuf]) -> bool {
    ignore.iter().any(|root| path.starts_with(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "# Page").unwrap();
    }

    #[test]
    fn test_scan_pages_sorted_and_filtered() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        touch(&root.join("guide/intro.md"));
        touch(&root.join("index.md"));
        touch(&root.join("notes.txt"));
        touch(&root.join(".hidden/secret.md"));
        touch(&root.join("_drafts/wip.md"));
        touch(&root.join("node_modules/pkg/readme.md"));

        let matcher = PageMatcher::new(root, &["**/*.md".to_owned()]).unwrap();
        let pages = scan_pages(&matcher);

        let root = normalize(root);
        assert_eq!(
            pages,
            vec![root.join("guide/intro.md"), root.join("index.md")]
        );
    }

    #[test]
    fn test_scan_pages_missing_dir() {
        let matcher = PageMatcher::new(Path::new("/nonexistent/docs"), &[]).unwrap();

        assert!(scan_pages(&matcher).is_empty());
    }

    #[test]
    fn test_matcher_rejects_outside_and_hidden() {
        let matcher = PageMatcher::new(Path::new("/docs"), &["**/*.md".to_owned()]).unwrap();

        assert!(matcher.matches(Path::new("/docs/a/b.md")));
        assert!(matcher.matches(Path::new("/docs/a.md")));
        assert!(!matcher.matches(Path::new("/other/a.md")));
        assert!(!matcher.matches(Path::new("/docs/.git/a.md")));
        assert!(!matcher.matches(Path::new("/docs/a.png")));
    }

    #[test]
    fn test_matcher_invalid_pattern() {
        let err = PageMatcher::new(Path::new("/docs"), &["[".to_owned()]).unwrap_err();

        assert!(matches!(err, WatchError::Pattern { ref pattern, .. } if pattern == "["));
    }

    #[test]
    fn test_snapshot_skips_ignored() {
        let temp = tempfile::tempdir().unwrap();
        let root = normalize(temp.path());
        touch(&root.join("docs/a.md"));
        touch(&root.join("out/a.html"));

        let files = snapshot(&root, &[root.join("out")]).unwrap();

        assert_eq!(
            files.keys().cloned().collect::<Vec<_>>(),
            vec![root.join("docs/a.md")]
        );
    }

    #[test]
    fn test_diff_detects_all_kinds() {
        let t0 = SystemTime::UNIX_EPOCH;
        let t1 = t0 + Duration::from_secs(1);
        let before: Snapshot = [
            (PathBuf::from("/r/kept.md"), t0),
            (PathBuf::from("/r/edited.md"), t0),
            (PathBuf::from("/r/gone.md"), t0),
        ]
        .into();
        let after: Snapshot = [
            (PathBuf::from("/r/kept.md"), t0),
            (PathBuf::from("/r/edited.md"), t1),
            (PathBuf::from("/r/new.md"), t1),
        ]
        .into();

        let changes = diff(&before, &after);

        assert_eq!(
            changes,
            vec![
                FileChange {
                    path: PathBuf::from("/r/edited.md"),
                    kind: ChangeKind::Modified,
                },
                FileChange {
                    path: PathBuf::from("/r/gone.md"),
                    kind: ChangeKind::Removed,
                },
                FileChange {
                    path: PathBuf::from("/r/new.md"),
                    kind: ChangeKind::Created,
                },
            ]
        );
    }

    fn change(path: &Path, kind: ChangeKind) -> FileChange {
        FileChange {
            path: path.to_path_buf(),
            kind,
        }
    }

    #[test]
    fn test_reconcile_file_moved_away_is_removed() {
        let temp = tempfile::tempdir().unwrap();
        let root = normalize(temp.path());
        let page = root.join("docs/a.md");
        touch(&page);
        let mut known = snapshot(&root, &[]).unwrap();

        fs::rename(&page, root.join("a.md")).unwrap();
        let changes = reconcile(&mut known, change(&page, ChangeKind::Modified), &[]);

        assert_eq!(changes, vec![change(&page, ChangeKind::Removed)]);
        assert!(!known.contains_key(&page));
    }

    #[test]
    fn test_reconcile_directory_moved_away_removes_each_file() {
        let temp = tempfile::tempdir().unwrap();
        let root = normalize(temp.path());
        touch(&root.join("docs/guide/a.md"));
        touch(&root.join("docs/guide/deep/b.md"));
        touch(&root.join("docs/guide-other.md"));
        let mut known = snapshot(&root, &[]).unwrap();

        fs::rename(root.join("docs/guide"), root.join("moved")).unwrap();
        let moved = change(&root.join("docs/guide"), ChangeKind::Modified);
        let changes = reconcile(&mut known, moved, &[]);

        assert_eq!(
            changes,
            vec![
                change(&root.join("docs/guide/a.md"), ChangeKind::Removed),
                change(&root.join("docs/guide/deep/b.md"), ChangeKind::Removed),
            ]
        );
        assert!(known.contains_key(&root.join("docs/guide-other.md")));
    }

    #[test]
    fn test_reconcile_directory_moved_in_creates_each_file() {
        let temp = tempfile::tempdir().unwrap();
        let root = normalize(temp.path());
        fs::create_dir_all(root.join("docs")).unwrap();
        let mut known = snapshot(&root, &[]).unwrap();

        touch(&root.join("incoming/a.md"));
        fs::rename(root.join("incoming"), root.join("docs/guide")).unwrap();
        let moved = change(&root.join("docs/guide"), ChangeKind::Created);
        let changes = reconcile(&mut known, moved, &[]);

        assert_eq!(changes, vec![change(&root.join("docs/guide/a.md"), ChangeKind::Created)]);

        // The file's own creation event was already covered
        let created = change(&root.join("docs/guide/a.md"), ChangeKind::Created);
        let again = reconcile(&mut known, created, &[]);
        assert!(again.is_empty());
    }

    #[test]
    fn test_reconcile_removed_but_present_is_modified() {
        let temp = tempfile::tempdir().unwrap();
        let root = normalize(temp.path());
        let page = root.join("a.md");
        touch(&page);
        let mut known = Snapshot::new();

        let changes = reconcile(&mut known, change(&page, ChangeKind::Removed), &[]);

        assert_eq!(changes, vec![change(&page, ChangeKind::Modified)]);
        assert!(known.contains_key(&page));
    }
}
