//! The persisted page tree.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use quire_paths::page_url;
use serde::{Deserialize, Serialize};

use crate::error::{TreeLoadError, TreeSaveError};
use crate::hierarchy::{self, Node, PageMeta};
use crate::navigation::{BreadcrumbItem, NavItem, Navigation};

/// Version of the persisted format. Files with another version are ignored.
pub const FORMAT_VERSION: u32 = 1;

/// Result of [`PageTree::save`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SaveOutcome {
    /// The persisted structure changed; pages rendered against the previous
    /// structure are stale.
    pub needs_another_pass: bool,
}

/// On-disk document.
#[derive(Debug, Serialize, Deserialize)]
struct TreeFile {
    version: u32,
    pages: Vec<TreeNode>,
}

/// On-disk node. Field order is the line order in the file.
#[derive(Debug, Serialize, Deserialize)]
struct TreeNode {
    source: String,
    title: String,
    url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    order: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<TreeNode>,
}

impl TreeNode {
    fn from_node(node: &Node<'_>) -> Self {
        Self {
            source: source_key(node.source),
            title: node.meta.title.clone(),
            url: page_url(node.source),
            order: node.meta.order,
            parent: node.meta.parent.clone(),
            children: node.children.iter().map(Self::from_node).collect(),
        }
    }

    fn flatten_into(self, entries: &mut BTreeMap<PathBuf, PageMeta>) {
        entries.insert(
            PathBuf::from(self.source),
            PageMeta {
                title: self.title,
                order: self.order,
                parent: self.parent,
            },
        );
        for child in self.children {
            child.flatten_into(entries);
        }
    }
}

/// Source path as stored on disk: `/`-separated regardless of platform.
fn source_key(source: &Path) -> String {
    source
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Hierarchical navigation structure derived from rendered pages.
///
/// [`add`](Self::add) and [`remove`](Self::remove) only touch memory.
/// [`save`](Self::save) persists the computed hierarchy and reports whether
/// it differs from what was persisted before.
///
/// Given the same entries, the persisted bytes are identical across runs:
/// entries live in ordered maps and siblings are sorted by explicit `order`
/// and then by source path.
#[derive(Debug)]
pub struct PageTree {
    file: PathBuf,
    entries: BTreeMap<PathBuf, PageMeta>,
    persisted: Option<Vec<u8>>,
    needs_another_pass: bool,
}

impl PageTree {
    /// Create an empty tree persisted at `file`.
    #[must_use]
    pub fn new(file: PathBuf) -> Self {
        Self {
            file,
            entries: BTreeMap::new(),
            persisted: None,
            needs_another_pass: false,
        }
    }

    /// Path of the persisted tree file.
    #[must_use]
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Load persisted state, starting empty on any failure.
    ///
    /// Returns the number of restored entries.
    pub fn restore(&mut self) -> usize {
        match self.load() {
            Ok(count) => {
                tracing::debug!(file = %self.file.display(), count, "Restored page tree");
                count
            }
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring persisted page tree");
                self.entries.clear();
                self.persisted = None;
                0
            }
        }
    }

    /// Load persisted state.
    ///
    /// A missing file is not an error and leaves the tree empty.
    ///
    /// # Errors
    ///
    /// Returns [`TreeLoadError`] if the file is unreadable, malformed or of
    /// another format version. The tree is left untouched in that case.
    pub fn load(&mut self) -> Result<usize, TreeLoadError> {
        let bytes = match fs::read(&self.file) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(source) => {
                return Err(TreeLoadError::Io {
                    path: self.file.clone(),
                    source,
                });
            }
        };

        let document: TreeFile =
            serde_json::from_slice(&bytes).map_err(|source| TreeLoadError::Parse {
                path: self.file.clone(),
                source,
            })?;
        if document.version != FORMAT_VERSION {
            return Err(TreeLoadError::Version {
                path: self.file.clone(),
                found: document.version,
                expected: FORMAT_VERSION,
            });
        }

        let mut entries = BTreeMap::new();
        for node in document.pages {
            node.flatten_into(&mut entries);
        }
        let count = entries.len();
        self.entries = entries;
        self.persisted = Some(bytes);
        Ok(count)
    }

    /// Insert or update the entry for a source-relative path.
    pub fn add(&mut self, source: PathBuf, meta: PageMeta) {
        self.entries.insert(source, meta);
    }

    /// Remove the entry for a source-relative path.
    ///
    /// Returns `true` if the entry existed.
    pub fn remove(&mut self, source: &Path) -> bool {
        self.entries.remove(source).is_some()
    }

    /// Drop entries whose source no longer qualifies.
    ///
    /// Returns the removed source paths.
    pub fn retain(&mut self, mut keep: impl FnMut(&Path) -> bool) -> Vec<PathBuf> {
        let removed: Vec<PathBuf> = self
            .entries
            .keys()
            .filter(|source| !keep(source))
            .cloned()
            .collect();
        for source in &removed {
            self.entries.remove(source);
        }
        removed
    }

    /// Whether an entry exists for `source`.
    #[must_use]
    pub fn contains(&self, source: &Path) -> bool {
        self.entries.contains_key(source)
    }

    /// Metadata recorded for `source`.
    #[must_use]
    pub fn meta(&self, source: &Path) -> Option<&PageMeta> {
        self.entries.get(source)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the tree has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Persist the computed hierarchy.
    ///
    /// The file is only rewritten when the serialized structure differs from
    /// the last persisted bytes. The write goes through a temporary file in
    /// the same directory followed by a rename.
    ///
    /// # Errors
    ///
    /// Returns [`TreeSaveError`] if the file cannot be written.
    pub fn save(&mut self) -> Result<SaveOutcome, TreeSaveError> {
        let bytes = self.serialize()?;
        let changed = match &self.persisted {
            Some(previous) => *previous != bytes,
            None => !self.entries.is_empty(),
        };

        if changed || self.persisted.is_none() {
            self.write(&bytes)?;
            self.persisted = Some(bytes);
        }
        self.needs_another_pass = changed;

        if changed {
            tracing::debug!(
                file = %self.file.display(),
                entries = self.entries.len(),
                "Page tree structure changed"
            );
        }
        Ok(SaveOutcome {
            needs_another_pass: changed,
        })
    }

    /// Whether the last [`save`](Self::save) changed the structure.
    #[must_use]
    pub fn needs_another_pass(&self) -> bool {
        self.needs_another_pass
    }

    /// Snapshot of the current in-memory hierarchy.
    #[must_use]
    pub fn navigation(&self) -> Navigation {
        fn convert(node: &Node<'_>) -> NavItem {
            NavItem {
                title: node.meta.title.clone(),
                url: page_url(node.source),
                source: node.source.to_path_buf(),
                children: node.children.iter().map(convert).collect(),
            }
        }

        Navigation {
            items: hierarchy::build(&self.entries).iter().map(convert).collect(),
        }
    }

    /// Ancestors of `source`, root first.
    #[must_use]
    pub fn breadcrumbs(&self, source: &Path) -> Vec<BreadcrumbItem> {
        self.navigation().breadcrumbs(source)
    }

    fn serialize(&self) -> Result<Vec<u8>, serde_json::Error> {
        let document = TreeFile {
            version: FORMAT_VERSION,
            pages: hierarchy::build(&self.entries)
                .iter()
                .map(TreeNode::from_node)
                .collect(),
        };
        let mut bytes = serde_json::to_vec_pretty(&document)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    fn write(&self, bytes: &[u8]) -> Result<(), TreeSaveError> {
        let io_err = |source| TreeSaveError::Io {
            path: self.file.clone(),
            source,
        };
        let dir = self
            .file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));

        fs::create_dir_all(dir).map_err(io_err)?;
        let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        temp.write_all(bytes).map_err(io_err)?;
        temp.persist(&self.file).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}
