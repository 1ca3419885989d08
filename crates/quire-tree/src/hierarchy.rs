//! Parent/child resolution and sibling ordering.
//!
//! Parent rules, in order:
//!
//! 1. An explicit `parent` from front matter, if it names a known page and
//!    does not create a cycle.
//! 2. The nearest `index.md` in an ancestor directory (for `dir/index.md`
//!    the search starts one level up).
//! 3. Otherwise the entry is top-level.
//!
//! The root `index.md` is top-level and adopts nothing implicitly.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// File name of directory landing pages.
const INDEX_FILE: &str = "index.md";

/// Navigation-relevant metadata reported by a render.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    /// Display title.
    pub title: String,
    /// Explicit sibling position; lower sorts first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    /// Explicit parent page (source path, with or without `.md`, or a
    /// directory whose `index.md` is meant).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

/// One resolved tree node borrowing from the entry map.
pub(crate) struct Node<'a> {
    pub source: &'a Path,
    pub meta: &'a PageMeta,
    pub children: Vec<Node<'a>>,
}

/// Arrange `entries` into sorted top-level nodes.
pub(crate) fn build(entries: &BTreeMap<PathBuf, PageMeta>) -> Vec<Node<'_>> {
    let parents = resolve_parents(entries);

    let mut children: BTreeMap<Option<&Path>, Vec<&Path>> = BTreeMap::new();
    for (source, parent) in &parents {
        children.entry(*parent).or_default().push(*source);
    }
    for siblings in children.values_mut() {
        siblings.sort_by(|a, b| sibling_key(entries, a).cmp(&sibling_key(entries, b)));
    }

    assemble(None, &children, entries)
}

fn assemble<'a>(
    parent: Option<&'a Path>,
    children: &BTreeMap<Option<&'a Path>, Vec<&'a Path>>,
    entries: &'a BTreeMap<PathBuf, PageMeta>,
) -> Vec<Node<'a>> {
    children
        .get(&parent)
        .into_iter()
        .flatten()
        .filter_map(|source| {
            let (source, meta) = entries.get_key_value(*source)?;
            Some(Node {
                source,
                meta,
                children: assemble(Some(source), children, entries),
            })
        })
        .collect()
}

/// Explicit order first (ascending), then source path.
fn sibling_key<'a>(
    entries: &BTreeMap<PathBuf, PageMeta>,
    source: &'a Path,
) -> (bool, Option<i64>, &'a Path) {
    let order = entries.get(source).and_then(|meta| meta.order);
    (order.is_none(), order, source)
}

fn resolve_parents(entries: &BTreeMap<PathBuf, PageMeta>) -> BTreeMap<&Path, Option<&Path>> {
    let mut parents: BTreeMap<&Path, Option<&Path>> = entries
        .keys()
        .map(|source| (source.as_path(), implicit_parent(source, entries)))
        .collect();

    for (source, meta) in entries {
        let Some(raw) = meta.parent.as_deref() else {
            continue;
        };
        let Some(parent) = lookup(raw, entries) else {
            tracing::debug!(
                page = %source.display(),
                parent = raw,
                "Unknown parent, using default"
            );
            continue;
        };
        if creates_cycle(&parents, source, parent) {
            tracing::debug!(
                page = %source.display(),
                parent = raw,
                "Parent would create a cycle, using default"
            );
            continue;
        }
        parents.insert(source.as_path(), Some(parent));
    }

    parents
}

fn implicit_parent<'a>(
    source: &Path,
    entries: &'a BTreeMap<PathBuf, PageMeta>,
) -> Option<&'a Path> {
    let mut dir = source.parent();
    if source.file_name() == Some(OsStr::new(INDEX_FILE)) {
        dir = dir.and_then(Path::parent);
    }

    while let Some(current) = dir {
        if current.as_os_str().is_empty() {
            break;
        }
        if let Some((key, _)) = entries.get_key_value(&current.join(INDEX_FILE)) {
            return Some(key);
        }
        dir = current.parent();
    }
    None
}

/// Resolve a front-matter parent reference to a known entry.
fn lookup<'a>(raw: &str, entries: &'a BTreeMap<PathBuf, PageMeta>) -> Option<&'a Path> {
    let raw = raw.trim().trim_matches('/');
    let candidates = if raw.is_empty() {
        vec![PathBuf::from(INDEX_FILE)]
    } else {
        vec![
            PathBuf::from(raw),
            PathBuf::from(format!("{raw}.md")),
            Path::new(raw).join(INDEX_FILE),
        ]
    };

    candidates
        .iter()
        .find_map(|candidate| entries.get_key_value(candidate))
        .map(|(key, _)| key.as_path())
}

/// Whether making `parent` the parent of `source` closes a loop.
fn creates_cycle(parents: &BTreeMap<&Path, Option<&Path>>, source: &Path, parent: &Path) -> bool {
    let mut current = Some(parent);
    while let Some(node) = current {
        if node == source {
            return true;
        }
        current = parents.get(node).copied().flatten();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn meta(title: &str) -> PageMeta {
        PageMeta {
            title: title.to_owned(),
            ..PageMeta::default()
        }
    }

    fn shape(nodes: &[Node<'_>]) -> Vec<String> {
        fn walk(nodes: &[Node<'_>], depth: usize, out: &mut Vec<String>) {
            for node in nodes {
                out.push(format!("{}{}", "  ".repeat(depth), node.source.display()));
                walk(&node.children, depth + 1, out);
            }
        }
        let mut out = Vec::new();
        walk(nodes, 0, &mut out);
        out
    }

    fn entries(items: &[(&str, PageMeta)]) -> BTreeMap<PathBuf, PageMeta> {
        items
            .iter()
            .map(|(source, meta)| (PathBuf::from(source), meta.clone()))
            .collect()
    }

    #[test]
    fn test_directory_index_adopts_siblings() {
        let entries = entries(&[
            ("index.md", meta("Home")),
            ("guide/index.md", meta("Guide")),
            ("guide/setup.md", meta("Setup")),
            ("guide/advanced/index.md", meta("Advanced")),
            ("about.md", meta("About")),
        ]);

        assert_eq!(
            shape(&build(&entries)),
            vec![
                "about.md",
                "guide/index.md",
                "  guide/advanced/index.md",
                "  guide/setup.md",
                "index.md",
            ]
        );
    }

    #[test]
    fn test_missing_index_falls_back_to_ancestor() {
        let entries = entries(&[
            ("guide/index.md", meta("Guide")),
            ("guide/deep/page.md", meta("Page")),
            ("orphan/page.md", meta("Orphan")),
        ]);

        assert_eq!(
            shape(&build(&entries)),
            vec!["guide/index.md", "  guide/deep/page.md", "orphan/page.md"]
        );
    }

    #[test]
    fn test_explicit_order_before_unordered() {
        let entries = entries(&[
            ("a.md", meta("A")),
            (
                "b.md",
                PageMeta {
                    order: Some(2),
                    ..meta("B")
                },
            ),
            (
                "c.md",
                PageMeta {
                    order: Some(1),
                    ..meta("C")
                },
            ),
            ("d.md", meta("D")),
        ]);

        assert_eq!(shape(&build(&entries)), vec!["c.md", "b.md", "a.md", "d.md"]);
    }

    #[test]
    fn test_equal_order_ties_break_by_path() {
        let ordered = |title: &str| PageMeta {
            order: Some(5),
            ..meta(title)
        };
        let entries = entries(&[("z.md", ordered("Z")), ("m.md", ordered("M"))]);

        assert_eq!(shape(&build(&entries)), vec!["m.md", "z.md"]);
    }

    #[test]
    fn test_explicit_parent_overrides_directory() {
        let entries = entries(&[
            ("guide/index.md", meta("Guide")),
            ("api.md", meta("API")),
            (
                "guide/reference.md",
                PageMeta {
                    parent: Some("api".to_owned()),
                    ..meta("Reference")
                },
            ),
        ]);

        assert_eq!(
            shape(&build(&entries)),
            vec!["api.md", "  guide/reference.md", "guide/index.md"]
        );
    }

    #[test]
    fn test_cyclic_parent_ignored() {
        let entries = entries(&[
            (
                "a.md",
                PageMeta {
                    parent: Some("b.md".to_owned()),
                    ..meta("A")
                },
            ),
            (
                "b.md",
                PageMeta {
                    parent: Some("a.md".to_owned()),
                    ..meta("B")
                },
            ),
        ]);

        // a.md claims b.md first; b.md's claim would close the loop
        assert_eq!(shape(&build(&entries)), vec!["b.md", "  a.md"]);
    }

    #[test]
    fn test_unknown_and_self_parent_ignored() {
        let entries = entries(&[
            (
                "a.md",
                PageMeta {
                    parent: Some("a".to_owned()),
                    ..meta("A")
                },
            ),
            (
                "b.md",
                PageMeta {
                    parent: Some("missing".to_owned()),
                    ..meta("B")
                },
            ),
        ]);

        assert_eq!(shape(&build(&entries)), vec!["a.md", "b.md"]);
    }
}
