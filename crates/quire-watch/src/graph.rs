//! Page set and dependency edges.
//!
//! [`DependencyGraph`] is an immutable-by-convention value: the watcher
//! publishes it behind an `Arc` and mutations produce a new snapshot, so a
//! classification step always works against one complete graph.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use quire_paths::normalize;

use crate::event::{ChangeKind, WatchEvent};

/// One tracked source document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page {
    /// Absolute source path. Identity of the page.
    pub source: PathBuf,
    /// Absolute paths whose change makes this page's output stale.
    ///
    /// Never contains `source` itself.
    pub dependencies: BTreeSet<PathBuf>,
    /// Whether the page has output from a completed render.
    pub rendered: bool,
    /// Whether the navigation tree changed after the last render.
    pub needs_another_pass: bool,
}

impl Page {
    fn new(source: PathBuf) -> Self {
        Self {
            source,
            dependencies: BTreeSet::new(),
            rendered: false,
            needs_another_pass: false,
        }
    }
}

/// Pages plus a reverse index from dependency path to dependent pages.
#[derive(Clone, Debug, Default)]
pub struct DependencyGraph {
    pages: BTreeMap<PathBuf, Page>,
    dependents: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
}

impl DependencyGraph {
    /// Look up a page by source path.
    #[must_use]
    pub fn page(&self, source: &Path) -> Option<&Page> {
        self.pages.get(source)
    }

    /// Whether `path` is a tracked page.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.pages.contains_key(path)
    }

    /// Iterate over tracked pages in path order.
    pub fn pages(&self) -> impl Iterator<Item = &Page> {
        self.pages.values()
    }

    /// Number of tracked pages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Whether no pages are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Pages that list `path` as a dependency, in path order.
    pub fn dependents_of(&self, path: &Path) -> impl Iterator<Item = &PathBuf> {
        self.dependents.get(path).into_iter().flatten()
    }

    /// Register a page with an empty dependency set.
    ///
    /// Returns `false` if the page was already tracked (left untouched).
    pub(crate) fn insert_page(&mut self, source: PathBuf) -> bool {
        if self.pages.contains_key(&source) {
            return false;
        }
        self.pages.insert(source.clone(), Page::new(source));
        true
    }

    /// Drop a page and all its outgoing edges.
    ///
    /// Edges from other pages to this path stay: the file may come back and
    /// dependents must still be invalidated when it does.
    pub(crate) fn remove_page(&mut self, source: &Path) -> Option<Page> {
        let page = self.pages.remove(source)?;
        for dependency in &page.dependencies {
            self.unlink(dependency, source);
        }
        Some(page)
    }

    /// Replace the dependency set of `source` wholesale.
    ///
    /// Registers the page if needed, marks it rendered and clears its
    /// another-pass flag.
    pub(crate) fn set_dependencies(&mut self, source: &Path, dependencies: BTreeSet<PathBuf>) {
        let page = self
            .pages
            .entry(source.to_path_buf())
            .or_insert_with(|| Page::new(source.to_path_buf()));
        let previous = std::mem::replace(&mut page.dependencies, dependencies);
        page.rendered = true;
        page.needs_another_pass = false;
        let current = page.dependencies.clone();

        for stale in previous.difference(&current) {
            self.unlink(stale, source);
        }
        for added in current.difference(&previous) {
            self.dependents
                .entry(added.clone())
                .or_default()
                .insert(source.to_path_buf());
        }
    }

    /// Mark a page rendered after a failed render, keeping its previous edges.
    pub(crate) fn mark_failed(&mut self, source: &Path) {
        if let Some(page) = self.pages.get_mut(source) {
            page.rendered = true;
            page.needs_another_pass = false;
        }
    }

    /// Flag every rendered page not in `except` as needing another pass.
    ///
    /// Returns the newly flagged pages in path order.
    pub(crate) fn mark_needs_another_pass(&mut self, except: &[PathBuf]) -> Vec<PathBuf> {
        self.pages
            .values_mut()
            .filter(|page| page.rendered && !except.contains(&page.source))
            .filter_map(|page| {
                (!page.needs_another_pass).then(|| {
                    page.needs_another_pass = true;
                    page.source.clone()
                })
            })
            .collect()
    }

    /// Translate a file change into semantic events.
    ///
    /// A changed page yields an event for itself; every page depending on the
    /// path yields an event too. Each page appears at most once and
    /// [`WatchEvent::PageChanged`] wins over
    /// [`WatchEvent::DependencyOnlyChanged`]. The changed page comes first,
    /// dependents follow in path order.
    #[must_use]
    pub fn classify(
        &self,
        changed: &Path,
        kind: ChangeKind,
        is_subscribed: impl Fn(&Path) -> bool,
    ) -> Vec<WatchEvent> {
        let mut events = Vec::new();

        if self.contains(changed) {
            let page = changed.to_path_buf();
            events.push(match kind {
                ChangeKind::Removed => WatchEvent::PageDeleted { page },
                ChangeKind::Created | ChangeKind::Modified if is_subscribed(changed) => {
                    WatchEvent::PageChanged { page }
                }
                ChangeKind::Created | ChangeKind::Modified => WatchEvent::DependencyOnlyChanged {
                    page,
                    changed: changed.to_path_buf(),
                },
            });
        }

        for dependent in self.dependents_of(changed) {
            if dependent == changed {
                continue;
            }
            let event = if is_subscribed(dependent) {
                WatchEvent::PageChanged {
                    page: dependent.clone(),
                }
            } else {
                WatchEvent::DependencyOnlyChanged {
                    page: dependent.clone(),
                    changed: changed.to_path_buf(),
                }
            };
            events.push(event);
        }

        events
    }

    fn unlink(&mut self, dependency: &Path, dependent: &Path) {
        if let Some(set) = self.dependents.get_mut(dependency) {
            set.remove(dependent);
            if set.is_empty() {
                self.dependents.remove(dependency);
            }
        }
    }
}

/// Normalize a reported dependency list into an edge set for `page`.
///
/// Paths are folded lexically; the page itself is dropped.
pub(crate) fn dependency_set(
    page: &Path,
    dependencies: impl IntoIterator<Item = PathBuf>,
) -> BTreeSet<PathBuf> {
    dependencies
        .into_iter()
        .map(|path| normalize(&path))
        .filter(|path| path != page)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn path(name: &str) -> PathBuf {
        PathBuf::from(format!("/docs/{name}"))
    }

    fn graph_with(pages: &[&str]) -> DependencyGraph {
        let mut graph = DependencyGraph::default();
        for name in pages {
            graph.insert_page(path(name));
        }
        graph
    }

    fn nobody(_: &Path) -> bool {
        false
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut graph = DependencyGraph::default();

        assert!(graph.insert_page(path("a.md")));
        graph.set_dependencies(&path("a.md"), [path("b.md")].into());
        assert!(!graph.insert_page(path("a.md")));

        let page = graph.page(&path("a.md")).unwrap();
        assert_eq!(page.dependencies, [path("b.md")].into());
    }

    #[test]
    fn test_set_dependencies_replaces_wholesale() {
        let mut graph = graph_with(&["a.md"]);

        graph.set_dependencies(&path("a.md"), [path("x.md"), path("y.md")].into());
        graph.set_dependencies(&path("a.md"), [path("y.md"), path("z.md")].into());

        assert_eq!(graph.dependents_of(&path("x.md")).count(), 0);
        assert_eq!(
            graph.dependents_of(&path("z.md")).collect::<Vec<_>>(),
            vec![&path("a.md")]
        );
        let page = graph.page(&path("a.md")).unwrap();
        assert!(page.rendered);
    }

    #[test]
    fn test_dependency_set_drops_self_and_normalizes() {
        let deps = dependency_set(
            &path("a.md"),
            [
                PathBuf::from("/docs/./a.md"),
                PathBuf::from("/docs/sub/../b.md"),
            ],
        );

        assert_eq!(deps, [path("b.md")].into());
    }

    #[test]
    fn test_remove_page_drops_edges() {
        let mut graph = graph_with(&["a.md", "b.md"]);
        graph.set_dependencies(&path("b.md"), [path("a.md")].into());

        let removed = graph.remove_page(&path("b.md")).unwrap();

        assert_eq!(removed.source, path("b.md"));
        assert_eq!(graph.dependents_of(&path("a.md")).count(), 0);
        assert!(graph.remove_page(&path("b.md")).is_none());
    }

    #[test]
    fn test_classify_unknown_path() {
        let graph = graph_with(&["a.md"]);

        assert!(
            graph
                .classify(&path("other.txt"), ChangeKind::Modified, nobody)
                .is_empty()
        );
    }

    #[test]
    fn test_classify_subscribed_dependent() {
        let mut graph = graph_with(&["a.md", "b.md"]);
        graph.set_dependencies(&path("b.md"), [path("a.md")].into());
        let b = path("b.md");

        let events = graph.classify(&path("a.md"), ChangeKind::Modified, |p| p == b);

        assert_eq!(
            events,
            vec![
                WatchEvent::DependencyOnlyChanged {
                    page: path("a.md"),
                    changed: path("a.md"),
                },
                WatchEvent::PageChanged { page: path("b.md") },
            ]
        );
    }

    #[test]
    fn test_classify_page_and_dependency_both_apply() {
        let mut graph = graph_with(&["a.md", "b.md"]);
        graph.set_dependencies(&path("b.md"), [path("a.md")].into());
        let a = path("a.md");

        let events = graph.classify(&path("a.md"), ChangeKind::Modified, |p| p == a);

        assert_eq!(
            events,
            vec![
                WatchEvent::PageChanged { page: path("a.md") },
                WatchEvent::DependencyOnlyChanged {
                    page: path("b.md"),
                    changed: path("a.md"),
                },
            ]
        );
    }

    #[test]
    fn test_classify_removed_page() {
        let mut graph = graph_with(&["a.md", "b.md"]);
        graph.set_dependencies(&path("b.md"), [path("a.md")].into());

        let events = graph.classify(&path("a.md"), ChangeKind::Removed, |_| true);

        assert_eq!(
            events,
            vec![
                WatchEvent::PageDeleted { page: path("a.md") },
                WatchEvent::PageChanged { page: path("b.md") },
            ]
        );
    }

    #[test]
    fn test_mark_needs_another_pass_skips_unrendered_and_excepted() {
        let mut graph = graph_with(&["a.md", "b.md", "c.md", "d.md"]);
        graph.set_dependencies(&path("a.md"), BTreeSet::new());
        graph.set_dependencies(&path("b.md"), BTreeSet::new());
        graph.set_dependencies(&path("c.md"), BTreeSet::new());

        let flagged = graph.mark_needs_another_pass(&[path("b.md")]);

        assert_eq!(flagged, vec![path("a.md"), path("c.md")]);
        assert!(graph.page(&path("a.md")).unwrap().needs_another_pass);
        assert!(!graph.page(&path("d.md")).unwrap().needs_another_pass);

        graph.set_dependencies(&path("a.md"), BTreeSet::new());
        assert!(!graph.page(&path("a.md")).unwrap().needs_another_pass);
    }

    #[test]
    fn test_mark_failed_keeps_edges() {
        let mut graph = graph_with(&["a.md"]);
        graph.set_dependencies(&path("a.md"), [path("inc.md")].into());
        graph.mark_needs_another_pass(&[]);

        graph.mark_failed(&path("a.md"));

        let page = graph.page(&path("a.md")).unwrap();
        assert!(!page.needs_another_pass);
        assert_eq!(page.dependencies, [path("inc.md")].into());
    }

    /// Random graph: page count, per-page dependency picks (indices into a
    /// pool of pages plus extra non-page files), subscription mask, and the
    /// index of the file to modify.
    fn arb_graph() -> impl Strategy<Value = (usize, Vec<Vec<usize>>, Vec<bool>, usize)> {
        (1usize..12).prop_flat_map(|n| {
            let pool = n + 4;
            (
                Just(n),
                prop::collection::vec(prop::collection::vec(0..pool, 0..6), n),
                prop::collection::vec(any::<bool>(), n),
                0..pool,
            )
        })
    }

    fn file(index: usize, pages: usize) -> PathBuf {
        if index < pages {
            path(&format!("p{index}.md"))
        } else {
            path(&format!("shared/f{index}.md"))
        }
    }

    proptest! {
        #[test]
        fn prop_subscribed_dependents_render_exactly_once(
            (n, deps, subscribed, changed) in arb_graph()
        ) {
            let mut graph = DependencyGraph::default();
            for (i, picks) in deps.iter().enumerate() {
                let page = file(i, n);
                graph.insert_page(page.clone());
                let set = dependency_set(&page, picks.iter().map(|&j| file(j, n)));
                graph.set_dependencies(&page, set);
            }
            let open: BTreeSet<PathBuf> = subscribed
                .iter()
                .enumerate()
                .filter(|(_, s)| **s)
                .map(|(i, _)| file(i, n))
                .collect();
            let changed = file(changed, n);

            let events = graph.classify(&changed, ChangeKind::Modified, |p| open.contains(p));

            let mut seen = BTreeSet::new();
            for event in &events {
                prop_assert!(
                    seen.insert(event.page().clone()),
                    "duplicate event for {:?}",
                    event.page()
                );
            }

            for (i, picks) in deps.iter().enumerate() {
                let page = file(i, n);
                let affected = page == changed
                    || picks.iter().any(|&j| file(j, n) == changed);
                let rerenders = events
                    .iter()
                    .filter(|e| matches!(e, WatchEvent::PageChanged { page: p } if *p == page))
                    .count();
                let expected = usize::from(affected && open.contains(&page));
                prop_assert_eq!(rerenders, expected, "page {:?}", page);

                let invalidated = events.iter().any(|e| {
                    matches!(e, WatchEvent::DependencyOnlyChanged { page: p, .. } if *p == page)
                });
                prop_assert_eq!(invalidated, affected && !open.contains(&page));
            }
        }
    }
}
