//! Navigation snapshot handed to renders.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Navigation item with children for the UI tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NavItem {
    /// Display title.
    pub title: String,
    /// Link target URL (e.g., `/guide/setup`).
    pub url: String,
    /// Source path relative to the docs directory.
    pub source: PathBuf,
    /// Child items in sibling order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NavItem>,
}

/// Breadcrumb navigation item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BreadcrumbItem {
    /// Display title.
    pub title: String,
    /// Link target URL.
    pub url: String,
}

/// Immutable view of the page tree at one instant.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Navigation {
    /// Top-level items in sibling order.
    pub items: Vec<NavItem>,
}

impl Navigation {
    /// Whether the tree has no pages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Find the item for a source-relative path.
    #[must_use]
    pub fn find(&self, source: &Path) -> Option<&NavItem> {
        self.trail(source).and_then(|trail| trail.last().copied())
    }

    /// Ancestors of `source`, root first, excluding the page itself.
    ///
    /// Empty if the page is top-level or not in the tree.
    #[must_use]
    pub fn breadcrumbs(&self, source: &Path) -> Vec<BreadcrumbItem> {
        let Some(mut trail) = self.trail(source) else {
            return Vec::new();
        };
        trail.pop();
        trail
            .into_iter()
            .map(|item| BreadcrumbItem {
                title: item.title.clone(),
                url: item.url.clone(),
            })
            .collect()
    }

    /// Path from a top-level item down to `source`, inclusive.
    fn trail(&self, source: &Path) -> Option<Vec<&NavItem>> {
        fn search<'a>(items: &'a [NavItem], source: &Path, trail: &mut Vec<&'a NavItem>) -> bool {
            for item in items {
                trail.push(item);
                if item.source == source || search(&item.children, source, trail) {
                    return true;
                }
                trail.pop();
            }
            false
        }

        let mut trail = Vec::new();
        search(&self.items, source, &mut trail).then_some(trail)
    }
}
