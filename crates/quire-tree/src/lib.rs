//! Navigation tree for the Quire documentation engine.
//!
//! The [`PageTree`] holds one entry per rendered page (title, ordering hint,
//! explicit parent) and derives the navigation hierarchy from it. It is
//! persisted as pretty-printed JSON so the file diffs cleanly in review.
//!
//! Saving reports whether the persisted structure changed. A change means
//! navigation already baked into rendered pages is stale and those pages
//! need another rendering pass.
//!
//! # Example
//!
//! ```ignore
//! use quire_tree::{PageMeta, PageTree};
//!
//! let mut tree = PageTree::new(project.join(".quire/page-tree.json"));
//! tree.restore();
//! tree.add("guide/setup.md".into(), PageMeta { title: "Setup".into(), ..Default::default() });
//! if tree.save()?.needs_another_pass {
//!     // re-render open pages
//! }
//! ```

mod error;
mod hierarchy;
mod navigation;
mod tree;

pub use error::{TreeLoadError, TreeSaveError};
pub use hierarchy::PageMeta;
pub use navigation::{BreadcrumbItem, NavItem, Navigation};
pub use tree::{FORMAT_VERSION, PageTree, SaveOutcome};
