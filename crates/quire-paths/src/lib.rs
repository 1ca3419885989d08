//! Source/output path mapping for the Quire documentation engine.
//!
//! [`PathMapper`] is a pure, stateless translation layer between three
//! representations of a page:
//!
//! - **Source paths**: files under the docs directory (`guide/intro.md`)
//! - **Output paths**: rendered files under the output directory, mirroring
//!   the source tree (`guide/intro.html`)
//! - **URLs**: what the browser requests (`/guide/intro`)
//!
//! Nothing here touches the filesystem. The inverse URL mapping returns
//! candidate source paths in preference order and leaves the existence check
//! to the caller.
//!
//! # Example
//!
//! ```
//! use std::path::{Path, PathBuf};
//! use quire_paths::PathMapper;
//!
//! let mapper = PathMapper::new(PathBuf::from("/site/docs"), PathBuf::from("/site/out"));
//!
//! assert_eq!(mapper.url_for(Path::new("guide/index.md")), "/guide");
//! assert_eq!(
//!     mapper.output_relative(Path::new("guide/intro.md")),
//!     PathBuf::from("guide/intro.html")
//! );
//! ```

mod outside;

use std::path::{Component, Path, PathBuf};

pub use outside::OUTSIDE_PREFIX;

/// Extension of source pages.
const SOURCE_EXTENSION: &str = "md";

/// Extension of rendered output files.
const OUTPUT_EXTENSION: &str = "html";

/// Stem of directory landing pages.
const INDEX_STEM: &str = "index";

/// Translates between source-relative paths, output paths, and URLs.
#[derive(Clone, Debug)]
pub struct PathMapper {
    source_dir: PathBuf,
    output_dir: PathBuf,
}

impl PathMapper {
    /// Create a mapper for the given source and output roots.
    ///
    /// Both roots are normalized lexically so that prefix stripping works on
    /// paths built with `.` or `..` segments.
    #[must_use]
    pub fn new(source_dir: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            source_dir: normalize(&source_dir),
            output_dir: normalize(&output_dir),
        }
    }

    /// Root of the source tree.
    #[must_use]
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Root of the output tree.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Strip the source root from an absolute source path.
    ///
    /// Returns `None` for paths outside the source tree.
    #[must_use]
    pub fn source_relative(&self, source: &Path) -> Option<PathBuf> {
        normalize(source)
            .strip_prefix(&self.source_dir)
            .ok()
            .map(Path::to_path_buf)
    }

    /// Absolute source path for a source-relative path.
    #[must_use]
    pub fn source_path(&self, source_rel: &Path) -> PathBuf {
        self.source_dir.join(source_rel)
    }

    /// Output path (relative to the output root) for a source-relative path.
    ///
    /// The tree structure is mirrored; only the extension changes.
    #[must_use]
    pub fn output_relative(&self, source_rel: &Path) -> PathBuf {
        source_rel.with_extension(OUTPUT_EXTENSION)
    }

    /// Absolute output path for an absolute source path.
    ///
    /// Returns `None` when the source path lies outside the source root.
    #[must_use]
    pub fn output_path(&self, source: &Path) -> Option<PathBuf> {
        let rel = self.source_relative(source)?;
        Some(self.output_dir.join(self.output_relative(&rel)))
    }

    /// URL for a source-relative path.
    ///
    /// - `index.md` -> `/`
    /// - `guide.md` -> `/guide`
    /// - `guide/index.md` -> `/guide`
    /// - `guide/setup.md` -> `/guide/setup`
    #[must_use]
    pub fn url_for(&self, source_rel: &Path) -> String {
        page_url(source_rel)
    }

    /// Candidate source-relative paths for a URL, in preference order.
    ///
    /// `/guide` resolves to `guide.md` first and `guide/index.md` second;
    /// the root resolves to `index.md` only. A trailing `.html` or `/` is
    /// ignored. URLs containing `..` segments yield no candidates.
    #[must_use]
    pub fn source_candidates(&self, url: &str) -> Vec<PathBuf> {
        let trimmed = url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim_matches('/');
        let trimmed = trimmed
            .strip_suffix(&format!(".{OUTPUT_EXTENSION}"))
            .unwrap_or(trimmed);

        let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
        if segments.iter().any(|s| *s == ".." || *s == ".") {
            return Vec::new();
        }

        let index_file = format!("{INDEX_STEM}.{SOURCE_EXTENSION}");
        if segments.is_empty() {
            return vec![PathBuf::from(index_file)];
        }

        let joined = segments.join("/");
        let mut candidates = vec![PathBuf::from(format!("{joined}.{SOURCE_EXTENSION}"))];
        if segments.last() != Some(&INDEX_STEM) {
            candidates.push(Path::new(&joined).join(index_file));
        }
        candidates
    }

    /// Rewrite an asset reference made from a page.
    ///
    /// Relative references that stay inside the tree are returned unchanged
    /// since the output tree mirrors the source tree. References that climb
    /// above the root are mapped into the outside-root namespace
    /// (`/@outside/{depth}/{rest}`). Absolute URLs, fragments and rooted
    /// paths are returned unchanged.
    #[must_use]
    pub fn asset_url(&self, page_source_rel: &Path, reference: &str) -> String {
        outside::rewrite(page_source_rel, reference)
    }

    /// Resolve an outside-root URL back to a filesystem path.
    ///
    /// Returns `None` if the URL is not in the outside-root namespace or is
    /// malformed.
    #[must_use]
    pub fn resolve_outside_url(&self, url: &str) -> Option<PathBuf> {
        let (depth, rest) = outside::parse(url)?;
        let mut base = self.source_dir.clone();
        for _ in 0..depth {
            if !base.pop() {
                return None;
            }
        }
        Some(base.join(rest))
    }
}

/// URL for a source-relative path. See [`PathMapper::url_for`].
#[must_use]
pub fn page_url(source_rel: &Path) -> String {
    let mut segments = url_segments(&source_rel.with_extension(""));

    if segments.last().is_some_and(|s| s == INDEX_STEM) {
        segments.pop();
    }

    format!("/{}", segments.join("/"))
}

/// Lexically normalize a path by folding `.` and `..` components.
///
/// Leading `..` components of relative paths are preserved; `..` at the root
/// of an absolute path is dropped.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }

    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().collect()
}

/// Path segments as UTF-8 strings, skipping non-normal components.
fn url_segments(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}
