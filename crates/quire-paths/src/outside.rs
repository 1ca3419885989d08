//! Outside-root URL namespace.
//!
//! Pages may reference assets that live above the source root
//! (`../../shared/logo.png`). Such references cannot be served from the
//! output tree, so they are rewritten to `/@outside/{depth}/{rest}` where
//! `depth` counts how many levels the reference climbs above the root.

use std::path::{Component, Path, PathBuf};

/// URL prefix of the outside-root namespace.
pub const OUTSIDE_PREFIX: &str = "/@outside/";

/// Rewrite a reference made from `page_source_rel`.
pub(crate) fn rewrite(page_source_rel: &Path, reference: &str) -> String {
    if is_external(reference) {
        return reference.to_owned();
    }

    let (target, suffix) = split_suffix(reference);
    let base = page_source_rel.parent().unwrap_or(Path::new(""));

    let mut stack: Vec<String> = base
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    let mut depth = 0usize;

    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if stack.pop().is_none() {
                    depth += 1;
                }
            }
            other => stack.push(other.to_owned()),
        }
    }

    if depth == 0 {
        return reference.to_owned();
    }

    format!("{OUTSIDE_PREFIX}{depth}/{}{suffix}", stack.join("/"))
}

/// Parse an outside-root URL into its depth and the path below that level.
pub(crate) fn parse(url: &str) -> Option<(usize, PathBuf)> {
    let rest = url.strip_prefix(OUTSIDE_PREFIX)?;
    let (depth, rest) = rest.split_once('/')?;
    let depth: usize = depth.parse().ok()?;
    if depth == 0 {
        return None;
    }

    let rest = rest.split(['?', '#']).next().unwrap_or_default();
    let mut path = PathBuf::new();
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => return None,
            other => path.push(other),
        }
    }
    if path.as_os_str().is_empty() {
        return None;
    }
    Some((depth, path))
}

/// References the rewriter leaves alone.
fn is_external(reference: &str) -> bool {
    reference.is_empty()
        || reference.starts_with('/')
        || reference.starts_with('#')
        || reference.contains("://")
        || reference.starts_with("mailto:")
        || reference.starts_with("data:")
}

/// Split `path?query#fragment` into the path and the rest.
fn split_suffix(reference: &str) -> (&str, &str) {
    match reference.find(['?', '#']) {
        Some(idx) => reference.split_at(idx),
        None => (reference, ""),
    }
}
