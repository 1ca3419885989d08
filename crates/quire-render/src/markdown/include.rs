//! `::include[path]` leaf directive.
//!
//! The directive must stand alone on its line. The referenced file is
//! resolved against the including file's directory, stripped of front
//! matter, expanded recursively, and inlined in place. Every referenced
//! file, found or not, is reported as a dependency so that creating or
//! editing it invalidates the page.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use quire_paths::normalize;
use regex::Regex;

use super::front_matter;
use super::page::escape_html;

static INCLUDE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*::include\[([^\]]+)\]\s*$").unwrap());

/// Markdown with includes inlined.
#[derive(Debug)]
pub(crate) struct Expansion {
    pub markdown: String,
    /// Referenced files in first-seen order, without duplicates.
    pub dependencies: Vec<PathBuf>,
}

/// Inline includes in `body`, which was read from `source`.
pub(crate) fn expand(source: &Path, body: &str) -> Expansion {
    let mut expansion = Expansion {
        markdown: String::with_capacity(body.len()),
        dependencies: Vec::new(),
    };
    let mut stack = vec![normalize(source)];
    expand_into(body, &mut stack, &mut expansion);
    expansion
}

fn expand_into(body: &str, stack: &mut Vec<PathBuf>, expansion: &mut Expansion) {
    let base = stack
        .last()
        .and_then(|file| file.parent())
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let mut fence: Option<&str> = None;

    for line in body.split_inclusive('\n') {
        let trimmed = line.trim_start();
        let marker = ["```", "~~~"].into_iter().find(|m| trimmed.starts_with(m));
        match (fence, marker) {
            (None, Some(m)) => fence = Some(m),
            (Some(open), Some(m)) if open == m => fence = None,
            _ => {}
        }

        let directive = if fence.is_none() {
            INCLUDE_PATTERN.captures(line.trim_end())
        } else {
            None
        };
        let Some(caps) = directive else {
            expansion.markdown.push_str(line);
            continue;
        };

        let reference = caps[1].trim();
        let target = normalize(&base.join(reference));
        if !expansion.dependencies.contains(&target) {
            expansion.dependencies.push(target.clone());
        }

        if stack.contains(&target) {
            push_error(&mut expansion.markdown, &format!("Include cycle: {reference}"));
            continue;
        }
        match fs::read_to_string(&target) {
            Ok(content) => {
                let (_, included) = front_matter::split(&content);
                stack.push(target);
                expand_into(included, stack, expansion);
                stack.pop();
                if !expansion.markdown.ends_with('\n') {
                    expansion.markdown.push('\n');
                }
            }
            Err(e) => {
                tracing::debug!(include = %target.display(), error = %e, "Include not readable");
                push_error(&mut expansion.markdown, &format!("Include not found: {reference}"));
            }
        }
    }
}

fn push_error(out: &mut String, message: &str) {
    out.push_str("\n<div class=\"quire-error\">");
    out.push_str(&escape_html(message));
    out.push_str("</div>\n\n");
}
