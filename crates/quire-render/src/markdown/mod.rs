//! Default markdown transform.
//!
//! Pipeline for one page:
//!
//! 1. Split and parse YAML front matter (`title`, `order`, `parent`)
//! 2. Inline `::include[path]` directives, collecting dependencies
//! 3. Render markdown with `pulldown-cmark`, rewriting link and image
//!    targets and capturing the first H1
//! 4. Wrap the body in the page layout with navigation and breadcrumbs

mod front_matter;
mod include;
pub(crate) mod page;

use std::fs;
use std::path::Path;

use pulldown_cmark::{CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd, html};
use quire_paths::PathMapper;
use quire_tree::PageMeta;

use crate::error::TransformError;
use crate::transform::{RenderMode, Transform, TransformInput, TransformOutput};
use page::{PageView, render_page, titlecase_from_slug};

/// Markdown to HTML transform with front matter, includes and navigation.
#[derive(Clone, Debug)]
pub struct MarkdownTransform {
    gfm: bool,
}

impl Default for MarkdownTransform {
    fn default() -> Self {
        Self { gfm: true }
    }
}

impl MarkdownTransform {
    /// Create a transform with GitHub Flavored Markdown enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable GitHub Flavored Markdown features.
    ///
    /// GFM is enabled by default. When enabled, the parser supports:
    /// - Tables
    /// - Strikethrough (`~~text~~`)
    /// - Task lists (`- [ ] item`)
    #[must_use]
    pub fn with_gfm(mut self, enabled: bool) -> Self {
        self.gfm = enabled;
        self
    }

    fn parser_options(&self) -> Options {
        if self.gfm {
            Options::ENABLE_TABLES
                | Options::ENABLE_STRIKETHROUGH
                | Options::ENABLE_TASKLISTS
                | Options::ENABLE_GFM
        } else {
            Options::empty()
        }
    }

    /// Render body markdown. Returns the HTML and the first H1's text.
    fn render_body(&self, markdown: &str, input: &TransformInput<'_>) -> (String, Option<String>) {
        let links = LinkRewriter::new(input.mapper, input.source_rel);
        let mut heading: Option<String> = None;
        let mut heading_text = String::new();
        let mut in_h1 = false;

        let events = Parser::new_ext(markdown, self.parser_options()).map(|event| match event {
            Event::Start(Tag::Heading {
                level: HeadingLevel::H1,
                ..
            }) if heading.is_none() => {
                in_h1 = true;
                event
            }
            Event::End(TagEnd::Heading(HeadingLevel::H1)) if in_h1 => {
                in_h1 = false;
                heading = Some(std::mem::take(&mut heading_text).trim().to_owned());
                event
            }
            event @ (Event::Text(_) | Event::Code(_)) if in_h1 => {
                if let Event::Text(text) | Event::Code(text) = &event {
                    heading_text.push_str(text);
                }
                event
            }
            Event::Start(Tag::Link {
                link_type,
                dest_url,
                title,
                id,
            }) => Event::Start(Tag::Link {
                link_type,
                dest_url: links.rewrite(&dest_url, true),
                title,
                id,
            }),
            Event::Start(Tag::Image {
                link_type,
                dest_url,
                title,
                id,
            }) => Event::Start(Tag::Image {
                link_type,
                dest_url: links.rewrite(&dest_url, false),
                title,
                id,
            }),
            other => other,
        });

        let mut body = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut body, events);
        (body, heading.filter(|h| !h.is_empty()))
    }
}

impl Transform for MarkdownTransform {
    fn transform(&self, input: &TransformInput<'_>) -> Result<TransformOutput, TransformError> {
        let content = fs::read_to_string(input.source).map_err(|source| TransformError::Read {
            path: input.source.to_path_buf(),
            source,
        })?;

        let (header, body) = front_matter::split(&content);
        let front = header
            .map(front_matter::parse)
            .transpose()
            .map_err(|source| TransformError::FrontMatter {
                path: input.source.to_path_buf(),
                source,
            })?
            .unwrap_or_default();

        let expansion = include::expand(input.source, body);
        let (body_html, heading) = self.render_body(&expansion.markdown, input);

        let title = front
            .title
            .or(heading)
            .unwrap_or_else(|| fallback_title(input.source_rel));
        let url = input.mapper.url_for(input.source_rel);
        let breadcrumbs = input.navigation.breadcrumbs(input.source_rel);

        let html = render_page(&PageView {
            title: &title,
            url: &url,
            body: &body_html,
            navigation: &input.navigation.items,
            breadcrumbs: &breadcrumbs,
            live_reload: input.mode == RenderMode::Serve,
        });

        Ok(TransformOutput {
            html,
            meta: PageMeta {
                title,
                order: front.order,
                parent: front.parent,
            },
            dependencies: expansion.dependencies,
        })
    }
}

/// Title from the file name: `setup-guide.md` -> "Setup Guide",
/// `guide/index.md` -> "Guide", `index.md` -> "Home".
fn fallback_title(source_rel: &Path) -> String {
    let stem = source_rel
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    if stem != "index" {
        return titlecase_from_slug(&stem);
    }
    source_rel
        .parent()
        .and_then(Path::file_name)
        .map_or_else(
            || "Home".to_owned(),
            |dir| titlecase_from_slug(&dir.to_string_lossy()),
        )
}

/// Rewrites link and image targets for the page's served URL.
struct LinkRewriter<'a> {
    mapper: &'a PathMapper,
    source_rel: &'a Path,
    /// Prefix that keeps relative targets working from a directory index,
    /// which is served without a trailing slash (`guide/index.md` at
    /// `/guide`).
    index_prefix: Option<String>,
}

impl<'a> LinkRewriter<'a> {
    fn new(mapper: &'a PathMapper, source_rel: &'a Path) -> Self {
        let is_index = source_rel.file_stem().is_some_and(|s| s == "index");
        let index_prefix = source_rel
            .parent()
            .and_then(Path::file_name)
            .filter(|_| is_index)
            .map(|dir| format!("{}/", dir.to_string_lossy()));
        Self {
            mapper,
            source_rel,
            index_prefix,
        }
    }

    fn rewrite(&self, dest: &str, is_link: bool) -> CowStr<'static> {
        let outside = self.mapper.asset_url(self.source_rel, dest);
        if outside != dest {
            return outside.into();
        }
        if is_external(dest) {
            return dest.to_owned().into();
        }

        let split = dest.find(['?', '#']).unwrap_or(dest.len());
        let (path, suffix) = dest.split_at(split);
        let path = if is_link {
            path.strip_suffix(".md").unwrap_or(path)
        } else {
            path
        };
        let prefix = self.index_prefix.as_deref().unwrap_or_default();
        format!("{prefix}{path}{suffix}").into()
    }
}

fn is_external(dest: &str) -> bool {
    dest.is_empty()
        || dest.starts_with('/')
        || dest.starts_with('#')
        || dest.contains("://")
        || dest.starts_with("mailto:")
        || dest.starts_with("data:")
}
