//! HTML page layout.

use std::fmt::Write;

use quire_tree::{BreadcrumbItem, NavItem};

/// URL of the live-reload client served by the development server.
pub const LIVE_RELOAD_SCRIPT: &str = "/@quire/live-reload.js";

/// Inputs for one HTML document.
pub(crate) struct PageView<'a> {
    pub title: &'a str,
    pub url: &'a str,
    pub body: &'a str,
    pub navigation: &'a [NavItem],
    pub breadcrumbs: &'a [BreadcrumbItem],
    pub live_reload: bool,
}

/// Render a complete HTML document.
pub(crate) fn render_page(view: &PageView<'_>) -> String {
    let mut html = String::with_capacity(view.body.len() + 1024);
    let title = escape_html(view.title);

    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n\
         <meta charset=\"utf-8\">\n<title>{title}</title>\n"
    );
    if view.live_reload {
        push_live_reload(&mut html, view.url);
    }
    html.push_str("</head>\n<body>\n");

    if !view.navigation.is_empty() {
        html.push_str("<nav class=\"quire-nav\">\n");
        push_nav_list(&mut html, view.navigation, view.url);
        html.push_str("</nav>\n");
    }

    html.push_str("<main>\n");
    if !view.breadcrumbs.is_empty() {
        html.push_str("<ol class=\"quire-breadcrumbs\">\n");
        for crumb in view.breadcrumbs {
            let _ = writeln!(
                html,
                "<li><a href=\"{}\">{}</a></li>",
                escape_html(&crumb.url),
                escape_html(&crumb.title)
            );
        }
        html.push_str("</ol>\n");
    }
    html.push_str("<article>\n");
    html.push_str(view.body);
    html.push_str("</article>\n</main>\n</body>\n</html>\n");
    html
}

/// Render the page shown in place of content when a render fails.
#[must_use]
pub fn render_error_page(url: &str, message: &str, live_reload: bool) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n\
         <meta charset=\"utf-8\">\n<title>Render error</title>\n",
    );
    if live_reload {
        push_live_reload(&mut html, url);
    }
    let _ = write!(
        html,
        "</head>\n<body>\n<main>\n<h1>Render error</h1>\n\
         <pre class=\"quire-error\">{}</pre>\n</main>\n</body>\n</html>\n",
        escape_html(message)
    );
    html
}

fn push_live_reload(html: &mut String, url: &str) {
    let _ = writeln!(
        html,
        "<script src=\"{LIVE_RELOAD_SCRIPT}\" data-path=\"{}\" defer></script>",
        escape_html(url)
    );
}

fn push_nav_list(html: &mut String, items: &[NavItem], current: &str) {
    html.push_str("<ul>\n");
    for item in items {
        let aria = if item.url == current {
            " aria-current=\"page\""
        } else {
            ""
        };
        let _ = write!(
            html,
            "<li><a href=\"{}\"{aria}>{}</a>",
            escape_html(&item.url),
            escape_html(&item.title)
        );
        if !item.children.is_empty() {
            html.push('\n');
            push_nav_list(html, &item.children, current);
        }
        html.push_str("</li>\n");
    }
    html.push_str("</ul>\n");
}

/// Escape HTML special characters.
#[must_use]
pub(crate) fn escape_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(c),
        }
    }
    result
}

/// Convert a slug (kebab-case or `snake_case`) to title case.
pub(crate) fn titlecase_from_slug(slug: &str) -> String {
    let mut result = String::with_capacity(slug.len());
    for word in slug.split(['-', '_', ' ']).filter(|w| !w.is_empty()) {
        if !result.is_empty() {
            result.push(' ');
        }
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            result.extend(first.to_uppercase());
            result.push_str(chars.as_str());
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn nav() -> Vec<NavItem> {
        vec![NavItem {
            title: "Guide".to_owned(),
            url: "/guide".to_owned(),
            source: PathBuf::from("guide/index.md"),
            children: vec![NavItem {
                title: "Setup & Run".to_owned(),
                url: "/guide/setup".to_owned(),
                source: PathBuf::from("guide/setup.md"),
                children: Vec::new(),
            }],
        }]
    }

    #[test]
    fn test_render_page_marks_current_and_escapes() {
        let navigation = nav();
        let html = render_page(&PageView {
            title: "Setup & Run",
            url: "/guide/setup",
            body: "<p>Hi</p>\n",
            navigation: &navigation,
            breadcrumbs: &[],
            live_reload: false,
        });

        assert!(html.contains("<title>Setup &amp; Run</title>"));
        assert!(
            html.contains("<a href=\"/guide/setup\" aria-current=\"page\">Setup &amp; Run</a>")
        );
        assert!(html.contains("<a href=\"/guide\">Guide</a>"));
        assert!(!html.contains(LIVE_RELOAD_SCRIPT));
    }

    #[test]
    fn test_render_page_live_reload() {
        let html = render_page(&PageView {
            title: "T",
            url: "/a",
            body: "",
            navigation: &[],
            breadcrumbs: &[],
            live_reload: true,
        });

        assert!(html.contains("src=\"/@quire/live-reload.js\" data-path=\"/a\""));
        assert!(!html.contains("quire-nav"));
    }

    #[test]
    fn test_render_page_breadcrumbs() {
        let crumbs = [BreadcrumbItem {
            title: "Guide".to_owned(),
            url: "/guide".to_owned(),
        }];
        let html = render_page(&PageView {
            title: "Setup",
            url: "/guide/setup",
            body: "",
            navigation: &[],
            breadcrumbs: &crumbs,
            live_reload: false,
        });

        assert!(
            html.contains("<ol class=\"quire-breadcrumbs\">\n<li><a href=\"/guide\">Guide</a></li>")
        );
    }

    #[test]
    fn test_error_page_escapes_message() {
        let html = render_error_page("/a", "bad <tag>", true);

        assert!(html.contains("bad &lt;tag&gt;"));
        assert!(html.contains(LIVE_RELOAD_SCRIPT));
    }

    #[test]
    fn test_titlecase_from_slug() {
        assert_eq!(titlecase_from_slug("setup-guide"), "Setup Guide");
        assert_eq!(titlecase_from_slug("my_page"), "My Page");
        assert_eq!(titlecase_from_slug(""), "");
    }
}
