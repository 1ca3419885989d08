//! Colored terminal output.

use console::{Style, Term};
use quire_engine::BuildSummary;

/// Human-facing messages on stderr. Logs go through `tracing`.
pub(crate) struct Output {
    term: Term,
    green: Style,
    yellow: Style,
    red: Style,
    cyan_bold: Style,
}

impl Output {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            green: Style::new().green(),
            yellow: Style::new().yellow(),
            red: Style::new().red(),
            cyan_bold: Style::new().cyan().bold(),
        }
    }

    pub(crate) fn info(&self, msg: &str) {
        self.line(msg, None);
    }

    pub(crate) fn success(&self, msg: &str) {
        self.line(msg, Some(&self.green));
    }

    pub(crate) fn warning(&self, msg: &str) {
        self.line(msg, Some(&self.yellow));
    }

    pub(crate) fn error(&self, msg: &str) {
        self.line(msg, Some(&self.red));
    }

    pub(crate) fn highlight(&self, msg: &str) {
        self.line(msg, Some(&self.cyan_bold));
    }

    /// Report a finished build: one warning per failed page, then a summary.
    pub(crate) fn build_report(&self, summary: &BuildSummary) {
        for page in &summary.failed {
            self.warning(&format!("Failed: {}", page.display()));
        }
        let msg = format!(
            "Rendered {} page(s) in {} pass(es)",
            summary.rendered, summary.passes
        );
        if summary.failed.is_empty() {
            self.success(&msg);
        } else {
            self.warning(&msg);
        }
    }

    fn line(&self, msg: &str, style: Option<&Style>) {
        // Nothing useful to do if stderr is gone
        let _ = match style {
            Some(style) => self.term.write_line(&style.apply_to(msg).to_string()),
            None => self.term.write_line(msg),
        };
    }
}
