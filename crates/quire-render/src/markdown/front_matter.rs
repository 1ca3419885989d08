//! YAML front matter.

use serde::Deserialize;

/// Recognised front matter fields. Unknown fields are ignored.
#[derive(Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub(crate) struct FrontMatter {
    pub title: Option<String>,
    pub order: Option<i64>,
    pub parent: Option<String>,
}

/// Split a `---` delimited header from the body.
///
/// Returns `(None, content)` when the document has no complete header.
pub(crate) fn split(content: &str) -> (Option<&str>, &str) {
    let Some(rest) = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
    else {
        return (None, content);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return (Some(&rest[..offset]), &rest[offset + line.len()..]);
        }
        offset += line.len();
    }
    (None, content)
}

/// Parse a header. Blank headers yield defaults.
pub(crate) fn parse(header: &str) -> Result<FrontMatter, serde_yaml::Error> {
    if header.trim().is_empty() {
        return Ok(FrontMatter::default());
    }
    serde_yaml::from_str(header)
}
