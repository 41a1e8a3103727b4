//! Page conversion: storage-format body to final Markdown.
//!
//! Pipeline per page: parse → macro normalization → generic HTML→Markdown
//! (the `htmd` converter) → placeholder-link rewrite. The rewrite must run
//! after Markdown generation: it replaces target paths inside already-formed
//! Markdown link syntax, never raw markup.
//!
//! Converting the same body twice against the same [`PathTable`] yields
//! byte-identical Markdown; a re-run after an interruption produces no
//! spurious diffs.

use std::sync::LazyLock;

use htmd::HtmlToMarkdown;
use percent_encoding::percent_decode_str;
use regex::{Captures, Regex};

use crate::error::ConvertError;
use crate::normalize::{self, BodyRef, PLACEHOLDER_SCHEME};
use crate::report::UnresolvedReference;
use crate::resolver::PathTable;
use crate::source::PageMeta;
use crate::xml::StorageParser;

/// Placeholder URLs as they appear inside generated Markdown link targets.
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"{PLACEHOLDER_SCHEME}(page|title|attachment)/([^\s)]*)"
    ))
    .expect("invalid placeholder regex")
});

/// Trailing whitespace on any line.
static TRAILING_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)[ \t]+$").expect("invalid trailing-ws regex"));

/// Three or more consecutive newlines.
static EXTRA_BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("invalid blank-line regex"));

/// Result of converting one page.
#[derive(Debug)]
pub struct Conversion {
    /// Final Markdown text.
    pub markdown: String,
    /// References degraded to external links.
    pub unresolved: Vec<UnresolvedReference>,
}

/// Converts page bodies to Markdown using the resolver's path table.
pub struct PageConverter {
    parser: StorageParser,
    markup: HtmlToMarkdown,
}

impl PageConverter {
    /// Create a converter with the standard markup configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            parser: StorageParser::new(),
            markup: HtmlToMarkdown::builder()
                .skip_tags(vec!["script", "style", "head", "meta", "noscript"])
                .build(),
        }
    }

    /// Convert one page body.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError`] if the body cannot be parsed or the generic
    /// Markdown conversion fails. Both are per-page conditions; macro-level
    /// problems degrade inside the output instead of erroring.
    pub fn convert(
        &self,
        page: &PageMeta,
        body: &str,
        table: &PathTable,
    ) -> Result<Conversion, ConvertError> {
        let tree = self.parser.parse(body)?;
        let normalized = normalize::normalize(&tree);

        let markdown = self
            .markup
            .convert(&normalized.html)
            .map_err(|e| ConvertError::Markdown(e.to_string()))?;

        let markdown = unescape(&markdown);
        let (markdown, unresolved) = rewrite_placeholders(&markdown, page, table);

        let markdown = tidy(&format!("# {}\n\n{}", page.title, markdown));
        Ok(Conversion {
            markdown,
            unresolved,
        })
    }
}

impl Default for PageConverter {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace every `confluence://` placeholder with a resolved relative path,
/// or with a marked external link when the target is outside the export.
fn rewrite_placeholders(
    markdown: &str,
    page: &PageMeta,
    table: &PathTable,
) -> (String, Vec<UnresolvedReference>) {
    let mut unresolved = Vec::new();

    let rewritten = PLACEHOLDER.replace_all(markdown, |caps: &Captures| {
        let kind = &caps[1];
        let rest = &caps[2];
        match kind {
            "page" => table.resolve_page(&page.id, rest).unwrap_or_else(|| {
                unresolved.push(reference(page, &BodyRef::PageId(rest.to_owned())));
                degraded(table.fallback_page_url(rest))
            }),
            "title" => {
                let (space, title) = split_title_segments(rest);
                table
                    .resolve_title(&page.id, space.as_deref(), &title)
                    .unwrap_or_else(|| {
                        unresolved.push(reference(
                            page,
                            &BodyRef::PageTitle {
                                space: space.clone(),
                                title: title.clone(),
                            },
                        ));
                        degraded(table.fallback_title_url(space.as_deref(), &title))
                    })
            }
            _ => {
                let filename = decode_segment(rest);
                table
                    .resolve_attachment(&page.id, &page.id, &filename)
                    .unwrap_or_else(|| {
                        unresolved.push(reference(
                            page,
                            &BodyRef::Attachment {
                                filename: filename.clone(),
                            },
                        ));
                        degraded(table.fallback_attachment_url(&page.id, &filename))
                    })
            }
        }
    });

    (rewritten.into_owned(), unresolved)
}

/// External-link degradation: the link title marks the failure in the
/// rendered output without breaking the link itself.
fn degraded(url: String) -> String {
    format!("{url} \"not exported\"")
}

fn reference(page: &PageMeta, body_ref: &BodyRef) -> UnresolvedReference {
    UnresolvedReference {
        page_id: page.id.clone(),
        page_title: page.title.clone(),
        reference: body_ref.describe(),
    }
}

/// Split a `title` placeholder's `{space}/{title}` segments.
fn split_title_segments(rest: &str) -> (Option<String>, String) {
    match rest.split_once('/') {
        Some((space, title)) => {
            let space = decode_segment(space);
            let space = if space.is_empty() { None } else { Some(space) };
            (space, decode_segment(title))
        }
        None => (None, decode_segment(rest)),
    }
}

fn decode_segment(segment: &str) -> String {
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}

/// The generic converter escapes Markdown-meaningful characters in ordinary
/// text. Wiki bodies almost never mean them as literals, so the common
/// escapes are undone.
fn unescape(markdown: &str) -> String {
    markdown
        .replace("\\[", "[")
        .replace("\\]", "]")
        .replace("\\*", "*")
        .replace("\\_", "_")
        .replace("\\`", "`")
        .replace("\\#", "#")
        .replace("\\>", ">")
        .replace("\\-", "-")
}

/// Whitespace cleanup: drop trailing spaces, collapse blank-line runs, end
/// with exactly one newline.
fn tidy(markdown: &str) -> String {
    let trimmed = TRAILING_WS.replace_all(markdown, "");
    let collapsed = EXTRA_BLANK_LINES.replace_all(&trimmed, "\n\n");
    let mut out = collapsed.trim().to_owned();
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::source::{AttachmentMeta, PageMeta};
    use crate::tree::PageTree;

    fn meta(id: &str, title: &str, parent: Option<&str>) -> PageMeta {
        PageMeta {
            id: id.to_owned(),
            title: title.to_owned(),
            parent_id: parent.map(str::to_owned),
        }
    }

    fn table_with_attachment() -> PathTable {
        let tree = PageTree::build(vec![
            meta("1", "Home", None),
            meta("2", "Guide", Some("1")),
            meta("3", "Reference", Some("1")),
        ])
        .unwrap();
        let mut attachments = HashMap::new();
        attachments.insert(
            "2".to_owned(),
            vec![AttachmentMeta {
                id: "10".to_owned(),
                page_id: "2".to_owned(),
                filename: "diagram.png".to_owned(),
                media_type: "image/png".to_owned(),
                download_link: None,
            }],
        );
        PathTable::build(&tree, &attachments, "DOCS", Some("https://wiki.example.com"))
    }

    #[test]
    fn test_convert_heading_and_emphasis() {
        let table = table_with_attachment();
        let page = meta("3", "Reference", Some("1"));
        let converter = PageConverter::new();

        let out = converter
            .convert(&page, "<h2>Usage</h2><p><strong>Bold</strong> text</p>", &table)
            .unwrap();

        assert!(out.markdown.starts_with("# Reference\n"));
        assert!(out.markdown.contains("## Usage"));
        assert!(out.markdown.contains("**Bold** text"));
        assert!(out.unresolved.is_empty());
    }

    #[test]
    fn test_convert_rewrites_title_link() {
        let table = table_with_attachment();
        let page = meta("3", "Reference", Some("1"));
        let converter = PageConverter::new();

        let body = r#"<p>See <ac:link><ri:page ri:content-title="Guide" /></ac:link>.</p>"#;
        let out = converter.convert(&page, body, &table).unwrap();

        assert!(
            out.markdown.contains("[Guide](guide/index.md)"),
            "got: {}",
            out.markdown
        );
        assert!(out.unresolved.is_empty());
    }

    #[test]
    fn test_convert_rewrites_attachment_embed() {
        let table = table_with_attachment();
        let page = meta("2", "Guide", Some("1"));
        let converter = PageConverter::new();

        let body = r#"<p>Diagram:</p><ac:image><ri:attachment ri:filename="diagram.png" /></ac:image>"#;
        let out = converter.convert(&page, body, &table).unwrap();

        assert!(
            out.markdown.contains("![diagram.png](attachments/diagram.png)"),
            "got: {}",
            out.markdown
        );
        assert!(out.unresolved.is_empty());
    }

    #[test]
    fn test_dangling_page_id_degrades_and_is_recorded() {
        let table = table_with_attachment();
        let page = meta("3", "Reference", Some("1"));
        let converter = PageConverter::new();

        let body = r#"<p><a href="https://wiki.example.com/pages/viewpage.action?pageId=999">gone</a></p>"#;
        let out = converter.convert(&page, body, &table).unwrap();

        assert!(
            out.markdown.contains(
                "[gone](https://wiki.example.com/pages/viewpage.action?pageId=999 \"not exported\")"
            ),
            "got: {}",
            out.markdown
        );
        assert_eq!(out.unresolved.len(), 1);
        assert_eq!(out.unresolved[0].page_id, "3");
        assert_eq!(out.unresolved[0].reference, "page id 999");
    }

    #[test]
    fn test_unknown_macro_marker_survives_conversion() {
        let table = table_with_attachment();
        let page = meta("3", "Reference", Some("1"));
        let converter = PageConverter::new();

        let body = r#"<p>Widget:</p><ac:structured-macro ac:name="foo-widget"></ac:structured-macro>"#;
        let out = converter.convert(&page, body, &table).unwrap();

        assert!(
            out.markdown.contains("`unsupported macro: foo-widget`"),
            "got: {}",
            out.markdown
        );
    }

    #[test]
    fn test_code_macro_becomes_fenced_block() {
        let table = table_with_attachment();
        let page = meta("3", "Reference", Some("1"));
        let converter = PageConverter::new();

        let body = r#"<ac:structured-macro ac:name="code"><ac:parameter ac:name="language">rust</ac:parameter><ac:plain-text-body><![CDATA[fn main() {}]]></ac:plain-text-body></ac:structured-macro>"#;
        let out = converter.convert(&page, body, &table).unwrap();

        assert!(
            out.markdown.contains("```rust\nfn main() {}\n```"),
            "got: {}",
            out.markdown
        );
    }

    #[test]
    fn test_task_markers_survive_unescaped() {
        let table = table_with_attachment();
        let page = meta("3", "Reference", Some("1"));
        let converter = PageConverter::new();

        let body = r#"<ac:task-list><ac:task><ac:task-status>complete</ac:task-status><ac:task-body>Ship it</ac:task-body></ac:task></ac:task-list>"#;
        let out = converter.convert(&page, body, &table).unwrap();

        assert!(out.markdown.contains("[x] Ship it"), "got: {}", out.markdown);
    }

    #[test]
    fn test_convert_is_idempotent() {
        let table = table_with_attachment();
        let page = meta("2", "Guide", Some("1"));
        let converter = PageConverter::new();

        let body = r#"<h2>Section</h2><p>See <ac:link><ri:page ri:content-title="Reference" /></ac:link></p><ac:image><ri:attachment ri:filename="diagram.png" /></ac:image>"#;
        let first = converter.convert(&page, body, &table).unwrap();
        let second = converter.convert(&page, body, &table).unwrap();

        assert_eq!(first.markdown, second.markdown);
    }

    #[test]
    fn test_malformed_body_is_error() {
        let table = table_with_attachment();
        let page = meta("3", "Reference", Some("1"));
        let converter = PageConverter::new();

        let err = converter.convert(&page, "<p>unclosed <x", &table).unwrap_err();
        assert!(matches!(err, ConvertError::Parse(_)));
    }

    #[test]
    fn test_tidy_output_shape() {
        let table = table_with_attachment();
        let page = meta("3", "Reference", Some("1"));
        let converter = PageConverter::new();

        let out = converter
            .convert(&page, "<p>One</p><p>Two</p>", &table)
            .unwrap();

        assert!(out.markdown.ends_with('\n'));
        assert!(!out.markdown.ends_with("\n\n"));
        assert!(!out.markdown.contains("\n\n\n"));
    }
}
