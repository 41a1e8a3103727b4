//! Macro normalization: storage-format specifics to plain HTML.
//!
//! Confluence bodies mix plain XHTML with `ac:`/`ri:` macros the generic
//! HTML→Markdown converter knows nothing about. This pass runs first and
//! rewrites every macro into ordinary markup: fenced-code-friendly
//! `<pre><code>`, blockquote panels, placeholder links for intra-wiki
//! references. Unsupported macros degrade to a visible inline-code marker,
//! never to silence.
//!
//! Intra-wiki references cannot be resolved here (resolution needs the
//! referencing page's final location), so they become `confluence://`
//! placeholder URLs the converter rewrites after Markdown generation, and
//! each one is collected as a [`BodyRef`].

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::xml::{HtmlNode, serialize_children};

/// Scheme of placeholder URLs produced here and rewritten by the converter.
pub const PLACEHOLDER_SCHEME: &str = "confluence://";

/// Percent-encoding set for placeholder URL segments. Everything outside
/// the unreserved set is encoded so titles survive Markdown link syntax.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// An intra-wiki reference discovered in a page body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyRef {
    /// Reference by page id.
    PageId(String),
    /// Reference by page title, optionally scoped to a space.
    PageTitle {
        /// Space key, `None` for the current space.
        space: Option<String>,
        /// Target page title.
        title: String,
    },
    /// Reference to an attachment of the current page.
    Attachment {
        /// Attachment filename as written in the macro.
        filename: String,
    },
}

impl BodyRef {
    /// Human-readable reference text for the export report.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::PageId(id) => format!("page id {id}"),
            Self::PageTitle {
                space: Some(space),
                title,
            } => format!("page '{title}' in space {space}"),
            Self::PageTitle { space: None, title } => format!("page '{title}'"),
            Self::Attachment { filename } => format!("attachment '{filename}'"),
        }
    }
}

/// Result of normalizing one page body.
#[derive(Debug)]
pub struct NormalizedBody {
    /// Plain HTML, free of `ac:`/`ri:` elements.
    pub html: String,
    /// Intra-wiki references in document order.
    pub refs: Vec<BodyRef>,
}

/// The closed set of macro kinds this pass understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MacroKind {
    CodeBlock,
    Panel,
    Toc,
    AttachmentEmbed,
    PageInclude,
    Unknown,
}

fn macro_kind(name: &str) -> MacroKind {
    match name {
        "code" => MacroKind::CodeBlock,
        "info" | "note" | "warning" | "tip" | "panel" => MacroKind::Panel,
        "toc" => MacroKind::Toc,
        "view-file" | "multimedia" => MacroKind::AttachmentEmbed,
        "include" | "excerpt-include" => MacroKind::PageInclude,
        _ => MacroKind::Unknown,
    }
}

/// Normalize a parsed storage body.
#[must_use]
pub fn normalize(root: &HtmlNode) -> NormalizedBody {
    let mut pass = Normalizer { refs: Vec::new() };
    let rewritten = pass.rewrite_children(root);
    NormalizedBody {
        html: serialize_children(&rewritten),
        refs: pass.refs,
    }
}

struct Normalizer {
    refs: Vec<BodyRef>,
}

impl Normalizer {
    /// Rewrite a node's children, preserving tail text of dropped nodes.
    fn rewrite_children(&mut self, node: &HtmlNode) -> HtmlNode {
        let mut out = HtmlNode {
            tag: node.tag.clone(),
            text: node.text.clone(),
            tail: node.tail.clone(),
            attrs: node.attrs.clone(),
            children: Vec::new(),
        };

        for child in &node.children {
            let mut replacements = self.rewrite_node(child);
            if replacements.is_empty() {
                // Node dropped entirely: keep its tail text
                append_text(&mut out, &child.tail);
            } else {
                if let Some(last) = replacements.last_mut() {
                    last.tail.push_str(&child.tail);
                }
                out.children.append(&mut replacements);
            }
        }
        out
    }

    /// Rewrite one node into zero or more plain-HTML replacements.
    fn rewrite_node(&mut self, node: &HtmlNode) -> Vec<HtmlNode> {
        match node.tag.as_str() {
            "ac:structured-macro" | "ac:macro" => self.rewrite_macro(node),
            "ac:image" => self.rewrite_image(node),
            "ac:link" => self.rewrite_link(node),
            "ac:emoticon" => vec![rewrite_emoticon(node)],
            "ac:task-list" => vec![self.rewrite_task_list(node)],
            "a" => vec![self.rewrite_anchor(node)],
            tag if tag.starts_with("ac:") || tag.starts_with("ri:") => {
                // Structural containers (layouts, rich-text bodies, stray
                // resource identifiers): unwrap so visible content survives
                self.unwrap_children(node)
            }
            _ => vec![self.rewrite_children(node)],
        }
    }

    fn unwrap_children(&mut self, node: &HtmlNode) -> Vec<HtmlNode> {
        let rewritten = self.rewrite_children(node);
        let mut out = Vec::new();
        if !rewritten.text.trim().is_empty() {
            out.push(HtmlNode::new("p").with_text(rewritten.text.clone()));
        }
        out.extend(rewritten.children);
        out
    }

    fn rewrite_macro(&mut self, node: &HtmlNode) -> Vec<HtmlNode> {
        let name = node.attr("ac:name").unwrap_or("");
        match macro_kind(name) {
            MacroKind::CodeBlock => vec![rewrite_code_block(node)],
            MacroKind::Panel => vec![self.rewrite_panel(node, name)],
            MacroKind::Toc => Vec::new(),
            MacroKind::AttachmentEmbed => self.rewrite_attachment_embed(node, name),
            MacroKind::PageInclude => self.rewrite_page_include(node, name),
            MacroKind::Unknown => vec![unsupported_marker(name)],
        }
    }

    /// Panel macros become a blockquote with a leading bold severity label.
    fn rewrite_panel(&mut self, node: &HtmlNode, name: &str) -> HtmlNode {
        let label = macro_param(node, "title").unwrap_or_else(|| capitalize(name));
        let label_node = HtmlNode::new("strong").with_text(format!("{label}:"));

        let mut body_children = node
            .child("ac:rich-text-body")
            .map(|body| self.unwrap_children(body))
            .unwrap_or_default();

        // Merge the label into the first paragraph so the rendered form is
        // "> **Note:** text", falling back to a standalone paragraph.
        let merge = body_children.first().is_some_and(|first| first.tag == "p");
        if merge {
            if let Some(first) = body_children.first_mut() {
                let label_node = label_node.with_tail(format!(" {}", first.text));
                first.text = String::new();
                first.children.insert(0, label_node);
            }
        } else {
            body_children.insert(0, HtmlNode::new("p").with_children(vec![label_node]));
        }

        HtmlNode::new("blockquote").with_children(body_children)
    }

    fn rewrite_attachment_embed(&mut self, node: &HtmlNode, name: &str) -> Vec<HtmlNode> {
        let Some(filename) = embedded_attachment_filename(node) else {
            return vec![unsupported_marker(name)];
        };

        self.refs.push(BodyRef::Attachment {
            filename: filename.clone(),
        });
        let link = HtmlNode::new("a")
            .with_attr("href", attachment_placeholder(&filename))
            .with_text(filename);
        vec![HtmlNode::new("p").with_children(vec![link])]
    }

    /// Included pages cannot be inlined in a static export; link to them.
    fn rewrite_page_include(&mut self, node: &HtmlNode, name: &str) -> Vec<HtmlNode> {
        let Some(page_ref) = find_descendant(node, "ri:page") else {
            return vec![unsupported_marker(name)];
        };
        let Some(title) = page_ref.attr("ri:content-title").map(str::to_owned) else {
            return vec![unsupported_marker(name)];
        };
        let space = page_ref.attr("ri:space-key").map(str::to_owned);

        self.refs.push(BodyRef::PageTitle {
            space: space.clone(),
            title: title.clone(),
        });
        let link = HtmlNode::new("a")
            .with_attr("href", title_placeholder(space.as_deref(), &title))
            .with_text(title);
        vec![HtmlNode::new("p").with_children(vec![link])]
    }

    fn rewrite_image(&mut self, node: &HtmlNode) -> Vec<HtmlNode> {
        let alt = node.attr("ac:alt").map(str::to_owned);

        if let Some(att) = node.child("ri:attachment")
            && let Some(filename) = att.attr("ri:filename")
        {
            self.refs.push(BodyRef::Attachment {
                filename: filename.to_owned(),
            });
            let img = HtmlNode::new("img")
                .with_attr("src", attachment_placeholder(filename))
                .with_attr("alt", alt.unwrap_or_else(|| filename.to_owned()));
            return vec![img];
        }

        if let Some(url) = node.child("ri:url")
            && let Some(value) = url.attr("ri:value")
        {
            let img = HtmlNode::new("img")
                .with_attr("src", value)
                .with_attr("alt", alt.unwrap_or_default());
            return vec![img];
        }

        Vec::new()
    }

    fn rewrite_link(&mut self, node: &HtmlNode) -> Vec<HtmlNode> {
        let body_text = link_body_text(node);

        if let Some(page_ref) = node.child("ri:page")
            && let Some(title) = page_ref.attr("ri:content-title")
        {
            let space = page_ref.attr("ri:space-key").map(str::to_owned);
            self.refs.push(BodyRef::PageTitle {
                space: space.clone(),
                title: title.to_owned(),
            });
            let link = HtmlNode::new("a")
                .with_attr("href", title_placeholder(space.as_deref(), title))
                .with_text(body_text.unwrap_or_else(|| title.to_owned()));
            return vec![link];
        }

        if let Some(att) = node.child("ri:attachment")
            && let Some(filename) = att.attr("ri:filename")
        {
            self.refs.push(BodyRef::Attachment {
                filename: filename.to_owned(),
            });
            let link = HtmlNode::new("a")
                .with_attr("href", attachment_placeholder(filename))
                .with_text(body_text.unwrap_or_else(|| filename.to_owned()));
            return vec![link];
        }

        // User mentions and bare anchors have no target in the export;
        // degrade to their visible text
        let text = body_text.unwrap_or_else(|| node.deep_text().trim().to_owned());
        vec![HtmlNode::new("span").with_text(text)]
    }

    /// Plain HTML anchors may still point into the wiki by page id.
    fn rewrite_anchor(&mut self, node: &HtmlNode) -> HtmlNode {
        let mut rewritten = self.rewrite_children(node);
        if let Some(href) = node.attr("href")
            && let Some(id) = page_id_from_url(href)
        {
            self.refs.push(BodyRef::PageId(id.clone()));
            for (key, value) in &mut rewritten.attrs {
                if key == "href" {
                    *value = page_placeholder(&id);
                }
            }
        }
        rewritten
    }

    fn rewrite_task_list(&mut self, node: &HtmlNode) -> HtmlNode {
        let mut items = Vec::new();
        for task in node.children.iter().filter(|c| c.tag == "ac:task") {
            let complete = task
                .child("ac:task-status")
                .is_some_and(|s| s.deep_text().trim() == "complete");
            let marker = if complete { "[x] " } else { "[ ] " };

            let mut item = HtmlNode::new("li");
            if let Some(body) = task.child("ac:task-body") {
                let rewritten = self.rewrite_children(body);
                item.text = format!("{marker}{}", rewritten.text);
                item.children = rewritten.children;
            } else {
                item.text = marker.to_owned();
            }
            items.push(item);
        }
        HtmlNode::new("ul").with_children(items)
    }
}

/// Code macros become `<pre><code>` so the generic converter emits a fenced
/// block; the language hint survives as a `language-*` class.
fn rewrite_code_block(node: &HtmlNode) -> HtmlNode {
    let body = node
        .child("ac:plain-text-body")
        .map(HtmlNode::deep_text)
        .unwrap_or_default();

    let mut code = HtmlNode::new("code").with_text(body);
    if let Some(language) = macro_param(node, "language") {
        code = code.with_attr("class", format!("language-{language}"));
    }
    HtmlNode::new("pre").with_children(vec![code])
}

fn rewrite_emoticon(node: &HtmlNode) -> HtmlNode {
    let text = node
        .attr("ac:emoji-fallback")
        .map(str::to_owned)
        .or_else(|| node.attr("ac:name").map(|n| format!(":{n}:")))
        .unwrap_or_default();
    HtmlNode::new("span").with_text(text)
}

/// Visible degradation for macros outside the supported set.
fn unsupported_marker(name: &str) -> HtmlNode {
    let name = if name.is_empty() { "unnamed" } else { name };
    HtmlNode::new("code").with_text(format!("unsupported macro: {name}"))
}

/// Value of a macro's `ac:parameter` by name, if non-empty.
fn macro_param(node: &HtmlNode, name: &str) -> Option<String> {
    node.children
        .iter()
        .find(|c| c.tag == "ac:parameter" && c.attr("ac:name") == Some(name))
        .map(|p| p.deep_text().trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Filename of an embedded attachment, from the macro's `name` parameter.
fn embedded_attachment_filename(node: &HtmlNode) -> Option<String> {
    let param = node
        .children
        .iter()
        .find(|c| c.tag == "ac:parameter" && c.attr("ac:name") == Some("name"))?;
    if let Some(att) = find_descendant(param, "ri:attachment") {
        return att.attr("ri:filename").map(str::to_owned);
    }
    let text = param.deep_text().trim().to_owned();
    if text.is_empty() { None } else { Some(text) }
}

/// First descendant with the given tag, depth-first.
fn find_descendant<'a>(node: &'a HtmlNode, tag: &str) -> Option<&'a HtmlNode> {
    for child in &node.children {
        if child.tag == tag {
            return Some(child);
        }
        if let Some(found) = find_descendant(child, tag) {
            return Some(found);
        }
    }
    None
}

/// Link body text from `ac:plain-text-link-body` or `ac:link-body`.
fn link_body_text(node: &HtmlNode) -> Option<String> {
    let body = node
        .child("ac:plain-text-link-body")
        .or_else(|| node.child("ac:link-body"))?;
    let text = body.deep_text().trim().to_owned();
    if text.is_empty() { None } else { Some(text) }
}

/// Extract a numeric page id from a wiki URL, if it carries one.
fn page_id_from_url(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("pageId=")?;
    let id: String = rest.chars().take_while(char::is_ascii_digit).collect();
    if id.is_empty() { None } else { Some(id) }
}

fn append_text(node: &mut HtmlNode, text: &str) {
    if let Some(last) = node.children.last_mut() {
        last.tail.push_str(text);
    } else {
        node.text.push_str(text);
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn page_placeholder(id: &str) -> String {
    format!("{PLACEHOLDER_SCHEME}page/{id}")
}

fn title_placeholder(space: Option<&str>, title: &str) -> String {
    format!(
        "{PLACEHOLDER_SCHEME}title/{}/{}",
        utf8_percent_encode(space.unwrap_or(""), SEGMENT),
        utf8_percent_encode(title, SEGMENT)
    )
}

fn attachment_placeholder(filename: &str) -> String {
    format!(
        "{PLACEHOLDER_SCHEME}attachment/{}",
        utf8_percent_encode(filename, SEGMENT)
    )
}
