//! HTML serializer for normalized node trees.

use std::fmt::Write;

use super::node::HtmlNode;

/// Elements serialized in self-closing form.
const VOID_ELEMENTS: &[&str] = &["br", "hr", "img"];

/// Serialize the children of a (synthetic) root node to an HTML string.
///
/// Attribute order follows the node's attribute vector, so output is
/// deterministic for a given tree.
#[must_use]
pub fn serialize_children(root: &HtmlNode) -> String {
    let mut out = String::with_capacity(4096);
    if !root.text.is_empty() {
        out.push_str(&escape_text(&root.text));
    }
    for child in &root.children {
        serialize_node(child, &mut out);
    }
    out
}

/// Serialize a single node recursively.
fn serialize_node(node: &HtmlNode, out: &mut String) {
    out.push('<');
    out.push_str(&node.tag);

    for (key, value) in &node.attrs {
        write!(out, r#" {}="{}""#, key, escape_attr(value)).unwrap();
    }

    if VOID_ELEMENTS.contains(&node.tag.as_str()) {
        out.push_str(" />");
    } else {
        out.push('>');

        if !node.text.is_empty() {
            out.push_str(&escape_text(&node.text));
        }

        for child in &node.children {
            serialize_node(child, out);
        }

        write!(out, "</{}>", node.tag).unwrap();
    }

    if !node.tail.is_empty() {
        out.push_str(&escape_text(&node.tail));
    }
}

/// Escape text for HTML content.
fn escape_text(text: &str) -> String {
    escape_html(text, false)
}

/// Escape text for HTML attribute values.
fn escape_attr(text: &str) -> String {
    escape_html(text, true)
}

/// Escape HTML special characters.
fn escape_html(text: &str, escape_quotes: bool) -> String {
    let mut result = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' if escape_quotes => result.push_str("&quot;"),
            '\'' if escape_quotes => result.push_str("&#39;"),
            _ => result.push(ch),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_simple_element() {
        let root =
            HtmlNode::new("root").with_children(vec![HtmlNode::new("p").with_text("Hello")]);

        assert_eq!(serialize_children(&root), "<p>Hello</p>");
    }

    #[test]
    fn test_serialize_with_children_and_tail() {
        let strong = HtmlNode::new("strong").with_text("Bold").with_tail(" text");
        let p = HtmlNode::new("p").with_children(vec![strong]);
        let root = HtmlNode::new("root").with_children(vec![p]);

        assert_eq!(serialize_children(&root), "<p><strong>Bold</strong> text</p>");
    }

    #[test]
    fn test_serialize_void_elements() {
        let br = HtmlNode::new("br").with_tail("After");
        let p = HtmlNode::new("p").with_text("Before").with_children(vec![br]);
        let root = HtmlNode::new("root").with_children(vec![p]);

        assert_eq!(serialize_children(&root), "<p>Before<br />After</p>");
    }

    #[test]
    fn test_serialize_empty_non_void_keeps_close_tag() {
        let root = HtmlNode::new("root")
            .with_children(vec![HtmlNode::new("a").with_attr("href", "x")]);

        assert_eq!(serialize_children(&root), r#"<a href="x"></a>"#);
    }

    #[test]
    fn test_escape_special_chars() {
        let p = HtmlNode::new("p").with_text("a < b & c > d");
        let root = HtmlNode::new("root").with_children(vec![p]);

        assert_eq!(serialize_children(&root), "<p>a &lt; b &amp; c &gt; d</p>");
    }

    #[test]
    fn test_escape_attr_quotes() {
        let img = HtmlNode::new("img").with_attr("alt", r#"say "hi""#);
        let root = HtmlNode::new("root").with_children(vec![img]);

        assert_eq!(
            serialize_children(&root),
            r#"<img alt="say &quot;hi&quot;" />"#
        );
    }
}
