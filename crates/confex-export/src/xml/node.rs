//! Tree node representation for storage-format XHTML.

/// Node in a parsed XHTML tree.
///
/// Attributes are kept as a vector in source order so that serialization is
/// deterministic; the exporter's idempotence guarantee depends on it.
#[derive(Debug, Clone, Default)]
pub struct HtmlNode {
    /// Element tag name (may include an `ac:`/`ri:` namespace prefix).
    pub tag: String,
    /// Direct text content.
    pub text: String,
    /// Text after the element (XML tail).
    pub tail: String,
    /// Element attributes in source order.
    pub attrs: Vec<(String, String)>,
    /// Child nodes.
    pub children: Vec<HtmlNode>,
}

impl HtmlNode {
    /// Create a new node with the given tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// Set text content.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set tail content.
    #[must_use]
    pub fn with_tail(mut self, tail: impl Into<String>) -> Self {
        self.tail = tail.into();
        self
    }

    /// Add an attribute.
    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    /// Set children.
    #[must_use]
    pub fn with_children(mut self, children: Vec<HtmlNode>) -> Self {
        self.children = children;
        self
    }

    /// Look up an attribute value by name.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First child with the given tag.
    #[must_use]
    pub fn child(&self, tag: &str) -> Option<&HtmlNode> {
        self.children.iter().find(|c| c.tag == tag)
    }

    /// Concatenated text of this node and all descendants, tails included.
    #[must_use]
    pub fn deep_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        out.push_str(&self.text);
        for child in &self.children {
            child.collect_text(out);
            out.push_str(&child.tail);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_lookup() {
        let node = HtmlNode::new("ac:parameter")
            .with_attr("ac:name", "language")
            .with_text("rust");

        assert_eq!(node.attr("ac:name"), Some("language"));
        assert!(node.attr("ac:missing").is_none());
    }

    #[test]
    fn test_deep_text() {
        let strong = HtmlNode::new("strong").with_text("Bold").with_tail(" text");
        let p = HtmlNode::new("p")
            .with_text("A ")
            .with_children(vec![strong]);

        assert_eq!(p.deep_text(), "A Bold text");
    }

    #[test]
    fn test_child_by_tag() {
        let body = HtmlNode::new("ac:plain-text-body").with_text("code here");
        let node = HtmlNode::new("ac:structured-macro").with_children(vec![body]);

        assert_eq!(
            node.child("ac:plain-text-body").map(|c| c.text.as_str()),
            Some("code here")
        );
        assert!(node.child("ac:rich-text-body").is_none());
    }
}
