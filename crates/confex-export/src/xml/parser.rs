//! Storage-format XHTML parser with namespace support.

#![allow(clippy::unused_self)] // Unit struct methods have &self for API consistency

use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use super::node::HtmlNode;
use crate::error::XmlError;

/// Confluence XML namespaces.
const NAMESPACES: &[(&str, &str)] = &[
    ("ac", "http://www.atlassian.com/schema/confluence/4/ac/"),
    ("ri", "http://www.atlassian.com/schema/confluence/4/ri/"),
];

/// Parse storage-format XHTML into an [`HtmlNode`] tree.
pub struct StorageParser;

impl StorageParser {
    /// Create a new parser.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Parse a storage-format body into a tree rooted at a synthetic node.
    ///
    /// Adds namespace declarations for the `ac:` and `ri:` prefixes so the
    /// fragment parses as well-formed XML.
    ///
    /// # Errors
    ///
    /// Returns an error if the body cannot be parsed as XML.
    pub fn parse(&self, body: &str) -> Result<HtmlNode, XmlError> {
        // Add namespace declarations to a synthetic root
        let namespace_decls = NAMESPACES
            .iter()
            .map(|(prefix, uri)| format!(r#"xmlns:{prefix}="{uri}""#))
            .collect::<Vec<_>>()
            .join(" ");
        let wrapped = format!("<root {namespace_decls}>{body}</root>");

        let mut reader = Reader::from_str(&wrapped);
        reader.config_mut().trim_text(false);

        self.parse_element(&mut reader)
    }

    fn parse_element<R: BufRead>(&self, reader: &mut Reader<R>) -> Result<HtmlNode, XmlError> {
        let mut buf = Vec::new();
        let mut node = HtmlNode::default();
        let mut first_element = true;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => {
                    if first_element {
                        // This is the synthetic root element
                        node.tag = self.decode_tag(reader, &e);
                        first_element = false;
                    } else {
                        let child_tag = self.decode_tag(reader, &e);
                        let child_attrs = self.decode_attrs(reader, &e);
                        let mut child = self.parse_children(reader, &child_tag)?;
                        child.tag = child_tag;
                        child.attrs = child_attrs;
                        node.children.push(child);
                    }
                }
                Event::Empty(e) => {
                    if first_element {
                        node.tag = self.decode_tag(reader, &e);
                        return Ok(node);
                    }
                    let child = HtmlNode {
                        tag: self.decode_tag(reader, &e),
                        attrs: self.decode_attrs(reader, &e),
                        ..Default::default()
                    };
                    node.children.push(child);
                }
                Event::Text(e) => {
                    if first_element {
                        continue;
                    }
                    let text = reader.decoder().decode(&e)?.into_owned();
                    append_text(&mut node, &text);
                }
                Event::GeneralRef(e) => {
                    if first_element {
                        continue;
                    }
                    let entity = reader.decoder().decode(&e)?.into_owned();
                    let text = decode_entity(&entity);
                    append_text(&mut node, &text);
                }
                Event::CData(e) => {
                    if first_element {
                        continue;
                    }
                    let text = String::from_utf8_lossy(&e).into_owned();
                    append_text(&mut node, &text);
                }
                Event::End(_) | Event::Eof => {
                    return Ok(node);
                }
                Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {
                    // Ignore these
                }
            }
            buf.clear();
        }
    }

    fn parse_children<R: BufRead>(
        &self,
        reader: &mut Reader<R>,
        parent_tag: &str,
    ) -> Result<HtmlNode, XmlError> {
        let mut buf = Vec::new();
        let mut node = HtmlNode::default();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => {
                    let child_tag = self.decode_tag(reader, &e);
                    let child_attrs = self.decode_attrs(reader, &e);
                    let mut child = self.parse_children(reader, &child_tag)?;
                    child.tag = child_tag;
                    child.attrs = child_attrs;
                    node.children.push(child);
                }
                Event::Empty(e) => {
                    let child = HtmlNode {
                        tag: self.decode_tag(reader, &e),
                        attrs: self.decode_attrs(reader, &e),
                        ..Default::default()
                    };
                    node.children.push(child);
                }
                Event::Text(e) => {
                    let text = reader.decoder().decode(&e)?.into_owned();
                    append_text(&mut node, &text);
                }
                Event::GeneralRef(e) => {
                    let entity = reader.decoder().decode(&e)?.into_owned();
                    let text = decode_entity(&entity);
                    append_text(&mut node, &text);
                }
                Event::CData(e) => {
                    let text = String::from_utf8_lossy(&e).into_owned();
                    append_text(&mut node, &text);
                }
                Event::End(e) => {
                    let end_tag = self.decode_tag_from_bytes(reader, e.name().as_ref());
                    if end_tag == parent_tag {
                        return Ok(node);
                    }
                    // Mismatched end tag - continue
                }
                Event::Eof => {
                    return Ok(node);
                }
                Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
            }
            buf.clear();
        }
    }

    fn decode_tag<R: BufRead>(&self, reader: &Reader<R>, e: &BytesStart) -> String {
        self.decode_tag_from_bytes(reader, e.name().as_ref())
    }

    fn decode_tag_from_bytes<R: BufRead>(&self, reader: &Reader<R>, name: &[u8]) -> String {
        reader.decoder().decode(name).map_or_else(
            |_| String::from_utf8_lossy(name).into_owned(),
            std::borrow::Cow::into_owned,
        )
    }

    fn decode_attrs<R: BufRead>(
        &self,
        reader: &Reader<R>,
        e: &BytesStart,
    ) -> Vec<(String, String)> {
        let mut attrs = Vec::new();
        for attr in e.attributes().flatten() {
            let key = reader.decoder().decode(attr.key.as_ref()).map_or_else(
                |_| String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
                std::borrow::Cow::into_owned,
            );

            // Skip namespace declarations
            if key.starts_with("xmlns") {
                continue;
            }

            let value = attr.unescape_value().map_or_else(
                |_| String::from_utf8_lossy(&attr.value).into_owned(),
                std::borrow::Cow::into_owned,
            );

            attrs.push((key, value));
        }
        attrs
    }
}

impl Default for StorageParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Append text to node's text or last child's tail.
fn append_text(node: &mut HtmlNode, text: &str) {
    if let Some(last_child) = node.children.last_mut() {
        last_child.tail.push_str(text);
    } else {
        node.text.push_str(text);
    }
}

/// Decode XML entity references to their character values.
///
/// Storage bodies carry HTML named entities the XML reader does not know;
/// the common ones are mapped here, the rest are preserved literally.
fn decode_entity(entity: &str) -> String {
    match entity {
        "lt" => "<".to_owned(),
        "gt" => ">".to_owned(),
        "amp" => "&".to_owned(),
        "apos" => "'".to_owned(),
        "quot" => "\"".to_owned(),
        "nbsp" => "\u{00a0}".to_owned(),
        "ndash" => "\u{2013}".to_owned(),
        "mdash" => "\u{2014}".to_owned(),
        "lsquo" => "\u{2018}".to_owned(),
        "rsquo" => "\u{2019}".to_owned(),
        "ldquo" => "\u{201c}".to_owned(),
        "rdquo" => "\u{201d}".to_owned(),
        "hellip" => "\u{2026}".to_owned(),
        "bull" => "\u{2022}".to_owned(),
        "middot" => "\u{00b7}".to_owned(),
        "times" => "\u{00d7}".to_owned(),
        "copy" => "\u{00a9}".to_owned(),
        "reg" => "\u{00ae}".to_owned(),
        "trade" => "\u{2122}".to_owned(),
        "larr" => "\u{2190}".to_owned(),
        "rarr" => "\u{2192}".to_owned(),
        // Numeric character references
        s if s.starts_with('#') => {
            let code = if s.starts_with("#x") || s.starts_with("#X") {
                u32::from_str_radix(&s[2..], 16).ok()
            } else {
                s[1..].parse::<u32>().ok()
            };
            code.and_then(char::from_u32)
                .map_or_else(|| format!("&{entity};"), |c| c.to_string())
        }
        // Unknown entity - preserve as-is
        _ => format!("&{entity};"),
    }
}
