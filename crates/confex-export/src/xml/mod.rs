//! Storage-format XHTML parsing and HTML serialization.
//!
//! Confluence bodies arrive as XHTML fragments with `ac:`/`ri:` namespaced
//! elements. This module parses them into an owned [`HtmlNode`] tree the
//! macro normalizer can rewrite, and serializes rewritten trees back to the
//! plain HTML the generic Markdown converter understands.

mod node;
mod parser;
mod serializer;

pub use node::HtmlNode;
pub use parser::StorageParser;
pub use serializer::serialize_children;
