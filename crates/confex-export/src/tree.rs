//! Pre-scanned page hierarchy.
//!
//! The tree is an arena of page records indexed by id; child lists hold ids,
//! not references, so a malformed hierarchy cannot produce dangling
//! pointers. Built once from the metadata pre-scan and read-only afterwards.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::error::ExportError;
use crate::source::PageMeta;

/// A page record in the arena.
#[derive(Debug)]
pub struct PageNode {
    /// Pre-scan metadata.
    pub meta: PageMeta,
    /// Child ids in the source's listing order.
    pub children: Vec<String>,
}

/// The space's page hierarchy, indexed by page id.
#[derive(Debug, Default)]
pub struct PageTree {
    nodes: HashMap<String, PageNode>,
    roots: Vec<String>,
    order: Vec<String>,
}

impl PageTree {
    /// Build the arena from the pre-scan listing.
    ///
    /// Pages whose parent id is absent from the listing are promoted to
    /// roots (the parent may be outside the space or restricted).
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::DuplicatePageId`] if an id appears twice, and
    /// [`ExportError::HierarchyCycle`] if the parent edges loop.
    pub fn build(metas: Vec<PageMeta>) -> Result<Self, ExportError> {
        let mut tree = Self::default();

        for meta in &metas {
            if tree.nodes.contains_key(&meta.id) {
                return Err(ExportError::DuplicatePageId {
                    id: meta.id.clone(),
                });
            }
            tree.order.push(meta.id.clone());
            tree.nodes.insert(
                meta.id.clone(),
                PageNode {
                    meta: meta.clone(),
                    children: Vec::new(),
                },
            );
        }

        // Wire parent/child edges in listing order
        for meta in &metas {
            match &meta.parent_id {
                Some(parent_id) if tree.nodes.contains_key(parent_id) => {
                    if let Some(parent) = tree.nodes.get_mut(parent_id) {
                        parent.children.push(meta.id.clone());
                    }
                }
                Some(parent_id) => {
                    warn!(
                        "Page {} ('{}') has parent {} outside the listing, treating as root",
                        meta.id, meta.title, parent_id
                    );
                    tree.roots.push(meta.id.clone());
                }
                None => tree.roots.push(meta.id.clone()),
            }
        }

        tree.validate_acyclic()?;
        Ok(tree)
    }

    /// Every node must be reachable from a root. Each node has at most one
    /// parent, so any unreachable node sits on a parent loop.
    fn validate_acyclic(&self) -> Result<(), ExportError> {
        let mut seen: HashSet<&str> = HashSet::with_capacity(self.nodes.len());
        let mut stack: Vec<&str> = self.roots.iter().map(String::as_str).collect();

        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(node) = self.nodes.get(id) {
                stack.extend(node.children.iter().map(String::as_str));
            }
        }

        if seen.len() < self.nodes.len() {
            // Deterministic pick: first unreachable id in listing order
            let id = self
                .order
                .iter()
                .find(|id| !seen.contains(id.as_str()))
                .cloned()
                .unwrap_or_default();
            return Err(ExportError::HierarchyCycle { id });
        }
        Ok(())
    }

    /// Get a page record by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&PageNode> {
        self.nodes.get(id)
    }

    /// Root page ids in listing order.
    #[must_use]
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// All page ids in the source's listing order.
    #[must_use]
    pub fn ids(&self) -> &[String] {
        &self.order
    }

    /// Number of pages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree has no pages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(id: &str, title: &str, parent: Option<&str>) -> PageMeta {
        PageMeta {
            id: id.to_owned(),
            title: title.to_owned(),
            parent_id: parent.map(str::to_owned),
        }
    }

    #[test]
    fn test_build_simple_tree() {
        let tree = PageTree::build(vec![
            meta("1", "Root", None),
            meta("2", "Child A", Some("1")),
            meta("3", "Child B", Some("1")),
            meta("4", "Grandchild", Some("2")),
        ])
        .unwrap();

        assert_eq!(tree.roots(), ["1".to_owned()]);
        assert_eq!(tree.get("1").unwrap().children, ["2", "3"]);
        assert_eq!(tree.get("2").unwrap().children, ["4"]);
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn test_children_keep_listing_order() {
        let tree = PageTree::build(vec![
            meta("1", "Root", None),
            meta("30", "Z", Some("1")),
            meta("20", "A", Some("1")),
            meta("10", "M", Some("1")),
        ])
        .unwrap();

        assert_eq!(tree.get("1").unwrap().children, ["30", "20", "10"]);
    }

    #[test]
    fn test_orphan_parent_promotes_to_root() {
        let tree = PageTree::build(vec![
            meta("1", "Root", None),
            meta("2", "Orphan", Some("999")),
        ])
        .unwrap();

        assert_eq!(tree.roots(), ["1".to_owned(), "2".to_owned()]);
    }

    #[test]
    fn test_duplicate_id_is_error() {
        let err = PageTree::build(vec![meta("1", "A", None), meta("1", "B", None)]).unwrap_err();

        assert!(matches!(err, ExportError::DuplicatePageId { id } if id == "1"));
    }

    #[test]
    fn test_cycle_is_error() {
        let err = PageTree::build(vec![
            meta("1", "Root", None),
            meta("2", "A", Some("3")),
            meta("3", "B", Some("2")),
        ])
        .unwrap_err();

        assert!(matches!(err, ExportError::HierarchyCycle { id } if id == "2"));
    }

    #[test]
    fn test_empty_tree() {
        let tree = PageTree::build(Vec::new()).unwrap();
        assert!(tree.is_empty());
        assert!(tree.roots().is_empty());
    }
}
