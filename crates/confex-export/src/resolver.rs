//! Reference resolution: page ids and titles to output paths.
//!
//! The [`PathTable`] is built once from the pre-scan, before any body is
//! fetched, and is read-only afterwards. Every page and every attachment
//! known to the pre-scan has its final output path here, so link rewriting
//! never depends on traversal or write order.

use std::collections::HashMap;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use crate::source::AttachmentMeta;
use crate::tree::PageTree;

/// Characters percent-encoded inside fallback URLs.
const URL_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'?')
    .add(b'%');

/// Name of the file carrying a directory page's own content.
pub const INDEX_FILE: &str = "index.md";

/// Subdirectory holding a page's attachments.
pub const ATTACHMENTS_DIR: &str = "attachments";

/// An attachment with its final on-disk filename.
#[derive(Debug, Clone)]
pub struct AttachmentFile {
    /// Pre-scan metadata.
    pub meta: AttachmentMeta,
    /// Filename inside the owning page's `attachments/` directory.
    /// Differs from `meta.filename` only on same-page collisions.
    pub stored_name: String,
}

/// Output location of a single page.
#[derive(Debug, Clone)]
pub struct PageEntry {
    /// Path of the page's Markdown file, relative to the export root.
    pub file: String,
    /// The page's own directory, when it is materialized as one (it has
    /// children, owns attachments, or is a space root).
    pub dir: Option<String>,
    /// Owned attachments in listing order.
    pub attachments: Vec<AttachmentFile>,
}

impl PageEntry {
    /// Path of the page's attachment directory, if it owns attachments.
    #[must_use]
    pub fn attachments_dir(&self) -> Option<String> {
        if self.attachments.is_empty() {
            None
        } else {
            self.dir.as_ref().map(|d| format!("{d}/{ATTACHMENTS_DIR}"))
        }
    }
}

/// Slot in the title index.
#[derive(Debug)]
enum TitleSlot {
    Unique(String),
    Ambiguous,
}

/// Immutable id→path table for one space export.
#[derive(Debug)]
pub struct PathTable {
    pages: HashMap<String, PageEntry>,
    titles: HashMap<String, TitleSlot>,
    space_key: String,
    wiki_base: Option<String>,
}

impl PathTable {
    /// Build the table from the pre-scanned hierarchy and per-page
    /// attachment listings.
    #[must_use]
    pub fn build(
        tree: &PageTree,
        attachments: &HashMap<String, Vec<AttachmentMeta>>,
        space_key: &str,
        wiki_base: Option<&str>,
    ) -> Self {
        let mut table = Self {
            pages: HashMap::with_capacity(tree.len()),
            titles: HashMap::new(),
            space_key: space_key.to_owned(),
            wiki_base: wiki_base.map(|b| b.trim_end_matches('/').to_owned()),
        };

        table.assign_group(tree, attachments, tree.roots(), "");

        for id in tree.ids() {
            if let Some(node) = tree.get(id) {
                table
                    .titles
                    .entry(node.meta.title.clone())
                    .and_modify(|slot| *slot = TitleSlot::Ambiguous)
                    .or_insert_with(|| TitleSlot::Unique(id.clone()));
            }
        }

        table
    }

    /// Assign paths for one sibling group, then recurse.
    fn assign_group(
        &mut self,
        tree: &PageTree,
        attachments: &HashMap<String, Vec<AttachmentMeta>>,
        group: &[String],
        parent_dir: &str,
    ) {
        let slugs = disambiguated_slugs(tree, group);

        for (id, slug) in group.iter().zip(&slugs) {
            let Some(node) = tree.get(id) else { continue };

            let owned = attachments.get(id).map(Vec::as_slice).unwrap_or_default();
            let is_root = parent_dir.is_empty();
            let is_dir = is_root || !node.children.is_empty() || !owned.is_empty();

            let base = if is_root {
                String::new()
            } else {
                format!("{parent_dir}/")
            };

            let (file, dir) = if is_dir {
                (format!("{base}{slug}/{INDEX_FILE}"), Some(format!("{base}{slug}")))
            } else {
                (format!("{base}{slug}.md"), None)
            };

            let entry = PageEntry {
                file,
                attachments: stored_attachment_files(owned),
                dir: dir.clone(),
            };
            self.pages.insert(id.clone(), entry);

            if let Some(dir) = dir {
                self.assign_group(tree, attachments, &node.children, &dir);
            }
        }
    }

    /// The space key this table was built for.
    #[must_use]
    pub fn space_key(&self) -> &str {
        &self.space_key
    }

    /// Get a page's entry.
    #[must_use]
    pub fn entry(&self, page_id: &str) -> Option<&PageEntry> {
        self.pages.get(page_id)
    }

    /// Resolve an id-based page reference to a path relative to the
    /// referencing page's file.
    #[must_use]
    pub fn resolve_page(&self, from_id: &str, target_id: &str) -> Option<String> {
        let from = self.pages.get(from_id)?;
        let target = self.pages.get(target_id)?;
        Some(relative_path(&from.file, &target.file))
    }

    /// Resolve a title-based page reference.
    ///
    /// A reference scoped to a different space, an unknown title, or a title
    /// shared by several pages is unresolved.
    #[must_use]
    pub fn resolve_title(
        &self,
        from_id: &str,
        space: Option<&str>,
        title: &str,
    ) -> Option<String> {
        if space.is_some_and(|s| s != self.space_key) {
            return None;
        }
        match self.titles.get(title)? {
            TitleSlot::Unique(id) => self.resolve_page(from_id, id),
            TitleSlot::Ambiguous => None,
        }
    }

    /// Resolve an attachment reference to a path relative to the
    /// referencing page's file.
    #[must_use]
    pub fn resolve_attachment(
        &self,
        from_id: &str,
        owner_id: &str,
        filename: &str,
    ) -> Option<String> {
        let from = self.pages.get(from_id)?;
        let owner = self.pages.get(owner_id)?;
        let dir = owner.dir.as_deref()?;
        let file = owner
            .attachments
            .iter()
            .find(|a| a.meta.filename == filename)?;
        let target = format!("{dir}/{ATTACHMENTS_DIR}/{}", file.stored_name);
        Some(relative_path(&from.file, &target))
    }

    /// Degraded external URL for an unresolved id-based page reference.
    #[must_use]
    pub fn fallback_page_url(&self, page_id: &str) -> String {
        match &self.wiki_base {
            Some(base) => format!("{base}/pages/viewpage.action?pageId={page_id}"),
            None => format!("#unresolved-page-{page_id}"),
        }
    }

    /// Degraded external URL for an unresolved title-based page reference.
    #[must_use]
    pub fn fallback_title_url(&self, space: Option<&str>, title: &str) -> String {
        let space = space.unwrap_or(&self.space_key);
        let title = utf8_percent_encode(title, URL_SET);
        match &self.wiki_base {
            Some(base) => format!("{base}/display/{space}/{title}"),
            None => format!("#unresolved-title-{title}"),
        }
    }

    /// Degraded external URL for an unresolved attachment reference.
    #[must_use]
    pub fn fallback_attachment_url(&self, owner_id: &str, filename: &str) -> String {
        let filename = utf8_percent_encode(filename, URL_SET);
        match &self.wiki_base {
            Some(base) => format!("{base}/download/attachments/{owner_id}/{filename}"),
            None => format!("#unresolved-attachment-{filename}"),
        }
    }
}

/// Filesystem-safe slug for a page title.
///
/// Lowercases and collapses every non-alphanumeric run to a single `-`.
/// An empty result falls back to the page id.
#[must_use]
pub fn slugify(title: &str, id: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_sep = false;
    for ch in title.chars() {
        if ch.is_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('-');
            }
            pending_sep = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    if slug.is_empty() { id.to_owned() } else { slug }
}

/// Slugs for a sibling group, id-suffixed where two siblings collide.
fn disambiguated_slugs(tree: &PageTree, group: &[String]) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let slugs: Vec<String> = group
        .iter()
        .map(|id| {
            let slug = tree
                .get(id)
                .map_or_else(|| id.clone(), |n| slugify(&n.meta.title, id));
            *counts.entry(slug.clone()).or_insert(0) += 1;
            slug
        })
        .collect();

    group
        .iter()
        .zip(slugs)
        .map(|(id, slug)| {
            if counts.get(&slug).copied().unwrap_or(0) > 1 {
                format!("{slug}-{id}")
            } else {
                slug
            }
        })
        .collect()
}

/// Keep original filenames verbatim except for path-dangerous pieces.
fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_owned(),
        _ => cleaned,
    }
}

/// Final filenames for one page's attachments.
///
/// When a filename appears more than once on the page, every colliding
/// attachment is stored as `{stem}-{id}{ext}`, independent of listing order.
fn stored_attachment_files(owned: &[AttachmentMeta]) -> Vec<AttachmentFile> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for meta in owned {
        *counts.entry(meta.filename.as_str()).or_insert(0) += 1;
    }

    owned
        .iter()
        .map(|meta| {
            let name = sanitize_filename(&meta.filename);
            let stored_name = if counts.get(meta.filename.as_str()).copied().unwrap_or(0) > 1 {
                match name.rsplit_once('.') {
                    Some((stem, ext)) if !stem.is_empty() => {
                        format!("{stem}-{}.{ext}", meta.id)
                    }
                    _ => format!("{name}-{}", meta.id),
                }
            } else {
                name
            };
            AttachmentFile {
                meta: meta.clone(),
                stored_name,
            }
        })
        .collect()
}

/// Path of `target` relative to the directory containing `from_file`.
fn relative_path(from_file: &str, target: &str) -> String {
    let from_dir: Vec<&str> = match from_file.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    let target_parts: Vec<&str> = target.split('/').collect();

    let mut common = 0;
    while common < from_dir.len()
        && common < target_parts.len() - 1
        && from_dir[common] == target_parts[common]
    {
        common += 1;
    }

    let mut parts: Vec<&str> = Vec::new();
    for _ in common..from_dir.len() {
        parts.push("..");
    }
    parts.extend(&target_parts[common..]);
    parts.join("/")
}
