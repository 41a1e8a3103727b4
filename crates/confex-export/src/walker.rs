//! Depth-first traversal and writing of the page tree.
//!
//! The walker is the single writer of the output tree. Per page it moves
//! through fetch → convert → write → attachments, folding per-page failures
//! into the report and continuing; only sink write failures abort the run.
//! A page's Markdown file is always written before its attachments, so a
//! reader following a freshly written link never sees a dangling attachment.

use std::sync::atomic::{AtomicBool, Ordering};

use confex_storage::Sink;
use tracing::{debug, warn};

use crate::convert::PageConverter;
use crate::error::ExportError;
use crate::report::{ExportReport, PageReport, PageStatus};
use crate::resolver::{PageEntry, PathTable};
use crate::source::PageSource;
use crate::tree::PageTree;

/// Traversal options.
#[derive(Debug, Clone, Copy)]
pub struct WalkOptions {
    /// Leave existing byte-identical files untouched.
    pub skip_unchanged: bool,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            skip_unchanged: true,
        }
    }
}

/// Depth-first export driver for one pre-scanned space.
pub struct TreeWalker<'a, S: PageSource + ?Sized, K: Sink + ?Sized> {
    source: &'a S,
    sink: &'a K,
    tree: &'a PageTree,
    table: &'a PathTable,
    converter: PageConverter,
    options: WalkOptions,
    stop: Option<&'a AtomicBool>,
}

impl<'a, S: PageSource + ?Sized, K: Sink + ?Sized> TreeWalker<'a, S, K> {
    /// Create a walker over a pre-scanned tree and its path table.
    #[must_use]
    pub fn new(
        source: &'a S,
        sink: &'a K,
        tree: &'a PageTree,
        table: &'a PathTable,
        options: WalkOptions,
    ) -> Self {
        Self {
            source,
            sink,
            tree,
            table,
            converter: PageConverter::new(),
            options,
            stop: None,
        }
    }

    /// Install a stop flag, checked between pages (never mid-page).
    #[must_use]
    pub fn with_stop_flag(mut self, stop: &'a AtomicBool) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Walk every root depth-first, children in the source's listing order.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Write`] if the sink rejects a write; all other
    /// conditions degrade into the report.
    pub fn walk(&self, report: &mut ExportReport) -> Result<(), ExportError> {
        for root in self.tree.roots() {
            self.visit(root, report)?;
        }
        Ok(())
    }

    fn stopped(&self) -> bool {
        self.stop.is_some_and(|s| s.load(Ordering::Relaxed))
    }

    fn visit(&self, id: &str, report: &mut ExportReport) -> Result<(), ExportError> {
        if self.stopped() {
            self.mark_skipped(id, report);
            return Ok(());
        }

        let Some(node) = self.tree.get(id) else {
            return Ok(());
        };
        let Some(entry) = self.table.entry(id) else {
            return Ok(());
        };

        let mut page = PageReport::new(id, node.meta.title.as_str(), entry.file.as_str());

        if let Some(dir) = &entry.dir {
            self.sink.ensure_dir(dir)?;
        }

        debug!("page {}: fetching body", id);
        match self.source.body(id) {
            Ok(body) => self.convert_and_write(&body, node, entry, &mut page)?,
            Err(e) => {
                warn!("page {} ('{}'): body fetch failed: {e}", id, node.meta.title);
                page.status = PageStatus::Failed;
                page.error = Some(format!("fetch failed: {e}"));
            }
        }

        report.pages.push(page);

        // Children are visited even when this page failed; their paths were
        // reserved during the pre-scan and do not depend on this body.
        for child in &node.children {
            self.visit(child, report)?;
        }
        Ok(())
    }

    fn convert_and_write(
        &self,
        body: &str,
        node: &crate::tree::PageNode,
        entry: &PageEntry,
        page: &mut PageReport,
    ) -> Result<(), ExportError> {
        debug!("page {}: converting", node.meta.id);
        let conversion = match self.converter.convert(&node.meta, body, self.table) {
            Ok(conversion) => conversion,
            Err(e) => {
                warn!(
                    "page {} ('{}'): conversion failed: {e}",
                    node.meta.id, node.meta.title
                );
                page.status = PageStatus::Failed;
                page.error = Some(e.to_string());
                return Ok(());
            }
        };

        page.unresolved = conversion.unresolved;

        let bytes = conversion.markdown.into_bytes();
        if self.options.skip_unchanged
            && self
                .sink
                .read(&entry.file)?
                .is_some_and(|existing| existing == bytes)
        {
            debug!("page {}: unchanged, skipping write", node.meta.id);
            page.unchanged = true;
        } else {
            self.sink.write(&entry.file, &bytes)?;
        }

        // Attachments land strictly after the page file
        self.write_attachments(entry, page)?;

        page.status = if page.attachment_failures.is_empty() {
            PageStatus::Exported
        } else {
            PageStatus::Partial
        };
        Ok(())
    }

    fn write_attachments(
        &self,
        entry: &PageEntry,
        page: &mut PageReport,
    ) -> Result<(), ExportError> {
        let Some(dir) = entry.attachments_dir() else {
            return Ok(());
        };
        self.sink.ensure_dir(&dir)?;

        for attachment in &entry.attachments {
            match self.source.attachment_data(&attachment.meta) {
                Ok(data) => {
                    let path = format!("{dir}/{}", attachment.stored_name);
                    let unchanged = self.options.skip_unchanged
                        && self.sink.read(&path)?.is_some_and(|existing| existing == data);
                    if !unchanged {
                        self.sink.write(&path, &data)?;
                    }
                    page.attachments_written += 1;
                }
                Err(e) => {
                    warn!(
                        "attachment '{}' of page {}: download failed: {e}",
                        attachment.meta.filename, attachment.meta.page_id
                    );
                    page.attachment_failures
                        .push(format!("{}: {e}", attachment.meta.filename));
                }
            }
        }
        Ok(())
    }

    /// Record a page and its descendants as skipped, without any I/O.
    fn mark_skipped(&self, id: &str, report: &mut ExportReport) {
        let Some(node) = self.tree.get(id) else {
            return;
        };
        let file = self
            .table
            .entry(id)
            .map(|e| e.file.clone())
            .unwrap_or_default();
        report
            .pages
            .push(PageReport::new(id, node.meta.title.as_str(), file));
        for child in &node.children {
            self.mark_skipped(child, report);
        }
    }
}
