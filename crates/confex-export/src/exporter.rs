//! Export orchestration: pre-scan, resolve, walk, report.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use confex_storage::Sink;
use tracing::{info, warn};

use crate::error::ExportError;
use crate::report::{ExportReport, PageStatus};
use crate::resolver::PathTable;
use crate::source::{AttachmentMeta, PageSource};
use crate::tree::PageTree;
use crate::walker::{TreeWalker, WalkOptions};

/// Options for one export run.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Space key to export.
    pub space_key: String,
    /// Leave existing byte-identical files untouched.
    pub skip_unchanged: bool,
}

impl ExportOptions {
    /// Options for a space with default behavior.
    #[must_use]
    pub fn new(space_key: impl Into<String>) -> Self {
        Self {
            space_key: space_key.into(),
            skip_unchanged: true,
        }
    }
}

/// Top-level export driver.
///
/// Runs the metadata pre-scan, builds the read-only path table, then walks
/// the hierarchy writing Markdown and attachments through the sink.
pub struct Exporter<'a, S: PageSource + ?Sized, K: Sink + ?Sized> {
    source: &'a S,
    sink: &'a K,
    options: ExportOptions,
    stop: Option<Arc<AtomicBool>>,
}

impl<'a, S: PageSource + ?Sized, K: Sink + ?Sized> Exporter<'a, S, K> {
    /// Create an exporter.
    #[must_use]
    pub fn new(source: &'a S, sink: &'a K, options: ExportOptions) -> Self {
        Self {
            source,
            sink,
            options,
            stop: None,
        }
    }

    /// Install an external stop flag. The walker checks it between pages and
    /// marks unvisited pages as skipped in the report.
    #[must_use]
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Run the export, filling `report` as work completes.
    ///
    /// The report is an out-parameter so the work finished before a fatal
    /// abort is still available to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError`] on fatal conditions: the space cannot be
    /// enumerated, the hierarchy is malformed, or the sink rejects a write.
    pub fn run(&self, report: &mut ExportReport) -> Result<(), ExportError> {
        let space = &self.options.space_key;

        let metas = self
            .source
            .pages(space)
            .map_err(|e| ExportError::Enumeration {
                space: space.clone(),
                source: e,
            })?;

        if metas.is_empty() {
            warn!("space {} has no pages, nothing to export", space);
            return Ok(());
        }

        let tree = PageTree::build(metas)?;
        info!(
            "space {}: {} pages, {} roots",
            space,
            tree.len(),
            tree.roots().len()
        );

        // Attachment listings are part of the pre-scan: the path table needs
        // every attachment's final name before any body is converted.
        let mut attachments: HashMap<String, Vec<AttachmentMeta>> = HashMap::new();
        let mut listing_failures: Vec<(String, String)> = Vec::new();
        for id in tree.ids() {
            match self.source.attachments(id) {
                Ok(list) if list.is_empty() => {}
                Ok(list) => {
                    attachments.insert(id.clone(), list);
                }
                Err(e) => {
                    warn!("page {}: attachment listing failed: {e}", id);
                    listing_failures.push((id.clone(), e.to_string()));
                }
            }
        }

        let table = PathTable::build(
            &tree,
            &attachments,
            space,
            self.source.web_base_url(),
        );

        let options = WalkOptions {
            skip_unchanged: self.options.skip_unchanged,
        };
        let walker = TreeWalker::new(self.source, self.sink, &tree, &table, options);
        match &self.stop {
            Some(stop) => walker.with_stop_flag(stop).walk(report)?,
            None => walker.walk(report)?,
        }

        // Fold pre-scan attachment listing failures into the per-page rows
        for (id, error) in listing_failures {
            if let Some(page) = report.page_mut(&id) {
                page.attachment_failures
                    .push(format!("attachment listing failed: {error}"));
                if page.status == PageStatus::Exported {
                    page.status = PageStatus::Partial;
                }
            }
        }

        info!(
            "space {}: exported {} pages, {} attachments, {} unresolved references",
            space,
            report.pages_exported(),
            report.attachments_written(),
            report.unresolved().count()
        );
        Ok(())
    }
}
