//! Per-run export results.
//!
//! Nothing here is persisted; the report exists so every degraded or failed
//! item surfaces by name at the end of the run.

/// Final state of one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStatus {
    /// Markdown written, all owned attachments written.
    Exported,
    /// Markdown written, but some attachment failed.
    Partial,
    /// Body fetch or conversion failed; no file written.
    Failed,
    /// Not visited because the run was stopped.
    Skipped,
}

/// A reference whose target could not be resolved inside the export scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedReference {
    /// Id of the page containing the reference.
    pub page_id: String,
    /// Title of the page containing the reference.
    pub page_title: String,
    /// Human-readable reference text (target description).
    pub reference: String,
}

/// Outcome of one page.
#[derive(Debug)]
pub struct PageReport {
    /// Page id.
    pub id: String,
    /// Page title.
    pub title: String,
    /// Output file path relative to the export root (empty when unknown).
    pub file: String,
    /// Final state.
    pub status: PageStatus,
    /// The existing output file was already byte-identical.
    pub unchanged: bool,
    /// Fatal-for-this-page error text.
    pub error: Option<String>,
    /// References degraded to external links.
    pub unresolved: Vec<UnresolvedReference>,
    /// Per-attachment failure descriptions.
    pub attachment_failures: Vec<String>,
    /// Attachments written for this page.
    pub attachments_written: usize,
}

impl PageReport {
    /// Start a report entry for a page.
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            file: file.into(),
            status: PageStatus::Skipped,
            unchanged: false,
            error: None,
            unresolved: Vec::new(),
            attachment_failures: Vec::new(),
            attachments_written: 0,
        }
    }
}

/// Aggregated outcome of a space export.
#[derive(Debug, Default)]
pub struct ExportReport {
    /// Per-page outcomes in traversal order.
    pub pages: Vec<PageReport>,
}

impl ExportReport {
    /// Pages whose Markdown file was written (fully or partially).
    #[must_use]
    pub fn pages_exported(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| matches!(p.status, PageStatus::Exported | PageStatus::Partial))
            .count()
    }

    /// Pages that failed outright.
    #[must_use]
    pub fn pages_failed(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| p.status == PageStatus::Failed)
            .count()
    }

    /// Pages skipped by a stop signal.
    #[must_use]
    pub fn pages_skipped(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| p.status == PageStatus::Skipped)
            .count()
    }

    /// Total attachments written.
    #[must_use]
    pub fn attachments_written(&self) -> usize {
        self.pages.iter().map(|p| p.attachments_written).sum()
    }

    /// All unresolved references across pages.
    pub fn unresolved(&self) -> impl Iterator<Item = &UnresolvedReference> {
        self.pages.iter().flat_map(|p| p.unresolved.iter())
    }

    /// Whether anything failed or degraded.
    #[must_use]
    pub fn has_issues(&self) -> bool {
        self.pages.iter().any(|p| {
            p.status == PageStatus::Failed
                || !p.unresolved.is_empty()
                || !p.attachment_failures.is_empty()
        })
    }

    /// Find a page's entry by id.
    #[must_use]
    pub fn page_mut(&mut self, id: &str) -> Option<&mut PageReport> {
        self.pages.iter_mut().find(|p| p.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let mut report = ExportReport::default();

        let mut ok = PageReport::new("1", "A", "a/index.md");
        ok.status = PageStatus::Exported;
        ok.attachments_written = 2;
        report.pages.push(ok);

        let mut failed = PageReport::new("2", "B", "a/b.md");
        failed.status = PageStatus::Failed;
        failed.error = Some("body fetch failed".to_owned());
        report.pages.push(failed);

        let mut partial = PageReport::new("3", "C", "a/c/index.md");
        partial.status = PageStatus::Partial;
        partial.attachments_written = 1;
        partial.attachment_failures.push("x.png: 404".to_owned());
        report.pages.push(partial);

        assert_eq!(report.pages_exported(), 2);
        assert_eq!(report.pages_failed(), 1);
        assert_eq!(report.attachments_written(), 3);
        assert!(report.has_issues());
    }

    #[test]
    fn test_clean_report_has_no_issues() {
        let mut report = ExportReport::default();
        let mut ok = PageReport::new("1", "A", "a/index.md");
        ok.status = PageStatus::Exported;
        report.pages.push(ok);

        assert!(!report.has_issues());
        assert_eq!(report.unresolved().count(), 0);
    }
}
