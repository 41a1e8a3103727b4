//! Page source abstraction.
//!
//! [`PageSource`] is the seam between the export pipeline and the wiki's
//! REST API: the pipeline only ever sees metadata listings, storage-format
//! bodies, and attachment bytes. [`RemoteSource`] adapts the real
//! [`ConfluenceClient`]; tests use in-memory fakes.

use confex_confluence::ConfluenceClient;

/// Page metadata collected by the pre-scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMeta {
    /// Stable page id, unique within the space.
    pub id: String,
    /// Page title.
    pub title: String,
    /// Direct parent id; `None` for space roots.
    pub parent_id: Option<String>,
}

/// Attachment metadata collected by the pre-scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentMeta {
    /// Attachment id.
    pub id: String,
    /// Owning page id.
    pub page_id: String,
    /// Original filename.
    pub filename: String,
    /// Media type (e.g., "image/png"); may be empty.
    pub media_type: String,
    /// Server-relative download link, if the source exposes one.
    pub download_link: Option<String>,
}

/// Failure reported by a page source.
#[derive(Debug, thiserror::Error)]
#[error("{context}")]
pub struct SourceError {
    context: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl SourceError {
    /// Create an error with a human-readable context line.
    #[must_use]
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            source: None,
        }
    }

    /// Attach the underlying error.
    #[must_use]
    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

/// Read access to a wiki space.
///
/// Pagination, rate limiting, and transport retries are the implementor's
/// concern; the pipeline treats every method as a single logical operation.
pub trait PageSource {
    /// Enumerate all pages of a space (id, title, parent), in the source's
    /// listing order.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the listing fails; the caller treats this
    /// as fatal for the run.
    fn pages(&self, space_key: &str) -> Result<Vec<PageMeta>, SourceError>;

    /// List a page's attachments in the source's listing order.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the listing fails; the caller degrades
    /// that page only.
    fn attachments(&self, page_id: &str) -> Result<Vec<AttachmentMeta>, SourceError>;

    /// Fetch a page's raw storage-format body.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the body is unavailable; the caller marks
    /// the page failed and continues.
    fn body(&self, page_id: &str) -> Result<String, SourceError>;

    /// Fetch an attachment's bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the download fails; the caller records it
    /// against the owning page.
    fn attachment_data(&self, attachment: &AttachmentMeta) -> Result<Vec<u8>, SourceError>;

    /// Base web URL of the source wiki, used to build degraded external
    /// links for unresolved references.
    fn web_base_url(&self) -> Option<&str> {
        None
    }
}

/// [`PageSource`] implementation over the Confluence REST client.
pub struct RemoteSource<'a> {
    client: &'a ConfluenceClient,
}

impl<'a> RemoteSource<'a> {
    /// Wrap a client.
    #[must_use]
    pub fn new(client: &'a ConfluenceClient) -> Self {
        Self { client }
    }
}

impl PageSource for RemoteSource<'_> {
    fn pages(&self, space_key: &str) -> Result<Vec<PageMeta>, SourceError> {
        let pages = self
            .client
            .space_pages(space_key)
            .map_err(|e| SourceError::new(format!("listing space {space_key}")).with_source(e))?;

        Ok(pages
            .into_iter()
            .map(|p| PageMeta {
                parent_id: p.parent_id().map(str::to_owned),
                id: p.id,
                title: p.title,
            })
            .collect())
    }

    fn attachments(&self, page_id: &str) -> Result<Vec<AttachmentMeta>, SourceError> {
        let attachments = self.client.attachments(page_id).map_err(|e| {
            SourceError::new(format!("listing attachments of page {page_id}")).with_source(e)
        })?;

        Ok(attachments
            .into_iter()
            .map(|a| AttachmentMeta {
                page_id: page_id.to_owned(),
                filename: a.title.clone(),
                media_type: a.metadata.media_type.clone(),
                download_link: a.download_link().map(str::to_owned),
                id: a.id,
            })
            .collect())
    }

    fn body(&self, page_id: &str) -> Result<String, SourceError> {
        self.client
            .page_body(page_id)
            .map_err(|e| SourceError::new(format!("fetching body of page {page_id}")).with_source(e))
    }

    fn attachment_data(&self, attachment: &AttachmentMeta) -> Result<Vec<u8>, SourceError> {
        let link = attachment.download_link.as_deref().ok_or_else(|| {
            SourceError::new(format!(
                "attachment '{}' has no download link",
                attachment.filename
            ))
        })?;

        self.client.download(link).map_err(|e| {
            SourceError::new(format!("downloading attachment '{}'", attachment.filename))
                .with_source(e)
        })
    }

    fn web_base_url(&self) -> Option<&str> {
        Some(self.client.base_url())
    }
}
