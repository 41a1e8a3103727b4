//! Confluence API response types.

mod attachment;
mod page;

pub use attachment::{Attachment, AttachmentLinks, AttachmentMetadata};
pub use page::{Ancestor, Body, ContentPage, PageSummary, Storage};

use serde::Deserialize;

/// Paginated listing response.
#[derive(Debug, Clone, Deserialize)]
pub struct PagedResponse<T> {
    /// Result items for this slice.
    pub results: Vec<T>,
    /// Number of items in this slice.
    #[serde(default)]
    pub size: usize,
    /// Requested slice size.
    #[serde(default)]
    pub limit: usize,
    /// Offset of this slice.
    #[serde(default)]
    pub start: usize,
}
