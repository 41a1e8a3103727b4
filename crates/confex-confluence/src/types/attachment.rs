//! Confluence attachment types.

use serde::Deserialize;

/// Attachment entry from a page's attachment listing.
#[derive(Debug, Clone, Deserialize)]
pub struct Attachment {
    /// Attachment ID (may carry an `att` prefix on some servers).
    pub id: String,
    /// Attachment filename.
    pub title: String,
    /// Attachment metadata.
    #[serde(default)]
    pub metadata: AttachmentMetadata,
    /// Hypermedia links.
    #[serde(rename = "_links", default)]
    pub links: Option<AttachmentLinks>,
}

impl Attachment {
    /// The server-relative download link, if present.
    #[must_use]
    pub fn download_link(&self) -> Option<&str> {
        self.links.as_ref().and_then(|l| l.download.as_deref())
    }
}

/// Attachment metadata.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttachmentMetadata {
    /// Media type (e.g., "image/png").
    #[serde(rename = "mediaType", default)]
    pub media_type: String,
}

/// Attachment hypermedia links.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentLinks {
    /// Server-relative download path.
    #[serde(default)]
    pub download: Option<String>,
}
