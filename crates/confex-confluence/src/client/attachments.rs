//! Attachment operations for the Confluence API.

use tracing::info;

use super::{ConfluenceClient, PAGE_LIMIT};
use crate::error::ConfluenceError;
use crate::types::{Attachment, PagedResponse};

impl ConfluenceClient {
    /// List all attachments on a page.
    ///
    /// Drains the paginated listing; the returned order is the server's
    /// listing order.
    pub fn attachments(&self, page_id: &str) -> Result<Vec<Attachment>, ConfluenceError> {
        let mut attachments = Vec::new();
        let mut start = 0usize;

        loop {
            let url = format!(
                "{}/content/{}/child/attachment?start={}&limit={}&expand=metadata",
                self.api_url(),
                page_id,
                start,
                PAGE_LIMIT
            );
            let response: PagedResponse<Attachment> = self.get_json(&url)?;
            let fetched = response.results.len();
            attachments.extend(response.results);

            if fetched < PAGE_LIMIT {
                break;
            }
            start += fetched;
        }

        Ok(attachments)
    }

    /// Download an attachment's bytes.
    pub fn download_attachment(&self, attachment: &Attachment) -> Result<Vec<u8>, ConfluenceError> {
        let link = attachment
            .download_link()
            .ok_or_else(|| ConfluenceError::MissingDownloadLink {
                id: attachment.id.clone(),
            })?;

        info!("Downloading attachment '{}'", attachment.title);

        self.download(link)
    }

    /// Download a server-relative link (e.g. an attachment `_links.download`
    /// value) as raw bytes.
    pub fn download(&self, server_relative_link: &str) -> Result<Vec<u8>, ConfluenceError> {
        let url = format!("{}{}", self.base_url(), server_relative_link);
        self.get_bytes(&url)
    }
}
