//! Page operations for the Confluence API.

use tracing::info;

use super::{ConfluenceClient, PAGE_LIMIT};
use crate::error::ConfluenceError;
use crate::types::{ContentPage, PagedResponse, PageSummary};

impl ConfluenceClient {
    /// Enumerate all pages of a space with their ancestor chains.
    ///
    /// Drains the paginated listing; the returned order is the server's
    /// listing order.
    pub fn space_pages(&self, space_key: &str) -> Result<Vec<PageSummary>, ConfluenceError> {
        let mut pages = Vec::new();
        let mut start = 0usize;

        info!("Listing pages of space {}", space_key);

        loop {
            let url = format!(
                "{}/content?spaceKey={}&type=page&start={}&limit={}&expand=ancestors",
                self.api_url(),
                space_key,
                start,
                PAGE_LIMIT
            );
            let response: PagedResponse<PageSummary> = self.get_json(&url)?;
            let fetched = response.results.len();
            pages.extend(response.results);

            if fetched < PAGE_LIMIT {
                break;
            }
            start += fetched;
        }

        info!("Space {} has {} pages", space_key, pages.len());
        Ok(pages)
    }

    /// Get a page's body in storage format.
    pub fn page_body(&self, page_id: &str) -> Result<String, ConfluenceError> {
        let url = format!("{}/content/{}?expand=body.storage", self.api_url(), page_id);

        info!("Fetching body of page {}", page_id);

        let page: ContentPage = self.get_json(&url)?;
        page.body
            .and_then(|b| b.storage)
            .map(|s| s.value)
            .ok_or_else(|| ConfluenceError::MissingBody {
                id: page_id.to_owned(),
            })
    }
}
