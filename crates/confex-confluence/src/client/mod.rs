//! Confluence REST API client.
//!
//! Provides a sync HTTP client for the Confluence Server/Data Center and
//! Cloud REST API, authenticated with username + API token (HTTP basic).
//! Pagination, status handling, and response decoding live here; callers see
//! fully materialized listings.

mod attachments;
mod pages;

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::de::DeserializeOwned;
use ureq::Agent;

use crate::error::ConfluenceError;

/// Default HTTP timeout in seconds.
const DEFAULT_TIMEOUT: u64 = 30;

/// Page size for paginated listings.
pub(crate) const PAGE_LIMIT: usize = 100;

/// Confluence REST API client.
pub struct ConfluenceClient {
    agent: Agent,
    base_url: String,
    auth_header: String,
}

impl ConfluenceClient {
    /// Create client from connection values.
    ///
    /// # Arguments
    /// * `base_url` - Confluence server base URL
    /// * `username` - Account username (or email for Confluence Cloud)
    /// * `api_token` - API token or password
    #[must_use]
    pub fn new(base_url: &str, username: &str, api_token: &str) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT)))
            .http_status_as_error(false)
            .build()
            .into();

        let credentials = BASE64.encode(format!("{username}:{api_token}"));

        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_owned(),
            auth_header: format!("Basic {credentials}"),
        }
    }

    /// Get the server base URL (no trailing slash).
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the API base URL.
    pub(crate) fn api_url(&self) -> String {
        format!("{}/rest/api", self.base_url)
    }

    /// GET a JSON resource, mapping error statuses to [`ConfluenceError`].
    pub(crate) fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ConfluenceError> {
        let response = self
            .agent
            .get(url)
            .header("Authorization", &self.auth_header)
            .header("Accept", "application/json")
            .call()?;

        let status = response.status().as_u16();
        let mut body_reader = response.into_body();

        if status >= 400 {
            let error_body = body_reader
                .read_to_string()
                .unwrap_or_else(|_| "(unable to read error body)".to_owned());
            return Err(ConfluenceError::HttpResponse {
                status,
                body: error_body,
            });
        }

        Ok(body_reader.read_json()?)
    }

    /// GET a raw resource as bytes.
    pub(crate) fn get_bytes(&self, url: &str) -> Result<Vec<u8>, ConfluenceError> {
        let response = self
            .agent
            .get(url)
            .header("Authorization", &self.auth_header)
            .call()?;

        let status = response.status().as_u16();
        let mut body_reader = response.into_body();

        if status >= 400 {
            let error_body = body_reader
                .read_to_string()
                .unwrap_or_else(|_| "(unable to read error body)".to_owned());
            return Err(ConfluenceError::HttpResponse {
                status,
                body: error_body,
            });
        }

        Ok(body_reader.read_to_vec()?)
    }
}
