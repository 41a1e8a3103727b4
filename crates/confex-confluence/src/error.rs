//! Error types for the Confluence client.

/// Error from Confluence API operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfluenceError {
    /// HTTP request failed (network error, timeout, etc).
    #[error("HTTP request failed")]
    HttpRequest(#[from] ureq::Error),

    /// HTTP response error (server returned error status).
    #[error("HTTP error: {status} - {body}")]
    HttpResponse {
        /// HTTP status code.
        status: u16,
        /// Response body (may contain error details).
        body: String,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error")]
    Json(#[from] serde_json::Error),

    /// Page exists but carries no storage-format body.
    #[error("page {id} has no storage body")]
    MissingBody {
        /// Page ID.
        id: String,
    },

    /// Attachment carries no download link.
    #[error("attachment {id} has no download link")]
    MissingDownloadLink {
        /// Attachment ID.
        id: String,
    },
}

impl ConfluenceError {
    /// Whether this error came from an HTTP 404 response.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::HttpResponse { status: 404, .. })
    }
}
