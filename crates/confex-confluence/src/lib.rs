//! Confluence REST API client for confex.
//!
//! Wraps the Confluence `rest/api` content endpoints the exporter needs:
//! space page enumeration (with ancestors), storage-format body retrieval,
//! and attachment listing/download. Authentication is username + API token
//! over HTTP basic; pagination and error-status mapping are handled here so
//! callers only see complete listings or a typed error.

mod client;
mod error;
mod types;

pub use client::ConfluenceClient;
pub use error::ConfluenceError;
pub use types::{
    Ancestor, Attachment, AttachmentLinks, AttachmentMetadata, Body, ContentPage, PagedResponse,
    PageSummary, Storage,
};
