//! Error types for the export pipeline.

pub use confex_storage::SinkError;

use crate::source::SourceError;

/// Error while parsing storage-format XHTML.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum XmlError {
    /// XML parsing error.
    #[error("XML parse error")]
    XmlParse(#[from] quick_xml::Error),

    /// Encoding error during XML parsing.
    #[error("encoding error")]
    Encoding(#[from] quick_xml::encoding::EncodingError),
}

/// Error converting a single page body to Markdown.
///
/// Per-page: the walker records it against the page and keeps going.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// The body is not well-formed storage XHTML.
    #[error("storage format parse error")]
    Parse(#[from] XmlError),

    /// The generic HTML→Markdown conversion failed.
    #[error("markdown conversion failed: {0}")]
    Markdown(String),
}

/// Fatal export failure; aborts the run.
///
/// Per-page conditions never surface here, they are folded into the
/// [`ExportReport`](crate::report::ExportReport) instead.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The space's page metadata could not be enumerated at all.
    #[error("failed to enumerate space '{space}'")]
    Enumeration {
        /// Space key.
        space: String,
        /// Underlying source failure.
        #[source]
        source: SourceError,
    },

    /// The page listing contained the same id twice.
    #[error("space listing contains duplicate page id {id}")]
    DuplicatePageId {
        /// The duplicated page id.
        id: String,
    },

    /// The parent/child edges form a cycle.
    #[error("page hierarchy contains a cycle involving page {id}")]
    HierarchyCycle {
        /// A page id on the cycle.
        id: String,
    },

    /// The sink rejected a write; partial unreadable output is worse than
    /// aborting.
    #[error("write failed")]
    Write(#[from] SinkError),
}
