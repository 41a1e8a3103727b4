//! Confluence page types.

use serde::Deserialize;

/// Page entry from a space content listing (metadata only).
#[derive(Debug, Clone, Deserialize)]
pub struct PageSummary {
    /// Page ID.
    pub id: String,
    /// Page title.
    pub title: String,
    /// Ancestor chain, root first. Present when requested via `expand`.
    #[serde(default)]
    pub ancestors: Vec<Ancestor>,
}

impl PageSummary {
    /// The direct parent's ID, if any.
    #[must_use]
    pub fn parent_id(&self) -> Option<&str> {
        self.ancestors.last().map(|a| a.id.as_str())
    }
}

/// Ancestor reference inside a page listing.
#[derive(Debug, Clone, Deserialize)]
pub struct Ancestor {
    /// Ancestor page ID.
    pub id: String,
}

/// Full page content response.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentPage {
    /// Page ID.
    pub id: String,
    /// Page title.
    pub title: String,
    /// Page body content.
    #[serde(default)]
    pub body: Option<Body>,
}

/// Page body content.
#[derive(Debug, Clone, Deserialize)]
pub struct Body {
    /// Storage format content.
    #[serde(default)]
    pub storage: Option<Storage>,
}

/// Storage format representation.
#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
    /// XHTML content in Confluence storage format.
    pub value: String,
    /// Content representation (always "storage").
    pub representation: String,
}
