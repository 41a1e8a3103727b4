//! Space export pipeline for confex.
//!
//! Exports a Confluence space into a tree of Markdown files plus downloaded
//! attachments, mirroring the page hierarchy and preserving intra-wiki
//! links. The pipeline runs in four stages:
//!
//! 1. **Pre-scan** — enumerate page metadata and per-page attachment
//!    listings ([`PageSource`]).
//! 2. **Resolve** — build the read-only id→path table ([`PathTable`]) so
//!    link rewriting never depends on traversal order.
//! 3. **Convert** — per page: macro normalization, generic HTML→Markdown,
//!    placeholder-link rewrite ([`PageConverter`]).
//! 4. **Walk** — deterministic depth-first traversal writing files and
//!    attachments through the [`Sink`](confex_storage::Sink)
//!    ([`TreeWalker`]), aggregated by the [`Exporter`].
//!
//! Per-page failures degrade into the [`ExportReport`]; only enumeration
//! failures, a malformed hierarchy, and sink write errors abort a run.
//! Re-running an export against an unchanged space produces byte-identical
//! output.

mod convert;
mod error;
mod exporter;
mod normalize;
mod report;
mod resolver;
mod source;
mod tree;
mod walker;
mod xml;

pub use convert::{Conversion, PageConverter};
pub use error::{ConvertError, ExportError, XmlError};
pub use exporter::{ExportOptions, Exporter};
pub use normalize::{BodyRef, NormalizedBody, normalize};
pub use report::{ExportReport, PageReport, PageStatus, UnresolvedReference};
pub use resolver::{ATTACHMENTS_DIR, AttachmentFile, INDEX_FILE, PageEntry, PathTable, slugify};
pub use source::{AttachmentMeta, PageMeta, PageSource, RemoteSource, SourceError};
pub use tree::{PageNode, PageTree};
pub use walker::{TreeWalker, WalkOptions};
pub use xml::{HtmlNode, StorageParser};
