//! Sink trait and error types.
//!
//! Provides the core [`Sink`] trait for abstracting the output tree the
//! exporter writes into, along with [`SinkError`] for unified error handling
//! across backends.
//!
//! # Path Convention
//!
//! All path parameters are **relative output paths** using `/` separators,
//! never absolute filesystem paths:
//! - `"docs/index.md"` - a page file
//! - `"docs/setup/attachments/diagram.png"` - an attachment
//!
//! Sink implementations map relative paths to their backing store.

use std::path::PathBuf;

/// Semantic error categories.
#[derive(Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum SinkErrorKind {
    /// Permission denied.
    PermissionDenied,
    /// Invalid or escaping relative path.
    InvalidPath,
    /// Backend is out of space or otherwise unavailable.
    Unavailable,
    /// Other/unknown error category.
    Other,
}

/// Sink error with semantic kind and backend-specific source.
#[derive(Debug)]
pub struct SinkError {
    /// Semantic error category.
    pub kind: SinkErrorKind,
    /// Path context (if applicable).
    pub path: Option<PathBuf>,
    /// Backend identifier (e.g., "Fs", "Memory").
    pub backend: Option<&'static str>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl SinkError {
    /// Create a new sink error.
    #[must_use]
    pub fn new(kind: SinkErrorKind) -> Self {
        Self {
            kind,
            path: None,
            backend: None,
            source: None,
        }
    }

    /// Attach path context.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Attach backend identifier.
    #[must_use]
    pub fn with_backend(mut self, backend: &'static str) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Attach the underlying error source.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Create an invalid path error.
    #[must_use]
    pub fn invalid_path(path: impl Into<PathBuf>) -> Self {
        Self::new(SinkErrorKind::InvalidPath).with_path(path)
    }

    /// Create a sink error from an I/O error.
    #[must_use]
    pub fn io(err: std::io::Error, path: Option<PathBuf>) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::PermissionDenied => SinkErrorKind::PermissionDenied,
            std::io::ErrorKind::StorageFull => SinkErrorKind::Unavailable,
            _ => SinkErrorKind::Other,
        };
        let mut error = Self::new(kind).with_source(err);
        if let Some(p) = path {
            error = error.with_path(p);
        }
        error
    }
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Format: "[Backend] Kind: message (path: foo/bar)"
        if let Some(backend) = self.backend {
            write!(f, "[{backend}] ")?;
        }

        let kind_str = match self.kind {
            SinkErrorKind::PermissionDenied => "Permission denied",
            SinkErrorKind::InvalidPath => "Invalid path",
            SinkErrorKind::Unavailable => "Unavailable",
            SinkErrorKind::Other => "Write error",
        };

        write!(f, "{kind_str}")?;

        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }

        if let Some(path) = &self.path {
            write!(f, " (path: {})", path.display())?;
        }

        Ok(())
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|s| s.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Output sink for the exported tree.
///
/// The exporter is the single writer; implementations only need to be
/// atomic enough for single-writer use. Write failures are treated as
/// fatal by the caller, so implementations should not retry internally.
pub trait Sink {
    /// Write a file, creating it if absent and truncating it otherwise.
    ///
    /// Parent directories must already exist (see [`Sink::ensure_dir`]).
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the path is invalid or the write fails.
    fn write(&self, path: &str, bytes: &[u8]) -> Result<(), SinkError>;

    /// Create a directory and all missing parents.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the path is invalid or creation fails.
    fn ensure_dir(&self, path: &str) -> Result<(), SinkError>;

    /// Read an existing file, or `None` if it does not exist.
    ///
    /// Used by the walker to skip rewriting byte-identical files on
    /// re-export.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the path is invalid or the read fails for a
    /// reason other than the file being absent.
    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, SinkError>;
}
