//! In-memory sink implementation for testing.
//!
//! Provides [`MemorySink`] for unit testing without filesystem access.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use crate::sink::{Sink, SinkError, SinkErrorKind};

/// In-memory sink for testing.
///
/// Stores written files and created directories in memory, preserving
/// write order observability through sorted map iteration.
///
/// # Example
///
/// ```
/// use confex_storage::{MemorySink, Sink};
///
/// let sink = MemorySink::new();
/// sink.ensure_dir("docs").unwrap();
/// sink.write("docs/index.md", b"# Home\n").unwrap();
///
/// assert_eq!(sink.file("docs/index.md").unwrap(), b"# Home\n");
/// assert!(sink.dirs().contains(&"docs".to_owned()));
/// ```
#[derive(Debug, Default)]
pub struct MemorySink {
    files: RwLock<BTreeMap<String, Vec<u8>>>,
    dirs: RwLock<BTreeSet<String>>,
    fail_paths: RwLock<BTreeSet<String>>,
}

impl MemorySink {
    /// Create a new empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make writes to `path` fail, for error-path tests.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_failing_path(self, path: impl Into<String>) -> Self {
        self.fail_paths.write().unwrap().insert(path.into());
        self
    }

    /// Get a written file's bytes.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.read().unwrap().get(path).cloned()
    }

    /// All written file paths, sorted.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.files.read().unwrap().keys().cloned().collect()
    }

    /// All created directories, sorted.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn dirs(&self) -> Vec<String> {
        self.dirs.read().unwrap().iter().cloned().collect()
    }
}

impl Sink for MemorySink {
    fn write(&self, path: &str, bytes: &[u8]) -> Result<(), SinkError> {
        if self.fail_paths.read().unwrap().contains(path) {
            return Err(SinkError::new(SinkErrorKind::Other)
                .with_backend("Memory")
                .with_path(path));
        }
        self.files
            .write()
            .unwrap()
            .insert(path.to_owned(), bytes.to_vec());
        Ok(())
    }

    fn ensure_dir(&self, path: &str) -> Result<(), SinkError> {
        self.dirs.write().unwrap().insert(path.to_owned());
        Ok(())
    }

    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, SinkError> {
        Ok(self.files.read().unwrap().get(path).cloned())
    }
}
