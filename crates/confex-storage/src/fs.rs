//! Filesystem sink implementation.

use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::sink::{Sink, SinkError};

/// Sink writing into a root directory on the local filesystem.
#[derive(Debug)]
pub struct FsSink {
    root: PathBuf,
}

impl FsSink {
    /// Create a sink rooted at `root`.
    ///
    /// The directory is created on first write, not here.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory this sink writes into.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a relative output path to an absolute path under the root.
    ///
    /// Rejects absolute paths and any path containing `..` components.
    fn full_path(&self, path: &str) -> Result<PathBuf, SinkError> {
        let rel = Path::new(path);
        let escapes = rel.components().any(|c| {
            !matches!(c, Component::Normal(_) | Component::CurDir)
        });
        if rel.is_absolute() || escapes {
            return Err(SinkError::invalid_path(path).with_backend("Fs"));
        }
        Ok(self.root.join(rel))
    }
}

impl Sink for FsSink {
    fn write(&self, path: &str, bytes: &[u8]) -> Result<(), SinkError> {
        let full = self.full_path(path)?;
        debug!("Writing {}", full.display());
        std::fs::write(&full, bytes).map_err(|e| SinkError::io(e, Some(full)).with_backend("Fs"))
    }

    fn ensure_dir(&self, path: &str) -> Result<(), SinkError> {
        let full = self.full_path(path)?;
        std::fs::create_dir_all(&full)
            .map_err(|e| SinkError::io(e, Some(full)).with_backend("Fs"))
    }

    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, SinkError> {
        let full = self.full_path(path)?;
        match std::fs::read(&full) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SinkError::io(e, Some(full)).with_backend("Fs")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::SinkErrorKind;

    #[test]
    fn test_write_and_read_back() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = FsSink::new(tmp.path());

        sink.ensure_dir("docs").unwrap();
        sink.write("docs/index.md", b"# Home\n").unwrap();

        assert_eq!(sink.read("docs/index.md").unwrap().unwrap(), b"# Home\n");
        assert!(tmp.path().join("docs/index.md").is_file());
    }

    #[test]
    fn test_read_missing_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = FsSink::new(tmp.path());

        assert!(sink.read("absent.md").unwrap().is_none());
    }

    #[test]
    fn test_ensure_dir_nested() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = FsSink::new(tmp.path());

        sink.ensure_dir("a/b/attachments").unwrap();

        assert!(tmp.path().join("a/b/attachments").is_dir());
    }

    #[test]
    fn test_write_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = FsSink::new(tmp.path());

        sink.write("page.md", b"old").unwrap();
        sink.write("page.md", b"new").unwrap();

        assert_eq!(sink.read("page.md").unwrap().unwrap(), b"new");
    }

    #[test]
    fn test_rejects_parent_escape() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = FsSink::new(tmp.path().join("out"));

        let err = sink.write("../escape.md", b"x").unwrap_err();
        assert_eq!(err.kind, SinkErrorKind::InvalidPath);
    }

    #[test]
    fn test_rejects_absolute_path() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = FsSink::new(tmp.path());

        let err = sink.ensure_dir("/etc/confex").unwrap_err();
        assert_eq!(err.kind, SinkErrorKind::InvalidPath);
    }
}
