//! Output sink abstraction for confex.
//!
//! This crate provides a [`Sink`] trait for abstracting where the exported
//! Markdown tree and attachments are written. This enables:
//!
//! - **Unit testing** the export pipeline without touching the filesystem
//! - **Backend flexibility** (filesystem today, object stores later)
//! - **Clean separation** between traversal logic and I/O mechanics
//!
//! # Architecture
//!
//! The crate provides:
//! - [`Sink`] trait with `write()`, `ensure_dir()`, and `read()` methods
//! - [`FsSink`] implementation rooted at the output directory
//! - [`MemorySink`] for testing (behind `mock` feature flag)

mod fs;
#[cfg(feature = "mock")]
mod mock;
mod sink;

pub use fs::FsSink;
#[cfg(feature = "mock")]
pub use mock::MemorySink;
pub use sink::{Sink, SinkError, SinkErrorKind};
