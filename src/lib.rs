//! # sevenz-decode
//!
//! A 7z container reader and coder-graph decode engine.
//!
//! The crate parses a 7z archive's header into an [`ArchiveDatabase`] and
//! rebuilds entry contents by running each folder through its graph of
//! coders: copy, LZMA, LZMA2, branch and delta filters, and the BCJ2
//! multiplexer. Decoding is single-threaded and verifies every folder and
//! file CRC.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sevenz_decode::{Archive, ExtractOptions, Result};
//! use sevenz_decode::read::{FilesystemSink, Selection};
//!
//! fn main() -> Result<()> {
//!     let archive = Archive::open_path("archive.7z")?;
//!
//!     for entry in archive.entries() {
//!         println!("{}: {} bytes", entry.name, entry.size);
//!     }
//!
//!     let mut sink = FilesystemSink::new("./output");
//!     let result = archive.extract(&Selection::All, &mut sink, &ExtractOptions::default())?;
//!     println!("{} extracted, {} failed", result.entries_succeeded(), result.entries_failed());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `lzma` | Yes | LZMA, LZMA2, BCJ x86 and Delta coders |
//! | `cli` | No | The `sevenz` command-line tool |
//!
//! Without `lzma`, only copy and BCJ2 folders decode; the rest report
//! [`Error::UnsupportedMethod`].
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`]. Opening an archive fails on any
//! problem. Extraction distinguishes archive-fatal errors, which are
//! returned, from folder-scoped ones (an unsupported coder, corrupt packed
//! data, a CRC mismatch), which are recorded per entry:
//!
//! ```rust,no_run
//! use sevenz_decode::read::{NullSink, Selection};
//! use sevenz_decode::{Archive, ExtractOptions};
//!
//! fn check(path: &str) -> sevenz_decode::Result<()> {
//!     let archive = Archive::open_path(path)?;
//!     let result = archive.extract(&Selection::All, &mut NullSink::new(), &ExtractOptions::new())?;
//!     for failure in result.failures() {
//!         eprintln!("{}: {:?}", failure.name, failure.status);
//!     }
//!     Ok(())
//! }
//! # fn main() {}
//! ```
//!
//! ## Resource Limits
//!
//! [`ResourceLimits`] bounds entry counts, header sizes and the amount of
//! data a folder or an extraction may produce. Folder output is buffered in
//! memory, so `max_folder_unpacked` bounds memory use.
//!
//! ## Logging
//!
//! The crate logs through the [`log`](https://docs.rs/log) facade and never
//! installs a logger.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod checksum;
pub mod codec;
pub mod error;
pub mod format;
pub mod pipeline;
pub mod progress;
pub mod read;
pub mod timestamp;

pub use error::{Error, ErrorCategory, Result};
pub use timestamp::Timestamp;

pub use format::database::ArchiveDatabase;
pub use format::files::FileEntry;
pub use format::streams::ResourceLimits;

pub use codec::{Decoder, Method, PropertyConfigurable};
pub use pipeline::{CacheStats, PipelineCache};
pub use progress::{NoProgress, ProgressReporter, StatisticsProgress, progress_fn};
pub use read::{
    Archive, EntryResult, EntryStatus, ExtractOptions, ExtractResult, ExtractSink, Selection,
    Threads,
};
