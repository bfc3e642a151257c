//! Archive reading API.
//!
//! [`Archive`] opens a 7z archive, exposes its entries, and extracts
//! selections of them into an [`ExtractSink`].
//!
//! # Example
//!
//! ```rust,ignore
//! use sevenz_decode::read::{Archive, ExtractOptions, MemorySink, Selection};
//!
//! let archive = Archive::open_path("archive.7z")?;
//! for entry in archive.entries() {
//!     println!("{}: {} bytes", entry.name, entry.size);
//! }
//!
//! let mut sink = MemorySink::new();
//! let result = archive.extract(&Selection::All, &mut sink, &ExtractOptions::default())?;
//! for failure in result.failures() {
//!     eprintln!("{}: {:?}", failure.name, failure.status);
//! }
//! ```

mod archive_open;
mod destination;
mod extraction;
mod info;
mod options;

pub use destination::{ExtractSink, FilesystemSink, MemorySink, NullSink};
pub use info::{ArchiveInfo, EntryResult, EntryStatus, ExtractResult};
pub use options::{ExtractOptions, Selection, Threads};

use crate::format::database::ArchiveDatabase;
use crate::format::header::StartHeader;
use crate::format::streams::ResourceLimits;
use crate::pipeline::SharedSource;

/// A 7z archive opened for reading.
///
/// All reads go through one shared, position-tracked source, so extraction
/// methods take `&self`.
#[derive(Debug)]
pub struct Archive<R> {
    pub(crate) source: SharedSource<R>,
    pub(crate) start: StartHeader,
    pub(crate) database: ArchiveDatabase,
    pub(crate) limits: ResourceLimits,
    pub(crate) info: ArchiveInfo,
}
