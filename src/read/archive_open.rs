//! Opening archives and querying their contents.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use crate::codec;
use crate::format::database::ArchiveDatabase;
use crate::format::files::FileEntry;
use crate::format::header::{StartHeader, locate_start_header};
use crate::format::parser::read_archive_header;
use crate::format::streams::ResourceLimits;
use crate::pipeline::SharedSource;
use crate::{Error, Result};

use super::{Archive, ArchiveInfo};

impl Archive<BufReader<File>> {
    /// Opens an archive from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the archive is invalid.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(Error::Io)?;
        Self::open(BufReader::new(file))
    }
}

impl<R: Read + Seek> Archive<R> {
    /// Opens an archive with the default [`ResourceLimits`].
    ///
    /// Locates the start header (scanning past a self-extractor stub if
    /// needed), reads and verifies the next header, decodes encoded headers
    /// and builds the archive database.
    pub fn open(reader: R) -> Result<Self> {
        Self::open_with_limits(reader, ResourceLimits::default())
    }

    /// Opens an archive with custom resource limits.
    pub fn open_with_limits(mut reader: R, limits: ResourceLimits) -> Result<Self> {
        let start = locate_start_header(&mut reader)?;
        let source = SharedSource::new(reader);

        let header = read_archive_header(&source, &start, &limits)?;
        let encoded_header_depth = header.encoded_depth;
        let database = header.into_database(start.data_start())?;

        let info = summarize(&database, &start, encoded_header_depth);
        log::debug!(
            "opened archive: {} entries, {} folders, {} pack streams",
            database.num_entries(),
            database.num_folders(),
            database.pack_info.num_streams()
        );

        Ok(Self {
            source,
            start,
            database,
            limits,
            info,
        })
    }

    /// Entries in archive order.
    pub fn entries(&self) -> &[FileEntry] {
        &self.database.entries
    }

    /// Entry `index`.
    pub fn entry(&self, index: usize) -> Option<&FileEntry> {
        self.database.entries.get(index)
    }

    /// Index of the first entry named `name`.
    pub fn entry_index(&self, name: &str) -> Option<usize> {
        self.database.entries.iter().position(|e| e.name == name)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.database.num_entries()
    }

    /// Returns `true` if the archive has no entries.
    pub fn is_empty(&self) -> bool {
        self.database.entries.is_empty()
    }

    /// Archive summary.
    pub fn info(&self) -> &ArchiveInfo {
        &self.info
    }

    /// The parsed archive model.
    pub fn database(&self) -> &ArchiveDatabase {
        &self.database
    }

    /// The start header.
    pub fn start_header(&self) -> &StartHeader {
        &self.start
    }

    /// Limits applied at open time and during extraction.
    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Returns the underlying reader.
    pub fn into_inner(self) -> Option<R> {
        self.source.into_inner()
    }
}

fn summarize(database: &ArchiveDatabase, start: &StartHeader, encoded_header_depth: u32) -> ArchiveInfo {
    let mut methods = Vec::new();
    for coder in database.folders.iter().flat_map(|f| &f.coders) {
        let name = codec::method_name(&coder.method_id);
        if !methods.contains(&name) {
            methods.push(name);
        }
    }

    ArchiveInfo {
        entry_count: database.num_entries(),
        total_size: database.total_unpacked_size(),
        packed_size: database.total_packed_size(),
        is_solid: (0..database.num_folders()).any(|f| database.is_solid_folder(f)),
        methods,
        folder_count: database.num_folders(),
        comment: database.comment.clone(),
        sfx_offset: start.sfx_offset,
        encoded_header_depth,
    }
}
