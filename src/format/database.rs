//! The parsed archive model with its derived lookup tables.

use super::files::{FileEntry, FilesInfo};
use super::streams::{Folder, PackInfo, SubStreamsInfo};
use crate::pipeline::PackRange;
use crate::{Error, Result};

/// Absolute pack stream ranges and the slice each folder consumes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackLayout {
    ranges: Vec<PackRange>,
    /// First pack stream and number of pack streams, per folder.
    folder_spans: Vec<(usize, usize)>,
}

impl PackLayout {
    /// Lays out the pack streams of `pack_info` from `data_start` and
    /// assigns them to `folders` in order.
    pub fn new(data_start: u64, pack_info: &PackInfo, folders: &[Folder]) -> Result<Self> {
        let overflow = || Error::corrupt_header(0, "pack stream offsets overflow");

        let mut offset = data_start
            .checked_add(pack_info.pack_pos)
            .ok_or_else(overflow)?;
        let mut ranges = Vec::with_capacity(pack_info.pack_sizes.len());
        for &size in &pack_info.pack_sizes {
            ranges.push(PackRange { offset, size });
            offset = offset.checked_add(size).ok_or_else(overflow)?;
        }

        let mut folder_spans = Vec::with_capacity(folders.len());
        let mut next = 0usize;
        for folder in folders {
            let count = folder.packed_streams.len();
            folder_spans.push((next, count));
            next += count;
        }
        if next > ranges.len() {
            return Err(Error::corrupt_header(
                0,
                format!(
                    "folders need {next} pack streams, archive declares {}",
                    ranges.len()
                ),
            ));
        }

        Ok(Self {
            ranges,
            folder_spans,
        })
    }

    /// Ranges of the pack streams feeding folder `folder`.
    pub fn folder_ranges(&self, folder: usize) -> &[PackRange] {
        self.folder_spans
            .get(folder)
            .map_or(&[], |&(first, count)| &self.ranges[first..first + count])
    }

    /// Index of the first pack stream of folder `folder`.
    pub fn first_pack_stream(&self, folder: usize) -> Option<usize> {
        self.folder_spans.get(folder).map(|&(first, _)| first)
    }

    /// All pack stream ranges.
    pub fn ranges(&self) -> &[PackRange] {
        &self.ranges
    }
}

/// Everything the header says about an archive.
///
/// Besides the raw sections it carries the maps extraction needs:
/// file to folder, folder to its files, and folder to its pack streams.
#[derive(Debug, Clone, Default)]
pub struct ArchiveDatabase {
    /// Pack stream sizes and CRCs.
    pub pack_info: PackInfo,
    /// Folder definitions.
    pub folders: Vec<Folder>,
    /// How folder outputs split into file streams.
    pub substreams: SubStreamsInfo,
    /// Entries in archive order.
    pub entries: Vec<FileEntry>,
    /// Archive comment, if stored.
    pub comment: Option<String>,
    layout: PackLayout,
    file_folder: Vec<Option<usize>>,
    folder_files: Vec<Vec<usize>>,
}

impl ArchiveDatabase {
    /// Assembles the database and derives its lookup tables.
    ///
    /// # Errors
    ///
    /// [`Error::CorruptHeader`] when the number of entries with a content
    /// stream differs from the number of substreams, or when the folders
    /// need more pack streams than the archive declares.
    pub fn build(
        pack_info: PackInfo,
        folders: Vec<Folder>,
        substreams: SubStreamsInfo,
        files: FilesInfo,
        data_start: u64,
    ) -> Result<Self> {
        let layout = PackLayout::new(data_start, &pack_info, &folders)?;

        let with_stream = files.entries.iter().filter(|e| e.has_stream).count();
        let total = substreams.total_streams();
        if with_stream != total {
            return Err(Error::corrupt_header(
                0,
                format!("{with_stream} entries have content but folders hold {total} streams"),
            ));
        }

        let mut file_folder = vec![None; files.entries.len()];
        let mut folder_files = vec![Vec::new(); folders.len()];
        let mut folder = 0usize;
        for entry in files.entries.iter().filter(|e| e.has_stream) {
            while substreams
                .num_unpack_streams
                .get(folder)
                .is_some_and(|&n| folder_files[folder].len() == n)
            {
                folder += 1;
            }
            // Counts match, so a folder with room always exists here.
            let Some(files) = folder_files.get_mut(folder) else {
                return Err(Error::corrupt_header(0, "more content streams than folders"));
            };
            files.push(entry.index);
            file_folder[entry.index] = Some(folder);
        }

        Ok(Self {
            pack_info,
            folders,
            substreams,
            entries: files.entries,
            comment: files.comment,
            layout,
            file_folder,
            folder_files,
        })
    }

    /// Number of entries.
    pub fn num_entries(&self) -> usize {
        self.entries.len()
    }

    /// Number of folders.
    pub fn num_folders(&self) -> usize {
        self.folders.len()
    }

    /// Folder holding the content of entry `index`, `None` for entries
    /// without a content stream.
    pub fn folder_for_entry(&self, index: usize) -> Option<usize> {
        self.file_folder.get(index).copied().flatten()
    }

    /// Entries stored in folder `folder`, in stream order.
    pub fn folder_entries(&self, folder: usize) -> &[usize] {
        self.folder_files.get(folder).map_or(&[], Vec::as_slice)
    }

    /// First entry stored in folder `folder`.
    pub fn first_entry_of_folder(&self, folder: usize) -> Option<usize> {
        self.folder_entries(folder).first().copied()
    }

    /// Index of the first pack stream of folder `folder`.
    pub fn first_pack_stream(&self, folder: usize) -> Option<usize> {
        self.layout.first_pack_stream(folder)
    }

    /// Absolute offset of pack stream `index`.
    pub fn pack_stream_offset(&self, index: usize) -> Option<u64> {
        self.layout.ranges().get(index).map(|r| r.offset)
    }

    /// Pack stream ranges of folder `folder`.
    pub fn folder_pack_ranges(&self, folder: usize) -> &[PackRange] {
        self.layout.folder_ranges(folder)
    }

    /// Sum of all entry sizes, saturating at `u64::MAX`.
    pub fn total_unpacked_size(&self) -> u64 {
        self.entries
            .iter()
            .fold(0u64, |acc, e| acc.saturating_add(e.size))
    }

    /// Sum of all pack stream sizes, saturating at `u64::MAX`.
    pub fn total_packed_size(&self) -> u64 {
        self.pack_info
            .pack_sizes
            .iter()
            .fold(0u64, |acc, &size| acc.saturating_add(size))
    }

    /// Whether folder `folder` holds more than one entry.
    pub fn is_solid_folder(&self, folder: usize) -> bool {
        self.folder_entries(folder).len() > 1
    }
}
