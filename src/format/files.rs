//! Files info: the entry table of an archive.

use super::attributes;
use super::property_id;
use super::reader::HeaderReader;
use super::streams::ResourceLimits;
use crate::timestamp::Timestamp;
use crate::{Error, Result};

/// One entry of the archive's file table.
///
/// Built up property by property while the files info section is parsed,
/// then read-only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileEntry {
    /// Position in the file table.
    pub index: usize,
    /// Path inside the archive, `/`-separated as stored.
    pub name: String,
    /// Uncompressed size.
    pub size: u64,
    /// CRC of the uncompressed content, if stored.
    pub crc: Option<u32>,
    /// Creation time.
    pub ctime: Option<Timestamp>,
    /// Last access time.
    pub atime: Option<Timestamp>,
    /// Last modification time.
    pub mtime: Option<Timestamp>,
    /// Windows attributes (high 16 bits may carry Unix mode).
    pub attributes: Option<u32>,
    /// Entry is a directory.
    pub is_directory: bool,
    /// Entry is an anti-item (a deletion marker).
    pub is_anti: bool,
    /// Entry has a content stream in some folder.
    pub has_stream: bool,
    /// Explicit start position, when the archive records one.
    pub start_pos: Option<u64>,
}

impl FileEntry {
    /// Returns `true` for regular files, including empty ones.
    pub fn is_file(&self) -> bool {
        !self.is_directory
    }

    /// Unix permission bits, when the attributes carry them.
    pub fn unix_mode(&self) -> Option<u32> {
        self.attributes
            .filter(|a| a & attributes::UNIX_EXTENSION != 0)
            .map(|a| a >> 16)
    }
}

/// The parsed files info section.
#[derive(Debug, Clone, Default)]
pub struct FilesInfo {
    /// Entries in file table order.
    pub entries: Vec<FileEntry>,
    /// Archive comment.
    pub comment: Option<String>,
}

impl FilesInfo {
    /// Parses a files info section (after its `FILES_INFO` id).
    ///
    /// `unpack_sizes` and `digests` are the substream tables; they are
    /// assigned in order to the entries that have a content stream.
    /// `additional` holds decoded additional streams that properties with
    /// the external flag set refer to.
    pub fn parse(
        r: &mut HeaderReader,
        additional: &[Vec<u8>],
        unpack_sizes: &[u64],
        digests: &[Option<u32>],
        limits: &ResourceLimits,
    ) -> Result<Self> {
        let num_files = r.read_count("file")?;
        limits.check_count("files", num_files as u64)?;

        let mut entries: Vec<FileEntry> = (0..num_files)
            .map(|index| FileEntry {
                index,
                ..FileEntry::default()
            })
            .collect();
        let mut empty_streams = vec![false; num_files];
        let mut seen_empty_stream = false;
        let mut empty_files: Vec<bool> = Vec::new();
        let mut anti_items: Vec<bool> = Vec::new();
        let mut comment = None;

        loop {
            let id = r.read_number()?;
            if id == property_id::END {
                break;
            }
            let size = r.read_number()?;
            let start_offset = r.offset();
            if size > r.remaining() as u64 {
                return Err(Error::truncated(
                    start_offset,
                    format!("file property {id:#x} of {size} bytes"),
                ));
            }
            let start = r.position();
            let num_empty = empty_streams.iter().filter(|&&e| e).count();

            match id {
                property_id::EMPTY_STREAM => {
                    if seen_empty_stream {
                        return Err(Error::corrupt_header(
                            start_offset,
                            "empty stream property repeated",
                        ));
                    }
                    seen_empty_stream = true;
                    empty_streams = r.read_bool_vector(num_files)?;
                }
                property_id::EMPTY_FILE | property_id::ANTI => {
                    if !seen_empty_stream {
                        return Err(Error::corrupt_header(
                            start_offset,
                            format!("file property {id:#x} before the empty stream property"),
                        ));
                    }
                    let flags = r.read_bool_vector(num_empty)?;
                    if id == property_id::EMPTY_FILE {
                        empty_files = flags;
                    } else {
                        anti_items = flags;
                    }
                }
                property_id::NAME => {
                    with_external(r, additional, |r| {
                        for entry in entries.iter_mut() {
                            entry.name = r.read_utf16_string()?;
                        }
                        Ok(())
                    })?;
                }
                property_id::CTIME => {
                    parse_timestamps(r, additional, &mut entries, |e, t| e.ctime = Some(t))?;
                }
                property_id::ATIME => {
                    parse_timestamps(r, additional, &mut entries, |e, t| e.atime = Some(t))?;
                }
                property_id::MTIME => {
                    parse_timestamps(r, additional, &mut entries, |e, t| e.mtime = Some(t))?;
                }
                property_id::WIN_ATTRIBUTES => {
                    let defined = r.read_all_or_bits(num_files)?;
                    with_external(r, additional, |r| {
                        for (entry, has_attr) in entries.iter_mut().zip(defined) {
                            if has_attr {
                                entry.attributes = Some(r.read_u32()?);
                            }
                        }
                        Ok(())
                    })?;
                }
                property_id::START_POS => {
                    let defined = r.read_all_or_bits(num_files)?;
                    with_external(r, additional, |r| {
                        for (entry, has_pos) in entries.iter_mut().zip(defined) {
                            if has_pos {
                                entry.start_pos = Some(r.read_u64()?);
                            }
                        }
                        Ok(())
                    })?;
                }
                property_id::COMMENT => {
                    comment = Some(with_external(r, additional, |r| r.read_utf16_string())?);
                }
                other => {
                    log::debug!("skipping file property {other:#x} ({size} bytes)");
                }
            }

            let consumed = (r.position() - start) as u64;
            if consumed > size {
                return Err(Error::corrupt_header(
                    start_offset,
                    format!("file property {id:#x} overruns its {size} bytes"),
                ));
            }
            r.skip(size - consumed)?;
        }

        let mut empty_index = 0;
        let mut stream_index = 0;
        for (entry, &is_empty) in entries.iter_mut().zip(&empty_streams) {
            if is_empty {
                let is_empty_file = empty_files.get(empty_index).copied().unwrap_or(false);
                entry.is_directory = !is_empty_file;
                entry.is_anti = anti_items.get(empty_index).copied().unwrap_or(false);
                empty_index += 1;
            } else {
                entry.has_stream = true;
                entry.size = unpack_sizes.get(stream_index).copied().unwrap_or(0);
                entry.crc = digests.get(stream_index).copied().flatten();
                stream_index += 1;
            }
            if entry
                .attributes
                .is_some_and(|a| a & attributes::DIRECTORY != 0)
            {
                entry.is_directory = true;
            }
        }

        Ok(Self { entries, comment })
    }
}

/// Reads the external flag of a property and runs `f` against the right
/// source: inline data, or the additional stream the flag refers to.
fn with_external<T>(
    r: &mut HeaderReader,
    additional: &[Vec<u8>],
    f: impl FnOnce(&mut HeaderReader) -> Result<T>,
) -> Result<T> {
    if r.read_u8()? == 0 {
        return f(r);
    }

    let offset = r.offset();
    let data_index = r.read_count("data index")?;
    let data = additional.get(data_index).ok_or_else(|| {
        Error::corrupt_header(offset, format!("no additional stream {data_index}"))
    })?;
    r.push_buffer(data.clone(), 0);
    let result = f(r);
    r.pop_buffer()?;
    result
}

fn parse_timestamps(
    r: &mut HeaderReader,
    additional: &[Vec<u8>],
    entries: &mut [FileEntry],
    mut setter: impl FnMut(&mut FileEntry, Timestamp),
) -> Result<()> {
    let defined = r.read_all_or_bits(entries.len())?;
    with_external(r, additional, |r| {
        for (entry, has_time) in entries.iter_mut().zip(defined) {
            if has_time {
                setter(entry, Timestamp::from_filetime(r.read_u64()?));
            }
        }
        Ok(())
    })
}
