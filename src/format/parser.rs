//! Next-header parser.
//!
//! The next header is either a plain header or an encoded header: streams
//! info describing a folder whose decoded output is the real header. Encoded
//! headers may nest; each level is decoded with the regular pipeline and
//! parsed again from its first byte.

use std::io::{Read, Seek};

use super::database::{ArchiveDatabase, PackLayout};
use super::files::FilesInfo;
use super::header::StartHeader;
use super::property_id;
use super::reader::HeaderReader;
use super::streams::{Folder, PackInfo, ResourceLimits, SubStreamsInfo, UnpackInfo};
use crate::pipeline::{self, PipelineCache, SharedSource};
use crate::{Error, Result};

/// Deepest encoded-header nesting that is followed.
pub const MAX_ENCODED_HEADER_DEPTH: u32 = 4;

/// Pack, unpack and substreams sections of one streams info block.
#[derive(Debug, Clone, Default)]
pub struct StreamsInfo {
    /// Pack stream sizes and CRCs.
    pub pack_info: PackInfo,
    /// Folder definitions.
    pub folders: Vec<Folder>,
    /// File streams per folder. Implied from the folders when absent.
    pub substreams: SubStreamsInfo,
}

impl StreamsInfo {
    /// Parses a streams info block up to and including its `END`.
    pub fn parse(r: &mut HeaderReader, limits: &ResourceLimits) -> Result<Self> {
        let mut info = Self::default();
        let mut substreams = None;

        loop {
            let offset = r.offset();
            match r.read_number()? {
                property_id::END => break,
                property_id::PACK_INFO => info.pack_info = PackInfo::parse(r, limits)?,
                property_id::UNPACK_INFO => info.folders = UnpackInfo::parse(r, limits)?.folders,
                property_id::SUBSTREAMS_INFO => {
                    substreams = Some(SubStreamsInfo::parse(r, &info.folders, limits)?);
                }
                id => {
                    return Err(Error::corrupt_header(
                        offset,
                        format!("unexpected property {id:#x} in streams info"),
                    ));
                }
            }
        }

        info.substreams = match substreams {
            Some(s) => s,
            None => SubStreamsInfo::from_folders(&info.folders)?,
        };
        Ok(info)
    }
}

/// A fully parsed next header.
#[derive(Debug, Clone, Default)]
pub struct ArchiveHeader {
    /// Main streams.
    pub streams: StreamsInfo,
    /// Entries and comment.
    pub files: FilesInfo,
    /// Number of encoded-header levels that were decoded to reach it.
    pub encoded_depth: u32,
}

impl ArchiveHeader {
    /// Builds the archive database, placing pack streams from `data_start`.
    pub fn into_database(self, data_start: u64) -> Result<ArchiveDatabase> {
        ArchiveDatabase::build(
            self.streams.pack_info,
            self.streams.folders,
            self.streams.substreams,
            self.files,
            data_start,
        )
    }
}

/// Parses next-header bytes, decoding encoded headers from `source`.
pub struct HeaderParser<'s, R> {
    source: &'s SharedSource<R>,
    data_start: u64,
    limits: ResourceLimits,
    cache: PipelineCache,
    depth: u32,
    max_depth: u32,
}

impl<'s, R: Read + Seek> HeaderParser<'s, R> {
    /// Creates a parser whose pack streams start at `data_start`.
    pub fn new(source: &'s SharedSource<R>, data_start: u64, limits: ResourceLimits) -> Self {
        Self {
            source,
            data_start,
            limits,
            cache: PipelineCache::new(1),
            depth: 0,
            max_depth: MAX_ENCODED_HEADER_DEPTH,
        }
    }

    /// Sets the deepest encoded-header nesting to follow.
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Parses `data`, located at `base_offset` in the archive.
    pub fn parse(mut self, data: Vec<u8>, base_offset: u64) -> Result<ArchiveHeader> {
        let mut r = HeaderReader::new(data, base_offset);
        loop {
            let offset = r.offset();
            match r.read_number()? {
                property_id::HEADER => {
                    let mut header = self.parse_main_header(&mut r)?;
                    header.encoded_depth = self.depth;
                    return Ok(header);
                }
                property_id::ENCODED_HEADER => {
                    self.depth += 1;
                    if self.depth > self.max_depth {
                        return Err(Error::ResourceLimitExceeded(format!(
                            "encoded header nested deeper than {}",
                            self.max_depth
                        )));
                    }
                    let streams = StreamsInfo::parse(&mut r, &self.limits)?;
                    let (decoded, decoded_offset) = self.decode_encoded_header(&streams, offset)?;
                    log::debug!(
                        "decoded encoded header level {}: {} bytes",
                        self.depth,
                        decoded.len()
                    );
                    r.push_buffer(decoded, decoded_offset);
                }
                id => {
                    return Err(Error::corrupt_header(
                        offset,
                        format!("expected header marker, found {id:#x}"),
                    ));
                }
            }
        }
    }

    fn parse_main_header(&mut self, r: &mut HeaderReader) -> Result<ArchiveHeader> {
        let mut header = ArchiveHeader::default();
        let mut additional = Vec::new();

        loop {
            let offset = r.offset();
            match r.read_number()? {
                property_id::END => break,
                property_id::ARCHIVE_PROPERTIES => skip_archive_properties(r)?,
                property_id::ADDITIONAL_STREAMS_INFO => {
                    let streams = StreamsInfo::parse(r, &self.limits)?;
                    additional = self.decode_additional_streams(&streams, offset)?;
                }
                property_id::MAIN_STREAMS_INFO => {
                    header.streams = StreamsInfo::parse(r, &self.limits)?;
                }
                property_id::FILES_INFO => {
                    header.files = FilesInfo::parse(
                        r,
                        &additional,
                        &header.streams.substreams.unpack_sizes,
                        &header.streams.substreams.digests,
                        &self.limits,
                    )?;
                }
                id => {
                    return Err(Error::corrupt_header(
                        offset,
                        format!("unexpected property {id:#x} in header"),
                    ));
                }
            }
        }

        Ok(header)
    }

    /// Decodes the first folder of an encoded header. Returns the bytes and
    /// the archive offset of their packed data.
    fn decode_encoded_header(&mut self, streams: &StreamsInfo, offset: u64) -> Result<(Vec<u8>, u64)> {
        if streams.folders.is_empty() {
            return Err(Error::corrupt_header(offset, "encoded header has no folders"));
        }
        if streams.folders.len() > 1 {
            log::debug!(
                "encoded header declares {} folders, decoding the first",
                streams.folders.len()
            );
        }

        let layout = PackLayout::new(self.data_start, &streams.pack_info, &streams.folders)?;
        let data = self.decode_header_folder(&layout, &streams.folders, 0, offset, "encoded header")?;
        let packed_at = layout
            .folder_ranges(0)
            .first()
            .map_or(self.data_start, |range| range.offset);
        Ok((data, packed_at))
    }

    fn decode_additional_streams(
        &mut self,
        streams: &StreamsInfo,
        offset: u64,
    ) -> Result<Vec<Vec<u8>>> {
        let layout = PackLayout::new(self.data_start, &streams.pack_info, &streams.folders)?;
        (0..streams.folders.len())
            .map(|i| self.decode_header_folder(&layout, &streams.folders, i, offset, "additional stream"))
            .collect()
    }

    fn decode_header_folder(
        &mut self,
        layout: &PackLayout,
        folders: &[Folder],
        index: usize,
        offset: u64,
        what: &str,
    ) -> Result<Vec<u8>> {
        let folder = &folders[index];
        let size = folder.unpack_size()?;
        if size > self.limits.max_header_bytes {
            return Err(Error::ResourceLimitExceeded(format!(
                "{what} of {size} bytes exceeds limit of {}",
                self.limits.max_header_bytes
            )));
        }

        let mut data = Vec::with_capacity(size as usize);
        let output = pipeline::decode_folder(
            &mut self.cache,
            self.source,
            folder,
            index,
            layout.folder_ranges(index),
            &mut data,
        )
        .map_err(|e| match e {
            Error::DataError { reason, .. } => {
                Error::corrupt_header(offset, format!("{what}: {reason}"))
            }
            other => other,
        })?;

        if let Some(expected) = folder.unpack_crc {
            if output.crc != expected {
                return Err(Error::corrupt_header(
                    offset,
                    format!(
                        "{what} CRC mismatch: expected {expected:#x}, got {:#x}",
                        output.crc
                    ),
                ));
            }
        }
        Ok(data)
    }
}

fn skip_archive_properties(r: &mut HeaderReader) -> Result<()> {
    loop {
        let id = r.read_number()?;
        if id == property_id::END {
            return Ok(());
        }
        log::debug!("skipping archive property {id:#x}");
        r.skip_data()?;
    }
}

/// Reads, verifies and parses the next header described by `start`.
///
/// An archive whose next header is empty has no entries.
pub fn read_archive_header<R: Read + Seek>(
    source: &SharedSource<R>,
    start: &StartHeader,
    limits: &ResourceLimits,
) -> Result<ArchiveHeader> {
    let size = start.next_header_size;
    if size == 0 {
        return Ok(ArchiveHeader::default());
    }
    if size > limits.max_header_bytes {
        return Err(Error::ResourceLimitExceeded(format!(
            "next header of {size} bytes exceeds limit of {}",
            limits.max_header_bytes
        )));
    }

    let position = start.next_header_position()?;
    let len = source.len()?;
    if position.checked_add(size).is_none_or(|end| end > len) {
        return Err(Error::truncated(
            len,
            format!("next header of {size} bytes at {position:#x}"),
        ));
    }

    let mut data = vec![0u8; size as usize];
    source.read_exact_at(position, &mut data, "next header")?;
    let actual = crc32fast::hash(&data);
    if actual != start.next_header_crc {
        return Err(Error::corrupt_header(
            position,
            format!(
                "next header CRC mismatch: expected {:#x}, got {actual:#x}",
                start.next_header_crc
            ),
        ));
    }

    HeaderParser::new(source, start.data_start(), limits.clone()).parse(data, position)
}
