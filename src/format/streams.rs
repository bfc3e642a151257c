//! Streams info: pack streams, folders (coder graphs) and substreams.
//!
//! A folder is a small directed graph. Each [`Coder`] owns a contiguous
//! range of input stream indices and output stream indices, numbered in
//! declaration order across the folder. A [`BindPair`] connects one coder
//! input to another coder's output. Inputs with no bind pair are fed from
//! pack streams, and exactly one output has no bind pair: the folder's
//! decoded content.

use super::property_id;
use super::reader::HeaderReader;
use crate::{Error, Result};

/// Maximum number of coders accepted in one folder.
pub const MAX_CODERS_PER_FOLDER: usize = 16;

/// Maximum number of input or output streams accepted for one coder.
pub const MAX_CODER_STREAMS: usize = 32;

/// Resource limits applied while reading an archive.
///
/// These guard against archives that declare absurd sizes or counts. A
/// limit violation is always fatal.
///
/// # Example
///
/// ```rust
/// use sevenz_decode::format::streams::ResourceLimits;
///
/// let limits = ResourceLimits::default()
///     .max_entries(10_000)
///     .max_folder_unpacked(256 << 20);
/// assert_eq!(limits.max_entries, 10_000);
/// ```
#[derive(Debug, Clone)]
pub struct ResourceLimits {
    /// Maximum number of entries, folders, pack streams or substreams.
    pub max_entries: usize,
    /// Maximum size of the next header and of any decoded header.
    pub max_header_bytes: u64,
    /// Maximum declared unpacked size of a single folder.
    ///
    /// Folder output is buffered in memory, so this bounds memory use.
    pub max_folder_unpacked: u64,
    /// Maximum total bytes produced by one extraction call.
    pub max_total_unpacked: u64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_entries: 1_000_000,
            max_header_bytes: 64 << 20,
            max_folder_unpacked: 4 << 30,
            max_total_unpacked: 1 << 40,
        }
    }
}

impl ResourceLimits {
    /// Creates the default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Disables all limits.
    pub fn unlimited() -> Self {
        Self {
            max_entries: usize::MAX,
            max_header_bytes: u64::MAX,
            max_folder_unpacked: u64::MAX,
            max_total_unpacked: u64::MAX,
        }
    }

    /// Sets the maximum entry count.
    pub fn max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    /// Sets the maximum header size.
    pub fn max_header_bytes(mut self, max: u64) -> Self {
        self.max_header_bytes = max;
        self
    }

    /// Sets the maximum unpacked size of one folder.
    pub fn max_folder_unpacked(mut self, max: u64) -> Self {
        self.max_folder_unpacked = max;
        self
    }

    /// Sets the maximum total unpacked size per extraction.
    pub fn max_total_unpacked(mut self, max: u64) -> Self {
        self.max_total_unpacked = max;
        self
    }

    pub(crate) fn check_count(&self, what: &str, count: u64) -> Result<()> {
        if count > self.max_entries as u64 {
            return Err(Error::ResourceLimitExceeded(format!(
                "too many {what}: {count}"
            )));
        }
        Ok(())
    }
}

/// Sizes and CRCs of the packed streams.
#[derive(Debug, Clone, Default)]
pub struct PackInfo {
    /// Offset of the first pack stream, relative to the end of the start header.
    pub pack_pos: u64,
    /// Size of each pack stream.
    pub pack_sizes: Vec<u64>,
    /// Optional CRC of each pack stream.
    pub pack_crcs: Vec<Option<u32>>,
}

impl PackInfo {
    /// Parses a pack info section (after its `PACK_INFO` id).
    pub fn parse(r: &mut HeaderReader, limits: &ResourceLimits) -> Result<Self> {
        let pack_pos = r.read_number()?;
        let num_streams = r.read_count("pack stream")?;
        limits.check_count("pack streams", num_streams as u64)?;

        let mut pack_sizes = None;
        let mut pack_crcs = vec![None; num_streams];

        loop {
            match r.read_number()? {
                property_id::END => break,
                property_id::SIZE => {
                    let mut sizes = Vec::with_capacity(num_streams);
                    for _ in 0..num_streams {
                        sizes.push(r.read_number()?);
                    }
                    pack_sizes = Some(sizes);
                }
                property_id::CRC => {
                    let defined = r.read_all_or_bits(num_streams)?;
                    for (slot, has_crc) in pack_crcs.iter_mut().zip(defined) {
                        if has_crc {
                            *slot = Some(r.read_u32()?);
                        }
                    }
                }
                id => {
                    log::debug!("skipping pack info property {id:#x}");
                    r.skip_data()?;
                }
            }
        }

        let pack_sizes = match pack_sizes {
            Some(sizes) => sizes,
            None if num_streams == 0 => Vec::new(),
            None => {
                return Err(Error::corrupt_header(r.offset(), "pack sizes missing"));
            }
        };

        Ok(Self {
            pack_pos,
            pack_sizes,
            pack_crcs,
        })
    }

    /// Number of pack streams.
    pub fn num_streams(&self) -> usize {
        self.pack_sizes.len()
    }
}

/// One coder of a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coder {
    /// Method ID bytes.
    pub method_id: Vec<u8>,
    /// Number of input streams.
    pub num_in_streams: usize,
    /// Number of output streams.
    pub num_out_streams: usize,
    /// Opaque coder properties.
    pub properties: Option<Vec<u8>>,
}

impl Coder {
    /// Method ID as an integer, most significant byte first
    /// (`[03 01 01]` becomes `0x030101`).
    pub fn method_id_u64(&self) -> u64 {
        self.method_id
            .iter()
            .fold(0u64, |acc, &b| (acc << 8) | b as u64)
    }

    /// Returns `true` for 1-in/1-out coders.
    pub fn is_simple(&self) -> bool {
        self.num_in_streams == 1 && self.num_out_streams == 1
    }
}

/// An edge from a coder output to another coder's input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindPair {
    /// Folder-wide input stream index.
    pub in_index: usize,
    /// Folder-wide output stream index.
    pub out_index: usize,
}

/// A folder: a coder graph that decodes one or more pack streams into one
/// output stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Folder {
    /// Coders in declaration order.
    pub coders: Vec<Coder>,
    /// Graph edges.
    pub bind_pairs: Vec<BindPair>,
    /// Input stream indices fed from pack streams, in pack stream order.
    pub packed_streams: Vec<usize>,
    /// Declared size of every output stream.
    pub unpack_sizes: Vec<u64>,
    /// CRC of the folder output.
    pub unpack_crc: Option<u32>,
    /// Archive offset of the folder record, for diagnostics.
    pub header_offset: u64,
}

impl Folder {
    fn parse(r: &mut HeaderReader) -> Result<Self> {
        let offset = r.offset();
        let num_coders = r.read_count("coder")?;
        if num_coders == 0 {
            return Err(Error::corrupt_header(offset, "folder has no coders"));
        }
        if num_coders > MAX_CODERS_PER_FOLDER {
            return Err(Error::ResourceLimitExceeded(format!(
                "too many coders in folder: {num_coders}"
            )));
        }

        let mut coders = Vec::with_capacity(num_coders);
        for _ in 0..num_coders {
            let flags_offset = r.offset();
            let flags = r.read_u8()?;
            if flags & 0xC0 != 0 {
                return Err(Error::UnsupportedFeature {
                    feature: "alternative coder methods",
                });
            }

            let id_size = (flags & 0x0F) as usize;
            if id_size > 8 {
                return Err(Error::corrupt_header(
                    flags_offset,
                    format!("method id of {id_size} bytes"),
                ));
            }
            let method_id = r.read_bytes(id_size)?;

            let (num_in_streams, num_out_streams) = if flags & 0x10 != 0 {
                (r.read_count("coder input")?, r.read_count("coder output")?)
            } else {
                (1, 1)
            };
            if num_in_streams > MAX_CODER_STREAMS || num_out_streams > MAX_CODER_STREAMS {
                return Err(Error::corrupt_header(
                    flags_offset,
                    format!("coder declares {num_in_streams} inputs and {num_out_streams} outputs"),
                ));
            }

            let properties = if flags & 0x20 != 0 {
                let size = r.read_count("coder property byte")?;
                Some(r.read_bytes(size)?)
            } else {
                None
            };

            coders.push(Coder {
                method_id,
                num_in_streams,
                num_out_streams,
                properties,
            });
        }

        let total_in: usize = coders.iter().map(|c| c.num_in_streams).sum();
        let total_out: usize = coders.iter().map(|c| c.num_out_streams).sum();
        if total_out == 0 {
            return Err(Error::corrupt_header(offset, "folder has no output streams"));
        }

        let num_bind_pairs = total_out - 1;
        let mut bind_pairs = Vec::with_capacity(num_bind_pairs);
        for _ in 0..num_bind_pairs {
            let in_index = r.read_count("bind pair input")?;
            let out_index = r.read_count("bind pair output")?;
            bind_pairs.push(BindPair {
                in_index,
                out_index,
            });
        }

        if total_in < num_bind_pairs {
            return Err(Error::corrupt_header(
                offset,
                format!("{total_in} inputs cannot take {num_bind_pairs} bind pairs"),
            ));
        }
        let num_packed = total_in - num_bind_pairs;

        let mut packed_streams = Vec::with_capacity(num_packed);
        if num_packed == 1 {
            let unbound = (0..total_in)
                .find(|&i| !bind_pairs.iter().any(|bp| bp.in_index == i))
                .ok_or_else(|| Error::corrupt_header(offset, "no unbound input stream"))?;
            packed_streams.push(unbound);
        } else {
            for _ in 0..num_packed {
                packed_streams.push(r.read_count("packed stream index")?);
            }
        }

        let folder = Self {
            coders,
            bind_pairs,
            packed_streams,
            unpack_sizes: Vec::new(),
            unpack_crc: None,
            header_offset: offset,
        };
        folder.validate(offset)?;
        Ok(folder)
    }

    /// Total input streams over all coders.
    pub fn total_in_streams(&self) -> usize {
        self.coders.iter().map(|c| c.num_in_streams).sum()
    }

    /// Total output streams over all coders.
    pub fn total_out_streams(&self) -> usize {
        self.coders.iter().map(|c| c.num_out_streams).sum()
    }

    /// First input and first output stream index of every coder.
    pub fn coder_stream_offsets(&self) -> Vec<(usize, usize)> {
        let mut result = Vec::with_capacity(self.coders.len());
        let (mut in_offset, mut out_offset) = (0, 0);
        for coder in &self.coders {
            result.push((in_offset, out_offset));
            in_offset += coder.num_in_streams;
            out_offset += coder.num_out_streams;
        }
        result
    }

    /// Index of the bind pair whose input is `in_index`.
    pub fn find_bind_pair_for_in_stream(&self, in_index: usize) -> Option<usize> {
        self.bind_pairs.iter().position(|bp| bp.in_index == in_index)
    }

    /// Index of the bind pair whose output is `out_index`.
    pub fn find_bind_pair_for_out_stream(&self, out_index: usize) -> Option<usize> {
        self.bind_pairs
            .iter()
            .position(|bp| bp.out_index == out_index)
    }

    /// Position of `in_index` in the packed stream list.
    pub fn find_pack_stream_index(&self, in_index: usize) -> Option<usize> {
        self.packed_streams.iter().position(|&ps| ps == in_index)
    }

    /// The output stream no bind pair consumes, scanning from the end.
    pub fn main_output_stream(&self) -> Option<usize> {
        (0..self.total_out_streams())
            .rev()
            .find(|&i| self.find_bind_pair_for_out_stream(i).is_none())
    }

    /// Declared size of the folder's main output.
    pub fn unpack_size(&self) -> Result<u64> {
        self.main_output_stream()
            .and_then(|i| self.unpack_sizes.get(i).copied())
            .ok_or_else(|| {
                Error::corrupt_header(self.header_offset, "folder has no unbound output stream")
            })
    }

    /// Coder owning output stream `out_index`, with the stream's position
    /// within that coder.
    pub fn coder_for_out_stream(&self, out_index: usize) -> Option<(usize, usize)> {
        let mut start = 0;
        for (i, coder) in self.coders.iter().enumerate() {
            if out_index < start + coder.num_out_streams {
                return Some((i, out_index - start));
            }
            start += coder.num_out_streams;
        }
        None
    }

    /// Coder owning input stream `in_index`, with the stream's position
    /// within that coder.
    pub fn coder_for_in_stream(&self, in_index: usize) -> Option<(usize, usize)> {
        let mut start = 0;
        for (i, coder) in self.coders.iter().enumerate() {
            if in_index < start + coder.num_in_streams {
                return Some((i, in_index - start));
            }
            start += coder.num_in_streams;
        }
        None
    }

    /// Coder producing the main output.
    pub fn main_coder_index(&self) -> Option<usize> {
        self.main_output_stream()
            .and_then(|out| self.coder_for_out_stream(out))
            .map(|(coder, _)| coder)
    }

    /// Checks the graph invariants.
    ///
    /// - there are exactly `total_out - 1` bind pairs, all in range
    /// - no output is bound twice, so exactly one output is unbound
    /// - bind pair inputs and packed streams together cover every input once
    /// - the graph has no cycle
    pub fn validate(&self, offset: u64) -> Result<()> {
        let corrupt = |reason: String| -> Result<()> { Err(Error::corrupt_header(offset, reason)) };
        let total_in = self.total_in_streams();
        let total_out = self.total_out_streams();

        if total_out == 0 || self.bind_pairs.len() != total_out - 1 {
            return corrupt(format!(
                "{} bind pairs for {} output streams",
                self.bind_pairs.len(),
                total_out
            ));
        }

        let mut in_uses = vec![0u32; total_in];
        let mut out_bound = vec![false; total_out];
        for (i, bp) in self.bind_pairs.iter().enumerate() {
            if bp.in_index >= total_in || bp.out_index >= total_out {
                return corrupt(format!(
                    "bind pair {i} ({} <- {}) out of range",
                    bp.in_index, bp.out_index
                ));
            }
            if std::mem::replace(&mut out_bound[bp.out_index], true) {
                return corrupt(format!("output stream {} bound twice", bp.out_index));
            }
            in_uses[bp.in_index] += 1;
        }
        for &ps in &self.packed_streams {
            if ps >= total_in {
                return corrupt(format!("packed stream input {ps} out of range"));
            }
            in_uses[ps] += 1;
        }
        if let Some(i) = in_uses.iter().position(|&n| n != 1) {
            return corrupt(format!(
                "input stream {i} is fed {} times",
                in_uses[i]
            ));
        }

        if self.has_cycle() {
            return corrupt("coder graph contains a cycle".into());
        }
        Ok(())
    }

    fn has_cycle(&self) -> bool {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            Active,
            Done,
        }

        fn visit(folder: &Folder, offsets: &[(usize, usize)], marks: &mut [Mark], c: usize) -> bool {
            match marks[c] {
                Mark::Active => return true,
                Mark::Done => return false,
                Mark::New => {}
            }
            marks[c] = Mark::Active;
            let first_in = offsets[c].0;
            for in_index in first_in..first_in + folder.coders[c].num_in_streams {
                let upstream = folder
                    .find_bind_pair_for_in_stream(in_index)
                    .and_then(|bp| folder.coder_for_out_stream(folder.bind_pairs[bp].out_index));
                if let Some((up, _)) = upstream {
                    if visit(folder, offsets, marks, up) {
                        return true;
                    }
                }
            }
            marks[c] = Mark::Done;
            false
        }

        let offsets = self.coder_stream_offsets();
        let mut marks = vec![Mark::New; self.coders.len()];
        (0..self.coders.len()).any(|c| visit(self, &offsets, &mut marks, c))
    }
}

/// The folder list with sizes and CRCs.
#[derive(Debug, Clone, Default)]
pub struct UnpackInfo {
    /// Parsed folders.
    pub folders: Vec<Folder>,
}

impl UnpackInfo {
    /// Parses an unpack info section (after its `UNPACK_INFO` id).
    pub fn parse(r: &mut HeaderReader, limits: &ResourceLimits) -> Result<Self> {
        let mut folders = Vec::new();

        loop {
            match r.read_number()? {
                property_id::END => break,
                property_id::FOLDER => {
                    let num_folders = r.read_count("folder")?;
                    limits.check_count("folders", num_folders as u64)?;
                    if r.read_u8()? != 0 {
                        return Err(Error::UnsupportedFeature {
                            feature: "external folder definitions",
                        });
                    }
                    folders = Vec::with_capacity(num_folders);
                    for _ in 0..num_folders {
                        folders.push(Folder::parse(r)?);
                    }
                }
                property_id::CODERS_UNPACK_SIZE => {
                    for folder in &mut folders {
                        let count = folder.total_out_streams();
                        let mut sizes = Vec::with_capacity(count);
                        for _ in 0..count {
                            sizes.push(r.read_number()?);
                        }
                        folder.unpack_sizes = sizes;
                    }
                }
                property_id::CRC => {
                    let defined = r.read_all_or_bits(folders.len())?;
                    for (folder, has_crc) in folders.iter_mut().zip(defined) {
                        if has_crc {
                            folder.unpack_crc = Some(r.read_u32()?);
                        }
                    }
                }
                id => {
                    log::debug!("skipping unpack info property {id:#x}");
                    r.skip_data()?;
                }
            }
        }

        for (i, folder) in folders.iter().enumerate() {
            if folder.unpack_sizes.len() != folder.total_out_streams() {
                return Err(Error::corrupt_header(
                    r.offset(),
                    format!("folder {i} is missing coder unpack sizes"),
                ));
            }
        }

        Ok(Self { folders })
    }
}

/// How folder outputs split into individual file streams.
#[derive(Debug, Clone, Default)]
pub struct SubStreamsInfo {
    /// Number of file streams in each folder.
    pub num_unpack_streams: Vec<usize>,
    /// Size of every file stream, folder by folder.
    pub unpack_sizes: Vec<u64>,
    /// CRC of every file stream, folder by folder.
    pub digests: Vec<Option<u32>>,
}

impl SubStreamsInfo {
    /// Parses a substreams info section (after its `SUBSTREAMS_INFO` id).
    pub fn parse(r: &mut HeaderReader, folders: &[Folder], limits: &ResourceLimits) -> Result<Self> {
        let mut counts = vec![1usize; folders.len()];
        let mut id = r.read_number()?;

        if id == property_id::NUM_UNPACK_STREAM {
            for count in counts.iter_mut() {
                *count = r.read_count("substream")?;
            }
            id = r.read_number()?;
        }

        let total = counts.iter().try_fold(0u64, |acc, &n| acc.checked_add(n as u64));
        let total = total.ok_or_else(|| Error::corrupt_header(r.offset(), "substream count overflow"))?;
        limits.check_count("substreams", total)?;

        let mut unpack_sizes = Vec::with_capacity(total as usize);
        if id == property_id::SIZE {
            for (folder, &n) in folders.iter().zip(&counts) {
                if n == 0 {
                    continue;
                }
                let folder_size = folder.unpack_size()?;
                let mut sum = 0u64;
                for _ in 1..n {
                    let size = r.read_number()?;
                    sum = sum.saturating_add(size);
                    unpack_sizes.push(size);
                }
                if sum > folder_size {
                    return Err(Error::corrupt_header(
                        r.offset(),
                        format!("substream sizes {sum} exceed folder size {folder_size}"),
                    ));
                }
                unpack_sizes.push(folder_size - sum);
            }
            id = r.read_number()?;
        } else {
            for (folder, &n) in folders.iter().zip(&counts) {
                match n {
                    0 => {}
                    1 => unpack_sizes.push(folder.unpack_size()?),
                    _ => {
                        return Err(Error::corrupt_header(
                            r.offset(),
                            "substream sizes missing",
                        ));
                    }
                }
            }
        }

        let mut digests = None;
        loop {
            match id {
                property_id::END => break,
                property_id::CRC => {
                    digests = Some(Self::parse_digests(r, folders, &counts)?);
                }
                other => {
                    log::debug!("skipping substreams property {other:#x}");
                    r.skip_data()?;
                }
            }
            id = r.read_number()?;
        }

        let digests = digests.unwrap_or_else(|| {
            folders
                .iter()
                .zip(&counts)
                .flat_map(|(folder, &n)| {
                    let inherited = if n == 1 { folder.unpack_crc } else { None };
                    std::iter::repeat_n(inherited, n)
                })
                .collect()
        });

        Ok(Self {
            num_unpack_streams: counts,
            unpack_sizes,
            digests,
        })
    }

    fn parse_digests(
        r: &mut HeaderReader,
        folders: &[Folder],
        counts: &[usize],
    ) -> Result<Vec<Option<u32>>> {
        let inherits = |folder: &Folder, n: usize| n == 1 && folder.unpack_crc.is_some();

        let needed: usize = folders
            .iter()
            .zip(counts)
            .filter(|(folder, n)| !inherits(folder, **n))
            .map(|(_, &n)| n)
            .sum();
        let defined = r.read_all_or_bits(needed)?;
        let mut defined = defined.into_iter();

        let mut digests = Vec::with_capacity(counts.iter().sum());
        for (folder, &n) in folders.iter().zip(counts) {
            if inherits(folder, n) {
                digests.push(folder.unpack_crc);
                continue;
            }
            for _ in 0..n {
                if defined.next().unwrap_or(false) {
                    digests.push(Some(r.read_u32()?));
                } else {
                    digests.push(None);
                }
            }
        }
        Ok(digests)
    }

    /// The implied layout when the section is absent: one stream per folder,
    /// with the folder's size and CRC.
    pub fn from_folders(folders: &[Folder]) -> Result<Self> {
        Ok(Self {
            num_unpack_streams: vec![1; folders.len()],
            unpack_sizes: folders
                .iter()
                .map(Folder::unpack_size)
                .collect::<Result<_>>()?,
            digests: folders.iter().map(|f| f.unpack_crc).collect(),
        })
    }

    /// Total number of file streams.
    pub fn total_streams(&self) -> usize {
        self.num_unpack_streams.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::reader::write_variable_u64;

    fn num(buf: &mut Vec<u8>, value: u64) {
        write_variable_u64(buf, value).unwrap();
    }

    fn reader(data: Vec<u8>) -> HeaderReader {
        HeaderReader::new(data, 0)
    }

    fn simple_coder(method: &[u8]) -> Coder {
        Coder {
            method_id: method.to_vec(),
            num_in_streams: 1,
            num_out_streams: 1,
            properties: None,
        }
    }

    /// BCJ2 arrangement: coder 0 is BCJ2 (4 in, 1 out), coders 1..=3 are
    /// LZMA decoders feeding its first three inputs. Input 3 of BCJ2 is
    /// the range coder stream, fed directly from a pack stream.
    fn bcj2_folder() -> Folder {
        let mut bcj2 = simple_coder(&[0x03, 0x03, 0x01, 0x1B]);
        bcj2.num_in_streams = 4;
        Folder {
            coders: vec![
                bcj2,
                simple_coder(&[0x03, 0x01, 0x01]),
                simple_coder(&[0x03, 0x01, 0x01]),
                simple_coder(&[0x03, 0x01, 0x01]),
            ],
            bind_pairs: vec![
                BindPair { in_index: 0, out_index: 1 },
                BindPair { in_index: 1, out_index: 2 },
                BindPair { in_index: 2, out_index: 3 },
            ],
            packed_streams: vec![4, 5, 6, 3],
            unpack_sizes: vec![1000, 900, 40, 30],
            unpack_crc: None,
            header_offset: 0,
        }
    }

    #[test]
    fn test_pack_info_with_crcs_and_unknown_property() {
        let mut data = Vec::new();
        num(&mut data, 0); // pack_pos
        num(&mut data, 2);
        num(&mut data, property_id::SIZE);
        num(&mut data, 100);
        num(&mut data, 200);
        num(&mut data, 0x30); // unknown, skipped by size
        num(&mut data, 2);
        data.extend_from_slice(&[0xAA, 0xBB]);
        num(&mut data, property_id::CRC);
        data.push(0); // not all defined
        data.push(0b0100_0000);
        data.extend_from_slice(&0x1234_5678u32.to_le_bytes());
        num(&mut data, property_id::END);

        let info = PackInfo::parse(&mut reader(data), &ResourceLimits::default()).unwrap();
        assert_eq!(info.pack_sizes, [100, 200]);
        assert_eq!(info.pack_crcs, [None, Some(0x1234_5678)]);
    }

    #[test]
    fn test_pack_info_limit() {
        let mut data = Vec::new();
        num(&mut data, 0);
        num(&mut data, 10);
        let limits = ResourceLimits::default().max_entries(5);
        let err = PackInfo::parse(&mut reader(data), &limits).unwrap_err();
        assert!(matches!(err, Error::ResourceLimitExceeded(_)));
    }

    #[test]
    fn test_method_id_u64_is_big_endian() {
        assert_eq!(simple_coder(&[0x03, 0x01, 0x01]).method_id_u64(), 0x030101);
        assert_eq!(simple_coder(&[0x21]).method_id_u64(), 0x21);
        assert_eq!(simple_coder(&[]).method_id_u64(), 0);
    }

    #[test]
    fn test_graph_queries_bcj2() {
        let folder = bcj2_folder();
        assert_eq!(folder.total_in_streams(), 7);
        assert_eq!(folder.total_out_streams(), 4);
        assert_eq!(folder.find_bind_pair_for_in_stream(1), Some(1));
        assert_eq!(folder.find_bind_pair_for_in_stream(3), None);
        assert_eq!(folder.find_bind_pair_for_out_stream(3), Some(2));
        assert_eq!(folder.find_bind_pair_for_out_stream(0), None);
        assert_eq!(folder.find_pack_stream_index(3), Some(3));
        assert_eq!(folder.find_pack_stream_index(5), Some(1));
        assert_eq!(folder.find_pack_stream_index(0), None);
        assert_eq!(folder.main_output_stream(), Some(0));
        assert_eq!(folder.main_coder_index(), Some(0));
        assert_eq!(folder.unpack_size().unwrap(), 1000);
        assert_eq!(folder.coder_for_in_stream(5), Some((2, 0)));
        assert_eq!(folder.coder_for_out_stream(2), Some((2, 0)));
        assert_eq!(folder.coder_stream_offsets(), [(0, 0), (4, 1), (5, 2), (6, 3)]);
        folder.validate(0).unwrap();
    }

    #[test]
    fn test_unpack_size_without_unbound_output() {
        let mut folder = bcj2_folder();
        folder.bind_pairs.push(BindPair { in_index: 3, out_index: 0 });
        folder.header_offset = 42;
        assert!(matches!(
            folder.unpack_size().unwrap_err(),
            Error::CorruptHeader { offset: 42, .. }
        ));
        assert!(folder.validate(0).is_err());
    }

    #[test]
    fn test_validate_rejects_double_fed_input() {
        let mut folder = bcj2_folder();
        folder.packed_streams = vec![4, 5, 6, 0];
        let err = folder.validate(7).unwrap_err();
        assert!(matches!(err, Error::CorruptHeader { offset: 7, .. }));
    }

    #[test]
    fn test_validate_rejects_cycle() {
        // Two simple coders bound to each other plus a third producing output.
        let folder = Folder {
            coders: vec![simple_coder(&[0]), simple_coder(&[0]), simple_coder(&[0])],
            bind_pairs: vec![
                BindPair { in_index: 0, out_index: 1 },
                BindPair { in_index: 1, out_index: 0 },
            ],
            packed_streams: vec![2],
            unpack_sizes: vec![1, 1, 1],
            unpack_crc: None,
            header_offset: 0,
        };
        let err = folder.validate(0).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    fn encode_single_coder_folder(data: &mut Vec<u8>, method: &[u8], props: Option<&[u8]>) {
        num(data, 1); // coders
        let mut flags = method.len() as u8;
        if props.is_some() {
            flags |= 0x20;
        }
        data.push(flags);
        data.extend_from_slice(method);
        if let Some(props) = props {
            num(data, props.len() as u64);
            data.extend_from_slice(props);
        }
    }

    #[test]
    fn test_unpack_info_single_lzma_folder() {
        let mut data = Vec::new();
        num(&mut data, property_id::FOLDER);
        num(&mut data, 1);
        data.push(0); // not external
        encode_single_coder_folder(&mut data, &[0x03, 0x01, 0x01], Some(&[0x5D, 0, 0, 1, 0]));
        num(&mut data, property_id::CODERS_UNPACK_SIZE);
        num(&mut data, 4096);
        num(&mut data, property_id::CRC);
        data.push(1);
        data.extend_from_slice(&0xCAFE_BABEu32.to_le_bytes());
        num(&mut data, property_id::END);

        let info = UnpackInfo::parse(&mut reader(data), &ResourceLimits::default()).unwrap();
        let folder = &info.folders[0];
        assert_eq!(folder.packed_streams, [0]);
        // FOLDER id, count and external flag come first.
        assert_eq!(folder.header_offset, 3);
        assert_eq!(folder.coders[0].properties.as_deref(), Some(&[0x5D, 0, 0, 1, 0][..]));
        assert_eq!(folder.unpack_size().unwrap(), 4096);
        assert_eq!(folder.unpack_crc, Some(0xCAFE_BABE));
    }

    #[test]
    fn test_unpack_info_missing_sizes() {
        let mut data = Vec::new();
        num(&mut data, property_id::FOLDER);
        num(&mut data, 1);
        data.push(0);
        encode_single_coder_folder(&mut data, &[0x00], None);
        num(&mut data, property_id::END);

        let err = UnpackInfo::parse(&mut reader(data), &ResourceLimits::default()).unwrap_err();
        assert!(matches!(err, Error::CorruptHeader { .. }));
    }

    #[test]
    fn test_alternative_methods_flag_rejected() {
        let mut data = Vec::new();
        num(&mut data, property_id::FOLDER);
        num(&mut data, 1);
        data.push(0);
        num(&mut data, 1);
        data.push(0x81);
        data.push(0x00);

        let err = UnpackInfo::parse(&mut reader(data), &ResourceLimits::default()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFeature { .. }));
    }

    fn copy_folder(size: u64, crc: Option<u32>) -> Folder {
        Folder {
            coders: vec![simple_coder(&[0x00])],
            bind_pairs: Vec::new(),
            packed_streams: vec![0],
            unpack_sizes: vec![size],
            unpack_crc: crc,
            header_offset: 0,
        }
    }

    #[test]
    fn test_substreams_split_and_crc_inheritance() {
        let folders = [copy_folder(30, None), copy_folder(5, Some(0x55))];
        let mut data = Vec::new();
        num(&mut data, property_id::NUM_UNPACK_STREAM);
        num(&mut data, 2);
        num(&mut data, 1);
        num(&mut data, property_id::SIZE);
        num(&mut data, 10); // last size of folder 0 is implicit (20)
        num(&mut data, property_id::CRC);
        data.push(1); // two digests needed, both defined
        data.extend_from_slice(&0x11u32.to_le_bytes());
        data.extend_from_slice(&0x22u32.to_le_bytes());
        num(&mut data, property_id::END);

        let info =
            SubStreamsInfo::parse(&mut reader(data), &folders, &ResourceLimits::default()).unwrap();
        assert_eq!(info.num_unpack_streams, [2, 1]);
        assert_eq!(info.unpack_sizes, [10, 20, 5]);
        assert_eq!(info.digests, [Some(0x11), Some(0x22), Some(0x55)]);
        assert_eq!(info.total_streams(), 3);
    }

    #[test]
    fn test_substreams_defaults() {
        let folders = [copy_folder(30, Some(0x99))];
        let mut data = Vec::new();
        num(&mut data, property_id::END);

        let info =
            SubStreamsInfo::parse(&mut reader(data), &folders, &ResourceLimits::default()).unwrap();
        assert_eq!(info.unpack_sizes, [30]);
        assert_eq!(info.digests, [Some(0x99)]);
    }

    #[test]
    fn test_substreams_sizes_exceeding_folder() {
        let folders = [copy_folder(30, None)];
        let mut data = Vec::new();
        num(&mut data, property_id::NUM_UNPACK_STREAM);
        num(&mut data, 2);
        num(&mut data, property_id::SIZE);
        num(&mut data, 31);
        num(&mut data, property_id::END);

        let err = SubStreamsInfo::parse(&mut reader(data), &folders, &ResourceLimits::default())
            .unwrap_err();
        assert!(matches!(err, Error::CorruptHeader { .. }));
    }

    #[test]
    fn test_substreams_empty_folder() {
        let folders = [copy_folder(0, None), copy_folder(4, None)];
        let mut data = Vec::new();
        num(&mut data, property_id::NUM_UNPACK_STREAM);
        num(&mut data, 0);
        num(&mut data, 1);
        num(&mut data, property_id::END);

        let info =
            SubStreamsInfo::parse(&mut reader(data), &folders, &ResourceLimits::default()).unwrap();
        assert_eq!(info.unpack_sizes, [4]);
        assert_eq!(info.digests, [None]);
    }
}
