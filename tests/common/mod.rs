//! Shared test utilities for integration tests.
//!
//! The crate only reads archives, so the tests assemble their own: an
//! [`ArchiveBuilder`] lays out pack streams, a main header and an optional
//! chain of encoded headers exactly as a 7z writer would.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and may only use a subset of these helpers.

#![allow(dead_code)]

use std::io::{Cursor, Write};

use sevenz_decode::Archive;

/// Method IDs as stored in coder records.
pub mod method {
    pub const COPY: &[u8] = &[0x00];
    pub const LZMA: &[u8] = &[0x03, 0x01, 0x01];
    pub const LZMA2: &[u8] = &[0x21];
    pub const BCJ_X86: &[u8] = &[0x03, 0x03, 0x01, 0x03];
    pub const BCJ2: &[u8] = &[0x03, 0x03, 0x01, 0x1B];
    pub const DELTA: &[u8] = &[0x03];
    pub const PPMD: &[u8] = &[0x03, 0x04, 0x01];
    pub const UNKNOWN: &[u8] = &[0x7F, 0x7F, 0x01];
}

const END: u8 = 0x00;
const HEADER: u8 = 0x01;
const MAIN_STREAMS_INFO: u8 = 0x04;
const FILES_INFO: u8 = 0x05;
const PACK_INFO: u8 = 0x06;
const UNPACK_INFO: u8 = 0x07;
const SUBSTREAMS_INFO: u8 = 0x08;
const SIZE: u8 = 0x09;
const CRC: u8 = 0x0A;
const FOLDER: u8 = 0x0B;
const CODERS_UNPACK_SIZE: u8 = 0x0C;
const NUM_UNPACK_STREAM: u8 = 0x0D;
const EMPTY_STREAM: u8 = 0x0E;
const EMPTY_FILE: u8 = 0x0F;
const NAME: u8 = 0x11;
const MTIME: u8 = 0x14;
const WIN_ATTRIBUTES: u8 = 0x15;
const ENCODED_HEADER: u8 = 0x17;

/// 2024-01-01T00:00:00Z as a Windows FILETIME.
pub const SAMPLE_FILETIME: u64 = 133_485_408_000_000_000;

/// Unix seconds of [`SAMPLE_FILETIME`].
pub const SAMPLE_UNIX_SECS: i64 = 1_704_067_200;

// =============================================================================
// Primitive encoders
// =============================================================================

/// Appends a 7z variable-length Number.
pub fn write_number(buf: &mut Vec<u8>, value: u64) {
    let mut extra = 0usize;
    while extra < 8 && value >= 1u64 << (7 * (extra + 1)) {
        extra += 1;
    }

    if extra == 8 {
        buf.push(0xFF);
        buf.extend_from_slice(&value.to_le_bytes());
        return;
    }

    let prefix = !(0xFFu8 >> extra);
    let high = (value >> (8 * extra)) as u8;
    buf.push(prefix | high);
    buf.extend_from_slice(&value.to_le_bytes()[..extra]);
}

/// Appends a bit vector, most significant bit first.
pub fn write_bits(buf: &mut Vec<u8>, bits: &[bool]) {
    for chunk in bits.chunks(8) {
        let byte = chunk
            .iter()
            .enumerate()
            .fold(0u8, |acc, (i, &b)| if b { acc | (0x80 >> i) } else { acc });
        buf.push(byte);
    }
}

fn write_utf16(buf: &mut Vec<u8>, s: &str) {
    for unit in s.encode_utf16() {
        buf.extend_from_slice(&unit.to_le_bytes());
    }
    buf.extend_from_slice(&[0, 0]);
}

fn file_property(buf: &mut Vec<u8>, id: u8, payload: &[u8]) {
    buf.push(id);
    write_number(buf, payload.len() as u64);
    buf.extend_from_slice(payload);
}

// =============================================================================
// Encoders
// =============================================================================

/// Compresses `data` as raw LZMA, returning the packed bytes and the 5-byte
/// coder properties.
pub fn lzma_compress(data: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let opts = lzma_rust2::LzmaOptions::with_preset(1);
    let mut props = vec![opts.get_props()];
    props.extend_from_slice(&opts.dict_size.to_le_bytes());

    let mut packed = Vec::new();
    let mut writer = lzma_rust2::LzmaWriter::new_no_header(&mut packed, &opts, true).unwrap();
    writer.write_all(data).unwrap();
    writer.finish().unwrap();
    (packed, props)
}

/// Compresses `data` as LZMA2, returning the packed bytes and the 1-byte
/// dictionary property.
pub fn lzma2_compress(data: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let opts = lzma_rust2::Lzma2Options::with_preset(1);
    let dict_size = opts.lzma_options.dict_size;

    let mut packed = Vec::new();
    let mut writer = lzma_rust2::Lzma2Writer::new(&mut packed, opts);
    writer.write_all(data).unwrap();
    writer.finish().unwrap();
    (packed, vec![lzma2_dict_prop(dict_size)])
}

fn lzma2_dict_prop(dict_size: u32) -> u8 {
    (0..40u8)
        .find(|&p| {
            let base_log = (p as u32) / 2 + 12;
            let size = if p % 2 == 0 {
                1u64 << base_log
            } else {
                3u64 << (base_log - 1)
            };
            size >= dict_size as u64
        })
        .unwrap_or(40)
}

/// Applies the forward x86 branch conversion used before compression.
pub fn bcj_x86_encode(data: &[u8]) -> Vec<u8> {
    let mut buf = data.to_vec();
    if buf.len() < 5 {
        return buf;
    }

    let limit = buf.len() - 4;
    let mut pos = 0usize;
    let mut mask = 0u32;
    loop {
        let start = pos;
        while pos < limit && buf[pos] & 0xFE != 0xE8 {
            pos += 1;
        }
        if pos >= limit {
            break;
        }

        let d = pos - start;
        if d > 2 {
            mask = 0;
        } else {
            mask >>= d;
            if mask != 0
                && (mask > 4 || mask == 3 || test_ms_byte(buf[pos + (mask >> 1) as usize + 1]))
            {
                mask = (mask >> 1) | 4;
                pos += 1;
                continue;
            }
        }

        if test_ms_byte(buf[pos + 4]) {
            let mut v = u32::from_le_bytes([buf[pos + 1], buf[pos + 2], buf[pos + 3], buf[pos + 4]]);
            let cur = (pos as u32).wrapping_add(5);
            pos += 5;
            v = v.wrapping_add(cur);
            if mask != 0 {
                let sh = (mask & 6) << 2;
                if test_ms_byte((v >> sh) as u8) {
                    v ^= (0x100u32 << sh).wrapping_sub(1);
                    v = v.wrapping_add(cur);
                }
                mask = 0;
            }
            let bytes = v.to_le_bytes();
            buf[pos - 4] = bytes[0];
            buf[pos - 3] = bytes[1];
            buf[pos - 2] = bytes[2];
            buf[pos - 1] = 0u8.wrapping_sub(bytes[3] & 1);
        } else {
            mask = (mask >> 1) | 4;
            pos += 1;
        }
    }
    buf
}

fn test_ms_byte(b: u8) -> bool {
    b.wrapping_add(1) & 0xFE == 0
}

/// Applies the forward delta filter with the given distance.
pub fn delta_encode(data: &[u8], distance: usize) -> Vec<u8> {
    data.iter()
        .enumerate()
        .map(|(i, &b)| {
            if i >= distance {
                b.wrapping_sub(data[i - distance])
            } else {
                b
            }
        })
        .collect()
}

/// x86-like bytes: call instructions with small forward targets between
/// runs of filler, which the branch converter rewrites.
pub fn x86_sample(len: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(len);
    let mut i = 0u32;
    while data.len() < len {
        data.extend_from_slice(&[0x55, 0x89, 0xE5, 0x83, 0xEC, 0x10, 0x90, 0x90]);
        data.push(0xE8);
        data.extend_from_slice(&(0x100 + i * 16).to_le_bytes());
        data.extend_from_slice(&[0xC9, 0xC3, 0x90]);
        i += 1;
    }
    data.truncate(len);
    data
}

/// Compressible text.
pub fn text_sample(len: usize) -> Vec<u8> {
    b"The quick brown fox jumps over the lazy dog. "
        .iter()
        .copied()
        .cycle()
        .take(len)
        .collect()
}

// =============================================================================
// Folders
// =============================================================================

/// One coder record.
#[derive(Debug, Clone)]
pub struct CoderSpec {
    pub id: Vec<u8>,
    pub num_in: u64,
    pub num_out: u64,
    pub props: Option<Vec<u8>>,
}

impl CoderSpec {
    pub fn simple(id: &[u8], props: Option<Vec<u8>>) -> Self {
        Self {
            id: id.to_vec(),
            num_in: 1,
            num_out: 1,
            props,
        }
    }
}

/// A folder together with the files stored in it.
#[derive(Debug, Clone)]
pub struct FolderSpec {
    pub coders: Vec<CoderSpec>,
    /// `(in_index, out_index)` pairs.
    pub bind_pairs: Vec<(u64, u64)>,
    /// Written only when the folder has more than one packed stream.
    pub packed_streams: Vec<u64>,
    pub packs: Vec<Vec<u8>>,
    /// Pack sizes written to the header, when they differ from `packs`.
    pub declared_pack_sizes: Option<Vec<u64>>,
    pub unpack_sizes: Vec<u64>,
    pub folder_crc: bool,
    pub file_crcs: bool,
    pub files: Vec<(String, Vec<u8>)>,
}

fn concat(files: &[(&str, &[u8])]) -> Vec<u8> {
    files.iter().flat_map(|(_, d)| d.iter().copied()).collect()
}

fn owned(files: &[(&str, &[u8])]) -> Vec<(String, Vec<u8>)> {
    files
        .iter()
        .map(|(n, d)| (n.to_string(), d.to_vec()))
        .collect()
}

impl FolderSpec {
    fn single(coder: CoderSpec, packed: Vec<u8>, files: &[(&str, &[u8])]) -> Self {
        Self {
            coders: vec![coder],
            bind_pairs: Vec::new(),
            packed_streams: vec![0],
            packs: vec![packed],
            declared_pack_sizes: None,
            unpack_sizes: vec![concat(files).len() as u64],
            folder_crc: false,
            file_crcs: true,
            files: owned(files),
        }
    }

    /// A filter stacked on an LZMA coder: coder 0 is the filter, its input
    /// is bound to the LZMA output.
    fn filtered(filter: CoderSpec, filtered: Vec<u8>, files: &[(&str, &[u8])]) -> Self {
        let (packed, props) = lzma_compress(&filtered);
        let size = concat(files).len() as u64;
        Self {
            coders: vec![filter, CoderSpec::simple(method::LZMA, Some(props))],
            bind_pairs: vec![(0, 1)],
            packed_streams: vec![1],
            packs: vec![packed],
            declared_pack_sizes: None,
            unpack_sizes: vec![size, filtered.len() as u64],
            folder_crc: false,
            file_crcs: true,
            files: owned(files),
        }
    }

    /// Stored files.
    pub fn copy(files: &[(&str, &[u8])]) -> Self {
        Self::single(CoderSpec::simple(method::COPY, None), concat(files), files)
    }

    pub fn lzma(files: &[(&str, &[u8])]) -> Self {
        let (packed, props) = lzma_compress(&concat(files));
        Self::single(CoderSpec::simple(method::LZMA, Some(props)), packed, files)
    }

    pub fn lzma2(files: &[(&str, &[u8])]) -> Self {
        let (packed, props) = lzma2_compress(&concat(files));
        Self::single(CoderSpec::simple(method::LZMA2, Some(props)), packed, files)
    }

    /// BCJ x86 over LZMA.
    pub fn bcj(files: &[(&str, &[u8])]) -> Self {
        let filtered = bcj_x86_encode(&concat(files));
        Self::filtered(CoderSpec::simple(method::BCJ_X86, None), filtered, files)
    }

    /// Delta over LZMA.
    pub fn delta(distance: u8, files: &[(&str, &[u8])]) -> Self {
        let filtered = delta_encode(&concat(files), distance as usize);
        let coder = CoderSpec::simple(method::DELTA, Some(vec![distance - 1]));
        Self::filtered(coder, filtered, files)
    }

    /// A BCJ2 coder fed directly by four pack streams. The selector stream
    /// marks every branch as unconverted, so the main stream is the data.
    pub fn bcj2(files: &[(&str, &[u8])]) -> Self {
        let data = concat(files);
        Self {
            coders: vec![CoderSpec {
                id: method::BCJ2.to_vec(),
                num_in: 4,
                num_out: 1,
                props: None,
            }],
            bind_pairs: Vec::new(),
            packed_streams: vec![0, 1, 2, 3],
            packs: vec![data.clone(), Vec::new(), Vec::new(), vec![0; 5]],
            declared_pack_sizes: None,
            unpack_sizes: vec![data.len() as u64],
            folder_crc: false,
            file_crcs: true,
            files: owned(files),
        }
    }

    /// BCJ2 whose main stream is LZMA-compressed, the layout 7-Zip writes.
    pub fn bcj2_lzma(files: &[(&str, &[u8])]) -> Self {
        let data = concat(files);
        let (packed, props) = lzma_compress(&data);
        Self {
            coders: vec![
                CoderSpec {
                    id: method::BCJ2.to_vec(),
                    num_in: 4,
                    num_out: 1,
                    props: None,
                },
                CoderSpec::simple(method::LZMA, Some(props)),
            ],
            bind_pairs: vec![(0, 1)],
            packed_streams: vec![4, 1, 2, 3],
            packs: vec![packed, Vec::new(), Vec::new(), vec![0; 5]],
            declared_pack_sizes: None,
            unpack_sizes: vec![data.len() as u64, data.len() as u64],
            folder_crc: false,
            file_crcs: true,
            files: owned(files),
        }
    }

    /// Stored data behind a method ID no decoder knows.
    pub fn unknown_method(files: &[(&str, &[u8])]) -> Self {
        Self::single(CoderSpec::simple(method::UNKNOWN, None), concat(files), files)
    }

    /// Stores the folder CRC in the unpack info.
    pub fn with_folder_crc(mut self) -> Self {
        self.folder_crc = true;
        self
    }

    /// Leaves out the per-file CRCs.
    pub fn without_file_crcs(mut self) -> Self {
        self.file_crcs = false;
        self
    }

    /// Flips a byte in the middle of the first pack stream. CRCs still
    /// describe the original data.
    pub fn corrupted(mut self) -> Self {
        let pack = &mut self.packs[0];
        let mid = pack.len() / 2;
        pack[mid] ^= 0x5A;
        self
    }

    /// Stores only the first `keep` bytes of the first pack stream while
    /// the header still declares `declared` bytes.
    pub fn truncated_pack(mut self, keep: usize, declared: u64) -> Self {
        let mut sizes: Vec<u64> = self.packs.iter().map(|p| p.len() as u64).collect();
        sizes[0] = declared;
        self.packs[0].truncate(keep);
        self.declared_pack_sizes = Some(sizes);
        self
    }

    fn pack_sizes(&self) -> Vec<u64> {
        self.declared_pack_sizes
            .clone()
            .unwrap_or_else(|| self.packs.iter().map(|p| p.len() as u64).collect())
    }

    fn unpacked(&self) -> Vec<u8> {
        self.files.iter().flat_map(|(_, d)| d.iter().copied()).collect()
    }

    fn inherits_crc(&self) -> bool {
        self.folder_crc && self.files.len() == 1
    }
}

// =============================================================================
// Archive builder
// =============================================================================

#[derive(Debug, Clone)]
enum Item {
    Folder(usize),
    Directory(String),
    EmptyFile(String),
}

/// How the next header is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderCoding {
    Plain,
    Copy,
    Lzma,
}

/// Assembles a complete archive in memory.
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    folders: Vec<FolderSpec>,
    items: Vec<Item>,
    header_coding: HeaderCoding,
    header_levels: u32,
    sfx: Vec<u8>,
    mtime: Option<u64>,
    unix_mode: Option<u32>,
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self {
            folders: Vec::new(),
            items: Vec::new(),
            header_coding: HeaderCoding::Plain,
            header_levels: 0,
            sfx: Vec::new(),
            mtime: None,
            unix_mode: None,
        }
    }

    pub fn folder(mut self, folder: FolderSpec) -> Self {
        self.items.push(Item::Folder(self.folders.len()));
        self.folders.push(folder);
        self
    }

    pub fn directory(mut self, name: &str) -> Self {
        self.items.push(Item::Directory(name.to_string()));
        self
    }

    pub fn empty_file(mut self, name: &str) -> Self {
        self.items.push(Item::EmptyFile(name.to_string()));
        self
    }

    /// Wraps the header in `levels` encoded headers.
    pub fn encoded_header(mut self, coding: HeaderCoding, levels: u32) -> Self {
        self.header_coding = coding;
        self.header_levels = levels;
        self
    }

    /// Prepends a self-extractor stub.
    pub fn sfx(mut self, stub: &[u8]) -> Self {
        self.sfx = stub.to_vec();
        self
    }

    /// Gives every entry the same modification time.
    pub fn mtime(mut self, filetime: u64) -> Self {
        self.mtime = Some(filetime);
        self
    }

    /// Stores Unix permissions for regular files.
    pub fn unix_mode(mut self, mode: u32) -> Self {
        self.unix_mode = Some(mode);
        self
    }

    /// Entry names in archive order.
    pub fn names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for item in &self.items {
            match item {
                Item::Folder(f) => names.extend(self.folders[*f].files.iter().map(|(n, _)| n.clone())),
                Item::Directory(n) | Item::EmptyFile(n) => names.push(n.clone()),
            }
        }
        names
    }

    pub fn build(&self) -> Vec<u8> {
        let mut packs: Vec<u8> = Vec::new();
        for folder in &self.folders {
            for pack in &folder.packs {
                packs.extend_from_slice(pack);
            }
        }

        let mut header = self.main_header();
        for _ in 0..self.header_levels {
            header = encode_header(&mut packs, &header, self.header_coding);
        }

        assemble(&self.sfx, &packs, &header)
    }

    fn main_header(&self) -> Vec<u8> {
        let mut h = vec![HEADER];
        if !self.folders.is_empty() {
            h.push(MAIN_STREAMS_INFO);
            self.write_streams_info(&mut h);
        }
        self.write_files_info(&mut h);
        h.push(END);
        h
    }

    fn write_streams_info(&self, h: &mut Vec<u8>) {
        let pack_sizes: Vec<u64> = self
            .folders
            .iter()
            .flat_map(FolderSpec::pack_sizes)
            .collect();
        write_pack_info(h, 0, &pack_sizes);

        h.push(UNPACK_INFO);
        h.push(FOLDER);
        write_number(h, self.folders.len() as u64);
        h.push(0);
        for folder in &self.folders {
            write_folder(h, folder);
        }
        h.push(CODERS_UNPACK_SIZE);
        for folder in &self.folders {
            for &size in &folder.unpack_sizes {
                write_number(h, size);
            }
        }
        let folder_crcs: Vec<bool> = self.folders.iter().map(|f| f.folder_crc).collect();
        if folder_crcs.iter().any(|&c| c) {
            h.push(CRC);
            write_defined(h, &folder_crcs);
            for folder in self.folders.iter().filter(|f| f.folder_crc) {
                h.extend_from_slice(&crc32fast::hash(&folder.unpacked()).to_le_bytes());
            }
        }
        h.push(END);

        h.push(SUBSTREAMS_INFO);
        h.push(NUM_UNPACK_STREAM);
        for folder in &self.folders {
            write_number(h, folder.files.len() as u64);
        }
        if self.folders.iter().any(|f| f.files.len() > 1) {
            h.push(SIZE);
            for folder in &self.folders {
                if let Some((_, init)) = folder.files.split_last() {
                    for (_, data) in init {
                        write_number(h, data.len() as u64);
                    }
                }
            }
        }

        let mut defined = Vec::new();
        let mut digests = Vec::new();
        for folder in self.folders.iter().filter(|f| !f.inherits_crc()) {
            for (_, data) in &folder.files {
                defined.push(folder.file_crcs);
                if folder.file_crcs {
                    digests.push(crc32fast::hash(data));
                }
            }
        }
        if !digests.is_empty() {
            h.push(CRC);
            write_defined(h, &defined);
            for crc in digests {
                h.extend_from_slice(&crc.to_le_bytes());
            }
        }
        h.push(END);
        h.push(END);
    }

    fn write_files_info(&self, h: &mut Vec<u8>) {
        let mut names = Vec::new();
        let mut empty_stream = Vec::new();
        let mut empty_file = Vec::new();
        let mut is_dir = Vec::new();
        for item in &self.items {
            match item {
                Item::Folder(f) => {
                    for (name, _) in &self.folders[*f].files {
                        names.push(name.clone());
                        empty_stream.push(false);
                        is_dir.push(false);
                    }
                }
                Item::Directory(name) => {
                    names.push(name.clone());
                    empty_stream.push(true);
                    empty_file.push(false);
                    is_dir.push(true);
                }
                Item::EmptyFile(name) => {
                    names.push(name.clone());
                    empty_stream.push(true);
                    empty_file.push(true);
                    is_dir.push(false);
                }
            }
        }
        if names.is_empty() {
            return;
        }

        h.push(FILES_INFO);
        write_number(h, names.len() as u64);

        if empty_stream.iter().any(|&e| e) {
            let mut payload = Vec::new();
            write_bits(&mut payload, &empty_stream);
            file_property(h, EMPTY_STREAM, &payload);
            if empty_file.iter().any(|&e| e) {
                let mut payload = Vec::new();
                write_bits(&mut payload, &empty_file);
                file_property(h, EMPTY_FILE, &payload);
            }
        }

        let mut payload = vec![0];
        for name in &names {
            write_utf16(&mut payload, name);
        }
        file_property(h, NAME, &payload);

        if let Some(mtime) = self.mtime {
            let mut payload = vec![1, 0];
            for _ in &names {
                payload.extend_from_slice(&mtime.to_le_bytes());
            }
            file_property(h, MTIME, &payload);
        }

        let mut payload = vec![1, 0];
        for &dir in &is_dir {
            let attrs = match (dir, self.unix_mode) {
                (true, _) => 0x10,
                (false, Some(mode)) => 0x20 | 0x8000 | (mode << 16),
                (false, None) => 0x20,
            };
            payload.extend_from_slice(&u32::to_le_bytes(attrs));
        }
        file_property(h, WIN_ATTRIBUTES, &payload);

        h.push(END);
    }
}

fn write_defined(h: &mut Vec<u8>, defined: &[bool]) {
    if defined.iter().all(|&d| d) {
        h.push(1);
    } else {
        h.push(0);
        write_bits(h, defined);
    }
}

fn write_pack_info(h: &mut Vec<u8>, pack_pos: u64, sizes: &[u64]) {
    h.push(PACK_INFO);
    write_number(h, pack_pos);
    write_number(h, sizes.len() as u64);
    h.push(SIZE);
    for &size in sizes {
        write_number(h, size);
    }
    h.push(END);
}

fn write_folder(h: &mut Vec<u8>, folder: &FolderSpec) {
    write_number(h, folder.coders.len() as u64);
    for coder in &folder.coders {
        let complex = coder.num_in != 1 || coder.num_out != 1;
        let mut flags = coder.id.len() as u8;
        if complex {
            flags |= 0x10;
        }
        if coder.props.is_some() {
            flags |= 0x20;
        }
        h.push(flags);
        h.extend_from_slice(&coder.id);
        if complex {
            write_number(h, coder.num_in);
            write_number(h, coder.num_out);
        }
        if let Some(props) = &coder.props {
            write_number(h, props.len() as u64);
            h.extend_from_slice(props);
        }
    }
    for &(in_index, out_index) in &folder.bind_pairs {
        write_number(h, in_index);
        write_number(h, out_index);
    }
    if folder.packed_streams.len() > 1 {
        for &index in &folder.packed_streams {
            write_number(h, index);
        }
    }
}

/// Stores `header` as a pack stream and returns the encoded header that
/// points at it.
fn encode_header(packs: &mut Vec<u8>, header: &[u8], coding: HeaderCoding) -> Vec<u8> {
    let (packed, coder) = match coding {
        HeaderCoding::Plain => return header.to_vec(),
        HeaderCoding::Copy => (header.to_vec(), CoderSpec::simple(method::COPY, None)),
        HeaderCoding::Lzma => {
            let (packed, props) = lzma_compress(header);
            (packed, CoderSpec::simple(method::LZMA, Some(props)))
        }
    };
    let pack_pos = packs.len() as u64;
    packs.extend_from_slice(&packed);

    let folder = FolderSpec {
        coders: vec![coder],
        bind_pairs: Vec::new(),
        packed_streams: vec![0],
        packs: vec![packed.clone()],
        declared_pack_sizes: None,
        unpack_sizes: vec![header.len() as u64],
        folder_crc: true,
        file_crcs: false,
        files: Vec::new(),
    };

    let mut h = vec![ENCODED_HEADER];
    write_pack_info(&mut h, pack_pos, &[packed.len() as u64]);
    h.push(UNPACK_INFO);
    h.push(FOLDER);
    write_number(&mut h, 1);
    h.push(0);
    write_folder(&mut h, &folder);
    h.push(CODERS_UNPACK_SIZE);
    write_number(&mut h, header.len() as u64);
    h.push(CRC);
    h.push(1);
    h.extend_from_slice(&crc32fast::hash(header).to_le_bytes());
    h.push(END);
    h.push(END);
    h
}

/// Joins a stub, the signature header, pack data and the next header.
pub fn assemble(sfx: &[u8], packs: &[u8], header: &[u8]) -> Vec<u8> {
    let mut tail = Vec::with_capacity(20);
    tail.extend_from_slice(&(packs.len() as u64).to_le_bytes());
    tail.extend_from_slice(&(header.len() as u64).to_le_bytes());
    tail.extend_from_slice(&crc32fast::hash(header).to_le_bytes());

    let mut out = sfx.to_vec();
    out.extend_from_slice(&[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C, 0x00, 0x04]);
    out.extend_from_slice(&crc32fast::hash(&tail).to_le_bytes());
    out.extend_from_slice(&tail);
    out.extend_from_slice(packs);
    out.extend_from_slice(header);
    out
}

/// An archive whose next header is `header` verbatim, with no pack data.
pub fn raw_archive(header: &[u8]) -> Vec<u8> {
    assemble(&[], &[], header)
}

/// Opens archive bytes from memory.
pub fn open(bytes: Vec<u8>) -> sevenz_decode::Result<Archive<Cursor<Vec<u8>>>> {
    Archive::open(Cursor::new(bytes))
}
