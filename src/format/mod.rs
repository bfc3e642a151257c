//! 7z container format: constants, binary reader, and header model.
//!
//! The submodules follow the order in which an archive is read:
//! [`header`] locates and verifies the fixed-size start header, [`reader`]
//! decodes the variable-length primitives of the next header, [`streams`]
//! and [`files`] model its sections, [`parser`] drives the section state
//! machine, and [`database`] assembles the result into an
//! [`ArchiveDatabase`](database::ArchiveDatabase).

pub mod database;
pub mod files;
pub mod header;
pub mod parser;
pub mod reader;
pub mod streams;

/// The 7z file signature (magic bytes).
///
/// Every archive starts with these 6 bytes: `'7' 'z' 0xBC 0xAF 0x27 0x1C`
pub const SIGNATURE: &[u8; 6] = &[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C];

/// Size of the signature header in bytes.
///
/// The signature header contains:
/// - 6 bytes: signature
/// - 2 bytes: version (major, minor)
/// - 4 bytes: start header CRC
/// - 8 bytes: next header offset
/// - 8 bytes: next header size
/// - 4 bytes: next header CRC
pub const SIGNATURE_HEADER_SIZE: u64 = 32;

/// Highest supported major version.
pub const VERSION_MAJOR: u8 = 0;

/// Highest supported minor version.
pub const VERSION_MINOR: u8 = 4;

/// Property IDs used in 7z headers.
///
/// IDs are stored as Numbers in the header, so they are kept as `u64`.
pub mod property_id {
    /// End of section marker.
    pub const END: u64 = 0x00;
    /// Plain header marker.
    pub const HEADER: u64 = 0x01;
    /// Archive properties.
    pub const ARCHIVE_PROPERTIES: u64 = 0x02;
    /// Additional streams info.
    pub const ADDITIONAL_STREAMS_INFO: u64 = 0x03;
    /// Main streams info.
    pub const MAIN_STREAMS_INFO: u64 = 0x04;
    /// Files info.
    pub const FILES_INFO: u64 = 0x05;
    /// Pack info.
    pub const PACK_INFO: u64 = 0x06;
    /// Unpack info.
    pub const UNPACK_INFO: u64 = 0x07;
    /// Substreams info.
    pub const SUBSTREAMS_INFO: u64 = 0x08;
    /// Size list.
    pub const SIZE: u64 = 0x09;
    /// CRC list.
    pub const CRC: u64 = 0x0A;
    /// Folder list.
    pub const FOLDER: u64 = 0x0B;
    /// Coder output sizes.
    pub const CODERS_UNPACK_SIZE: u64 = 0x0C;
    /// Number of substreams per folder.
    pub const NUM_UNPACK_STREAM: u64 = 0x0D;
    /// Entries without a content stream.
    pub const EMPTY_STREAM: u64 = 0x0E;
    /// Empty files among the entries without a stream.
    pub const EMPTY_FILE: u64 = 0x0F;
    /// Anti-items (deletion markers).
    pub const ANTI: u64 = 0x10;
    /// Entry names.
    pub const NAME: u64 = 0x11;
    /// Creation time.
    pub const CTIME: u64 = 0x12;
    /// Access time.
    pub const ATIME: u64 = 0x13;
    /// Modification time.
    pub const MTIME: u64 = 0x14;
    /// Windows file attributes.
    pub const WIN_ATTRIBUTES: u64 = 0x15;
    /// Archive comment.
    pub const COMMENT: u64 = 0x16;
    /// Encoded (compressed) header.
    pub const ENCODED_HEADER: u64 = 0x17;
    /// Explicit start position.
    pub const START_POS: u64 = 0x18;
    /// Padding.
    pub const DUMMY: u64 = 0x19;
}

/// Windows file attribute constants.
pub mod attributes {
    /// Directory.
    pub const DIRECTORY: u32 = 0x10;
    /// Unix permissions are stored in the high 16 bits.
    pub const UNIX_EXTENSION: u32 = 0x8000;
}
