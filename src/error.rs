//! Error types for 7z archive reading and decoding.
//!
//! This module provides the [`Error`] enum, which represents all possible
//! failure modes when opening, listing, or extracting a 7z archive, along
//! with the [`Result<T>`] alias and the coarse [`ErrorCategory`] taxonomy.
//!
//! # Fatal and folder-scoped errors
//!
//! Extraction decodes one folder (solid block) at a time. Some errors only
//! concern the folder being decoded: an unsupported coder, a coder that
//! rejects its input, or a checksum mismatch. The extractor records these
//! against every file of that folder and moves on to the next folder. All
//! other errors abort the operation. [`Error::is_folder_scoped`] tells the
//! two apart.
//!
//! ```rust
//! use sevenz_decode::{Error, ErrorCategory};
//!
//! fn describe(error: &Error) -> &'static str {
//!     match error.category() {
//!         ErrorCategory::TruncatedStream => "The archive is incomplete.",
//!         ErrorCategory::HeaderCorrupt => "The archive header is damaged.",
//!         ErrorCategory::UnsupportedCodec => "The archive uses an unsupported method.",
//!         ErrorCategory::DataIntegrity => "Archive data failed verification.",
//!         _ => "The archive could not be read.",
//!     }
//! }
//! ```

use std::io;

/// Helper struct for formatting CrcMismatch error messages.
struct CrcMismatchDisplay<'a> {
    entry_index: usize,
    entry_name: Option<&'a str>,
    expected: u32,
    actual: u32,
}

impl std::fmt::Display for CrcMismatchDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CRC mismatch for entry {}", self.entry_index)?;
        if let Some(name) = self.entry_name {
            write!(f, " ({})", name)?;
        }
        write!(f, ": expected {:#x}, got {:#x}", self.expected, self.actual)
    }
}

/// Coarse classification of an [`Error`].
///
/// Callers that only need to decide how to react (report, skip, abort)
/// can match on the category instead of on individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The archive ends before a declared structure or stream.
    TruncatedStream,
    /// The header is malformed or violates a structural invariant.
    HeaderCorrupt,
    /// The format version is newer than this reader understands.
    UnsupportedVersion,
    /// A coder method or coder arrangement is not supported.
    UnsupportedCodec,
    /// Decoded data failed a checksum or the decoder rejected its input.
    DataIntegrity,
    /// The underlying byte source failed.
    Io,
    /// A configured resource limit was exceeded.
    ResourceLimit,
    /// The caller passed an invalid argument or an unsafe path.
    InvalidInput,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::TruncatedStream => "truncated stream",
            Self::HeaderCorrupt => "corrupt header",
            Self::UnsupportedVersion => "unsupported version",
            Self::UnsupportedCodec => "unsupported codec",
            Self::DataIntegrity => "data integrity",
            Self::Io => "I/O",
            Self::ResourceLimit => "resource limit",
            Self::InvalidInput => "invalid input",
        };
        f.write_str(name)
    }
}

/// The main error type for 7z archive operations.
///
/// # Error Categories
///
/// | Category | Variants |
/// |----------|----------|
/// | Truncation | [`Truncated`][Self::Truncated] |
/// | Format | [`InvalidFormat`][Self::InvalidFormat], [`CorruptHeader`][Self::CorruptHeader] |
/// | Version | [`UnsupportedVersion`][Self::UnsupportedVersion] |
/// | Compatibility | [`UnsupportedMethod`][Self::UnsupportedMethod], [`UnsupportedFeature`][Self::UnsupportedFeature] |
/// | Integrity | [`DataError`][Self::DataError], [`FolderCrcMismatch`][Self::FolderCrcMismatch], [`CrcMismatch`][Self::CrcMismatch] |
/// | Resources | [`ResourceLimitExceeded`][Self::ResourceLimitExceeded] |
/// | Caller | [`InvalidInput`][Self::InvalidInput], [`PathTraversal`][Self::PathTraversal] |
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred on the archive source or an extraction sink.
    ///
    /// This wraps [`std::io::Error`]. Errors that a decoder raises while
    /// reading packed data are not reported here: they become
    /// [`DataError`][Self::DataError] for the folder being decoded.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The archive ends before a structure or stream it declares.
    ///
    /// The offset is the absolute position in the archive where the
    /// missing data was expected.
    #[error("Truncated archive at offset {offset:#x}: {reason}")]
    Truncated {
        /// The absolute byte offset where more data was expected.
        offset: u64,
        /// What was being read.
        reason: String,
    },

    /// The source is not a 7z archive.
    ///
    /// Returned when no signature is found, neither at the start of the
    /// source nor within the self-extractor scan window.
    #[error("Invalid 7z format: {0}")]
    InvalidFormat(String),

    /// The archive header is corrupt.
    ///
    /// Covers checksum failures on the start header and next header,
    /// out-of-range counts, unknown section identifiers and folder graphs
    /// that violate the bind-pair invariants.
    #[error("Corrupt header at offset {offset:#x}: {reason}")]
    CorruptHeader {
        /// The byte offset where corruption was detected.
        offset: u64,
        /// A description of the corruption.
        reason: String,
    },

    /// The archive declares a format version this reader does not know.
    #[error("Unsupported 7z version {major}.{minor}")]
    UnsupportedVersion {
        /// Major version byte.
        major: u8,
        /// Minor version byte.
        minor: u8,
    },

    /// The archive uses a coder method that cannot be decoded.
    ///
    /// Common method IDs:
    /// - `0x00`: Copy
    /// - `0x21`: LZMA2
    /// - `0x030101`: LZMA
    /// - `0x03030103`: BCJ x86
    /// - `0x0303011b`: BCJ2
    /// - `0x040108`: Deflate (not supported)
    /// - `0x040202`: BZip2 (not supported)
    /// - `0x030401`: PPMd (not supported)
    /// - `0x06f10701`: AES-256 (not supported)
    #[error("Unsupported method: {method_id:#x}")]
    UnsupportedMethod {
        /// The method ID that is not supported.
        method_id: u64,
    },

    /// A feature required by the archive or requested by the caller is not
    /// supported.
    #[error("Unsupported feature: {feature}")]
    UnsupportedFeature {
        /// The name of the unsupported feature.
        feature: &'static str,
    },

    /// A coder rejected its input while decoding a folder.
    #[error("Data error in folder {folder_index}: {reason}")]
    DataError {
        /// The folder being decoded.
        folder_index: usize,
        /// Description reported by the decoder.
        reason: String,
    },

    /// A folder's decoded output does not match its stored CRC.
    #[error("CRC mismatch for folder {folder_index}: expected {expected:#x}, got {actual:#x}")]
    FolderCrcMismatch {
        /// The folder whose output failed verification.
        folder_index: usize,
        /// The CRC stored in the archive.
        expected: u32,
        /// The CRC of the decoded output.
        actual: u32,
    },

    /// The CRC checksum of an extracted entry does not match.
    ///
    /// Other entries of the archive may still be intact.
    #[error("{}", CrcMismatchDisplay { entry_index: *entry_index, entry_name: entry_name.as_deref(), expected: *expected, actual: *actual })]
    CrcMismatch {
        /// The entry index with the CRC mismatch.
        entry_index: usize,
        /// The entry name/path with the CRC mismatch (if known).
        entry_name: Option<String>,
        /// The expected CRC value from the archive.
        expected: u32,
        /// The actual CRC value of the extracted data.
        actual: u32,
    },

    /// An entry path would escape the extraction directory.
    ///
    /// Raised by [`FilesystemSink`] for absolute paths and `..` components.
    ///
    /// [`FilesystemSink`]: crate::read::FilesystemSink
    #[error("Path traversal detected in entry {entry_index}: {path}")]
    PathTraversal {
        /// The entry index with path traversal.
        entry_index: usize,
        /// The offending path.
        path: String,
    },

    /// A resource limit was exceeded.
    ///
    /// Protects against archives that declare absurd entry counts, header
    /// sizes, or folder sizes. See [`ResourceLimits`].
    ///
    /// [`ResourceLimits`]: crate::format::streams::ResourceLimits
    #[error("Resource limit exceeded: {0}")]
    ResourceLimitExceeded(String),

    /// The caller passed an invalid argument, such as an entry index that
    /// does not exist.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Returns the coarse category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Io(_) => ErrorCategory::Io,
            Error::Truncated { .. } => ErrorCategory::TruncatedStream,
            Error::InvalidFormat(_) | Error::CorruptHeader { .. } => ErrorCategory::HeaderCorrupt,
            Error::UnsupportedVersion { .. } => ErrorCategory::UnsupportedVersion,
            Error::UnsupportedMethod { .. } | Error::UnsupportedFeature { .. } => {
                ErrorCategory::UnsupportedCodec
            }
            Error::DataError { .. }
            | Error::FolderCrcMismatch { .. }
            | Error::CrcMismatch { .. } => ErrorCategory::DataIntegrity,
            Error::ResourceLimitExceeded(_) => ErrorCategory::ResourceLimit,
            Error::InvalidInput(_) | Error::PathTraversal { .. } => ErrorCategory::InvalidInput,
        }
    }

    /// Returns `true` if this error only affects the folder being decoded.
    ///
    /// The extractor records folder-scoped errors against the folder's files
    /// and continues with the next folder. Everything else aborts.
    pub fn is_folder_scoped(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::UnsupportedCodec | ErrorCategory::DataIntegrity
        )
    }

    /// Returns `true` if this is a data corruption error.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::CrcMismatch { .. }
                | Error::FolderCrcMismatch { .. }
                | Error::DataError { .. }
                | Error::CorruptHeader { .. }
                | Error::Truncated { .. }
        )
    }

    /// Returns `true` if this error is related to unsupported methods or features.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedMethod { .. }
                | Error::UnsupportedFeature { .. }
                | Error::UnsupportedVersion { .. }
        )
    }

    /// Returns the entry index associated with this error, if any.
    pub fn entry_index(&self) -> Option<usize> {
        match self {
            Error::CrcMismatch { entry_index, .. } => Some(*entry_index),
            Error::PathTraversal { entry_index, .. } => Some(*entry_index),
            _ => None,
        }
    }

    /// Returns the folder index associated with this error, if any.
    pub fn folder_index(&self) -> Option<usize> {
        match self {
            Error::DataError { folder_index, .. } => Some(*folder_index),
            Error::FolderCrcMismatch { folder_index, .. } => Some(*folder_index),
            _ => None,
        }
    }

    /// Returns the method ID if this is an unsupported method error.
    pub fn method_id(&self) -> Option<u64> {
        match self {
            Error::UnsupportedMethod { method_id } => Some(*method_id),
            _ => None,
        }
    }

    /// Creates a CrcMismatch error.
    pub fn crc_mismatch(
        entry_index: usize,
        entry_name: Option<String>,
        expected: u32,
        actual: u32,
    ) -> Self {
        Error::CrcMismatch {
            entry_index,
            entry_name,
            expected,
            actual,
        }
    }

    /// Creates a CorruptHeader error.
    pub fn corrupt_header(offset: u64, reason: impl Into<String>) -> Self {
        Error::CorruptHeader {
            offset,
            reason: reason.into(),
        }
    }

    /// Creates a Truncated error.
    pub fn truncated(offset: u64, reason: impl Into<String>) -> Self {
        Error::Truncated {
            offset,
            reason: reason.into(),
        }
    }

    /// Creates a DataError for a folder.
    pub fn data_error(folder_index: usize, reason: impl Into<String>) -> Self {
        Error::DataError {
            folder_index,
            reason: reason.into(),
        }
    }
}

/// A specialized Result type for 7z operations.
pub type Result<T> = std::result::Result<T, Error>;
