//! Archive summary and extraction results.

use crate::pipeline::CacheStats;
use crate::{Error, ErrorCategory};

/// Information about an opened archive.
#[derive(Debug, Clone, Default)]
pub struct ArchiveInfo {
    /// Total number of entries (files and directories).
    pub entry_count: usize,
    /// Total uncompressed size of all files.
    pub total_size: u64,
    /// Total size of the pack streams.
    pub packed_size: u64,
    /// Whether some folder holds more than one file.
    pub is_solid: bool,
    /// Names of the coder methods used, in first-use order.
    pub methods: Vec<&'static str>,
    /// Number of folders.
    pub folder_count: usize,
    /// Archive comment (if any).
    pub comment: Option<String>,
    /// Offset of the signature. Non-zero for self-extracting archives.
    pub sfx_offset: u64,
    /// Levels of encoded header that were decoded at open time.
    pub encoded_header_depth: u32,
}

impl ArchiveInfo {
    /// Returns the compression ratio (packed / unpacked).
    pub fn compression_ratio(&self) -> f64 {
        if self.total_size == 0 {
            1.0
        } else {
            self.packed_size as f64 / self.total_size as f64
        }
    }

    /// Returns the archive comment, if any.
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }
}

/// Outcome of one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStatus {
    /// Extracted (or verified, in test-only mode).
    Ok,
    /// The entry's folder uses a method or feature that cannot be decoded.
    Unsupported {
        /// Description of what is missing.
        reason: String,
    },
    /// The entry's folder failed to decode or its folder CRC did not match.
    DataError {
        /// Description of the failure.
        reason: String,
    },
    /// The entry's own CRC did not match.
    CrcMismatch {
        /// CRC stored in the archive.
        expected: u32,
        /// CRC of the decoded bytes.
        actual: u32,
    },
}

impl EntryStatus {
    /// Returns `true` for [`EntryStatus::Ok`].
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Category of the failure, `None` on success.
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            Self::Ok => None,
            Self::Unsupported { .. } => Some(ErrorCategory::UnsupportedCodec),
            Self::DataError { .. } | Self::CrcMismatch { .. } => {
                Some(ErrorCategory::DataIntegrity)
            }
        }
    }

    /// Status recorded for the files of a folder that failed with `error`.
    pub(crate) fn from_folder_error(error: &Error) -> Self {
        match error.category() {
            ErrorCategory::UnsupportedCodec => Self::Unsupported {
                reason: error.to_string(),
            },
            _ => Self::DataError {
                reason: error.to_string(),
            },
        }
    }
}

/// Result for one selected entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryResult {
    /// Entry index.
    pub index: usize,
    /// Entry name.
    pub name: String,
    /// Declared uncompressed size.
    pub size: u64,
    /// Outcome.
    pub status: EntryStatus,
}

/// Result of an extraction or test run.
///
/// Folder-scoped failures do not abort the run; they show up as entries
/// with a failed [`EntryStatus`].
#[must_use = "extraction results should be checked for partial failures"]
#[derive(Debug, Clone, Default)]
pub struct ExtractResult {
    /// Per-entry results in index order.
    pub entries: Vec<EntryResult>,
    /// Folders that were run through a pipeline.
    pub folders_decoded: usize,
    /// Bytes produced by folder decoding.
    pub bytes_produced: u64,
    /// Pipeline cache counters at the end of the run.
    pub cache_stats: CacheStats,
}

impl ExtractResult {
    /// Returns true if every selected entry succeeded.
    pub fn is_ok(&self) -> bool {
        self.entries.iter().all(|e| e.status.is_ok())
    }

    /// Number of entries that succeeded.
    pub fn entries_succeeded(&self) -> usize {
        self.entries.iter().filter(|e| e.status.is_ok()).count()
    }

    /// Number of entries that failed.
    pub fn entries_failed(&self) -> usize {
        self.entries.len() - self.entries_succeeded()
    }

    /// Entries that failed.
    pub fn failures(&self) -> impl Iterator<Item = &EntryResult> {
        self.entries.iter().filter(|e| !e.status.is_ok())
    }

    /// Result for entry `index`, if it was selected.
    pub fn entry(&self, index: usize) -> Option<&EntryResult> {
        self.entries
            .binary_search_by_key(&index, |e| e.index)
            .ok()
            .map(|i| &self.entries[i])
    }
}
