//! Start header (signature header) parsing and signature location.

use std::io::{self, Read, Seek, SeekFrom};

use super::reader::{read_u8, read_u32_le, read_u64_le};
use super::{SIGNATURE, SIGNATURE_HEADER_SIZE, VERSION_MAJOR, VERSION_MINOR};
use crate::{Error, Result};

/// How far into the source the signature scan looks for a self-extracting
/// stub's payload.
pub const SFX_SEARCH_LIMIT: usize = 1024 * 1024;

/// Highest minor version accepted while scanning for an embedded signature.
const SCAN_MAX_MINOR: u8 = 10;

/// The fixed 32-byte header at the start of every archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartHeader {
    /// Format major version.
    pub version_major: u8,
    /// Format minor version.
    pub version_minor: u8,
    /// CRC of the 20 bytes that follow it.
    pub start_header_crc: u32,
    /// Offset of the next header, relative to the end of this header.
    pub next_header_offset: u64,
    /// Size of the next header in bytes.
    pub next_header_size: u64,
    /// CRC of the next header.
    pub next_header_crc: u32,
    /// Where the signature was found. Non-zero for self-extracting archives.
    pub sfx_offset: u64,
}

fn eof_as_truncated(offset: u64) -> impl Fn(io::Error) -> Error {
    move |e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::truncated(offset, "start header")
        } else {
            Error::Io(e)
        }
    }
}

impl StartHeader {
    /// Parses a start header at the reader's current position.
    ///
    /// The version is checked before the CRC, and the CRC is checked before
    /// any of the protected fields are interpreted.
    pub fn parse<R: Read>(r: &mut R) -> Result<Self> {
        let mut sig = [0u8; 6];
        r.read_exact(&mut sig).map_err(eof_as_truncated(0))?;
        if sig != *SIGNATURE {
            return Err(Error::InvalidFormat("invalid 7z signature".into()));
        }

        let version_major = read_u8(r).map_err(eof_as_truncated(6))?;
        let version_minor = read_u8(r).map_err(eof_as_truncated(7))?;
        if version_major != VERSION_MAJOR || version_minor > VERSION_MINOR {
            return Err(Error::UnsupportedVersion {
                major: version_major,
                minor: version_minor,
            });
        }

        let start_header_crc = read_u32_le(r).map_err(eof_as_truncated(8))?;

        let mut protected = [0u8; 20];
        r.read_exact(&mut protected).map_err(eof_as_truncated(12))?;
        let actual = crc32fast::hash(&protected);
        if actual != start_header_crc {
            return Err(Error::corrupt_header(
                12,
                format!(
                    "start header CRC mismatch: expected {:#x}, got {:#x}",
                    start_header_crc, actual
                ),
            ));
        }

        let mut fields = &protected[..];
        let next_header_offset = read_u64_le(&mut fields)?;
        let next_header_size = read_u64_le(&mut fields)?;
        let next_header_crc = read_u32_le(&mut fields)?;

        Ok(Self {
            version_major,
            version_minor,
            start_header_crc,
            next_header_offset,
            next_header_size,
            next_header_crc,
            sfx_offset: 0,
        })
    }

    /// Absolute position of the next header in the source.
    pub fn next_header_position(&self) -> Result<u64> {
        self.sfx_offset
            .checked_add(SIGNATURE_HEADER_SIZE)
            .and_then(|p| p.checked_add(self.next_header_offset))
            .ok_or_else(|| Error::corrupt_header(12, "next header offset overflows"))
    }

    /// Offset where packed data begins.
    pub fn data_start(&self) -> u64 {
        self.sfx_offset + SIGNATURE_HEADER_SIZE
    }
}

/// Scans forward for a signature followed by a plausible version.
///
/// Looks at most `search_limit` bytes (default [`SFX_SEARCH_LIMIT`]) from the
/// reader's current position and returns the absolute offset of the first
/// match.
pub fn find_signature<R: Read + Seek>(
    reader: &mut R,
    search_limit: Option<usize>,
) -> Result<Option<u64>> {
    let limit = search_limit.unwrap_or(SFX_SEARCH_LIMIT);
    let start_pos = reader.stream_position()?;

    let mut buffer = Vec::with_capacity(limit.min(64 * 1024));
    reader.by_ref().take(limit as u64).read_to_end(&mut buffer)?;

    let found = buffer.windows(8).position(|w| {
        w[..6] == SIGNATURE[..] && w[6] == VERSION_MAJOR && w[7] <= SCAN_MAX_MINOR
    });
    Ok(found.map(|pos| start_pos + pos as u64))
}

/// Locates and parses the start header.
///
/// Tries offset 0 first. If the source does not start with a signature, the
/// first 1 MiB is scanned for one, which covers self-extracting stubs.
pub fn locate_start_header<R: Read + Seek>(reader: &mut R) -> Result<StartHeader> {
    reader.seek(SeekFrom::Start(0))?;
    match StartHeader::parse(reader) {
        Err(Error::InvalidFormat(_)) => {}
        other => return other,
    }

    reader.seek(SeekFrom::Start(0))?;
    let offset = find_signature(reader, None)?.ok_or_else(|| {
        Error::InvalidFormat("no 7z signature found (not a 7z or SFX archive)".into())
    })?;
    log::debug!("found 7z signature at offset {offset:#x}");

    reader.seek(SeekFrom::Start(offset))?;
    let mut header = StartHeader::parse(reader)?;
    header.sfx_offset = offset;
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn start_header(version_minor: u8, offset: u64, size: u64, next_crc: u32) -> Vec<u8> {
        let mut protected = Vec::new();
        protected.extend_from_slice(&offset.to_le_bytes());
        protected.extend_from_slice(&size.to_le_bytes());
        protected.extend_from_slice(&next_crc.to_le_bytes());

        let mut data = SIGNATURE.to_vec();
        data.extend_from_slice(&[0, version_minor]);
        data.extend_from_slice(&crc32fast::hash(&protected).to_le_bytes());
        data.extend_from_slice(&protected);
        data
    }

    #[test]
    fn test_valid_start_header() {
        let data = start_header(4, 100, 50, 0xDEADBEEF);
        let header = StartHeader::parse(&mut Cursor::new(&data)).unwrap();
        assert_eq!(header.version_minor, 4);
        assert_eq!(header.next_header_offset, 100);
        assert_eq!(header.next_header_size, 50);
        assert_eq!(header.next_header_crc, 0xDEADBEEF);
        assert_eq!(header.next_header_position().unwrap(), 132);
    }

    #[test]
    fn test_invalid_signature() {
        let mut data = start_header(4, 0, 0, 0);
        data[0] = 0;
        let err = StartHeader::parse(&mut Cursor::new(&data)).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)));
    }

    #[test]
    fn test_unsupported_version() {
        let data = start_header(5, 0, 0, 0);
        let err = StartHeader::parse(&mut Cursor::new(&data)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedVersion { major: 0, minor: 5 }));

        let mut data = start_header(2, 0, 0, 0);
        data[6] = 1;
        let err = StartHeader::parse(&mut Cursor::new(&data)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedVersion { major: 1, .. }));
    }

    #[test]
    fn test_crc_checked_before_fields() {
        let mut data = start_header(4, 100, 50, 0);
        data[12] ^= 0xFF;
        let err = StartHeader::parse(&mut Cursor::new(&data)).unwrap_err();
        assert!(matches!(err, Error::CorruptHeader { offset: 12, .. }));
    }

    #[test]
    fn test_truncated_start_header() {
        let data = start_header(4, 0, 0, 0);
        let err = StartHeader::parse(&mut Cursor::new(&data[..20])).unwrap_err();
        assert!(matches!(err, Error::Truncated { offset: 12, .. }));
    }

    #[test]
    fn test_find_signature_skips_false_positive() {
        let mut data = SIGNATURE.to_vec();
        data.extend_from_slice(&[7, 0]); // major 7: not plausible
        data.extend_from_slice(&start_header(4, 0, 0, 0));
        let found = find_signature(&mut Cursor::new(&data), None).unwrap();
        assert_eq!(found, Some(8));
    }

    #[test]
    fn test_find_signature_respects_limit() {
        let mut data = vec![0u8; 64];
        data.extend_from_slice(&start_header(4, 0, 0, 0));
        assert_eq!(find_signature(&mut Cursor::new(&data), Some(32)).unwrap(), None);
        assert_eq!(find_signature(&mut Cursor::new(&data), None).unwrap(), Some(64));
    }

    #[test]
    fn test_locate_with_sfx_stub() {
        let mut data = b"MZ fake self-extractor stub".to_vec();
        let stub_len = data.len() as u64;
        data.extend_from_slice(&start_header(4, 0, 0, 0));

        let header = locate_start_header(&mut Cursor::new(&data)).unwrap();
        assert_eq!(header.sfx_offset, stub_len);
        assert_eq!(header.data_start(), stub_len + 32);
    }

    #[test]
    fn test_locate_without_signature() {
        let data = vec![0xAB; 256];
        let err = locate_start_header(&mut Cursor::new(&data)).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)));
    }
}
