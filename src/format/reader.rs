//! Binary reader for 7z header structures.
//!
//! Two layers live here. The free functions decode primitives from any
//! [`Read`] and report plain I/O errors; they are used for the start header
//! and by tests that build header fixtures. [`HeaderReader`] is what the
//! header parser walks: a stack of in-memory byte frames with offset
//! tracking, typed truncation errors and the stream switch used for
//! additional-streams indirection.

use std::io::{self, Read, Write};

use crate::{Error, Result};

/// Largest element count accepted from a header.
pub const MAX_COUNT: u64 = i32::MAX as u64;

/// Maximum length of an entry name in UTF-16 code units.
pub const MAX_NAME_UNITS: usize = 32768;

/// Reads a variable-length encoded u64 (a "Number").
///
/// The count of leading one bits in the first byte is the number of extra
/// little-endian bytes that follow. The remaining low bits of the first
/// byte are the most significant part of the value:
///
/// - `0xxxxxxx`: value 0-127
/// - `10xxxxxx` + 1 byte: value 0-16383
/// - `110xxxxx` + 2 bytes
/// - ...
/// - `11111111` + 8 bytes: full u64
pub fn read_variable_u64<R: Read>(r: &mut R) -> io::Result<u64> {
    let first = read_u8(r)? as u64;
    let mut mask = 0x80u64;
    let mut value = 0u64;

    for i in 0..8 {
        if first & mask == 0 {
            return Ok(value | ((first & (mask - 1)) << (8 * i)));
        }
        value |= (read_u8(r)? as u64) << (8 * i);
        mask >>= 1;
    }

    Ok(value)
}

/// Writes `value` as a Number using the shortest encoding.
pub fn write_variable_u64<W: Write>(w: &mut W, value: u64) -> io::Result<()> {
    let extra = (0..8u32)
        .find(|&n| value < 1u64 << (7 * (n + 1)))
        .unwrap_or(8);

    let first = if extra == 8 {
        0xFF
    } else {
        let prefix = !(0xFFu8 >> extra);
        prefix | ((value >> (8 * extra)) as u8 & (0x7F >> extra))
    };

    let mut buf = [0u8; 9];
    buf[0] = first;
    for i in 0..extra as usize {
        buf[1 + i] = (value >> (8 * i)) as u8;
    }
    w.write_all(&buf[..=extra as usize])
}

/// Reads a single byte.
pub fn read_u8<R: Read>(r: &mut R) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Reads an unsigned 32-bit little-endian integer.
pub fn read_u32_le<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Reads an unsigned 64-bit little-endian integer.
pub fn read_u64_le<R: Read>(r: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Reads a bit-packed boolean vector of `count` elements, MSB first.
pub fn read_bool_vector<R: Read>(r: &mut R, count: usize) -> io::Result<Vec<bool>> {
    let mut bytes = vec![0u8; count.div_ceil(8)];
    r.read_exact(&mut bytes)?;
    Ok(unpack_bits(&bytes, count))
}

/// Reads an "all defined" flag byte, followed by a bit vector if the flag
/// is zero.
pub fn read_all_or_bits<R: Read>(r: &mut R, count: usize) -> io::Result<Vec<bool>> {
    if read_u8(r)? != 0 {
        Ok(vec![true; count])
    } else {
        read_bool_vector(r, count)
    }
}

fn unpack_bits(bytes: &[u8], count: usize) -> Vec<bool> {
    (0..count)
        .map(|i| (bytes[i / 8] >> (7 - (i % 8))) & 1 != 0)
        .collect()
}

#[derive(Debug)]
struct Frame {
    data: Vec<u8>,
    pos: usize,
    base_offset: u64,
}

/// Sequential reader over header bytes with a stack of sources.
///
/// The bottom frame holds the next header (or a decoded header). A
/// secondary buffer can be made the active source with
/// [`push_buffer`](Self::push_buffer) and dropped again with
/// [`pop_buffer`](Self::pop_buffer); reads always come from the top frame.
///
/// Reading past the end of the active frame yields [`Error::Truncated`]
/// carrying the offset at which data was expected.
#[derive(Debug)]
pub struct HeaderReader {
    frames: Vec<Frame>,
}

impl HeaderReader {
    /// Creates a reader over `data`, which starts at `base_offset` in the
    /// archive. Decoded buffers use the offset of their packed data.
    pub fn new(data: Vec<u8>, base_offset: u64) -> Self {
        Self {
            frames: vec![Frame {
                data,
                pos: 0,
                base_offset,
            }],
        }
    }

    /// Makes `data` the active source until the matching
    /// [`pop_buffer`](Self::pop_buffer).
    pub fn push_buffer(&mut self, data: Vec<u8>, base_offset: u64) {
        log::trace!(
            "header reader: push {} byte buffer (depth {})",
            data.len(),
            self.frames.len() + 1
        );
        self.frames.push(Frame {
            data,
            pos: 0,
            base_offset,
        });
    }

    /// Returns to the previous source.
    pub fn pop_buffer(&mut self) -> Result<()> {
        if self.frames.len() <= 1 {
            return Err(Error::corrupt_header(
                self.offset(),
                "stream switch stack underflow",
            ));
        }
        self.frames.pop();
        Ok(())
    }

    /// Number of frames on the stack.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    fn frame(&self) -> &Frame {
        // The bottom frame is never popped.
        &self.frames[self.frames.len() - 1]
    }

    fn frame_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    /// Position within the active frame.
    pub fn position(&self) -> usize {
        self.frame().pos
    }

    /// Archive offset of the next byte, used in error reports.
    pub fn offset(&self) -> u64 {
        let frame = self.frame();
        frame.base_offset + frame.pos as u64
    }

    /// Bytes left in the active frame.
    pub fn remaining(&self) -> usize {
        let frame = self.frame();
        frame.data.len() - frame.pos
    }

    /// Returns `true` if the active frame is exhausted.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&[u8]> {
        if n > self.remaining() {
            return Err(Error::truncated(
                self.offset(),
                format!("{what}: need {n} bytes, {} left", self.remaining()),
            ));
        }
        let frame = self.frame_mut();
        let start = frame.pos;
        frame.pos += n;
        Ok(&frame.data[start..start + n])
    }

    /// Reads one byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1, "byte")?[0])
    }

    /// Reads a little-endian u32.
    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.take(4, "u32")?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads a little-endian u64.
    pub fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8, "u64")?);
        Ok(u64::from_le_bytes(buf))
    }

    /// Reads `n` raw bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        Ok(self.take(n, "byte run")?.to_vec())
    }

    /// Skips `n` bytes.
    pub fn skip(&mut self, n: u64) -> Result<()> {
        let n = usize::try_from(n).unwrap_or(usize::MAX);
        self.take(n, "skipped property")?;
        Ok(())
    }

    /// Skips a property payload whose size Number comes next.
    pub fn skip_data(&mut self) -> Result<()> {
        let size = self.read_number()?;
        self.skip(size)
    }

    /// Reads a Number.
    pub fn read_number(&mut self) -> Result<u64> {
        let offset = self.offset();
        let frame = self.frame_mut();
        let mut slice = &frame.data[frame.pos..];
        let before = slice.len();
        match read_variable_u64(&mut slice) {
            Ok(value) => {
                frame.pos += before - slice.len();
                Ok(value)
            }
            Err(_) => Err(Error::truncated(offset, "number")),
        }
    }

    /// Reads a Number used as an element count.
    ///
    /// Counts above `2^31 - 1` are rejected as corrupt.
    pub fn read_count(&mut self, what: &str) -> Result<usize> {
        let offset = self.offset();
        let value = self.read_number()?;
        if value > MAX_COUNT {
            return Err(Error::corrupt_header(
                offset,
                format!("{what} count {value} out of range"),
            ));
        }
        Ok(value as usize)
    }

    /// Reads a Number that must fit in `u32`.
    pub fn read_u32_number(&mut self, what: &str) -> Result<u32> {
        let offset = self.offset();
        let value = self.read_number()?;
        u32::try_from(value)
            .map_err(|_| Error::corrupt_header(offset, format!("{what} {value} out of range")))
    }

    /// Reads a bit-packed boolean vector.
    pub fn read_bool_vector(&mut self, count: usize) -> Result<Vec<bool>> {
        let bytes = self.take(count.div_ceil(8), "bit vector")?;
        Ok(unpack_bits(bytes, count))
    }

    /// Reads an "all defined" flag followed by an optional bit vector.
    pub fn read_all_or_bits(&mut self, count: usize) -> Result<Vec<bool>> {
        if self.read_u8()? != 0 {
            Ok(vec![true; count])
        } else {
            self.read_bool_vector(count)
        }
    }

    /// Reads a NUL-terminated UTF-16LE string.
    pub fn read_utf16_string(&mut self) -> Result<String> {
        let offset = self.offset();
        let mut units = Vec::new();
        loop {
            let bytes = self.take(2, "name")?;
            let unit = u16::from_le_bytes([bytes[0], bytes[1]]);
            if unit == 0 {
                break;
            }
            if units.len() >= MAX_NAME_UNITS {
                return Err(Error::corrupt_header(offset, "name too long"));
            }
            units.push(unit);
        }
        String::from_utf16(&units)
            .map_err(|_| Error::corrupt_header(offset, "name is not valid UTF-16"))
    }
}
