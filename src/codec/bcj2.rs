//! BCJ2 filter for x86 executables.
//!
//! BCJ2 is a 4-in/1-out coder that improves compression of x86 code by
//! moving CALL/JMP destinations out of the main stream.
//!
//! # Stream Layout
//!
//! - Input 0 (Main): code with the converted operands removed
//! - Input 1 (Call): CALL (E8) destinations, big-endian absolute
//! - Input 2 (Jump): JMP (E9) and Jcc destinations, big-endian absolute
//! - Input 3 (Range): range-coded selector bits
//!
//! For every E8, E9 or `0F 8x` opcode in the main stream a selector bit says
//! whether the operand was converted. Converted operands are read from the
//! call or jump stream and turned back into relative addresses.

use std::io::{self, BufReader, Read};

use super::{Decoder, Method, StreamSizes, invalid_data};
use crate::Result;

mod range {
    pub const NUM_MOVE_BITS: u32 = 5;
    pub const NUM_BIT_MODEL_TOTAL_BITS: u32 = 11;
    pub const BIT_MODEL_TOTAL: u32 = 1 << NUM_BIT_MODEL_TOTAL_BITS;
    pub const TOP_VALUE: u32 = 1 << 24;
    pub const INITIAL_PROB: u32 = BIT_MODEL_TOTAL / 2;
}

/// Binary range decoder for the selector stream.
struct RangeDecoder<R> {
    reader: R,
    range: u32,
    code: u32,
}

impl<R: Read> RangeDecoder<R> {
    fn new(mut reader: R) -> io::Result<Self> {
        let mut init = [0u8; 5];
        reader.read_exact(&mut init)?;
        // The first byte is shifted out of the 32-bit code.
        let code = init[1..]
            .iter()
            .fold(0u32, |code, &b| (code << 8) | b as u32);
        Ok(Self {
            reader,
            range: 0xFFFF_FFFF,
            code,
        })
    }

    fn decode_bit(&mut self, prob: &mut u32) -> io::Result<bool> {
        let bound = (self.range >> range::NUM_BIT_MODEL_TOTAL_BITS) * *prob;
        let bit = if self.code < bound {
            self.range = bound;
            *prob += (range::BIT_MODEL_TOTAL - *prob) >> range::NUM_MOVE_BITS;
            false
        } else {
            self.range -= bound;
            self.code -= bound;
            *prob -= *prob >> range::NUM_MOVE_BITS;
            true
        };

        if self.range < range::TOP_VALUE {
            let mut byte = [0u8; 1];
            // Past the end the encoder's flush is implicitly zero.
            match self.reader.read(&mut byte) {
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {}
                Err(e) => return Err(e),
            }
            self.code = (self.code << 8) | byte[0] as u32;
            self.range <<= 8;
        }
        Ok(bit)
    }
}

#[inline]
fn is_jcc(prev: u8, curr: u8) -> bool {
    prev == 0x0F && (curr & 0xF0) == 0x80
}

#[inline]
fn is_jump(prev: u8, curr: u8) -> bool {
    (curr & 0xFE) == 0xE8 || is_jcc(prev, curr)
}

/// Probability slot: 256 CALL contexts keyed by the previous byte, then JMP,
/// then Jcc.
#[inline]
fn status_index(prev: u8, curr: u8) -> usize {
    match curr {
        0xE8 => prev as usize,
        0xE9 => 256,
        _ => 257,
    }
}

/// Reader that merges the four BCJ2 streams back into x86 code.
pub struct Bcj2Reader<R> {
    main: BufReader<R>,
    call: R,
    jump: R,
    range_decoder: RangeDecoder<R>,
    probs: [u32; 258],
    prev_byte: u8,
    written: u64,
    out_size: u64,
    buffer: Vec<u8>,
    buffer_pos: usize,
}

impl<R: Read> Bcj2Reader<R> {
    /// Creates the reader. `out_size` bounds the output, and no selector bit
    /// is consumed once it is reached.
    pub fn new(main: R, call: R, jump: R, range: R, out_size: u64) -> io::Result<Self> {
        Ok(Self {
            main: BufReader::new(main),
            call,
            jump,
            range_decoder: RangeDecoder::new(range)?,
            probs: [range::INITIAL_PROB; 258],
            prev_byte: 0,
            written: 0,
            out_size,
            buffer: Vec::with_capacity(64 * 1024),
            buffer_pos: 0,
        })
    }

    fn fill_buffer(&mut self) -> io::Result<()> {
        self.buffer.clear();
        self.buffer_pos = 0;

        while self.written < self.out_size && self.buffer.len() < self.buffer.capacity() / 2 {
            let mut byte = [0u8; 1];
            if self.main.read(&mut byte)? == 0 {
                break;
            }
            let b = byte[0];
            self.buffer.push(b);
            self.written += 1;

            if !is_jump(self.prev_byte, b) || self.written == self.out_size {
                self.prev_byte = b;
                continue;
            }

            let prob = &mut self.probs[status_index(self.prev_byte, b)];
            if !self.range_decoder.decode_bit(prob)? {
                self.prev_byte = b;
                continue;
            }

            let source: &mut dyn Read = if b == 0xE8 {
                &mut self.call
            } else {
                &mut self.jump
            };
            let mut dest = [0u8; 4];
            source.read_exact(&mut dest)?;
            let relative = u32::from_be_bytes(dest).wrapping_sub(self.written as u32 + 4);
            let bytes = relative.to_le_bytes();
            let room = (self.out_size - self.written).min(4) as usize;
            self.buffer.extend_from_slice(&bytes[..room]);
            self.written += room as u64;
            self.prev_byte = bytes[3];
        }
        Ok(())
    }
}

impl<R: Read> Read for Bcj2Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.buffer_pos >= self.buffer.len() {
            self.fill_buffer()?;
            if self.buffer.is_empty() {
                return Ok(0);
            }
        }
        let n = (self.buffer.len() - self.buffer_pos).min(buf.len());
        buf[..n].copy_from_slice(&self.buffer[self.buffer_pos..self.buffer_pos + n]);
        self.buffer_pos += n;
        Ok(n)
    }
}

/// The BCJ2 coder. It takes no properties.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bcj2Decoder;

impl Decoder for Bcj2Decoder {
    fn method(&self) -> Method {
        Method::Bcj2
    }

    fn decode<'a>(
        &self,
        inputs: Vec<Box<dyn Read + 'a>>,
        sizes: &StreamSizes,
    ) -> Result<Box<dyn Read + 'a>> {
        let Ok([main, call, jump, range]) = <[_; 4]>::try_from(inputs) else {
            return Err(invalid_data("BCJ2 expects exactly four inputs"));
        };
        let reader = Bcj2Reader::new(main, call, jump, range, sizes.out_size())?;
        Ok(Box::new(reader))
    }
}
