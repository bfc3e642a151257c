//! Coder registry and the decoder abstraction.
//!
//! A folder names its coders by method ID. [`instantiate`] maps an ID to a
//! fresh [`Decoder`] through the [`Method`] table; IDs that are known but not
//! implemented, and IDs that are not known at all, both surface as
//! [`Error::UnsupportedMethod`].
//!
//! Decoders are stateless factories: [`Decoder::decode`] wires a set of input
//! readers into a new output reader, so one instance can be reused for every
//! folder that shares a pipeline shape.

use std::fmt;
use std::io::{self, Read};

use crate::{Error, Result};

pub mod bcj2;
mod copy;
#[cfg(feature = "lzma")]
pub mod filters;
#[cfg(feature = "lzma")]
pub mod lzma;

pub use bcj2::Bcj2Decoder;
pub use copy::CopyDecoder;
#[cfg(feature = "lzma")]
pub use filters::FilterAdapter;
#[cfg(feature = "lzma")]
pub use lzma::{Lzma2Decoder, LzmaDecoder};

/// Sizes of the streams a coder reads and produces within one folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSizes {
    /// Size of each input, in the coder's input order.
    pub in_sizes: Vec<u64>,
    /// Size of each output, in the coder's output order.
    pub out_sizes: Vec<u64>,
}

impl StreamSizes {
    /// Size of the first output, or `u64::MAX` when unknown.
    pub fn out_size(&self) -> u64 {
        self.out_sizes.first().copied().unwrap_or(u64::MAX)
    }
}

/// Optional capability of coders that take a property blob.
pub trait PropertyConfigurable {
    /// Applies the coder properties stored in the folder.
    ///
    /// Called before every folder run, with an empty slice when the folder
    /// stores none, so state from a previous folder never leaks.
    fn set_properties(&mut self, properties: &[u8]) -> Result<()>;
}

/// A coder that turns its input streams into one output stream.
pub trait Decoder {
    /// Which method this decoder implements.
    fn method(&self) -> Method;

    /// Builds the output reader for one folder run.
    ///
    /// `inputs` holds exactly as many readers as the method's arity, in
    /// input order. Errors returned here are construction failures; errors
    /// while reading the result come through the returned reader.
    fn decode<'a>(
        &self,
        inputs: Vec<Box<dyn Read + 'a>>,
        sizes: &StreamSizes,
    ) -> Result<Box<dyn Read + 'a>>;

    /// Returns the property capability, when the coder has one.
    fn as_property_configurable(&mut self) -> Option<&mut dyn PropertyConfigurable> {
        None
    }
}

/// Coder methods this crate recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Method {
    /// Stored data.
    Copy,
    /// LZMA.
    Lzma,
    /// LZMA2.
    Lzma2,
    /// x86 branch converter.
    BcjX86,
    /// Four-stream x86 branch converter.
    Bcj2,
    /// Byte-wise delta filter.
    Delta,
    /// Deflate (recognized, not decoded).
    Deflate,
    /// BZip2 (recognized, not decoded).
    BZip2,
    /// PPMd (recognized, not decoded).
    Ppmd,
    /// AES-256 with SHA-256 key derivation (recognized, not decoded).
    Aes,
}

/// Method ID bytes as stored in coder records.
const METHOD_IDS: &[(Method, &[u8])] = &[
    (Method::Copy, &[0x00]),
    (Method::Lzma, &[0x03, 0x01, 0x01]),
    (Method::Lzma2, &[0x21]),
    (Method::BcjX86, &[0x03, 0x03, 0x01, 0x03]),
    (Method::Bcj2, &[0x03, 0x03, 0x01, 0x1B]),
    (Method::Delta, &[0x03]),
    (Method::Deflate, &[0x04, 0x01, 0x08]),
    (Method::BZip2, &[0x04, 0x02, 0x02]),
    (Method::Ppmd, &[0x03, 0x04, 0x01]),
    (Method::Aes, &[0x06, 0xF1, 0x07, 0x01]),
];

impl Method {
    /// Looks up a method by its ID bytes.
    pub fn from_id(id: &[u8]) -> Option<Self> {
        METHOD_IDS
            .iter()
            .find(|(_, bytes)| *bytes == id)
            .map(|(method, _)| *method)
    }

    /// The method's ID bytes.
    pub fn id(self) -> &'static [u8] {
        METHOD_IDS
            .iter()
            .find(|(method, _)| *method == self)
            .map(|(_, bytes)| *bytes)
            .unwrap_or(&[])
    }

    /// The ID as a big-endian integer, as used in error reports.
    pub fn id_u64(self) -> u64 {
        method_id_u64(self.id())
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Copy => "Copy",
            Self::Lzma => "LZMA",
            Self::Lzma2 => "LZMA2",
            Self::BcjX86 => "BCJ",
            Self::Bcj2 => "BCJ2",
            Self::Delta => "Delta",
            Self::Deflate => "Deflate",
            Self::BZip2 => "BZip2",
            Self::Ppmd => "PPMd",
            Self::Aes => "7zAES",
        }
    }

    /// Number of input and output streams a coder of this method has.
    pub fn arity(self) -> (usize, usize) {
        match self {
            Self::Bcj2 => (4, 1),
            _ => (1, 1),
        }
    }

    /// Whether this build can decode the method.
    pub fn is_supported(self) -> bool {
        constructor(self).is_some()
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Interprets method ID bytes as a big-endian integer.
pub fn method_id_u64(id: &[u8]) -> u64 {
    id.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

/// Human-readable name for raw ID bytes, `"Unknown"` when not in the table.
pub fn method_name(id: &[u8]) -> &'static str {
    Method::from_id(id).map_or("Unknown", Method::name)
}

type Constructor = fn() -> Box<dyn Decoder>;

fn constructor(method: Method) -> Option<Constructor> {
    match method {
        Method::Copy => Some(|| -> Box<dyn Decoder> { Box::new(CopyDecoder) }),
        Method::Bcj2 => Some(|| -> Box<dyn Decoder> { Box::new(Bcj2Decoder) }),
        #[cfg(feature = "lzma")]
        Method::Lzma => Some(|| -> Box<dyn Decoder> { Box::new(LzmaDecoder::default()) }),
        #[cfg(feature = "lzma")]
        Method::Lzma2 => Some(|| -> Box<dyn Decoder> { Box::new(Lzma2Decoder::default()) }),
        #[cfg(feature = "lzma")]
        Method::BcjX86 => Some(|| -> Box<dyn Decoder> { Box::new(FilterAdapter::bcj_x86()) }),
        #[cfg(feature = "lzma")]
        Method::Delta => Some(|| -> Box<dyn Decoder> { Box::new(FilterAdapter::delta()) }),
        _ => None,
    }
}

/// Creates a fresh decoder for the given method ID.
///
/// # Errors
///
/// Returns [`Error::UnsupportedMethod`] for unknown IDs and for known
/// methods this build cannot decode.
pub fn instantiate(method_id: &[u8]) -> Result<Box<dyn Decoder>> {
    let unsupported = || Error::UnsupportedMethod {
        method_id: method_id_u64(method_id),
    };
    let method = Method::from_id(method_id).ok_or_else(unsupported)?;
    let make = constructor(method).ok_or_else(unsupported)?;
    Ok(make())
}

/// Error for a coder that cannot start on the given properties or inputs.
///
/// Reported as [`io::ErrorKind::InvalidData`] so the pipeline attributes it
/// to the folder being decoded.
pub(crate) fn invalid_data(reason: impl Into<String>) -> Error {
    Error::Io(io::Error::new(io::ErrorKind::InvalidData, reason.into()))
}

/// Takes the single input of a one-input coder.
pub(crate) fn single_input<'a>(
    method: Method,
    mut inputs: Vec<Box<dyn Read + 'a>>,
) -> Result<Box<dyn Read + 'a>> {
    match (inputs.pop(), inputs.is_empty()) {
        (Some(input), true) => Ok(input),
        _ => Err(invalid_data(format!("{method} expects exactly one input"))),
    }
}
