//! Single-stream filters (BCJ x86, Delta).
//!
//! Both are thin adapters over the reader transforms in `lzma_rust2`.

use std::io::Read;

use lzma_rust2::filter::bcj::BcjReader;
use lzma_rust2::filter::delta::DeltaReader;

use super::{Decoder, Method, PropertyConfigurable, StreamSizes, invalid_data, single_input};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Filter {
    BcjX86 { start_pos: usize },
    Delta { distance: usize },
}

/// Adapts a one-in/one-out reader transform to the [`Decoder`] interface.
#[derive(Debug, Clone)]
pub struct FilterAdapter {
    filter: Filter,
}

impl FilterAdapter {
    /// The x86 branch converter, starting at address 0 until properties
    /// say otherwise.
    pub fn bcj_x86() -> Self {
        Self {
            filter: Filter::BcjX86 { start_pos: 0 },
        }
    }

    /// The delta filter with distance 1 until properties say otherwise.
    pub fn delta() -> Self {
        Self {
            filter: Filter::Delta { distance: 1 },
        }
    }
}

impl PropertyConfigurable for FilterAdapter {
    fn set_properties(&mut self, properties: &[u8]) -> Result<()> {
        match &mut self.filter {
            Filter::BcjX86 { start_pos } => {
                // Absent properties mean a start offset of 0.
                *start_pos = match properties {
                    [] => 0,
                    [a, b, c, d] => u32::from_le_bytes([*a, *b, *c, *d]) as usize,
                    _ => {
                        return Err(invalid_data(format!(
                            "BCJ properties must be 4 bytes, got {}",
                            properties.len()
                        )));
                    }
                };
            }
            Filter::Delta { distance } => {
                // The stored byte is distance - 1.
                let stored = properties
                    .first()
                    .copied()
                    .ok_or_else(|| invalid_data("Delta properties missing"))?;
                *distance = stored as usize + 1;
            }
        }
        Ok(())
    }
}

impl Decoder for FilterAdapter {
    fn method(&self) -> Method {
        match self.filter {
            Filter::BcjX86 { .. } => Method::BcjX86,
            Filter::Delta { .. } => Method::Delta,
        }
    }

    fn decode<'a>(
        &self,
        inputs: Vec<Box<dyn Read + 'a>>,
        _sizes: &StreamSizes,
    ) -> Result<Box<dyn Read + 'a>> {
        let input = single_input(self.method(), inputs)?;
        Ok(match self.filter {
            Filter::BcjX86 { start_pos } => Box::new(BcjReader::new_x86(input, start_pos)),
            Filter::Delta { distance } => Box::new(DeltaReader::new(input, distance)),
        })
    }

    fn as_property_configurable(&mut self) -> Option<&mut dyn PropertyConfigurable> {
        Some(self)
    }
}
