//! LZMA and LZMA2 decoders.

use std::io::Read;

use super::{Decoder, Method, PropertyConfigurable, StreamSizes, invalid_data, single_input};
use crate::Result;

/// Parsed LZMA coder properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LzmaProps {
    props_byte: u8,
    dict_size: u32,
}

/// LZMA decoder.
///
/// Properties are 5 bytes: the lc/lp/pb byte followed by the dictionary size
/// in little-endian order.
#[derive(Debug, Default)]
pub struct LzmaDecoder {
    props: Option<LzmaProps>,
}

impl PropertyConfigurable for LzmaDecoder {
    fn set_properties(&mut self, properties: &[u8]) -> Result<()> {
        self.props = None;
        let Some((&props_byte, rest)) = properties.split_first() else {
            return Err(invalid_data("LZMA properties missing"));
        };
        let dict_bytes: [u8; 4] = rest
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| invalid_data("LZMA properties too short (need 5 bytes)"))?;
        if props_byte >= 9 * 5 * 5 {
            return Err(invalid_data(format!(
                "invalid LZMA properties byte {props_byte:#x}"
            )));
        }
        self.props = Some(LzmaProps {
            props_byte,
            dict_size: u32::from_le_bytes(dict_bytes),
        });
        Ok(())
    }
}

impl Decoder for LzmaDecoder {
    fn method(&self) -> Method {
        Method::Lzma
    }

    fn decode<'a>(
        &self,
        inputs: Vec<Box<dyn Read + 'a>>,
        sizes: &StreamSizes,
    ) -> Result<Box<dyn Read + 'a>> {
        let props = self
            .props
            .ok_or_else(|| invalid_data("LZMA properties not set"))?;
        let input = single_input(Method::Lzma, inputs)?;
        let reader = lzma_rust2::LzmaReader::new_with_props(
            input,
            sizes.out_size(),
            props.props_byte,
            props.dict_size,
            None,
        )
        .map_err(|e| invalid_data(e.to_string()))?;
        Ok(Box::new(reader))
    }

    fn as_property_configurable(&mut self) -> Option<&mut dyn PropertyConfigurable> {
        Some(self)
    }
}

/// LZMA2 decoder.
///
/// The single property byte encodes the dictionary size.
#[derive(Debug, Default)]
pub struct Lzma2Decoder {
    dict_size: Option<u32>,
}

impl PropertyConfigurable for Lzma2Decoder {
    fn set_properties(&mut self, properties: &[u8]) -> Result<()> {
        self.dict_size = None;
        let prop = properties
            .first()
            .copied()
            .ok_or_else(|| invalid_data("LZMA2 properties missing"))?;
        self.dict_size = Some(decode_lzma2_dict_size(prop)?);
        Ok(())
    }
}

impl Decoder for Lzma2Decoder {
    fn method(&self) -> Method {
        Method::Lzma2
    }

    fn decode<'a>(
        &self,
        inputs: Vec<Box<dyn Read + 'a>>,
        _sizes: &StreamSizes,
    ) -> Result<Box<dyn Read + 'a>> {
        let dict_size = self
            .dict_size
            .ok_or_else(|| invalid_data("LZMA2 properties not set"))?;
        let input = single_input(Method::Lzma2, inputs)?;
        Ok(Box::new(lzma_rust2::Lzma2Reader::new(input, dict_size, None)))
    }

    fn as_property_configurable(&mut self) -> Option<&mut dyn PropertyConfigurable> {
        Some(self)
    }
}

/// Decodes the LZMA2 dictionary size property byte.
///
/// 40 means 4 GiB - 1; anything above is invalid.
pub fn decode_lzma2_dict_size(prop: u8) -> Result<u32> {
    match prop {
        0..=39 => {
            let base_log = (prop as u32) / 2 + 12;
            Ok(if prop % 2 == 0 {
                1u32 << base_log
            } else {
                3u32 << (base_log - 1)
            })
        }
        40 => Ok(0xFFFF_FFFF),
        _ => Err(invalid_data(format!(
            "invalid LZMA2 dictionary size property: {prop}"
        ))),
    }
}
