//! Copy codec (stored data).

use std::io::Read;

use super::{Decoder, Method, StreamSizes, single_input};
use crate::Result;

/// Passes its single input through unchanged.
///
/// The pipeline bounds every folder output by its declared size, so the
/// input is handed back as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyDecoder;

impl Decoder for CopyDecoder {
    fn method(&self) -> Method {
        Method::Copy
    }

    fn decode<'a>(
        &self,
        inputs: Vec<Box<dyn Read + 'a>>,
        sizes: &StreamSizes,
    ) -> Result<Box<dyn Read + 'a>> {
        let input = single_input(Method::Copy, inputs)?;
        Ok(Box::new(input.take(sizes.out_size())))
    }
}
