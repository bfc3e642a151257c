//! Structural identity of a folder's coder graph.

use crate::format::streams::{BindPair, Folder};

/// Method and arity of one coder, without its properties.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CoderShape {
    /// Method ID bytes.
    pub method_id: Vec<u8>,
    /// Number of input streams.
    pub num_in_streams: usize,
    /// Number of output streams.
    pub num_out_streams: usize,
}

/// Two folders with equal fingerprints can be decoded by the same pipeline.
///
/// Properties and stream sizes are left out: they are applied per run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineFingerprint {
    /// Coders in folder order.
    pub coders: Vec<CoderShape>,
    /// Bind pairs in folder order.
    pub bind_pairs: Vec<BindPair>,
    /// Folder input indices fed by pack streams.
    pub packed_streams: Vec<usize>,
    /// Total number of output streams.
    pub num_out_streams: usize,
}

impl PipelineFingerprint {
    /// Fingerprint of `folder`.
    pub fn of(folder: &Folder) -> Self {
        Self {
            coders: folder
                .coders
                .iter()
                .map(|c| CoderShape {
                    method_id: c.method_id.clone(),
                    num_in_streams: c.num_in_streams,
                    num_out_streams: c.num_out_streams,
                })
                .collect(),
            bind_pairs: folder.bind_pairs.clone(),
            packed_streams: folder.packed_streams.clone(),
            num_out_streams: folder.total_out_streams(),
        }
    }
}
