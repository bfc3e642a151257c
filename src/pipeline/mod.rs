//! Folder decode pipelines.
//!
//! A [`DecodePipeline`] owns one instantiated decoder per coder of a folder
//! plus the resolved wiring between them. Running it pulls the folder's main
//! output through the coder graph, with pack streams read as bounded views
//! of a [`SharedSource`], and pushes the bytes into a sink while computing
//! their CRC.
//!
//! Pipelines are keyed by [`PipelineFingerprint`] in a [`PipelineCache`], so
//! folders that share a coder graph reuse the same decoder instances.
//!
//! # Error attribution
//!
//! Decoders report failures as [`io::Error`]s. An error that wraps a crate
//! [`Error`] (a truncated pack stream, a failing sink) is unwrapped and
//! stays archive-fatal; anything else is the coder rejecting its input and
//! becomes [`Error::DataError`] for the folder.

use std::io::{self, Read, Seek, Write};

use crate::checksum::Crc32Writer;
use crate::codec::{self, Decoder, StreamSizes};
use crate::format::streams::Folder;
use crate::{Error, Result};

mod cache;
mod fingerprint;
mod pack_stream;

pub use cache::{CacheStats, DEFAULT_CACHE_CAPACITY, PipelineCache};
pub use fingerprint::{CoderShape, PipelineFingerprint};
pub use pack_stream::{PackStreamReader, SharedSource};

/// Absolute location of one pack stream in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackRange {
    /// Absolute offset of the first byte.
    pub offset: u64,
    /// Length in bytes.
    pub size: u64,
}

/// Result of decoding one folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FolderOutput {
    /// Bytes written to the sink.
    pub size: u64,
    /// CRC-32 of those bytes.
    pub crc: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputSource {
    /// The n-th pack stream of the folder.
    Pack(usize),
    /// Output stream `out_index` of coder `coder`.
    Coder { coder: usize, out_index: usize },
}

/// Instantiated decoders and wiring for one folder shape.
pub struct DecodePipeline {
    coders: Vec<Box<dyn Decoder>>,
    /// Per coder, where each of its inputs comes from.
    wiring: Vec<Vec<InputSource>>,
    main_coder: usize,
}

impl std::fmt::Debug for DecodePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let methods: Vec<_> = self.coders.iter().map(|c| c.method()).collect();
        f.debug_struct("DecodePipeline")
            .field("methods", &methods)
            .field("wiring", &self.wiring)
            .field("main_coder", &self.main_coder)
            .finish()
    }
}

fn graph_error(folder: &Folder, reason: impl Into<String>) -> Error {
    Error::corrupt_header(folder.header_offset, reason)
}

impl DecodePipeline {
    /// Instantiates the decoders of `folder` and resolves its wiring.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedMethod`] when a coder's method cannot be decoded
    /// - [`Error::UnsupportedFeature`] for coders with several outputs or an
    ///   arity that does not match their method
    /// - [`Error::CorruptHeader`] for a graph that does not connect
    pub fn build(folder: &Folder) -> Result<Self> {
        let mut coders = Vec::with_capacity(folder.coders.len());
        for coder in &folder.coders {
            if coder.num_out_streams != 1 {
                return Err(Error::UnsupportedFeature {
                    feature: "coders with multiple output streams",
                });
            }
            let decoder = codec::instantiate(&coder.method_id)?;
            if decoder.method().arity() != (coder.num_in_streams, coder.num_out_streams) {
                return Err(Error::UnsupportedFeature {
                    feature: "coder stream counts that differ from the method's",
                });
            }
            coders.push(decoder);
        }

        let offsets = folder.coder_stream_offsets();
        let mut wiring = Vec::with_capacity(coders.len());
        for (coder, &(first_in, _)) in folder.coders.iter().zip(&offsets) {
            let inputs = (first_in..first_in + coder.num_in_streams)
                .map(|in_index| {
                    if let Some(bp) = folder.find_bind_pair_for_in_stream(in_index) {
                        let out_index = folder.bind_pairs[bp].out_index;
                        let (source, _) =
                            folder.coder_for_out_stream(out_index).ok_or_else(|| {
                                graph_error(
                                    folder,
                                    format!("bind pair refers to missing output {out_index}"),
                                )
                            })?;
                        Ok(InputSource::Coder {
                            coder: source,
                            out_index,
                        })
                    } else if let Some(pack) = folder.find_pack_stream_index(in_index) {
                        Ok(InputSource::Pack(pack))
                    } else {
                        Err(graph_error(
                            folder,
                            format!("input stream {in_index} is not connected"),
                        ))
                    }
                })
                .collect::<Result<Vec<_>>>()?;
            wiring.push(inputs);
        }

        let main_coder = folder
            .main_coder_index()
            .ok_or_else(|| graph_error(folder, "folder has no main output"))?;

        let pipeline = Self {
            coders,
            wiring,
            main_coder,
        };
        pipeline.check_acyclic(folder)?;
        Ok(pipeline)
    }

    fn check_acyclic(&self, folder: &Folder) -> Result<()> {
        fn visit(
            folder: &Folder,
            wiring: &[Vec<InputSource>],
            coder: usize,
            marks: &mut [u8],
        ) -> Result<()> {
            match marks[coder] {
                1 => return Err(graph_error(folder, "coder graph has a cycle")),
                2 => return Ok(()),
                _ => {}
            }
            marks[coder] = 1;
            for input in &wiring[coder] {
                if let InputSource::Coder { coder: next, .. } = *input {
                    visit(folder, wiring, next, marks)?;
                }
            }
            marks[coder] = 2;
            Ok(())
        }
        let mut marks = vec![0u8; self.wiring.len()];
        visit(folder, &self.wiring, self.main_coder, &mut marks)
    }

    /// Number of coders.
    pub fn num_coders(&self) -> usize {
        self.coders.len()
    }

    /// Applies each coder's properties for this run.
    ///
    /// Coders without the property capability ignore stored properties.
    /// A coder that rejects its properties fails the folder, not the archive.
    fn configure(&mut self, folder: &Folder, folder_index: usize) -> Result<()> {
        for (decoder, coder) in self.coders.iter_mut().zip(&folder.coders) {
            let method = decoder.method();
            let properties = coder.properties.as_deref();
            match decoder.as_property_configurable() {
                Some(target) => target
                    .set_properties(properties.unwrap_or(&[]))
                    .map_err(|e| {
                        Error::data_error(
                            folder_index,
                            format!("{method} properties rejected: {}", coder_reason(&e)),
                        )
                    })?,
                None => {
                    if let Some(p) = properties.filter(|p| !p.is_empty()) {
                        log::debug!(
                            "folder {folder_index}: {method} ignores {} property bytes",
                            p.len()
                        );
                    }
                }
            }
        }
        Ok(())
    }

    fn open_coder<'a, R: Read + Seek + 'a>(
        &self,
        coder: usize,
        folder: &Folder,
        source: &SharedSource<R>,
        packs: &[PackRange],
    ) -> Result<Box<dyn Read + 'a>> {
        let offsets = folder.coder_stream_offsets();
        let record = &folder.coders[coder];
        let mut inputs: Vec<Box<dyn Read + 'a>> = Vec::with_capacity(record.num_in_streams);
        let mut sizes = StreamSizes::default();

        for input in &self.wiring[coder] {
            match *input {
                InputSource::Pack(pack) => {
                    let range = packs.get(pack).ok_or_else(|| {
                        graph_error(folder, format!("pack stream {pack} of folder is missing"))
                    })?;
                    sizes.in_sizes.push(range.size);
                    inputs.push(Box::new(source.view(range.offset, range.size)));
                }
                InputSource::Coder {
                    coder: upstream,
                    out_index,
                } => {
                    sizes
                        .in_sizes
                        .push(folder.unpack_sizes.get(out_index).copied().unwrap_or(u64::MAX));
                    inputs.push(self.open_coder(upstream, folder, source, packs)?);
                }
            }
        }

        let first_out = offsets[coder].1;
        sizes.out_sizes = (first_out..first_out + record.num_out_streams)
            .map(|i| folder.unpack_sizes.get(i).copied().unwrap_or(u64::MAX))
            .collect();

        self.coders[coder].decode(inputs, &sizes)
    }

    /// Decodes `folder` into `sink`.
    ///
    /// `packs` are the absolute ranges of the folder's pack streams, in
    /// folder order. Output is bounded by the folder's unpack size; a coder
    /// that ends early is a data error.
    pub fn run<R: Read + Seek, W: Write + ?Sized>(
        &mut self,
        folder: &Folder,
        folder_index: usize,
        source: &SharedSource<R>,
        packs: &[PackRange],
        sink: &mut W,
    ) -> Result<FolderOutput> {
        self.configure(folder, folder_index)?;
        let unpack_size = folder.unpack_size()?;
        log::trace!(
            "folder {folder_index}: decoding {unpack_size} bytes through {} coders",
            self.coders.len()
        );

        let reader = self
            .open_coder(self.main_coder, folder, source, packs)
            .map_err(|e| match e {
                Error::Io(io) => map_decode_error(io, folder_index),
                other => other,
            })?;

        let mut writer = Crc32Writer::new(SinkWriter(sink));
        let copied = io::copy(&mut reader.take(unpack_size), &mut writer)
            .map_err(|e| map_decode_error(e, folder_index))?;
        if copied != unpack_size {
            return Err(Error::data_error(
                folder_index,
                format!("decoder produced {copied} of {unpack_size} bytes"),
            ));
        }
        Ok(FolderOutput {
            size: copied,
            crc: writer.crc(),
        })
    }
}

/// Tags sink failures so they are not mistaken for decoder errors.
struct SinkWriter<'w, W: ?Sized>(&'w mut W);

impl<W: Write + ?Sized> Write for SinkWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf).map_err(|e| io::Error::other(Error::Io(e)))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush().map_err(|e| io::Error::other(Error::Io(e)))
    }
}

fn coder_reason(e: &Error) -> String {
    match e {
        Error::Io(io) => io.to_string(),
        other => other.to_string(),
    }
}

/// Maps an I/O error raised while decoding folder `folder_index`.
pub(crate) fn map_decode_error(e: io::Error, folder_index: usize) -> Error {
    let reason = e.to_string();
    match e.into_inner().map(|inner| inner.downcast::<Error>()) {
        Some(Ok(err)) => *err,
        _ => Error::data_error(folder_index, reason),
    }
}

/// Decodes `folder` through a cached pipeline.
pub fn decode_folder<R: Read + Seek, W: Write + ?Sized>(
    cache: &mut PipelineCache,
    source: &SharedSource<R>,
    folder: &Folder,
    folder_index: usize,
    packs: &[PackRange],
    sink: &mut W,
) -> Result<FolderOutput> {
    cache
        .get_or_build(folder)?
        .run(folder, folder_index, source, packs, sink)
}
