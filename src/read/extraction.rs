//! The extraction orchestrator.
//!
//! Requested entries are grouped by folder so that every folder is decoded
//! once. A folder is decoded in full into a buffer, checked against its CRC,
//! and then cut into its files following the substream sizes. Each file is
//! checked against its own CRC before the sink sees it.
//!
//! Folder-scoped failures (unsupported coder, data error, CRC mismatch)
//! mark the affected files and extraction moves on. Everything else aborts.

use std::io::{Read, Seek, Write};

use crate::checksum::Crc32;
use crate::format::database::ArchiveDatabase;
use crate::format::files::FileEntry;
use crate::pipeline::{self, FolderOutput, PipelineCache};
use crate::progress::{NoProgress, ProgressReporter};
use crate::{Error, Result};

use super::{
    Archive, EntryResult, EntryStatus, ExtractOptions, ExtractResult, ExtractSink, NullSink,
    Selection,
};

/// Upper bound on the buffer reserved up front for a folder.
const MAX_PREALLOCATION: u64 = 64 << 20;

#[derive(Debug, PartialEq, Eq)]
enum Group {
    /// An entry without content stream.
    Entry(usize),
    /// Requested entries of one folder, in index order.
    Folder { folder: usize, indices: Vec<usize> },
}

/// Groups sorted entry indices so each folder appears once.
///
/// Files of a folder have increasing indices and folders follow each other
/// in index order, so only the most recent folder group can grow.
fn group_by_folder(database: &ArchiveDatabase, indices: &[usize]) -> Vec<Group> {
    let mut groups = Vec::new();
    let mut open: Option<usize> = None;

    for &index in indices {
        let Some(folder) = database.folder_for_entry(index) else {
            groups.push(Group::Entry(index));
            continue;
        };
        if let Some(Group::Folder {
            folder: current,
            indices,
        }) = open.and_then(|pos| groups.get_mut(pos))
        {
            if *current == folder {
                indices.push(index);
                continue;
            }
        }
        open = Some(groups.len());
        groups.push(Group::Folder {
            folder,
            indices: vec![index],
        });
    }
    groups
}

/// State of one extraction call.
struct Extraction<'s, 'p> {
    /// `None` in test-only mode.
    sink: Option<&'s mut dyn ExtractSink>,
    progress: &'p mut dyn ProgressReporter,
    total: u64,
    processed: u64,
    result: ExtractResult,
}

impl Extraction<'_, '_> {
    fn record(&mut self, entry: &FileEntry, status: EntryStatus) {
        let ok = status.is_ok();
        self.progress.on_entry_complete(&entry.name, ok);
        self.processed = self.processed.saturating_add(entry.size);
        self.progress.on_progress(self.processed, self.total);
        self.result.entries.push(EntryResult {
            index: entry.index,
            name: entry.name.clone(),
            size: entry.size,
            status,
        });
    }

    /// Directories, empty files and anti-items.
    fn empty_entry(&mut self, entry: &FileEntry) -> Result<()> {
        if entry.is_anti {
            log::debug!("anti-item '{}' is not written", entry.name);
        } else if let Some(sink) = self.sink.as_deref_mut() {
            if entry.is_directory {
                sink.on_directory(entry)?;
            } else {
                drop(sink.create_writer(entry)?);
                sink.on_complete(entry, true)?;
            }
        }
        self.record(entry, EntryStatus::Ok);
        Ok(())
    }

    fn deliver(&mut self, entry: &FileEntry, data: &[u8]) -> Result<()> {
        if let Some(sink) = self.sink.as_deref_mut() {
            let written = sink.create_writer(entry).and_then(|mut writer| {
                writer.write_all(data)?;
                writer.flush()?;
                Ok(())
            });
            if let Err(e) = written {
                if let Err(cleanup) = sink.on_complete(entry, false) {
                    log::warn!("sink cleanup for '{}' failed: {}", entry.name, cleanup);
                }
                return Err(e);
            }
            sink.on_complete(entry, true)?;
        }
        self.record(entry, EntryStatus::Ok);
        Ok(())
    }

    fn fail(&mut self, entry: &FileEntry, status: EntryStatus) -> Result<()> {
        log::warn!("entry {} '{}' failed: {:?}", entry.index, entry.name, status);
        if let Some(sink) = self.sink.as_deref_mut() {
            sink.on_complete(entry, false)?;
        }
        self.record(entry, status);
        Ok(())
    }
}

impl<R: Read + Seek> Archive<R> {
    /// Extracts the selected entries into `sink`.
    ///
    /// Uses a fresh [`PipelineCache`] with
    /// [`ExtractOptions::cache_capacity`] and no progress reporting.
    ///
    /// # Errors
    ///
    /// Archive-fatal conditions only: truncated or corrupt data outside a
    /// coder, I/O and sink failures, resource limits, invalid indices and
    /// a parallel thread setting. Folder-scoped failures are reported per
    /// entry in the [`ExtractResult`].
    pub fn extract(
        &self,
        selection: &Selection,
        sink: &mut dyn ExtractSink,
        options: &ExtractOptions,
    ) -> Result<ExtractResult> {
        let mut cache = PipelineCache::new(options.cache_capacity);
        self.extract_with(selection, sink, options, &mut cache, &mut NoProgress)
    }

    /// Extracts with a caller-owned pipeline cache and progress reporter.
    ///
    /// Reusing one cache across calls keeps decoders of already seen
    /// folder shapes alive.
    pub fn extract_with(
        &self,
        selection: &Selection,
        sink: &mut dyn ExtractSink,
        options: &ExtractOptions,
        cache: &mut PipelineCache,
        progress: &mut dyn ProgressReporter,
    ) -> Result<ExtractResult> {
        options.threads.ensure_supported()?;
        let indices = selection.resolve(self.len())?;

        let total = indices
            .iter()
            .fold(0u64, |acc, &i| acc.saturating_add(self.database.entries[i].size));
        let mut run = Extraction {
            sink: if options.test_only { None } else { Some(sink) },
            progress,
            total,
            processed: 0,
            result: ExtractResult::default(),
        };

        if let Some(sink) = run.sink.as_deref_mut() {
            sink.on_start(indices.len())?;
        }
        run.progress.on_total(total);

        let outcome = group_by_folder(&self.database, &indices)
            .into_iter()
            .try_for_each(|group| match group {
                Group::Entry(index) => run.empty_entry(&self.database.entries[index]),
                Group::Folder { folder, indices } => {
                    self.extract_folder(folder, &indices, cache, &mut run)
                }
            });

        run.result.cache_stats = cache.stats();
        run.result.entries.sort_by_key(|e| e.index);

        let success = outcome.is_ok() && run.result.is_ok();
        if let Some(sink) = run.sink.as_deref_mut() {
            match &outcome {
                Ok(()) => sink.on_finish(success)?,
                Err(_) => {
                    if let Err(e) = sink.on_finish(false) {
                        log::warn!("sink finish after failed extraction: {e}");
                    }
                }
            }
        }
        outcome?;

        log::debug!(
            "extracted {} entries ({} failed), {} folders, {} bytes",
            run.result.entries.len(),
            run.result.entries_failed(),
            run.result.folders_decoded,
            run.result.bytes_produced
        );
        Ok(run.result)
    }

    /// Decodes and verifies the selected entries without writing them.
    pub fn test(&self, selection: &Selection) -> Result<ExtractResult> {
        self.extract(
            selection,
            &mut NullSink::new(),
            &ExtractOptions::new().test_only(true),
        )
    }

    /// Decodes one entry into memory.
    ///
    /// Unlike [`extract`](Self::extract), folder-scoped failures are
    /// returned as errors.
    pub fn read_entry(&self, index: usize) -> Result<Vec<u8>> {
        let entry = self.entry(index).ok_or_else(|| {
            Error::InvalidInput(format!(
                "entry index {index} out of range for {} entries",
                self.len()
            ))
        })?;
        let Some(folder_index) = self.database.folder_for_entry(index) else {
            return Ok(Vec::new());
        };

        let mut cache = PipelineCache::new(1);
        let mut data = self.folder_buffer(folder_index)?;
        let output = self.decode_into(folder_index, &mut cache, &mut data)?;
        self.check_folder_crc(folder_index, output)?;

        let start = self
            .database
            .folder_entries(folder_index)
            .iter()
            .take_while(|&&i| i != index)
            .fold(0u64, |acc, &i| acc.saturating_add(self.database.entries[i].size));
        let range = substream_range(start, entry.size, data.len()).ok_or_else(|| {
            Error::data_error(folder_index, "substream extends past folder output")
        })?;
        data.truncate(range.end);
        data.drain(..range.start);

        if let Some(expected) = entry.crc {
            let actual = Crc32::compute(&data);
            if actual != expected {
                return Err(Error::crc_mismatch(
                    index,
                    Some(entry.name.clone()),
                    expected,
                    actual,
                ));
            }
        }
        Ok(data)
    }

    /// Decodes folder `folder_index` into `sink` and verifies its CRC.
    pub fn decode_folder(
        &self,
        folder_index: usize,
        cache: &mut PipelineCache,
        sink: &mut dyn Write,
    ) -> Result<FolderOutput> {
        if folder_index >= self.database.num_folders() {
            return Err(Error::InvalidInput(format!(
                "folder index {folder_index} out of range for {} folders",
                self.database.num_folders()
            )));
        }
        let output = self.decode_into(folder_index, cache, sink)?;
        self.check_folder_crc(folder_index, output)?;
        Ok(output)
    }

    fn folder_buffer(&self, folder_index: usize) -> Result<Vec<u8>> {
        let size = self.database.folders[folder_index].unpack_size()?;
        Ok(Vec::with_capacity(size.min(MAX_PREALLOCATION) as usize))
    }

    fn decode_into<W: Write + ?Sized>(
        &self,
        folder_index: usize,
        cache: &mut PipelineCache,
        sink: &mut W,
    ) -> Result<FolderOutput> {
        let folder = &self.database.folders[folder_index];
        let size = folder.unpack_size()?;
        if size > self.limits.max_folder_unpacked {
            return Err(Error::ResourceLimitExceeded(format!(
                "folder {folder_index} unpacks to {size} bytes, limit is {}",
                self.limits.max_folder_unpacked
            )));
        }
        log::debug!(
            "decoding folder {folder_index}: {} coders, {size} bytes",
            folder.coders.len()
        );
        pipeline::decode_folder(
            cache,
            &self.source,
            folder,
            folder_index,
            self.database.folder_pack_ranges(folder_index),
            sink,
        )
    }

    fn check_folder_crc(&self, folder_index: usize, output: FolderOutput) -> Result<()> {
        match self.database.folders[folder_index].unpack_crc {
            Some(expected) if expected != output.crc => Err(Error::FolderCrcMismatch {
                folder_index,
                expected,
                actual: output.crc,
            }),
            _ => Ok(()),
        }
    }

    fn extract_folder(
        &self,
        folder_index: usize,
        indices: &[usize],
        cache: &mut PipelineCache,
        run: &mut Extraction<'_, '_>,
    ) -> Result<()> {
        let size = self.database.folders[folder_index].unpack_size()?;
        let produced = run.result.bytes_produced.saturating_add(size);
        if produced > self.limits.max_total_unpacked {
            return Err(Error::ResourceLimitExceeded(format!(
                "extraction would produce {produced} bytes, limit is {}",
                self.limits.max_total_unpacked
            )));
        }

        let mut data = self.folder_buffer(folder_index)?;
        let decoded = self
            .decode_into(folder_index, cache, &mut data)
            .and_then(|output| {
                run.result.folders_decoded += 1;
                run.result.bytes_produced += output.size;
                self.check_folder_crc(folder_index, output)
            });

        match decoded {
            Ok(()) => self.split_folder(folder_index, &data, indices, run),
            Err(e) if e.is_folder_scoped() => {
                log::warn!("folder {folder_index} failed: {e}");
                let status = EntryStatus::from_folder_error(&e);
                for &index in indices {
                    run.fail(&self.database.entries[index], status.clone())?;
                }
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn split_folder(
        &self,
        folder_index: usize,
        data: &[u8],
        indices: &[usize],
        run: &mut Extraction<'_, '_>,
    ) -> Result<()> {
        let mut wanted = indices.iter().copied().peekable();
        let mut offset = 0u64;

        for &index in self.database.folder_entries(folder_index) {
            let entry = &self.database.entries[index];
            let start = offset;
            offset = offset.saturating_add(entry.size);
            if wanted.next_if_eq(&index).is_none() {
                continue;
            }

            let Some(range) = substream_range(start, entry.size, data.len()) else {
                run.fail(
                    entry,
                    EntryStatus::DataError {
                        reason: format!(
                            "substream at {start} of {} bytes extends past folder output of {}",
                            entry.size,
                            data.len()
                        ),
                    },
                )?;
                continue;
            };

            let bytes = &data[range];
            let actual = Crc32::compute(bytes);
            match entry.crc {
                Some(expected) if expected != actual => {
                    run.fail(entry, EntryStatus::CrcMismatch { expected, actual })?;
                }
                _ => run.deliver(entry, bytes)?,
            }
        }
        Ok(())
    }
}

fn substream_range(start: u64, size: u64, len: usize) -> Option<std::ops::Range<usize>> {
    let start = usize::try_from(start).ok()?;
    let end = start.checked_add(usize::try_from(size).ok()?)?;
    (end <= len).then_some(start..end)
}
