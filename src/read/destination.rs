//! Extraction sinks.
//!
//! The orchestrator hands every verified entry to an [`ExtractSink`]:
//!
//! - [`FilesystemSink`] writes under a root directory
//! - [`MemorySink`] keeps contents in a map keyed by entry name
//! - [`NullSink`] only counts
//!
//! Entries that fail verification never reach [`ExtractSink::create_writer`];
//! the sink only sees `on_complete(entry, false)` for them.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::format::files::FileEntry;
use crate::{Error, Result};

/// Receives extracted entries.
pub trait ExtractSink: Send {
    /// Creates a writer for a file entry. Not called for directories.
    fn create_writer(&mut self, entry: &FileEntry) -> Result<Box<dyn Write + Send>>;

    /// Called once per file entry after its data was written, or with
    /// `success == false` when the entry failed.
    fn on_complete(&mut self, entry: &FileEntry, success: bool) -> Result<()>;

    /// Called for directory entries.
    fn on_directory(&mut self, entry: &FileEntry) -> Result<()> {
        let _ = entry;
        Ok(())
    }

    /// Called once before any entry with the number of selected entries.
    fn on_start(&mut self, total_entries: usize) -> Result<()> {
        let _ = total_entries;
        Ok(())
    }

    /// Called once after the last entry.
    fn on_finish(&mut self, success: bool) -> Result<()> {
        let _ = success;
        Ok(())
    }
}

/// Resolves an archive name to a relative path.
///
/// Both `/` and `\` separate components. Absolute names, drive prefixes and
/// `..` components are rejected.
pub(crate) fn sanitize_entry_path(entry_index: usize, name: &str) -> Result<PathBuf> {
    let traversal = || Error::PathTraversal {
        entry_index,
        path: name.to_string(),
    };

    if name.starts_with('/') || name.starts_with('\\') {
        return Err(traversal());
    }
    let bytes = name.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        return Err(traversal());
    }

    let mut path = PathBuf::new();
    for part in name.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => return Err(traversal()),
            part => {
                // A platform-specific prefix or root hiding inside one part.
                if Path::new(part)
                    .components()
                    .any(|c| !matches!(c, Component::Normal(_)))
                {
                    return Err(traversal());
                }
                path.push(part);
            }
        }
    }
    Ok(path)
}

/// Writes entries below a root directory.
///
/// Modification times are applied with `filetime`; Unix permission bits
/// stored in the attributes are applied when enabled.
#[derive(Debug)]
pub struct FilesystemSink {
    root: PathBuf,
    preserve_permissions: bool,
    current_path: Option<PathBuf>,
}

impl FilesystemSink {
    /// Creates a sink writing below `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            preserve_permissions: true,
            current_path: None,
        }
    }

    /// Sets whether to apply Unix permission bits.
    pub fn preserve_permissions(mut self, preserve: bool) -> Self {
        self.preserve_permissions = preserve;
        self
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve_path(&self, entry: &FileEntry) -> Result<PathBuf> {
        Ok(self.root.join(sanitize_entry_path(entry.index, &entry.name)?))
    }

    fn apply_metadata(&self, path: &Path, entry: &FileEntry) {
        if let Some(mtime) = entry.mtime {
            if let Err(e) = filetime::set_file_mtime(path, mtime.to_file_time()) {
                log::warn!(
                    "failed to set modification time on '{}': {}",
                    path.display(),
                    e
                );
            }
        }

        #[cfg(unix)]
        if self.preserve_permissions {
            if let Some(mode) = entry.unix_mode() {
                use std::os::unix::fs::PermissionsExt;
                if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(mode)) {
                    log::warn!("failed to set permissions on '{}': {}", path.display(), e);
                }
            }
        }
    }
}

impl ExtractSink for FilesystemSink {
    fn create_writer(&mut self, entry: &FileEntry) -> Result<Box<dyn Write + Send>> {
        let path = self.resolve_path(entry)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;
        self.current_path = Some(path);
        Ok(Box::new(file))
    }

    fn on_complete(&mut self, entry: &FileEntry, success: bool) -> Result<()> {
        let Some(path) = self.current_path.take() else {
            return Ok(());
        };
        if success {
            self.apply_metadata(&path, entry);
        } else if let Err(e) = fs::remove_file(&path) {
            log::warn!(
                "failed to clean up partial file '{}': {}",
                path.display(),
                e
            );
        }
        Ok(())
    }

    fn on_directory(&mut self, entry: &FileEntry) -> Result<()> {
        let path = self.resolve_path(entry)?;
        fs::create_dir_all(&path)?;
        Ok(())
    }
}

/// Keeps extracted contents in memory, keyed by entry name.
#[derive(Debug, Default)]
pub struct MemorySink {
    files: HashMap<String, Vec<u8>>,
    directories: Vec<String>,
    current: Option<(String, Arc<Mutex<Vec<u8>>>)>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Extracted file contents by name.
    pub fn files(&self) -> &HashMap<String, Vec<u8>> {
        &self.files
    }

    /// Takes the extracted file contents.
    pub fn into_files(self) -> HashMap<String, Vec<u8>> {
        self.files
    }

    /// Content of the file named `name`.
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    /// Names of the directories seen.
    pub fn directories(&self) -> &[String] {
        &self.directories
    }

    /// Number of extracted files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns true if no file has been extracted.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Appends to a buffer the sink keeps a handle to.
struct SharedBufferWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Write for SharedBufferWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .buffer
            .lock()
            .map_err(|_| io::Error::other("mutex poisoned"))?;
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ExtractSink for MemorySink {
    fn create_writer(&mut self, entry: &FileEntry) -> Result<Box<dyn Write + Send>> {
        let capacity = usize::try_from(entry.size).unwrap_or(0).min(1 << 20);
        let buffer = Arc::new(Mutex::new(Vec::with_capacity(capacity)));
        self.current = Some((entry.name.clone(), Arc::clone(&buffer)));
        Ok(Box::new(SharedBufferWriter { buffer }))
    }

    fn on_complete(&mut self, _entry: &FileEntry, success: bool) -> Result<()> {
        let Some((name, buffer)) = self.current.take() else {
            return Ok(());
        };
        if success {
            let data = Arc::try_unwrap(buffer)
                .map(|mutex| mutex.into_inner().unwrap_or_default())
                .unwrap_or_else(|arc| arc.lock().map(|guard| guard.clone()).unwrap_or_default());
            self.files.insert(name, data);
        }
        Ok(())
    }

    fn on_directory(&mut self, entry: &FileEntry) -> Result<()> {
        self.directories.push(entry.name.clone());
        Ok(())
    }
}

/// Discards data and counts what it was given.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NullSink {
    entries_processed: usize,
    entries_failed: usize,
    bytes_discarded: u64,
}

impl NullSink {
    /// Creates a sink with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// File and directory entries completed successfully.
    pub fn entries_processed(&self) -> usize {
        self.entries_processed
    }

    /// Entries reported as failed.
    pub fn entries_failed(&self) -> usize {
        self.entries_failed
    }

    /// Total declared size of the successful file entries.
    pub fn bytes_discarded(&self) -> u64 {
        self.bytes_discarded
    }
}

impl ExtractSink for NullSink {
    fn create_writer(&mut self, _entry: &FileEntry) -> Result<Box<dyn Write + Send>> {
        Ok(Box::new(io::sink()))
    }

    fn on_complete(&mut self, entry: &FileEntry, success: bool) -> Result<()> {
        if success {
            self.entries_processed += 1;
            self.bytes_discarded += entry.size;
        } else {
            self.entries_failed += 1;
        }
        Ok(())
    }

    fn on_directory(&mut self, _entry: &FileEntry) -> Result<()> {
        self.entries_processed += 1;
        Ok(())
    }
}
