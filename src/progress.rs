//! Progress reporting for extraction.
//!
//! The orchestrator reports the total number of bytes it is about to
//! produce, the running byte count after every folder or empty entry, and
//! the outcome of each entry. Reporters only observe: there is no
//! cancellation hook, a caller that wants to stop early requests fewer
//! entries.
//!
//! # Example
//!
//! ```rust,ignore
//! use sevenz_decode::progress::{ProgressReporter, StatisticsProgress};
//!
//! let mut progress = StatisticsProgress::new();
//! archive.extract_with(Selection::All, &mut sink, &options, &mut cache, &mut progress)?;
//! println!("{} entries", progress.entries_completed);
//! ```

use std::time::{Duration, Instant};

const BYTES_KB: f64 = 1024.0;
const BYTES_MB: f64 = BYTES_KB * 1024.0;
const BYTES_GB: f64 = BYTES_MB * 1024.0;

/// Receives extraction progress.
pub trait ProgressReporter {
    /// Called once before extraction with the number of bytes that will be
    /// produced.
    fn on_total(&mut self, total_bytes: u64) {
        let _ = total_bytes;
    }

    /// Called as bytes are produced.
    fn on_progress(&mut self, bytes_processed: u64, total_bytes: u64) {
        let _ = (bytes_processed, total_bytes);
    }

    /// Called when an entry has been handled.
    fn on_entry_complete(&mut self, entry_name: &str, success: bool) {
        let _ = (entry_name, success);
    }
}

/// A progress reporter that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {}

/// A progress reporter that collects counters.
#[derive(Debug, Clone)]
pub struct StatisticsProgress {
    /// Total bytes announced by [`on_total`](ProgressReporter::on_total).
    pub total_bytes: u64,
    /// Bytes produced so far.
    pub processed_bytes: u64,
    /// Entries that completed successfully.
    pub entries_completed: usize,
    /// Entries that failed.
    pub entries_failed: usize,
    /// When the reporter was created.
    pub start_time: Instant,
}

impl Default for StatisticsProgress {
    fn default() -> Self {
        Self {
            total_bytes: 0,
            processed_bytes: 0,
            entries_completed: 0,
            entries_failed: 0,
            start_time: Instant::now(),
        }
    }
}

impl StatisticsProgress {
    /// Creates a reporter with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Completion percentage (0.0 - 100.0).
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            0.0
        } else {
            (self.processed_bytes as f64 / self.total_bytes as f64) * 100.0
        }
    }

    /// Time since creation.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Bytes produced per second.
    pub fn bytes_per_second(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed < 0.001 {
            0.0
        } else {
            self.processed_bytes as f64 / elapsed
        }
    }
}

impl ProgressReporter for StatisticsProgress {
    fn on_total(&mut self, total_bytes: u64) {
        self.total_bytes = total_bytes;
    }

    fn on_progress(&mut self, bytes_processed: u64, _total_bytes: u64) {
        self.processed_bytes = bytes_processed;
    }

    fn on_entry_complete(&mut self, _entry_name: &str, success: bool) {
        if success {
            self.entries_completed += 1;
        } else {
            self.entries_failed += 1;
        }
    }
}

/// Progress reporter backed by a closure over `(bytes_processed, total_bytes)`.
pub struct ClosureProgress<F> {
    callback: F,
}

impl<F> ProgressReporter for ClosureProgress<F>
where
    F: FnMut(u64, u64),
{
    fn on_progress(&mut self, bytes_processed: u64, total_bytes: u64) {
        (self.callback)(bytes_processed, total_bytes)
    }
}

/// Creates a closure-based progress reporter.
pub fn progress_fn<F>(f: F) -> ClosureProgress<F>
where
    F: FnMut(u64, u64),
{
    ClosureProgress { callback: f }
}

/// Formats bytes as a human-readable string using IEC units (KiB, MiB, GiB).
///
/// ```rust
/// use sevenz_decode::progress::format_bytes_iec;
///
/// assert_eq!(format_bytes_iec(512), "512 B");
/// assert_eq!(format_bytes_iec(1536), "1.5 KiB");
/// assert_eq!(format_bytes_iec(1048576), "1.0 MiB");
/// ```
pub fn format_bytes_iec(bytes: u64) -> String {
    let bytes_f64 = bytes as f64;
    if bytes_f64 < BYTES_KB {
        format!("{} B", bytes)
    } else if bytes_f64 < BYTES_MB {
        format!("{:.1} KiB", bytes_f64 / BYTES_KB)
    } else if bytes_f64 < BYTES_GB {
        format!("{:.1} MiB", bytes_f64 / BYTES_MB)
    } else {
        format!("{:.1} GiB", bytes_f64 / BYTES_GB)
    }
}
