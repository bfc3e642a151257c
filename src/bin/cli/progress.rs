//! Progress bar for CLI operations.

use indicatif::{ProgressBar, ProgressStyle};
use sevenz_decode::progress::ProgressReporter;

/// Byte-based progress bar driven by the extractor.
pub struct CliProgress {
    bar: ProgressBar,
    failed: usize,
}

impl CliProgress {
    /// Creates a progress bar, hidden when `quiet` is set.
    pub fn new(quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            let pb = ProgressBar::new(0);
            if let Ok(style) = ProgressStyle::default_bar().template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {wide_msg}",
            ) {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb
        };

        Self { bar, failed: 0 }
    }

    /// Sets a message next to the bar.
    pub fn set_message(&self, msg: impl Into<String>) {
        self.bar.set_message(msg.into());
    }

    /// Number of entries reported as failed so far.
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Finishes the bar with a message.
    pub fn finish_with_message(&self, msg: impl Into<String>) {
        self.bar.finish_with_message(msg.into());
    }
}

impl ProgressReporter for CliProgress {
    fn on_total(&mut self, total_bytes: u64) {
        self.bar.set_length(total_bytes);
    }

    fn on_progress(&mut self, bytes_processed: u64, _total_bytes: u64) {
        self.bar.set_position(bytes_processed);
    }

    fn on_entry_complete(&mut self, entry_name: &str, success: bool) {
        if success {
            let display_name = if entry_name.chars().count() > 40 {
                let tail: String = entry_name
                    .chars()
                    .rev()
                    .take(37)
                    .collect::<Vec<_>>()
                    .into_iter()
                    .rev()
                    .collect();
                format!("...{tail}")
            } else {
                entry_name.to_string()
            };
            self.bar.set_message(display_name);
        } else {
            self.failed += 1;
            self.bar.println(format!("failed: {entry_name}"));
        }
    }
}
