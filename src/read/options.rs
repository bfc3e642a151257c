//! Extraction options and entry selection.

use std::num::NonZeroUsize;

use crate::pipeline::DEFAULT_CACHE_CAPACITY;
use crate::{Error, Result};

/// Thread configuration for decoding.
///
/// Only [`Threads::Single`] (and `Count(1)`) is implemented. The other
/// settings are accepted by the builder and rejected when extraction
/// starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Threads {
    /// Let the decoder pick a thread count.
    Auto,
    /// Use a specific number of threads.
    Count(NonZeroUsize),
    /// Single-threaded operation.
    #[default]
    Single,
}

impl Threads {
    /// `Threads::Count(n)`, or `Threads::Single` when `n` is zero.
    ///
    /// ```rust
    /// use sevenz_decode::read::Threads;
    ///
    /// assert_eq!(Threads::count_or_single(0), Threads::Single);
    /// assert_eq!(Threads::count_or_single(4).count(), 4);
    /// ```
    pub fn count_or_single(n: usize) -> Self {
        match NonZeroUsize::new(n) {
            Some(count) => Self::Count(count),
            None => Self::Single,
        }
    }

    /// Requested thread count. `Auto` resolves to the available parallelism.
    pub fn count(&self) -> usize {
        match self {
            Self::Auto => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            Self::Count(n) => n.get(),
            Self::Single => 1,
        }
    }

    /// Fails with [`Error::UnsupportedFeature`] unless decoding stays on
    /// the calling thread.
    pub fn ensure_supported(&self) -> Result<()> {
        match self {
            Self::Single => Ok(()),
            Self::Count(n) if n.get() == 1 => Ok(()),
            Self::Auto | Self::Count(_) => Err(Error::UnsupportedFeature {
                feature: "multithreaded decoding",
            }),
        }
    }
}

/// Options for extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Decode and verify without handing anything to the sink.
    pub test_only: bool,
    /// Thread configuration.
    pub threads: Threads,
    /// Capacity of the pipeline cache created by
    /// [`Archive::extract`](super::Archive::extract).
    pub cache_capacity: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            test_only: false,
            threads: Threads::Single,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl ExtractOptions {
    /// Creates extraction options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets test-only mode.
    pub fn test_only(mut self, test_only: bool) -> Self {
        self.test_only = test_only;
        self
    }

    /// Sets the thread configuration.
    pub fn threads(mut self, threads: Threads) -> Self {
        self.threads = threads;
        self
    }

    /// Sets the pipeline cache capacity.
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }
}

/// Which entries an extraction covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    /// Every entry.
    #[default]
    All,
    /// The listed entry indices, in any order.
    Indices(Vec<usize>),
}

impl Selection {
    /// Selects the given indices.
    pub fn indices(indices: impl IntoIterator<Item = usize>) -> Self {
        Self::Indices(indices.into_iter().collect())
    }

    /// Sorted, de-duplicated entry indices.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] if an index is not below `num_entries`.
    pub fn resolve(&self, num_entries: usize) -> Result<Vec<usize>> {
        match self {
            Self::All => Ok((0..num_entries).collect()),
            Self::Indices(indices) => {
                if let Some(&bad) = indices.iter().find(|&&i| i >= num_entries) {
                    return Err(Error::InvalidInput(format!(
                        "entry index {bad} out of range for {num_entries} entries"
                    )));
                }
                let mut sorted = indices.clone();
                sorted.sort_unstable();
                sorted.dedup();
                Ok(sorted)
            }
        }
    }
}

impl From<Vec<usize>> for Selection {
    fn from(indices: Vec<usize>) -> Self {
        Self::Indices(indices)
    }
}
