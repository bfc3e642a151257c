//! Entry timestamps.
//!
//! 7z stores times as Windows FILETIME values: 100-nanosecond intervals
//! since January 1, 1601 (UTC).
//!
//! ```rust
//! use sevenz_decode::Timestamp;
//!
//! let ts = Timestamp::from_filetime(116444736000000000);
//! assert_eq!(ts.as_unix_secs(), 0);
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// FILETIME value of the Unix epoch.
const FILETIME_UNIX_DIFF: u64 = 116444736000000000;

/// Number of 100-nanosecond intervals per second.
const INTERVALS_PER_SECOND: u64 = 10_000_000;

/// A timestamp read from an archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    filetime: u64,
}

impl Timestamp {
    /// Wraps a raw FILETIME value.
    #[inline]
    pub const fn from_filetime(filetime: u64) -> Self {
        Self { filetime }
    }

    /// Returns the raw FILETIME value.
    #[inline]
    pub const fn as_filetime(&self) -> u64 {
        self.filetime
    }

    /// Whole seconds since the Unix epoch, rounded towards negative infinity.
    pub fn as_unix_secs(&self) -> i64 {
        let whole = (self.filetime / INTERVALS_PER_SECOND) as i64;
        whole - (FILETIME_UNIX_DIFF / INTERVALS_PER_SECOND) as i64
    }

    /// Sub-second part in nanoseconds (always a multiple of 100).
    #[inline]
    pub fn sub_second_nanos(&self) -> u32 {
        ((self.filetime % INTERVALS_PER_SECOND) * 100) as u32
    }

    /// Converts to a `SystemTime`.
    pub fn as_system_time(&self) -> SystemTime {
        if self.filetime >= FILETIME_UNIX_DIFF {
            let intervals = self.filetime - FILETIME_UNIX_DIFF;
            UNIX_EPOCH + interval_duration(intervals)
        } else {
            let intervals = FILETIME_UNIX_DIFF - self.filetime;
            UNIX_EPOCH - interval_duration(intervals)
        }
    }

    /// Converts to the representation used when setting file times.
    pub fn to_file_time(&self) -> filetime::FileTime {
        filetime::FileTime::from_unix_time(self.as_unix_secs(), self.sub_second_nanos())
    }
}

fn interval_duration(intervals: u64) -> Duration {
    Duration::new(
        intervals / INTERVALS_PER_SECOND,
        ((intervals % INTERVALS_PER_SECOND) * 100) as u32,
    )
}

impl From<u64> for Timestamp {
    fn from(filetime: u64) -> Self {
        Self::from_filetime(filetime)
    }
}
