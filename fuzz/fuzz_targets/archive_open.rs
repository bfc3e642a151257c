//! Fuzz target for Archive::open with arbitrary byte input.
//!
//! Exercises start header location, next header verification, encoded
//! header decoding and database assembly with adversarial input.
//!
//! Run with: cargo +nightly fuzz run archive_open

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    if let Ok(archive) = sevenz_decode::Archive::open(Cursor::new(data)) {
        let info = archive.info();
        assert_eq!(info.entry_count, archive.len());
        for entry in archive.entries() {
            let _ = entry.name.len();
            let _ = entry.size;
            let _ = entry.is_directory;
            let _ = entry.crc;
        }
    }
});
